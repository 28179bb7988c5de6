//! CRUD endpoints for the FHIR core models.

use std::slice;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use super::api::{self, DomainResourceJson, ListQuery, PatientJson, ResourceJson, SecurityLabels};
use super::auth::StaffUser;
use super::error::ApiResult;
use super::{AppState, PooledConn};
use crate::models::coding::{Coding, CodingInput};
use crate::models::domain_resource::DomainResourceInput;
use crate::models::patient::PatientInput;
use crate::models::resource::ResourceInput;
use crate::services::{
    coding_service, domain_resource_service, patient_service, resource_service, Page,
};

fn page(query: &ListQuery) -> Page {
    Page::new(query.limit, query.offset)
}

async fn security_labels(conn: &mut PooledConn, ids: &[i64]) -> ApiResult<SecurityLabels> {
    Ok(coding_service::codings_by_id(conn, ids).await?)
}

// ── Codings ──

pub async fn list_codings(
    _user: StaffUser,
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Coding>>> {
    let Query(query) = query?;
    let mut conn = state.conn().await?;
    Ok(Json(coding_service::list_codings(&mut conn, page(&query)).await?))
}

pub async fn get_coding(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Coding>> {
    let Path(id) = path?;
    let mut conn = state.conn().await?;
    Ok(Json(coding_service::get_coding(&mut conn, id).await?))
}

pub async fn create_coding(
    _user: StaffUser,
    State(state): State<AppState>,
    payload: Result<Json<CodingInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Coding>)> {
    let Json(input) = payload?;
    let mut conn = state.conn().await?;
    let coding = coding_service::create_coding(&mut conn, input).await?;
    Ok((StatusCode::CREATED, Json(coding)))
}

pub async fn update_coding(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CodingInput>, JsonRejection>,
) -> ApiResult<Json<Coding>> {
    let Path(id) = path?;
    let Json(input) = payload?;
    let mut conn = state.conn().await?;
    Ok(Json(coding_service::update_coding(&mut conn, id, input).await?))
}

pub async fn delete_coding(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    let mut conn = state.conn().await?;
    coding_service::delete_coding(&mut conn, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Resources ──

pub async fn list_resources(
    _user: StaffUser,
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ResourceJson>>> {
    let Query(query) = query?;
    let mut conn = state.conn().await?;
    let resources = resource_service::list_resources(&mut conn, page(&query)).await?;
    let labels = security_labels(&mut conn, &api::resource_labels(&resources)).await?;
    Ok(Json(
        resources
            .into_iter()
            .map(|r| ResourceJson::new(r, &labels))
            .collect(),
    ))
}

pub async fn get_resource(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<ResourceJson>> {
    let Path(version_id) = path?;
    let mut conn = state.conn().await?;
    let resource = resource_service::get_resource(&mut conn, &version_id).await?;
    let labels = security_labels(&mut conn, &api::resource_labels([&resource])).await?;
    Ok(Json(ResourceJson::new(resource, &labels)))
}

pub async fn create_resource(
    _user: StaffUser,
    State(state): State<AppState>,
    payload: Result<Json<ResourceInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ResourceJson>)> {
    let Json(input) = payload?;
    let mut conn = state.conn().await?;
    let resource = resource_service::create_resource(&mut conn, input).await?;
    let labels = security_labels(&mut conn, &api::resource_labels([&resource])).await?;
    Ok((StatusCode::CREATED, Json(ResourceJson::new(resource, &labels))))
}

pub async fn update_resource(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<ResourceInput>, JsonRejection>,
) -> ApiResult<Json<ResourceJson>> {
    let Path(version_id) = path?;
    let Json(input) = payload?;
    let mut conn = state.conn().await?;
    let resource = resource_service::update_resource(&mut conn, &version_id, input).await?;
    let labels = security_labels(&mut conn, &api::resource_labels([&resource])).await?;
    Ok(Json(ResourceJson::new(resource, &labels)))
}

pub async fn delete_resource(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(version_id) = path?;
    let mut conn = state.conn().await?;
    resource_service::delete_resource(&mut conn, &version_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Domain resources ──

pub async fn list_domain_resources(
    _user: StaffUser,
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<DomainResourceJson>>> {
    let Query(query) = query?;
    let mut conn = state.conn().await?;
    let domains = domain_resource_service::list_domain_resources(&mut conn, page(&query)).await?;
    let labels = security_labels(&mut conn, &api::domain_resource_labels(&domains)).await?;
    Ok(Json(
        domains
            .into_iter()
            .map(|d| DomainResourceJson::new(d, &labels))
            .collect(),
    ))
}

pub async fn get_domain_resource(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<DomainResourceJson>> {
    let Path(version_id) = path?;
    let mut conn = state.conn().await?;
    let domain = domain_resource_service::get_domain_resource(&mut conn, &version_id).await?;
    let ids = api::domain_resource_labels(slice::from_ref(&domain));
    let labels = security_labels(&mut conn, &ids).await?;
    Ok(Json(DomainResourceJson::new(domain, &labels)))
}

pub async fn create_domain_resource(
    _user: StaffUser,
    State(state): State<AppState>,
    payload: Result<Json<DomainResourceInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DomainResourceJson>)> {
    let Json(input) = payload?;
    let mut conn = state.conn().await?;
    let domain = domain_resource_service::create_domain_resource(&mut conn, input).await?;
    let ids = api::domain_resource_labels(slice::from_ref(&domain));
    let labels = security_labels(&mut conn, &ids).await?;
    Ok((StatusCode::CREATED, Json(DomainResourceJson::new(domain, &labels))))
}

pub async fn update_domain_resource(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<DomainResourceInput>, JsonRejection>,
) -> ApiResult<Json<DomainResourceJson>> {
    let Path(version_id) = path?;
    let Json(input) = payload?;
    let mut conn = state.conn().await?;
    let domain =
        domain_resource_service::update_domain_resource(&mut conn, &version_id, input).await?;
    let ids = api::domain_resource_labels(slice::from_ref(&domain));
    let labels = security_labels(&mut conn, &ids).await?;
    Ok(Json(DomainResourceJson::new(domain, &labels)))
}

pub async fn delete_domain_resource(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(version_id) = path?;
    let mut conn = state.conn().await?;
    domain_resource_service::delete_domain_resource(&mut conn, &version_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Patients ──

pub async fn list_patients(
    _user: StaffUser,
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<PatientJson>>> {
    let Query(query) = query?;
    let mut conn = state.conn().await?;
    let patients = patient_service::list_patients(&mut conn, page(&query)).await?;
    let labels = security_labels(&mut conn, &api::patient_labels(&patients)).await?;
    Ok(Json(
        patients
            .into_iter()
            .map(|p| PatientJson::new(p, &labels))
            .collect(),
    ))
}

pub async fn get_patient(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<PatientJson>> {
    let Path(version_id) = path?;
    let mut conn = state.conn().await?;
    let patient = patient_service::get_patient(&mut conn, &version_id).await?;
    let labels = security_labels(&mut conn, &api::patient_labels(slice::from_ref(&patient))).await?;
    Ok(Json(PatientJson::new(patient, &labels)))
}

pub async fn create_patient(
    _user: StaffUser,
    State(state): State<AppState>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PatientJson>)> {
    let Json(input) = payload?;
    let mut conn = state.conn().await?;
    let patient = patient_service::create_patient(&mut conn, input).await?;
    let labels = security_labels(&mut conn, &api::patient_labels(slice::from_ref(&patient))).await?;
    Ok((StatusCode::CREATED, Json(PatientJson::new(patient, &labels))))
}

pub async fn update_patient(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> ApiResult<Json<PatientJson>> {
    let Path(version_id) = path?;
    let Json(input) = payload?;
    let mut conn = state.conn().await?;
    let patient = patient_service::update_patient(&mut conn, &version_id, input).await?;
    let labels = security_labels(&mut conn, &api::patient_labels(slice::from_ref(&patient))).await?;
    Ok(Json(PatientJson::new(patient, &labels)))
}

pub async fn delete_patient(
    _user: StaffUser,
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(version_id) = path?;
    let mut conn = state.conn().await?;
    patient_service::delete_patient(&mut conn, &version_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
