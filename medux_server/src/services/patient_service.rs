//! Patient CRUD.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::{coding_service, Page, ServiceError, ServiceResult};
use crate::models::patient::{Patient, PatientInput};
use crate::schema::core_patient;

pub async fn list_patients(conn: &mut AsyncPgConnection, page: Page) -> ServiceResult<Vec<Patient>> {
    let results = core_patient::table
        .order((core_patient::created.asc(), core_patient::version_id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .select(Patient::as_select())
        .load(conn)
        .await?;
    Ok(results)
}

pub async fn get_patient(conn: &mut AsyncPgConnection, version_id: &str) -> ServiceResult<Patient> {
    core_patient::table
        .find(version_id)
        .select(Patient::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::not_found("patient", version_id))
}

pub async fn create_patient(
    conn: &mut AsyncPgConnection,
    input: PatientInput,
) -> ServiceResult<Patient> {
    coding_service::ensure_security_label(conn, input.meta.security).await?;
    let result = diesel::insert_into(core_patient::table)
        .values(&input.into_new())
        .returning(Patient::as_returning())
        .get_result(conn)
        .await?;

    crate::metrics::record_created("patient");
    tracing::info!(version_id = %result.version_id, "Patient created");
    Ok(result)
}

pub async fn update_patient(
    conn: &mut AsyncPgConnection,
    version_id: &str,
    input: PatientInput,
) -> ServiceResult<Patient> {
    coding_service::ensure_security_label(conn, input.meta.security).await?;
    let result = diesel::update(core_patient::table.find(version_id))
        .set(&input.into_changes(Utc::now()))
        .returning(Patient::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::not_found("patient", version_id))?;

    crate::metrics::record_updated("patient");
    tracing::info!(version_id = %version_id, "Patient updated");
    Ok(result)
}

pub async fn delete_patient(conn: &mut AsyncPgConnection, version_id: &str) -> ServiceResult<()> {
    let deleted = diesel::delete(core_patient::table.find(version_id))
        .execute(conn)
        .await?;
    if deleted == 0 {
        return Err(ServiceError::not_found("patient", version_id));
    }

    crate::metrics::record_deleted("patient");
    tracing::info!(version_id = %version_id, "Patient deleted");
    Ok(())
}
