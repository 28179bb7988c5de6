//! Resource CRUD.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::{coding_service, Page, ServiceError, ServiceResult};
use crate::models::resource::{Resource, ResourceInput};
use crate::schema::core_resource;

pub async fn list_resources(
    conn: &mut AsyncPgConnection,
    page: Page,
) -> ServiceResult<Vec<Resource>> {
    let results = core_resource::table
        .order((core_resource::created.asc(), core_resource::version_id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .select(Resource::as_select())
        .load(conn)
        .await?;
    Ok(results)
}

pub async fn get_resource(conn: &mut AsyncPgConnection, version_id: &str) -> ServiceResult<Resource> {
    core_resource::table
        .find(version_id)
        .select(Resource::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::not_found("resource", version_id))
}

/// Version ids from `ids` that do not exist.
pub async fn missing_resources(
    conn: &mut AsyncPgConnection,
    ids: &[String],
) -> ServiceResult<Vec<String>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let found: Vec<String> = core_resource::table
        .filter(core_resource::version_id.eq_any(ids))
        .select(core_resource::version_id)
        .load(conn)
        .await?;
    Ok(ids
        .iter()
        .filter(|id| !found.contains(id))
        .cloned()
        .collect())
}

pub async fn create_resource(
    conn: &mut AsyncPgConnection,
    input: ResourceInput,
) -> ServiceResult<Resource> {
    coding_service::ensure_security_label(conn, input.meta.security).await?;
    let new_resource = input.into_new();
    let result = diesel::insert_into(core_resource::table)
        .values(&new_resource)
        .returning(Resource::as_returning())
        .get_result(conn)
        .await?;

    crate::metrics::record_created("resource");
    tracing::info!(version_id = %result.version_id, "Resource created");
    Ok(result)
}

pub async fn update_resource(
    conn: &mut AsyncPgConnection,
    version_id: &str,
    input: ResourceInput,
) -> ServiceResult<Resource> {
    coding_service::ensure_security_label(conn, input.meta.security).await?;
    let changes = input.into_changes(Utc::now());
    let result = diesel::update(core_resource::table.find(version_id))
        .set(&changes)
        .returning(Resource::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::not_found("resource", version_id))?;

    crate::metrics::record_updated("resource");
    tracing::info!(version_id = %version_id, "Resource updated");
    Ok(result)
}

/// Delete a resource; domain resource data and containment links go with it.
pub async fn delete_resource(conn: &mut AsyncPgConnection, version_id: &str) -> ServiceResult<()> {
    let deleted = diesel::delete(core_resource::table.find(version_id))
        .execute(conn)
        .await?;
    if deleted == 0 {
        return Err(ServiceError::not_found("resource", version_id));
    }

    crate::metrics::record_deleted("resource");
    tracing::info!(version_id = %version_id, "Resource deleted");
    Ok(())
}
