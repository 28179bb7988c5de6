//! Coding CRUD.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use super::{Page, ServiceError, ServiceResult};
use crate::models::coding::{Coding, CodingInput};
use crate::schema::core_coding;

pub async fn list_codings(conn: &mut AsyncPgConnection, page: Page) -> ServiceResult<Vec<Coding>> {
    let results = core_coding::table
        .order(core_coding::id.asc())
        .limit(page.limit)
        .offset(page.offset)
        .select(Coding::as_select())
        .load(conn)
        .await?;
    Ok(results)
}

pub async fn get_coding(conn: &mut AsyncPgConnection, id: i64) -> ServiceResult<Coding> {
    core_coding::table
        .find(id)
        .select(Coding::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::not_found("coding", id))
}

/// Fetch the codings with the given ids, keyed by id.
pub async fn codings_by_id(
    conn: &mut AsyncPgConnection,
    ids: &[i64],
) -> ServiceResult<HashMap<i64, Coding>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let results: Vec<Coding> = core_coding::table
        .filter(core_coding::id.eq_any(ids))
        .select(Coding::as_select())
        .load(conn)
        .await?;
    Ok(results.into_iter().map(|c| (c.id, c)).collect())
}

/// Fail with a validation error unless `security` names an existing coding.
pub async fn ensure_security_label(
    conn: &mut AsyncPgConnection,
    security: Option<i64>,
) -> ServiceResult<()> {
    let Some(id) = security else {
        return Ok(());
    };
    let count: i64 = core_coding::table
        .filter(core_coding::id.eq(id))
        .count()
        .get_result(conn)
        .await?;
    if count == 0 {
        return Err(ServiceError::Validation(format!(
            "security label refers to unknown coding {id}"
        )));
    }
    Ok(())
}

pub async fn create_coding(
    conn: &mut AsyncPgConnection,
    input: CodingInput,
) -> ServiceResult<Coding> {
    let new_coding = input.into_new()?;
    let result = diesel::insert_into(core_coding::table)
        .values(&new_coding)
        .returning(Coding::as_returning())
        .get_result(conn)
        .await?;

    crate::metrics::record_created("coding");
    tracing::info!(coding_id = result.id, code = %result.code, "Coding created");
    Ok(result)
}

pub async fn update_coding(
    conn: &mut AsyncPgConnection,
    id: i64,
    input: CodingInput,
) -> ServiceResult<Coding> {
    let changes = input.into_new()?;
    let result = diesel::update(core_coding::table.find(id))
        .set(&changes)
        .returning(Coding::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::not_found("coding", id))?;

    crate::metrics::record_updated("coding");
    tracing::info!(coding_id = id, "Coding updated");
    Ok(result)
}

/// Delete a coding. Codings still used as a security label are protected.
pub async fn delete_coding(conn: &mut AsyncPgConnection, id: i64) -> ServiceResult<()> {
    let deleted = diesel::delete(core_coding::table.find(id))
        .execute(conn)
        .await
        .map_err(|e| match ServiceError::from(e) {
            ServiceError::Conflict(_) => {
                ServiceError::Conflict(format!("coding {id} is in use as a security label"))
            }
            other => other,
        })?;
    if deleted == 0 {
        return Err(ServiceError::not_found("coding", id));
    }

    crate::metrics::record_deleted("coding");
    tracing::info!(coding_id = id, "Coding deleted");
    Ok(())
}
