//! DomainResource CRUD: the resource row, its narrative and its contained
//! resources are always written together in one transaction.

use std::collections::HashMap;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use super::{coding_service, resource_service, Page, ServiceError, ServiceResult};
use crate::fhir::Id;
use crate::models::domain_resource::{
    DomainResource, DomainResourceInput, DomainResourceRow, NewContained,
};
use crate::models::resource::Resource;
use crate::schema::{core_domain_resource, core_domain_resource_contained, core_resource};

/// Contained version ids in submission order, without duplicates.
pub fn unique_ids(ids: Vec<Id>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.into_inner();
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

/// A domain resource must not contain itself.
pub fn check_not_self_contained(owner: &str, contained: &[String]) -> ServiceResult<()> {
    if contained.iter().any(|id| id == owner) {
        return Err(ServiceError::Validation(
            "a resource cannot contain itself".to_string(),
        ));
    }
    Ok(())
}

async fn load_contained(
    conn: &mut AsyncPgConnection,
    owners: &[String],
) -> ServiceResult<HashMap<String, Vec<Resource>>> {
    if owners.is_empty() {
        return Ok(HashMap::new());
    }
    let links: Vec<(String, Resource)> = core_domain_resource_contained::table
        .inner_join(core_resource::table)
        .filter(core_domain_resource_contained::domain_resource_id.eq_any(owners))
        .order(core_domain_resource_contained::id.asc())
        .select((
            core_domain_resource_contained::domain_resource_id,
            Resource::as_select(),
        ))
        .load(conn)
        .await?;

    let mut contained: HashMap<String, Vec<Resource>> = HashMap::new();
    for (owner, resource) in links {
        contained.entry(owner).or_default().push(resource);
    }
    Ok(contained)
}

fn assemble(
    rows: Vec<(DomainResourceRow, Resource)>,
    mut contained: HashMap<String, Vec<Resource>>,
) -> ServiceResult<Vec<DomainResource>> {
    rows.into_iter()
        .map(|(row, resource)| -> ServiceResult<DomainResource> {
            Ok(DomainResource {
                text: row.narrative()?,
                contained: contained.remove(&row.resource_ptr_id).unwrap_or_default(),
                resource,
            })
        })
        .collect()
}

pub async fn list_domain_resources(
    conn: &mut AsyncPgConnection,
    page: Page,
) -> ServiceResult<Vec<DomainResource>> {
    let rows: Vec<(DomainResourceRow, Resource)> = core_domain_resource::table
        .inner_join(core_resource::table)
        .order((core_resource::created.asc(), core_resource::version_id.asc()))
        .limit(page.limit)
        .offset(page.offset)
        .select((DomainResourceRow::as_select(), Resource::as_select()))
        .load(conn)
        .await?;

    let owners: Vec<String> = rows.iter().map(|(row, _)| row.resource_ptr_id.clone()).collect();
    let contained = load_contained(conn, &owners).await?;
    assemble(rows, contained)
}

pub async fn get_domain_resource(
    conn: &mut AsyncPgConnection,
    version_id: &str,
) -> ServiceResult<DomainResource> {
    let row: (DomainResourceRow, Resource) = core_domain_resource::table
        .inner_join(core_resource::table)
        .filter(core_domain_resource::resource_ptr_id.eq(version_id))
        .select((DomainResourceRow::as_select(), Resource::as_select()))
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::not_found("domain resource", version_id))?;

    let contained = load_contained(conn, &[version_id.to_string()]).await?;
    assemble(vec![row], contained)?
        .pop()
        .ok_or_else(|| ServiceError::not_found("domain resource", version_id))
}

async fn replace_contained(
    conn: &mut AsyncPgConnection,
    owner: &str,
    contained: &[String],
) -> ServiceResult<()> {
    check_not_self_contained(owner, contained)?;
    let missing = resource_service::missing_resources(conn, contained).await?;
    if !missing.is_empty() {
        return Err(ServiceError::Validation(format!(
            "contained resources not found: {}",
            missing.join(", ")
        )));
    }

    diesel::delete(
        core_domain_resource_contained::table
            .filter(core_domain_resource_contained::domain_resource_id.eq(owner)),
    )
    .execute(conn)
    .await?;

    let links: Vec<NewContained> = contained
        .iter()
        .map(|resource_id| NewContained {
            domain_resource_id: owner.to_string(),
            resource_id: resource_id.clone(),
        })
        .collect();
    if !links.is_empty() {
        diesel::insert_into(core_domain_resource_contained::table)
            .values(&links)
            .execute(conn)
            .await?;
    }
    Ok(())
}

pub async fn create_domain_resource(
    conn: &mut AsyncPgConnection,
    input: DomainResourceInput,
) -> ServiceResult<DomainResource> {
    let version_id = conn
        .transaction::<_, ServiceError, _>(|conn| {
            async move {
                coding_service::ensure_security_label(conn, input.resource.meta.security).await?;
                let new_resource = input.resource.into_new();
                let version_id = new_resource.version_id.clone();

                diesel::insert_into(core_resource::table)
                    .values(&new_resource)
                    .execute(conn)
                    .await?;
                diesel::insert_into(core_domain_resource::table)
                    .values(&DomainResourceRow::new(version_id.clone(), &input.text))
                    .execute(conn)
                    .await?;
                replace_contained(conn, &version_id, &unique_ids(input.contained)).await?;
                Ok(version_id)
            }
            .scope_boxed()
        })
        .await?;

    crate::metrics::record_created("domain_resource");
    tracing::info!(version_id = %version_id, "Domain resource created");
    get_domain_resource(conn, &version_id).await
}

pub async fn update_domain_resource(
    conn: &mut AsyncPgConnection,
    version_id: &str,
    input: DomainResourceInput,
) -> ServiceResult<DomainResource> {
    let owner = version_id.to_string();
    conn.transaction::<_, ServiceError, _>(|conn| {
        async move {
            let updated = diesel::update(core_domain_resource::table.find(owner.as_str()))
                .set((
                    core_domain_resource::narrative_status.eq(input.text.status().as_str()),
                    core_domain_resource::narrative_div.eq(input.text.div()),
                ))
                .execute(conn)
                .await?;
            if updated == 0 {
                return Err(ServiceError::not_found("domain resource", &owner));
            }

            coding_service::ensure_security_label(conn, input.resource.meta.security).await?;
            diesel::update(core_resource::table.find(owner.as_str()))
                .set(&input.resource.into_changes(Utc::now()))
                .execute(conn)
                .await?;
            replace_contained(conn, &owner, &unique_ids(input.contained)).await?;
            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    crate::metrics::record_updated("domain_resource");
    tracing::info!(version_id = %version_id, "Domain resource updated");
    get_domain_resource(conn, version_id).await
}

pub async fn delete_domain_resource(
    conn: &mut AsyncPgConnection,
    version_id: &str,
) -> ServiceResult<()> {
    let exists: i64 = core_domain_resource::table
        .filter(core_domain_resource::resource_ptr_id.eq(version_id))
        .count()
        .get_result(conn)
        .await?;
    if exists == 0 {
        return Err(ServiceError::not_found("domain resource", version_id));
    }
    resource_service::delete_resource(conn, version_id).await
}
