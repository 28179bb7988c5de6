//! core.domain_resource: a resource with narrative text and contained
//! resources.
//!
//! A domain resource is stored as a `core_resource` row plus a
//! `core_domain_resource` row sharing its version id; contained resources
//! are links in `core_domain_resource_contained`.

use diesel::prelude::*;
use serde::Deserialize;

use crate::fhir::{DatatypeError, Id, Narrative};
use crate::models::resource::{Resource, ResourceInput};
use crate::schema::{core_domain_resource, core_domain_resource_contained};

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Insertable)]
#[diesel(table_name = core_domain_resource, primary_key(resource_ptr_id))]
pub struct DomainResourceRow {
    pub resource_ptr_id: String,
    pub narrative_status: String,
    pub narrative_div: String,
}

impl DomainResourceRow {
    pub fn new(resource_ptr_id: String, text: &Narrative) -> Self {
        Self {
            resource_ptr_id,
            narrative_status: text.status().as_str().to_string(),
            narrative_div: text.div().to_string(),
        }
    }

    pub fn narrative(&self) -> Result<Narrative, DatatypeError> {
        Narrative::new(self.narrative_status.parse()?, self.narrative_div.clone())
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = core_domain_resource_contained)]
pub struct NewContained {
    pub domain_resource_id: String,
    pub resource_id: String,
}

/// A domain resource with its narrative and contained resources loaded.
#[derive(Debug, Clone)]
pub struct DomainResource {
    pub resource: Resource,
    pub text: Narrative,
    pub contained: Vec<Resource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainResourceInput {
    #[serde(flatten)]
    pub resource: ResourceInput,
    pub text: Narrative,
    /// Version ids of the contained resources.
    #[serde(default)]
    pub contained: Vec<Id>,
}
