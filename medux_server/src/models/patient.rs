//! core.patient: a patient record. For now it only carries resource
//! metadata; demographics are not modelled yet.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;

use crate::fhir::{Id, Uri};
use crate::models::resource::MetaInput;
use crate::schema::core_patient;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = core_patient, primary_key(version_id))]
pub struct Patient {
    pub version_id: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub profile: Option<String>,
    pub security_id: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = core_patient)]
pub struct NewPatient {
    pub version_id: String,
    pub profile: Option<String>,
    pub security_id: Option<i64>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = core_patient, treat_none_as_null = true)]
pub struct PatientChanges {
    pub profile: Option<String>,
    pub security_id: Option<i64>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientInput {
    #[serde(default)]
    pub meta: MetaInput,
}

impl PatientInput {
    pub fn into_new(self) -> NewPatient {
        NewPatient {
            version_id: Id::generate().into_inner(),
            profile: self.meta.profile.map(Uri::into_inner),
            security_id: self.meta.security,
        }
    }

    pub fn into_changes(self, now: DateTime<Utc>) -> PatientChanges {
        PatientChanges {
            profile: self.meta.profile.map(Uri::into_inner),
            security_id: self.meta.security,
            last_updated: now,
        }
    }
}
