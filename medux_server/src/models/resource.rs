//! core.resource: the base of every FHIR resource.
//!
//! Every resource carries the same metadata: a server-assigned version id
//! (the primary key), creation and last-update instants, an optional
//! profile and an optional security label.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;

use crate::fhir::{Id, LanguageTag, Uri};
use crate::schema::core_resource;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = core_resource, primary_key(version_id))]
pub struct Resource {
    pub version_id: String,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub profile: Option<String>,
    pub security_id: Option<i64>,
    /// Logical id of the resource.
    pub logical_id: Option<String>,
    pub implicit_rules: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = core_resource)]
pub struct NewResource {
    pub version_id: String,
    pub profile: Option<String>,
    pub security_id: Option<i64>,
    pub logical_id: Option<String>,
    pub implicit_rules: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = core_resource, treat_none_as_null = true)]
pub struct ResourceChanges {
    pub profile: Option<String>,
    pub security_id: Option<i64>,
    pub logical_id: Option<String>,
    pub implicit_rules: Option<String>,
    pub language: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Client-settable metadata. Version id and timestamps are always
/// assigned by the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaInput {
    pub profile: Option<Uri>,
    /// Id of the Coding used as security label.
    pub security: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInput {
    pub id: Option<Id>,
    #[serde(default)]
    pub meta: MetaInput,
    pub implicit_rules: Option<Uri>,
    pub language: Option<LanguageTag>,
}

impl ResourceInput {
    /// Row for a new resource with a freshly generated version id.
    pub fn into_new(self) -> NewResource {
        NewResource {
            version_id: Id::generate().into_inner(),
            profile: self.meta.profile.map(Uri::into_inner),
            security_id: self.meta.security,
            logical_id: self.id.map(Id::into_inner),
            implicit_rules: self.implicit_rules.map(Uri::into_inner),
            language: self.language.map(LanguageTag::into_inner),
        }
    }

    pub fn into_changes(self, now: DateTime<Utc>) -> ResourceChanges {
        ResourceChanges {
            profile: self.meta.profile.map(Uri::into_inner),
            security_id: self.meta.security,
            logical_id: self.id.map(Id::into_inner),
            implicit_rules: self.implicit_rules.map(Uri::into_inner),
            language: self.language.map(LanguageTag::into_inner),
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_new_resource_gets_its_own_version_id() {
        let a = ResourceInput::default().into_new();
        let b = ResourceInput::default().into_new();
        assert_ne!(a.version_id, b.version_id);
        assert!(Id::parse(&a.version_id).is_ok());
    }

    #[test]
    fn input_is_validated_while_parsing() {
        let input: ResourceInput = serde_json::from_str(
            r#"{"id":"example","meta":{"profile":"http://hl7.org/fhir/StructureDefinition/Resource","security":3},"language":"de-AT"}"#,
        )
        .unwrap();
        let new = input.into_new();
        assert_eq!(new.logical_id.as_deref(), Some("example"));
        assert_eq!(new.security_id, Some(3));
        assert_eq!(new.language.as_deref(), Some("de-AT"));

        assert!(serde_json::from_str::<ResourceInput>(r#"{"id":"not valid"}"#).is_err());
        assert!(serde_json::from_str::<ResourceInput>(r#"{"language":"german"}"#).is_err());
        assert!(serde_json::from_str::<ResourceInput>(r#"{"implicitRules":"a b"}"#).is_err());
    }

    #[test]
    fn changes_clear_omitted_fields_and_touch_last_updated() {
        let now = Utc::now();
        let changes = ResourceInput::default().into_changes(now);
        assert_eq!(changes.profile, None);
        assert_eq!(changes.language, None);
        assert_eq!(changes.last_updated, now);
    }
}
