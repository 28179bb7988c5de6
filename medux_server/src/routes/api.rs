//! JSON representations returned by the API, in FHIR camelCase.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fhir::{Instant, Narrative};
use crate::models::coding::Coding;
use crate::models::domain_resource::DomainResource;
use crate::models::patient::Patient;
use crate::models::resource::Resource;
use crate::models::user::User;

/// Codings referenced as security labels, keyed by id.
pub type SecurityLabels = HashMap<i64, Coding>;

#[derive(Debug, Serialize)]
pub struct HealthJson {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaJson {
    pub version_id: String,
    pub created: Instant,
    pub last_updated: Instant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Coding>,
}

impl MetaJson {
    fn new(
        version_id: String,
        created: chrono::DateTime<chrono::Utc>,
        last_updated: chrono::DateTime<chrono::Utc>,
        profile: Option<String>,
        security_id: Option<i64>,
        labels: &SecurityLabels,
    ) -> Self {
        Self {
            version_id,
            created: created.into(),
            last_updated: last_updated.into(),
            profile,
            security: security_id.and_then(|id| labels.get(&id).cloned()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceJson {
    pub resource_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub meta: MetaJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit_rules: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ResourceJson {
    pub fn new(resource: Resource, labels: &SecurityLabels) -> Self {
        Self::typed("Resource", resource, labels)
    }

    fn typed(resource_type: &'static str, resource: Resource, labels: &SecurityLabels) -> Self {
        Self {
            resource_type,
            id: resource.logical_id,
            meta: MetaJson::new(
                resource.version_id,
                resource.created,
                resource.last_updated,
                resource.profile,
                resource.security_id,
                labels,
            ),
            implicit_rules: resource.implicit_rules,
            language: resource.language,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResourceJson {
    #[serde(flatten)]
    pub resource: ResourceJson,
    pub text: Narrative,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contained: Vec<ResourceJson>,
}

impl DomainResourceJson {
    pub fn new(domain: DomainResource, labels: &SecurityLabels) -> Self {
        Self {
            resource: ResourceJson::typed("DomainResource", domain.resource, labels),
            text: domain.text,
            contained: domain
                .contained
                .into_iter()
                .map(|r| ResourceJson::new(r, labels))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientJson {
    pub resource_type: &'static str,
    pub meta: MetaJson,
}

impl PatientJson {
    pub fn new(patient: Patient, labels: &SecurityLabels) -> Self {
        Self {
            resource_type: "Patient",
            meta: MetaJson::new(
                patient.version_id,
                patient.created,
                patient.last_updated,
                patient.profile,
                patient.security_id,
                labels,
            ),
        }
    }
}

/// Security label ids used by a set of resources, for one batched lookup.
pub fn resource_labels<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Vec<i64> {
    let mut ids: Vec<i64> = resources.into_iter().filter_map(|r| r.security_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub fn domain_resource_labels(domains: &[DomainResource]) -> Vec<i64> {
    resource_labels(
        domains
            .iter()
            .flat_map(|d| std::iter::once(&d.resource).chain(d.contained.iter())),
    )
}

pub fn patient_labels(patients: &[Patient]) -> Vec<i64> {
    let mut ids: Vec<i64> = patients.iter().filter_map(|p| p.security_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// A user account; the password hash is never exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJson {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: Instant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<Instant>,
}

impl From<User> for UserJson {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_superuser: user.is_superuser,
            is_staff: user.is_staff,
            is_active: user.is_active,
            date_joined: user.date_joined.into(),
            last_login: user.last_login.map(Instant::from),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: Instant,
    pub user: UserJson,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::fhir::NarrativeStatus;

    fn resource(version_id: &str, security_id: Option<i64>) -> Resource {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        Resource {
            version_id: version_id.to_string(),
            created: at,
            last_updated: at,
            profile: None,
            security_id,
            logical_id: Some("obs-1".to_string()),
            implicit_rules: None,
            language: Some("de-AT".to_string()),
        }
    }

    fn label() -> Coding {
        Coding {
            id: 7,
            system: Some("http://terminology.hl7.org/CodeSystem/v3-Confidentiality".into()),
            version: None,
            code: "R".into(),
            display: "restricted".into(),
            user_selected: false,
        }
    }

    #[test]
    fn resource_json_is_fhir_shaped() {
        let labels: SecurityLabels = [(7, label())].into_iter().collect();
        let value = serde_json::to_value(ResourceJson::new(resource("v1", Some(7)), &labels)).unwrap();
        assert_eq!(
            value,
            json!({
                "resourceType": "Resource",
                "id": "obs-1",
                "meta": {
                    "versionId": "v1",
                    "created": "2024-03-01T08:30:00Z",
                    "lastUpdated": "2024-03-01T08:30:00Z",
                    "security": {
                        "id": 7,
                        "system": "http://terminology.hl7.org/CodeSystem/v3-Confidentiality",
                        "version": null,
                        "code": "R",
                        "display": "restricted",
                        "userSelected": false
                    }
                },
                "language": "de-AT"
            })
        );
    }

    #[test]
    fn domain_resource_json_flattens_and_nests_contained() {
        let domain = DomainResource {
            resource: resource("owner", None),
            text: Narrative::new(NarrativeStatus::Generated, "<div>ok</div>").unwrap(),
            contained: vec![resource("inner", Some(7))],
        };
        assert_eq!(domain_resource_labels(std::slice::from_ref(&domain)), vec![7]);

        let value = serde_json::to_value(DomainResourceJson::new(domain, &SecurityLabels::new())).unwrap();
        assert_eq!(value["resourceType"], "DomainResource");
        assert_eq!(value["meta"]["versionId"], "owner");
        assert_eq!(value["text"], json!({"status": "generated", "div": "<div>ok</div>"}));
        assert_eq!(value["contained"][0]["resourceType"], "Resource");
        assert_eq!(value["contained"][0]["meta"]["versionId"], "inner");
        // label id unknown to the lookup is omitted rather than invented
        assert!(value["contained"][0]["meta"].get("security").is_none());
    }

    #[test]
    fn user_json_hides_the_password() {
        let user = User {
            id: 1,
            username: "admin".into(),
            email: String::new(),
            password: "pbkdf2_sha256$1$salt$hash".into(),
            is_superuser: true,
            is_staff: true,
            is_active: true,
            date_joined: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_login: None,
        };
        let value = serde_json::to_value(UserJson::from(user)).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["isSuperuser"], true);
        assert_eq!(value["dateJoined"], "2024-01-01T00:00:00Z");
    }
}
