//! core.coding: a code from a terminology system.
//!
//! http://build.fhir.org/datatypes-definitions.html#Coding

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::fhir::datatypes::check_length;
use crate::fhir::{Code, DatatypeError, Uri};
use crate::schema::core_coding;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = core_coding)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    pub id: i64,
    /// Identity of the code system that defines the meaning of the code.
    pub system: Option<String>,
    /// Version of the code system used when choosing the code.
    pub version: Option<String>,
    pub code: String,
    /// Meaning of the code, following the rules of the system.
    pub display: String,
    /// The code was picked directly by a user, e.g. off a pick list.
    pub user_selected: bool,
}

#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = core_coding, treat_none_as_null = true)]
pub struct NewCoding {
    pub system: Option<String>,
    pub version: Option<String>,
    pub code: String,
    pub display: String,
    pub user_selected: bool,
}

/// A coding as submitted by API clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodingInput {
    pub system: Option<Uri>,
    pub version: Option<String>,
    pub code: Code,
    pub display: String,
    #[serde(default)]
    pub user_selected: bool,
}

impl CodingInput {
    pub fn into_new(self) -> Result<NewCoding, DatatypeError> {
        let version = self.version.filter(|v| !v.is_empty());
        if let Some(version) = &version {
            check_length("version", version, 35)?;
        }
        check_length("display", &self.display, 255)?;
        Ok(NewCoding {
            system: self.system.map(Uri::into_inner),
            version,
            code: self.code.into_inner(),
            display: self.display,
            user_selected: self.user_selected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(json: &str) -> CodingInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn converts_valid_input() {
        let new = input(
            r#"{"system":"http://loinc.org","version":"2.61","code":"8867-4","display":"Heart rate","userSelected":true}"#,
        )
        .into_new()
        .unwrap();
        assert_eq!(new.system.as_deref(), Some("http://loinc.org"));
        assert_eq!(new.version.as_deref(), Some("2.61"));
        assert_eq!(new.code, "8867-4");
        assert!(new.user_selected);
    }

    #[test]
    fn empty_version_means_none() {
        let new = input(r#"{"code":"x","display":"X","version":""}"#).into_new().unwrap();
        assert_eq!(new.version, None);
        assert_eq!(new.system, None);
        assert!(!new.user_selected);
    }

    #[test]
    fn rejects_long_version_and_missing_display() {
        let err = input(&format!(
            r#"{{"code":"x","display":"X","version":"{}"}}"#,
            "9".repeat(36)
        ))
        .into_new()
        .unwrap_err();
        assert!(matches!(err, DatatypeError::TooLong { kind: "version", max: 35, .. }));

        let err = input(r#"{"code":"x","display":""}"#).into_new().unwrap_err();
        assert_eq!(err, DatatypeError::Empty { kind: "display" });
    }

    #[test]
    fn serializes_in_camel_case() {
        let coding = Coding {
            id: 7,
            system: Some("http://snomed.info/sct".into()),
            version: None,
            code: "38341003".into(),
            display: "Hypertension".into(),
            user_selected: false,
        };
        let json = serde_json::to_value(&coding).unwrap();
        assert_eq!(json["userSelected"], false);
        assert_eq!(json["code"], "38341003");
        assert!(json["version"].is_null());
    }
}
