//! FHIR primitive datatypes used by the core model.
//!
//! Each type validates on construction and on deserialization, so a value
//! that exists is a value that satisfies its FHIR constraints.
//! See <http://build.fhir.org/datatypes.html>.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::DatatypeError;

/// Maximum length of URI-like values.
pub const URI_MAX_LEN: usize = 255;
/// Maximum length of codes and ids.
pub const CODE_MAX_LEN: usize = 64;

static ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-.]+$").unwrap());
static OID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(urn:oid:)?[0-2](\.[1-9]\d*)+$").unwrap());
static LANGUAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]{2,3}(-[a-zA-Z0-9]{2,8})*$").unwrap());

/// Reject empty values and values longer than `max` characters.
pub fn check_length(kind: &'static str, value: &str, max: usize) -> Result<(), DatatypeError> {
    if value.is_empty() {
        return Err(DatatypeError::Empty { kind });
    }
    let len = value.chars().count();
    if len > max {
        return Err(DatatypeError::TooLong { kind, max, len });
    }
    Ok(())
}

macro_rules! string_datatype {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = DatatypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DatatypeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// A Uniform Resource Identifier reference (RFC 3986).
///
/// URIs are case sensitive; UUIDs inside URIs should be lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri(String);

impl Uri {
    pub fn parse(value: &str) -> Result<Self, DatatypeError> {
        check_length("uri", value, URI_MAX_LEN)?;
        if value.chars().any(char::is_whitespace) {
            return Err(DatatypeError::InvalidCharacters {
                kind: "uri",
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }
}

string_datatype!(Uri);

/// An OID represented as a URI, e.g. `urn:oid:1.2.3.4`.
///
/// No stored field uses it yet; it is here for identifier and value set fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    pub fn parse(value: &str) -> Result<Self, DatatypeError> {
        let uri = Uri::parse(value)?;
        if !OID_REGEX.is_match(uri.as_str()) {
            return Err(DatatypeError::InvalidOid(value.to_string()));
        }
        Ok(Self(uri.into_inner()))
    }
}

string_datatype!(Oid);

/// A code defined elsewhere: at least one character, no leading or
/// trailing whitespace, and no whitespace other than single spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(String);

impl Code {
    pub fn parse(value: &str) -> Result<Self, DatatypeError> {
        check_length("code", value, CODE_MAX_LEN)?;
        let malformed = value
            .split(' ')
            .any(|part| part.is_empty() || part.chars().any(char::is_whitespace));
        if malformed {
            return Err(DatatypeError::MalformedCode(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

string_datatype!(Code);

/// Identifier of a resource: ASCII letters, digits, `-` and `.`, up to 64
/// characters. Integers, un-prefixed OIDs and UUIDs all qualify.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(String);

impl Id {
    pub fn parse(value: &str) -> Result<Self, DatatypeError> {
        check_length("id", value, CODE_MAX_LEN)?;
        if !ID_REGEX.is_match(value) {
            return Err(DatatypeError::InvalidCharacters {
                kind: "id",
                value: value.to_string(),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// A fresh random id (lowercase UUIDv4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

string_datatype!(Id);

/// A language tag such as `en` or `en-US`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn parse(value: &str) -> Result<Self, DatatypeError> {
        let code = Code::parse(value)?;
        if !LANGUAGE_REGEX.is_match(code.as_str()) {
            return Err(DatatypeError::InvalidLanguage(value.to_string()));
        }
        Ok(Self(code.into_inner()))
    }
}

string_datatype!(LanguageTag);

/// A string that may contain markdown, for optional processing by a
/// presentation engine.
///
/// Not yet bound to a column; kept for description and comment fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Markdown(String);

impl Markdown {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Markdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An instant in time, known at least to the second and always with a
/// time zone. Meant for system times, not human times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Instant(DateTime<Utc>);

impl Instant {
    pub fn parse(value: &str) -> Result<Self, DatatypeError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|_| DatatypeError::InvalidInstant(value.to_string()))
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Instant {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl TryFrom<String> for Instant {
    type Error = DatatypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Instant> for String {
    fn from(value: Instant) -> Self {
        value.to_string()
    }
}

/// Text persisted as a base64-encoded stream of bytes.
///
/// Not yet bound to a column; kept for attachment data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Text(String);

impl Base64Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Decode a stored value back into text.
    pub fn from_db_value(value: &str) -> Result<Self, DatatypeError> {
        let bytes = STANDARD
            .decode(value.trim())
            .map_err(|e| DatatypeError::InvalidBase64(e.to_string()))?;
        String::from_utf8(bytes)
            .map(Self)
            .map_err(|_| DatatypeError::NotUtf8)
    }

    /// Encode the text for storage.
    pub fn to_db_value(&self) -> String {
        STANDARD.encode(self.0.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_rejects_whitespace_and_overlong_values() {
        assert!(Uri::parse("http://loinc.org").is_ok());
        assert!(matches!(
            Uri::parse("http://example.org/a b"),
            Err(DatatypeError::InvalidCharacters { kind: "uri", .. })
        ));
        let long = format!("http://example.org/{}", "x".repeat(300));
        assert!(matches!(
            Uri::parse(&long),
            Err(DatatypeError::TooLong { max: 255, .. })
        ));
        assert_eq!(Uri::parse(""), Err(DatatypeError::Empty { kind: "uri" }));
    }

    #[test]
    fn oid_must_be_fully_dotted() {
        assert!(Oid::parse("urn:oid:2.16.840.1.113883").is_ok());
        assert!(Oid::parse("1.2.3").is_ok());
        assert!(matches!(Oid::parse("1.02.3"), Err(DatatypeError::InvalidOid(_))));
        assert!(matches!(Oid::parse("3.1"), Err(DatatypeError::InvalidOid(_))));
        // A matching OID embedded in other text is not an OID.
        assert!(matches!(
            Oid::parse("prefix-1.2.3"),
            Err(DatatypeError::InvalidOid(_))
        ));
    }

    #[test]
    fn code_allows_single_inner_spaces_only() {
        assert!(Code::parse("final").is_ok());
        assert!(Code::parse("entered in error").is_ok());
        for bad in [" final", "final ", "two  spaces", "tab\tinside", "new\nline"] {
            assert!(
                matches!(Code::parse(bad), Err(DatatypeError::MalformedCode(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(matches!(
            Code::parse(&"c".repeat(65)),
            Err(DatatypeError::TooLong { max: 64, len: 65, .. })
        ));
    }

    #[test]
    fn id_accepts_uuid_and_oid_shapes() {
        assert!(Id::parse("123").is_ok());
        assert!(Id::parse("1.2.840.10008").is_ok());
        assert!(Id::parse("a-B-c").is_ok());
        assert!(Id::parse("with_underscore").is_err());
        assert!(Id::parse(&"1".repeat(65)).is_err());
    }

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let a = Id::generate();
        let b = Id::generate();
        assert_ne!(a, b);
        assert!(Id::parse(a.as_str()).is_ok());
        assert_eq!(a.as_str(), a.as_str().to_lowercase());
    }

    #[test]
    fn language_tags() {
        assert!(LanguageTag::parse("en").is_ok());
        assert!(LanguageTag::parse("en-US").is_ok());
        assert!(LanguageTag::parse("de-AT").is_ok());
        assert!(matches!(
            LanguageTag::parse("english"),
            Err(DatatypeError::InvalidLanguage(_))
        ));
        assert!(LanguageTag::parse("en US").is_err());
    }

    #[test]
    fn instant_requires_seconds_and_zone() {
        let instant = Instant::parse("2017-06-01T12:30:45+02:00").unwrap();
        assert_eq!(instant.to_string(), "2017-06-01T10:30:45Z");
        assert!(Instant::parse("2017-06-01T12:30:45").is_err());
        assert!(Instant::parse("2017-06-01T12:30+02:00").is_err());
        assert!(Instant::parse("2017-06-01").is_err());
    }

    #[test]
    fn instant_round_trips_through_json() {
        let instant: Instant = serde_json::from_str("\"2020-02-29T23:59:59.5Z\"").unwrap();
        assert_eq!(
            serde_json::to_string(&instant).unwrap(),
            "\"2020-02-29T23:59:59.500Z\""
        );
    }

    #[test]
    fn deserialization_validates() {
        let err = serde_json::from_str::<Code>("\" padded\"").unwrap_err();
        assert!(err.to_string().contains("whitespace"));
        let uri: Uri = serde_json::from_str("\"http://snomed.info/sct\"").unwrap();
        assert_eq!(uri.as_str(), "http://snomed.info/sct");
    }

    #[test]
    fn base64_text_decodes_stored_values() {
        let text = Base64Text::from_db_value("R3LDvMOfZSBhdXMgTWVkVVg=").unwrap();
        assert_eq!(text.as_str(), "Grüße aus MedUX");
        assert_eq!(text.to_db_value(), "R3LDvMOfZSBhdXMgTWVkVVg=");
        assert!(matches!(
            Base64Text::from_db_value("not base64!"),
            Err(DatatypeError::InvalidBase64(_))
        ));
        // 0xff 0xfe is not UTF-8
        assert_eq!(Base64Text::from_db_value("//4="), Err(DatatypeError::NotUtf8));
    }

    #[test]
    fn markdown_is_unvalidated() {
        let md = Markdown::new("# Findings\n\n* none");
        assert_eq!(md.as_str(), "# Findings\n\n* none");
        assert!(Markdown::new("  ").is_empty());
    }
}
