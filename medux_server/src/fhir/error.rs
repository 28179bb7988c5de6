//! Validation errors for FHIR primitive datatypes.

use thiserror::Error;

/// Raised when a value violates the constraints of a FHIR datatype.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatatypeError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} exceeds {max} characters (got {len})")]
    TooLong {
        kind: &'static str,
        max: usize,
        len: usize,
    },

    #[error("{kind} contains invalid characters: {value:?}")]
    InvalidCharacters { kind: &'static str, value: String },

    #[error("code must not have leading, trailing or repeated whitespace: {0:?}")]
    MalformedCode(String),

    #[error("Given string is no OID: {0:?}")]
    InvalidOid(String),

    #[error("not a language tag: {0:?}")]
    InvalidLanguage(String),

    #[error("instant must be RFC 3339 with seconds and a time zone: {0:?}")]
    InvalidInstant(String),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),

    #[error("base64 payload is not valid UTF-8")]
    NotUtf8,

    #[error("unknown narrative status: {0:?}")]
    UnknownNarrativeStatus(String),

    #[error("narrative is not well-formed XHTML: {0}")]
    MalformedXhtml(String),

    #[error("narrative must be a single <div> element")]
    NarrativeNotDiv,

    #[error("narrative contains forbidden element <{0}>")]
    ForbiddenElement(String),

    #[error("narrative contains forbidden attribute {0:?}")]
    ForbiddenAttribute(String),
}
