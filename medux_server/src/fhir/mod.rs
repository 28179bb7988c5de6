//! FHIR building blocks shared by the core model.

pub mod datatypes;
pub mod error;
pub mod narrative;

pub use datatypes::{Base64Text, Code, Id, Instant, LanguageTag, Markdown, Oid, Uri};
pub use error::DatatypeError;
pub use narrative::{Narrative, NarrativeStatus};
