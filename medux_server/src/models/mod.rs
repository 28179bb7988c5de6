//! Core data models: FHIR resources plus administrator accounts.

pub mod coding;
pub mod domain_resource;
pub mod patient;
pub mod resource;
pub mod user;
