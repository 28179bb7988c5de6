//! MedUX: a Free/OpenSource Electronic Medical Record server.
//!
//! The core models follow HL7 FHIR: codings, resources, domain resources
//! and patients, persisted in PostgreSQL and administered through a JSON
//! API. The `medux` binary wraps the management commands (`migrate`,
//! `createsuperuser`, `runserver`, `resetdb`, `check`).

pub mod commands;
pub mod config;
pub mod db;
pub mod fhir;
pub mod metrics;
pub mod migration;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
