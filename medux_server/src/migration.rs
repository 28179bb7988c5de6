//! Database migrations.
//!
//! Each migration is a named SQL batch applied in its own transaction and
//! recorded in `medux_migrations`. There is no down-migration: when the
//! schema gets into a bad state, `reset_database` drops everything and
//! `run_migrations` starts over.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection};

use crate::schema::medux_migrations;

#[derive(Debug)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub name: &'static str,
    pub applied_at: Option<DateTime<Utc>>,
}

const TRACKING_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS medux_migrations (
    name        VARCHAR(255) PRIMARY KEY,
    applied_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

const AUTH_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS auth_user (
    id              BIGSERIAL PRIMARY KEY,
    username        VARCHAR(150) NOT NULL UNIQUE,
    email           VARCHAR(254) NOT NULL DEFAULT '',
    password        VARCHAR(128) NOT NULL,
    is_superuser    BOOLEAN NOT NULL DEFAULT FALSE,
    is_staff        BOOLEAN NOT NULL DEFAULT FALSE,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE,
    date_joined     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_login      TIMESTAMPTZ
);
"#;

const CORE_SQL: &str = r#"
-- ================================================================
-- FHIR core: Coding, Resource, DomainResource, Patient
-- ================================================================

CREATE TABLE IF NOT EXISTS core_coding (
    id              BIGSERIAL PRIMARY KEY,
    system          VARCHAR(255),
    version         VARCHAR(35),
    code            VARCHAR(64) NOT NULL,
    display         VARCHAR(255) NOT NULL,
    user_selected   BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX IF NOT EXISTS idx_core_coding_system_code ON core_coding (system, code);

CREATE TABLE IF NOT EXISTS core_resource (
    version_id      VARCHAR(64) PRIMARY KEY,
    created         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_updated    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    profile         VARCHAR(255),
    security_id     BIGINT REFERENCES core_coding(id) ON DELETE RESTRICT,
    logical_id      VARCHAR(64),
    implicit_rules  VARCHAR(255),
    language        VARCHAR(64)
);

CREATE INDEX IF NOT EXISTS idx_core_resource_logical_id ON core_resource (logical_id);
CREATE INDEX IF NOT EXISTS idx_core_resource_security ON core_resource (security_id);

CREATE TABLE IF NOT EXISTS core_domain_resource (
    resource_ptr_id  VARCHAR(64) PRIMARY KEY REFERENCES core_resource(version_id) ON DELETE CASCADE,
    narrative_status VARCHAR(35) NOT NULL
        CHECK (narrative_status IN ('generated', 'extensions', 'additional', 'empty')),
    narrative_div    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS core_domain_resource_contained (
    id                  BIGSERIAL PRIMARY KEY,
    domain_resource_id  VARCHAR(64) NOT NULL
        REFERENCES core_domain_resource(resource_ptr_id) ON DELETE CASCADE,
    resource_id         VARCHAR(64) NOT NULL
        REFERENCES core_resource(version_id) ON DELETE CASCADE,
    UNIQUE (domain_resource_id, resource_id),
    CHECK (domain_resource_id <> resource_id)
);

CREATE INDEX IF NOT EXISTS idx_core_contained_resource ON core_domain_resource_contained (resource_id);

CREATE TABLE IF NOT EXISTS core_patient (
    version_id      VARCHAR(64) PRIMARY KEY,
    created         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    last_updated    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    profile         VARCHAR(255),
    security_id     BIGINT REFERENCES core_coding(id) ON DELETE RESTRICT
);
"#;

const RESET_SQL: &str = r#"
DROP TABLE IF EXISTS
    core_domain_resource_contained,
    core_domain_resource,
    core_patient,
    core_resource,
    core_coding,
    auth_user,
    medux_migrations
CASCADE;
"#;

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_auth_user",
        sql: AUTH_SQL,
    },
    Migration {
        name: "0002_core_fhir",
        sql: CORE_SQL,
    },
];

/// Migrations from `all` whose name is not in `applied`, in order.
pub fn pending<'a>(all: &'a [Migration], applied: &HashSet<String>) -> Vec<&'a Migration> {
    all.iter()
        .filter(|migration| !applied.contains(migration.name))
        .collect()
}

async fn applied_migrations(
    conn: &mut AsyncPgConnection,
) -> anyhow::Result<Vec<(String, DateTime<Utc>)>> {
    conn.batch_execute(TRACKING_SQL)
        .await
        .map_err(|e| anyhow::anyhow!("creating migration table failed: {e}"))?;
    let rows = medux_migrations::table
        .select((medux_migrations::name, medux_migrations::applied_at))
        .order(medux_migrations::name.asc())
        .load::<(String, DateTime<Utc>)>(conn)
        .await?;
    Ok(rows)
}

/// Apply every pending migration. Returns the names applied by this call.
pub async fn run_migrations(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<&'static str>> {
    let applied: HashSet<String> = applied_migrations(conn)
        .await?
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    let mut newly_applied = Vec::new();
    for migration in pending(MIGRATIONS, &applied) {
        tracing::info!(migration = migration.name, "Applying migration");
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                conn.batch_execute(migration.sql).await?;
                diesel::insert_into(medux_migrations::table)
                    .values(medux_migrations::name.eq(migration.name))
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(|e| anyhow::anyhow!("migration {} failed: {e}", migration.name))?;
        newly_applied.push(migration.name);
    }

    crate::metrics::migrations_applied(newly_applied.len());
    Ok(newly_applied)
}

/// Applied/pending state of every known migration.
pub async fn migration_status(conn: &mut AsyncPgConnection) -> anyhow::Result<Vec<MigrationStatus>> {
    let applied = applied_migrations(conn).await?;
    Ok(MIGRATIONS
        .iter()
        .map(|migration| MigrationStatus {
            name: migration.name,
            applied_at: applied
                .iter()
                .find(|(name, _)| name == migration.name)
                .map(|(_, at)| *at),
        })
        .collect())
}

/// Drop every MedUX table, including the migration record.
pub async fn reset_database(conn: &mut AsyncPgConnection) -> anyhow::Result<()> {
    conn.batch_execute(RESET_SQL)
        .await
        .map_err(|e| anyhow::anyhow!("database reset failed: {e}"))?;
    tracing::warn!("All MedUX tables dropped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_names_are_unique_and_ordered() {
        let names: Vec<_> = MIGRATIONS.iter().map(|m| m.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn pending_skips_applied_migrations() {
        let none = HashSet::new();
        assert_eq!(pending(MIGRATIONS, &none).len(), MIGRATIONS.len());

        let first: HashSet<String> = [MIGRATIONS[0].name.to_string()].into();
        let rest = pending(MIGRATIONS, &first);
        assert_eq!(rest.len(), MIGRATIONS.len() - 1);
        assert!(rest.iter().all(|m| m.name != MIGRATIONS[0].name));

        let all: HashSet<String> = MIGRATIONS.iter().map(|m| m.name.to_string()).collect();
        assert!(pending(MIGRATIONS, &all).is_empty());
    }

    #[test]
    fn every_table_is_created_and_dropped() {
        let created: String = MIGRATIONS.iter().map(|m| m.sql).collect();
        for table in [
            "auth_user",
            "core_coding",
            "core_resource",
            "core_domain_resource",
            "core_domain_resource_contained",
            "core_patient",
        ] {
            assert!(
                created.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "{table} is never created"
            );
            assert!(RESET_SQL.contains(table), "{table} is never dropped");
        }
        assert!(RESET_SQL.contains("medux_migrations"));
    }

    #[test]
    fn coding_deletion_is_protected() {
        assert_eq!(
            CORE_SQL.matches("REFERENCES core_coding(id) ON DELETE RESTRICT").count(),
            2
        );
    }
}
