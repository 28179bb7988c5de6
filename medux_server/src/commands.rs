//! Management commands behind the `medux` binary.

use std::net::SocketAddr;

use anyhow::Context;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};

use crate::config::Settings;
use crate::migration::{self, MigrationStatus};
use crate::routes::{self, AppState};
use crate::services::{password, user_service};
use crate::{db, metrics};

/// Environment variable holding the password for `createsuperuser --noinput`.
pub const SUPERUSER_PASSWORD_ENV: &str = "MEDUX_SUPERUSER_PASSWORD";

/// One line of `migrate --plan` output.
pub fn format_status(status: &MigrationStatus) -> String {
    match status.applied_at {
        Some(at) => format!(" [X] {} (applied {})", status.name, at.format("%Y-%m-%d %H:%M:%S")),
        None => format!(" [ ] {}", status.name),
    }
}

pub async fn migrate(settings: &Settings, plan: bool) -> anyhow::Result<()> {
    let mut conn = db::connect(settings).await?;

    if plan {
        println!("Migrations:");
        for status in migration::migration_status(&mut conn).await? {
            println!("{}", format_status(&status));
        }
        return Ok(());
    }

    let applied = migration::run_migrations(&mut conn).await?;
    if applied.is_empty() {
        println!("No migrations to apply.");
    } else {
        for name in &applied {
            println!("  Applied {name}");
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct SuperuserArgs {
    pub username: Option<String>,
    pub email: Option<String>,
    pub noinput: bool,
}

/// Ask for a password until one passes validation.
fn prompt_password(theme: &ColorfulTheme, username: &str) -> anyhow::Result<String> {
    loop {
        let raw = Password::with_theme(theme)
            .with_prompt("Password")
            .with_confirmation("Password (again)", "Error: Your passwords didn't match.")
            .interact()?;
        match password::validate_password(&raw, username) {
            Ok(()) => return Ok(raw),
            Err(e) => eprintln!("{e}"),
        }
    }
}

pub async fn createsuperuser(settings: &Settings, args: SuperuserArgs) -> anyhow::Result<()> {
    let (username, email, raw_password) = if args.noinput {
        let username = args
            .username
            .context("--username is required when using --noinput")?;
        let raw_password = std::env::var(SUPERUSER_PASSWORD_ENV)
            .with_context(|| format!("{SUPERUSER_PASSWORD_ENV} must be set when using --noinput"))?;
        (username, args.email.unwrap_or_default(), raw_password)
    } else {
        let theme = ColorfulTheme::default();
        let username = match args.username {
            Some(username) => username,
            None => Input::with_theme(&theme)
                .with_prompt("Username")
                .default(std::env::var("USER").unwrap_or_else(|_| "admin".to_string()))
                .interact()?,
        };
        let email = match args.email {
            Some(email) => email,
            None => Input::with_theme(&theme)
                .with_prompt("Email address")
                .allow_empty(true)
                .interact()?,
        };
        let raw_password = prompt_password(&theme, &username)?;
        (username, email, raw_password)
    };

    let mut conn = db::connect(settings).await?;
    let user = user_service::create_superuser(
        &mut conn,
        &username,
        &email,
        &raw_password,
        settings.password_iterations,
    )
    .await?;
    println!("Superuser {} created successfully.", user.username);
    Ok(())
}

pub async fn resetdb(settings: &Settings, yes: bool) -> anyhow::Result<()> {
    if !yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("This drops every MedUX table and all data in them. Continue?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Reset cancelled.");
            return Ok(());
        }
    }

    let mut conn = db::connect(settings).await?;
    migration::reset_database(&mut conn).await?;
    println!("Database reset. Run `medux migrate` and `medux createsuperuser` to start over.");
    Ok(())
}

/// Validate settings and database state. Fails when any issue is found.
pub async fn check(settings: &Settings) -> anyhow::Result<()> {
    let mut issues = Vec::new();

    if let Err(e) = settings.require_secret_key() {
        issues.push(e.to_string());
    }

    match db::connect(settings).await {
        Ok(mut conn) => {
            let status = migration::migration_status(&mut conn).await?;
            let pending: Vec<&str> = status
                .iter()
                .filter(|s| s.applied_at.is_none())
                .map(|s| s.name)
                .collect();
            if pending.is_empty() {
                if user_service::count_superusers(&mut conn).await? == 0 {
                    println!("Note: no superuser yet; run `medux createsuperuser`.");
                }
            } else {
                issues.push(format!(
                    "unapplied migrations: {} (run `medux migrate`)",
                    pending.join(", ")
                ));
            }
        }
        Err(e) => issues.push(e.to_string()),
    }

    if issues.is_empty() {
        println!("System check identified no issues.");
        return Ok(());
    }
    for issue in &issues {
        eprintln!("  - {issue}");
    }
    anyhow::bail!("System check identified {} issue(s).", issues.len())
}

pub async fn runserver(settings: Settings, addr: Option<SocketAddr>) -> anyhow::Result<()> {
    settings.require_secret_key()?;
    if let Some(metrics_addr) = settings.metrics_listen {
        metrics::init_metrics(metrics_addr);
    }

    let pool = db::create_pool(&settings)?;
    {
        let mut conn = pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("diesel pool: {e}"))?;
        let pending = migration::migration_status(&mut conn)
            .await?
            .iter()
            .filter(|s| s.applied_at.is_none())
            .count();
        if pending > 0 {
            tracing::warn!(pending, "Unapplied migrations; run `medux migrate`");
        }
    }

    let addr = addr.unwrap_or(settings.listen);
    let app = routes::router(AppState::new(pool, settings));

    tracing::info!("MedUX listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn plan_lines_mark_applied_migrations() {
        let applied = MigrationStatus {
            name: "0001_auth_user",
            applied_at: Some(Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 1).unwrap()),
        };
        let pending = MigrationStatus {
            name: "0002_core_fhir",
            applied_at: None,
        };
        assert_eq!(
            format_status(&applied),
            " [X] 0001_auth_user (applied 2024-05-04 12:00:01)"
        );
        assert_eq!(format_status(&pending), " [ ] 0002_core_fhir");
    }

    #[tokio::test]
    async fn noinput_requires_a_username() {
        let err = createsuperuser(
            &Settings::default(),
            SuperuserArgs {
                noinput: true,
                ..SuperuserArgs::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("--username"));
    }
}
