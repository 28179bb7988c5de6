//! Accounts: creation, lookup and password authentication.

use std::sync::LazyLock;

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use regex::Regex;

use super::password;
use super::{Page, ServiceError, ServiceResult};
use crate::models::user::{NewUser, User};
use crate::schema::auth_user;

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

/// What a new account looks like before it is hashed and stored.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub fn validate_username(username: &str) -> ServiceResult<()> {
    if username.is_empty() {
        return Err(ServiceError::Validation("username must not be empty".to_string()));
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        return Err(ServiceError::Validation(format!(
            "username must be at most {USERNAME_MAX_LEN} characters"
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ServiceError::Validation(
            "username may only contain letters, digits and @/./+/-/_".to_string(),
        ));
    }
    Ok(())
}

/// Email addresses are optional; a non-empty one needs a local part and a domain.
pub fn validate_email(email: &str) -> ServiceResult<()> {
    if email.is_empty() {
        return Ok(());
    }
    if email.chars().count() > EMAIL_MAX_LEN {
        return Err(ServiceError::Validation(format!(
            "email must be at most {EMAIL_MAX_LEN} characters"
        )));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(ServiceError::Validation(format!("invalid email address: {email}"))),
    }
}

async fn hash_blocking(raw: String, iterations: u32) -> ServiceResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&raw, iterations))
        .await
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))
}

async fn verify_blocking(raw: String, encoded: String) -> ServiceResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&raw, &encoded))
        .await
        .map_err(|e| ServiceError::Internal(format!("password verification failed: {e}")))
}

pub async fn create_user(
    conn: &mut AsyncPgConnection,
    account: NewAccount,
    iterations: u32,
) -> ServiceResult<User> {
    let username = account.username.trim().to_string();
    let email = account.email.trim().to_string();
    validate_username(&username)?;
    validate_email(&email)?;
    password::validate_password(&account.password, &username)?;

    let new_user = NewUser {
        password: hash_blocking(account.password, iterations).await?,
        username,
        email,
        // superusers always have staff access
        is_staff: account.is_staff || account.is_superuser,
        is_superuser: account.is_superuser,
        is_active: true,
    };

    let user = diesel::insert_into(auth_user::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(conn)
        .await
        .map_err(|e| match ServiceError::from(e) {
            ServiceError::Conflict(_) => {
                ServiceError::Conflict(format!("username {} is already taken", new_user.username))
            }
            other => other,
        })?;

    crate::metrics::record_created("user");
    tracing::info!(
        user_id = user.id,
        username = %user.username,
        superuser = user.is_superuser,
        "User created"
    );
    Ok(user)
}

pub async fn create_superuser(
    conn: &mut AsyncPgConnection,
    username: &str,
    email: &str,
    raw_password: &str,
    iterations: u32,
) -> ServiceResult<User> {
    create_user(
        conn,
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: raw_password.to_string(),
            is_staff: true,
            is_superuser: true,
        },
        iterations,
    )
    .await
}

/// Check a username/password pair. Unknown users, inactive users and wrong
/// passwords all yield `InvalidCredentials`.
pub async fn authenticate(
    conn: &mut AsyncPgConnection,
    username: &str,
    raw_password: &str,
    iterations: u32,
) -> ServiceResult<User> {
    let username = username.trim();
    let user: Option<User> = auth_user::table
        .filter(auth_user::username.eq(username))
        .select(User::as_select())
        .first(conn)
        .await
        .optional()?;

    let Some(user) = user else {
        // burn the same work as a real check so unknown names are not cheaper
        hash_blocking(raw_password.to_string(), iterations).await?;
        crate::metrics::login_attempt("failure");
        tracing::info!(username = %username, "Login failed: unknown user");
        return Err(ServiceError::InvalidCredentials);
    };

    let valid = verify_blocking(raw_password.to_string(), user.password.clone()).await?;
    if !valid || !user.is_active {
        crate::metrics::login_attempt("failure");
        tracing::info!(user_id = user.id, active = user.is_active, "Login failed");
        return Err(ServiceError::InvalidCredentials);
    }

    let now = Utc::now();
    let mut rehashed = None;
    if password::needs_rehash(&user.password, iterations) {
        rehashed = Some(hash_blocking(raw_password.to_string(), iterations).await?);
        tracing::info!(user_id = user.id, iterations, "Upgrading password hash");
    }

    let user = match rehashed {
        Some(encoded) => diesel::update(auth_user::table.find(user.id))
            .set((auth_user::last_login.eq(now), auth_user::password.eq(encoded)))
            .returning(User::as_returning())
            .get_result(conn)
            .await?,
        None => diesel::update(auth_user::table.find(user.id))
            .set(auth_user::last_login.eq(now))
            .returning(User::as_returning())
            .get_result(conn)
            .await?,
    };

    crate::metrics::login_attempt("success");
    tracing::info!(user_id = user.id, "Login succeeded");
    Ok(user)
}

pub async fn get_user(conn: &mut AsyncPgConnection, id: i64) -> ServiceResult<User> {
    auth_user::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| ServiceError::not_found("user", id))
}

pub async fn list_users(conn: &mut AsyncPgConnection, page: Page) -> ServiceResult<Vec<User>> {
    let results = auth_user::table
        .order(auth_user::id.asc())
        .limit(page.limit)
        .offset(page.offset)
        .select(User::as_select())
        .load(conn)
        .await?;
    Ok(results)
}

pub async fn count_superusers(conn: &mut AsyncPgConnection) -> ServiceResult<i64> {
    let count = auth_user::table
        .filter(auth_user::is_superuser.eq(true))
        .count()
        .get_result(conn)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames() {
        assert!(validate_username("admin").is_ok());
        assert!(validate_username("dr.house@ppth+1-a_b").is_ok());
        assert!(validate_username("Jürgen").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("semi;colon").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
        assert!(validate_username(&"a".repeat(150)).is_ok());
    }

    #[test]
    fn emails() {
        assert!(validate_email("").is_ok());
        assert!(validate_email("admin@example.org").is_ok());
        assert!(validate_email("admin").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("admin@localhost").is_err());
        assert!(validate_email("a@b@example.org").is_err());
    }
}
