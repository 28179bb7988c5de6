//! Bearer-token authentication and the account endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;

use super::api::{CreateUserRequest, ListQuery, LoginRequest, LoginResponse, UserJson};
use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::models::user::User;
use crate::services::user_service::{self, NewAccount};
use crate::services::{token, Page, ServiceError};

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// An active staff user, authenticated by session token.
pub struct StaffUser(pub User);

impl FromRequestParts<AppState> for StaffUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthenticated)?;
        let user_id = token::verify(&state.settings.secret_key, token, Utc::now()).map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            ApiError::Unauthenticated
        })?;

        let mut conn = state.conn().await?;
        let user = match user_service::get_user(&mut conn, user_id).await {
            Ok(user) => user,
            Err(ServiceError::NotFound { .. }) => return Err(ApiError::Unauthenticated),
            Err(e) => return Err(e.into()),
        };
        if !user.is_active {
            return Err(ApiError::Unauthenticated);
        }
        if !user.is_staff {
            return Err(ApiError::Forbidden("staff access required"));
        }
        Ok(Self(user))
    }
}

/// A staff user who is also a superuser.
pub struct Superuser(pub User);

impl FromRequestParts<AppState> for Superuser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let StaffUser(user) = StaffUser::from_request_parts(parts, state).await?;
        if !user.is_superuser {
            return Err(ApiError::Forbidden("superuser access required"));
        }
        Ok(Self(user))
    }
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    let mut conn = state.conn().await?;
    let user = user_service::authenticate(
        &mut conn,
        &req.username,
        &req.password,
        state.settings.password_iterations,
    )
    .await?;

    let session = token::issue(
        &state.settings.secret_key,
        user.id,
        state.settings.session_ttl(),
        Utc::now(),
    );
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at.into(),
        user: user.into(),
    }))
}

pub async fn me(StaffUser(user): StaffUser) -> Json<UserJson> {
    Json(user.into())
}

pub async fn list_users(
    _admin: Superuser,
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<UserJson>>> {
    let Query(query) = query?;
    let mut conn = state.conn().await?;
    let users = user_service::list_users(&mut conn, Page::new(query.limit, query.offset)).await?;
    Ok(Json(users.into_iter().map(UserJson::from).collect()))
}

pub async fn create_user(
    Superuser(admin): Superuser,
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserJson>)> {
    let Json(req) = payload?;
    let mut conn = state.conn().await?;
    let user = user_service::create_user(
        &mut conn,
        NewAccount {
            username: req.username,
            email: req.email,
            password: req.password,
            is_staff: req.is_staff,
            is_superuser: req.is_superuser,
        },
        state.settings.password_iterations,
    )
    .await?;
    tracing::info!(user_id = user.id, created_by = admin.id, "Account created via API");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_bearer_tokens() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer  abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
