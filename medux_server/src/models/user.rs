//! auth.user: accounts allowed to administer MedUX.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::schema::auth_user;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable)]
#[diesel(table_name = auth_user)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Encoded password hash, never the raw password.
    pub password: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = auth_user)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
}
