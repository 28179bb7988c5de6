//! PostgreSQL connection handling.

use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection};

use crate::config::Settings;

pub type DbPool = Pool<AsyncPgConnection>;

/// Build a connection pool. Connections are opened lazily on first use.
pub fn create_pool(settings: &Settings) -> anyhow::Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&settings.database_url);
    let pool = Pool::builder(manager)
        .max_size(settings.max_db_connections)
        .build()
        .map_err(|e| anyhow::anyhow!("diesel pool: {e}"))?;
    Ok(pool)
}

/// Open a single connection, for management commands.
pub async fn connect(settings: &Settings) -> anyhow::Result<AsyncPgConnection> {
    AsyncPgConnection::establish(&settings.database_url)
        .await
        .map_err(|e| anyhow::anyhow!("cannot connect to database: {e}"))
}
