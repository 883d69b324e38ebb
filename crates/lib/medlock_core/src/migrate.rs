//! Database migration support.
//!
//! Embeds and runs SQL migrations from `medlock_core/migrations/`. Only needed
//! when the PostgreSQL key-value backend is selected.

use sqlx::PgPool;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
