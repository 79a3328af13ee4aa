// Public modules
pub mod auth;
pub mod domains;
pub mod errors;
pub mod globals;
pub mod types;
pub mod validation;

// Private modules
mod db_migration;

use errors::ServiceResult;

/// Initialize the library with the given database path and JWT secret.
/// This function must be called before any other function in the library.
pub async fn initialize(db_path: &str, jwt_secret: &str) -> ServiceResult<()> {
    globals::initialize(db_path, jwt_secret).await?;

    db_migration::initialize_database().await?;

    Ok(())
}

/// Install the default logger. Honors RUST_LOG; call once, early.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Get a reference to the SQLite connection pool.
/// This is primarily for internal use.
pub fn get_db_pool() -> ServiceResult<sqlx::SqlitePool> {
    globals::get_db_pool()
}
