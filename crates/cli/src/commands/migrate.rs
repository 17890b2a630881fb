//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! emporium-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SUPABASE_DATABASE_URL` - `PostgreSQL` connection string
//! - `DATABASE_URL` - Fallback when the above is unset
//!
//! # Migration Files
//!
//! Migrations live in `crates/api/migrations/` and are embedded into the
//! API crate at compile time.

use emporium_api::db::{MIGRATOR, create_pool};

use super::{CommandError, database_url};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database URL is missing, the connection
/// fails or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!(migrations = MIGRATOR.iter().count(), "Running migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
