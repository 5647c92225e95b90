//! SQLite registry for Kiln
//!
//! [`Database`] implements the repository traits in [`traits`] for the three
//! things Kiln remembers between runs: wallets (with encrypted keys), finalized
//! deployments and invocation history.

pub mod models;
mod repositories;
mod schema;
pub mod traits;

pub use models::*;
pub use traits::*;

use std::path::Path;
use std::str::FromStr;

use kiln_core::{Error, KilnDir, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// SQLite database connection and repository implementation
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the registry in `.kiln/kiln.db`, creating the directory and schema
    pub async fn open(dir: &KilnDir) -> Result<Self> {
        dir.create()
            .map_err(|e| Error::Database(sqlx::Error::Io(e)))?;
        let db = Self::connect_file(&dir.db_path()).await?;
        db.init_schema().await?;
        Ok(db)
    }

    /// Connect to a database URL or `:memory:`
    pub async fn connect_to(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?;
        Self::connect_with(options).await
    }

    async fn connect_file(path: &Path) -> Result<Self> {
        Self::connect_with(SqliteConnectOptions::new().filename(path)).await
    }

    async fn connect_with(options: SqliteConnectOptions) -> Result<Self> {
        let options = options.create_if_missing(true).foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        schema::init_schema(&self.pool).await
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
