//! Database bootstrap: pool construction and automatic migrations.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if necessary) the database and run pending
    /// migrations. WAL mode plus a busy timeout lets concurrent
    /// conditional writers serialize instead of failing spuriously.
    pub async fn connect(url: &str, max_connections: u32, auto_migrate: bool) -> Result<Self> {
        ensure_parent_dir(url)?;

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close connections gracefully.
    pub async fn close(&self) {
        info!("Closing database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url.strip_prefix("sqlite://").unwrap_or(url);
    if path.starts_with(':') {
        // in-memory database
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
