//! Connection pool and schema management.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::Result;
use crate::schema;

/// Main database handle. Cloning shares the pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DatabaseStats {
    pub papers: i64,
    pub figures: i64,
    pub entities: i64,
    pub figure_entities: i64,
}

impl Database {
    /// Open (creating if needed) the database at `url`, e.g.
    /// `sqlite://data/figura.db?mode=rwc`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Connected to {}", url);
        Ok(Self { pool })
    }

    /// Private in-memory database on a single long-lived connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create all tables and indexes if they don't exist.
    pub async fn initialize(&self) -> Result<()> {
        for ddl in schema::CREATE_STATEMENTS {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        debug!("Schema initialized");
        Ok(())
    }

    /// Drop every table and recreate the empty schema.
    pub async fn reset(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in schema::ALL_TABLES.iter().rev() {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&mut *tx)
                .await?;
        }
        for ddl in schema::CREATE_STATEMENTS {
            sqlx::query(ddl).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!("Database reset");
        Ok(())
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            papers: self.count(schema::TABLE_PAPERS).await?,
            figures: self.count(schema::TABLE_FIGURES).await?,
            entities: self.count(schema::TABLE_ENTITIES).await?,
            figure_entities: self.count(schema::TABLE_FIGURE_ENTITIES).await?,
        })
    }

    async fn count(&self, table: &str) -> Result<i64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}
