//! Figura relational store.
//!
//! Papers, figures and entities live in SQLite. Saving a paper is an
//! idempotent upsert: re-ingesting the same paper never creates duplicate
//! paper, figure, entity or link rows.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use figura_common::config::FigurePolicy;
//! use figura_db::{Database, PaperStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite://data/figura.db?mode=rwc", 5).await?;
//!     db.initialize().await?;
//!
//!     let store = PaperStore::new(Arc::new(db), FigurePolicy::MergeByLabel);
//!     for id in store.list_ids().await? {
//!         println!("{id}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod database;
pub mod error;
pub mod papers;
pub mod schema;

pub use database::{Database, DatabaseStats};
pub use error::{DbError, Result};
pub use papers::{PaperStore, SaveSummary};
pub use schema::{TABLE_ENTITIES, TABLE_FIGURES, TABLE_FIGURE_ENTITIES, TABLE_PAPERS};
