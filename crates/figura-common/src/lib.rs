//! figura-common: Shared types, errors, configuration and the HTTP client
//! used across all Figura crates.

pub mod error;
pub mod models;
pub mod config;
pub mod sandbox;

// Re-export commonly used types
pub use config::Config;
pub use error::{FiguraError, Result};
pub use models::{Entity, Figure, Paper};
