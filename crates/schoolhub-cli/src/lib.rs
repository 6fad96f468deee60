//! # SchoolHub CLI
//!
//! Bootstrap and demo-data tooling used by the `schoolhub-cli` binary.
//!
//! ```ignore
//! use schoolhub_cli::seeder::{seed_all, SeedConfig};
//!
//! seed_all(&pool, SeedConfig::new(3)).await?;
//! ```

pub mod admin;
pub mod seeder;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
