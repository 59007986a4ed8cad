//! Pure domain logic for the vitrine storefront service.
//!
//! Holds application configuration, the product filter/sort/pagination
//! builder, and the cart quantity rules. Everything in this crate is
//! synchronous and I/O-free so it can be unit-tested without a database.

#![feature(int_roundings)]

use thiserror::Error;

mod app_config;
mod config;
pub mod filter;
pub mod quantity;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[cfg(test)]
mod config_test;
