// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] mirrors the TOML layout (`[config]`, `[command.*]`,
//!   `[workflow.*]`).
//! - [`loader`] reads files and hands them to validation.
//! - [`validate`] turns a `RawConfigFile` into a `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    CommandConfig, ConfigFile, ConfigSection, RawConfigFile, Timing, WorkflowConfig,
};
