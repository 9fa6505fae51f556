//! Configuration module for Keypilot.
//!
//! This module wires together the data models and loading/validation helpers.
//!
//! Example:
//! use keypilot::config::{Config, load_from_path_async};
//!
//! let cfg = load_from_path_async("keypilot.json").await?;

pub mod loader;
pub mod models;

// Re-export core data models
pub use models::{Config, InjectorSettings, ScreenSize};

// Re-export loader utilities
pub use loader::{bind_addr, generate_schema, load_from_path_async, load_from_str, validate_config};
