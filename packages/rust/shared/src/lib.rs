//! Shared types, error model, and configuration for GCN Watch.
//!
//! This crate is the foundation depended on by all other GCN Watch crates.
//! It provides:
//! - [`GcnWatchError`]: the unified error type
//! - Domain types ([`BulletinReference`], [`ExtractionRecord`], [`Measurement`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, LoggingConfig, MonitorConfig, SlackConfig, SourceConfig, StorageConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{GcnWatchError, Result};
pub use types::{
    BulletinReference, ExtractionRecord, Measurement, RAW_TEXT_UNAVAILABLE,
    RETRIEVAL_FAILED_MESSAGE,
};
