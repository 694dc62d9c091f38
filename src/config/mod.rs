//! Configuration module for Press-Sieve
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use press_sieve::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("press-sieve.toml")).unwrap();
//! println!("Static fetch timeout: {}s", config.fetcher.timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AnalysisConfig, Config, ExtractionConfig, FetcherConfig, HandlerEntry, HandlerKind,
    PipelineConfig, PoolConfig, QueueConfig, RetryConfig, StorageConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, resolve_api_key};
