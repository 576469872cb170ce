//! Configuration module for Ripple-Frontier
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A loaded [`Config`] is immutable and shared by every crawler component.
//!
//! # Example
//!
//! ```no_run
//! use ripple_frontier::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.num_threads);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChecksumConfig, Config, CrawlerConfig, DelayConfig, DelayScope, FetcherConfig, FilterEntry,
    NormalizerConfig, OrphansStrategy, ScopeConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
