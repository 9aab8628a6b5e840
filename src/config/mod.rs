//! Configuration module for Screen Atlas
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and resolving them into the [`CrawlConfig`] a crawl runs with.
//!
//! # Example
//!
//! ```no_run
//! use screen_atlas::config::{load_config, CrawlConfig};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("atlas.toml")).unwrap();
//! let crawl = CrawlConfig::from_config(&config).unwrap();
//! println!("Crawler will use max depth: {}", crawl.max_depth);
//! ```

mod crawl;
mod parser;
mod types;
mod validation;

pub use crawl::CrawlConfig;

// Re-export types
pub use types::{
    AuthConfig, AuthStrategy, BrowserConfig, Config, CookieEntry, CrawlSection, EngineKind,
    OutputConfig, ScopeConfig, SnapshotConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
