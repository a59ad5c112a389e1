//! Configuration module for Satchel
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use satchel::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("satchel.toml")).unwrap();
//! println!("Crawling root: {}", config.root.root_id);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, EntryPoint, OutputConfig, RootConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
