// src/config.rs

//! Configuration loading utilities.
//!
//! This module provides convenience functions for loading the crawler
//! configuration and the run input from a base directory.

use std::fs;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlInput};

/// Config file name under the base directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Input file name under the base directory.
pub const INPUT_FILE: &str = "input.json";

/// Load configuration from a TOML file.
///
/// A missing file means defaults; a malformed one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::warn!("No config at {:?}; using default configuration", path);
        return Ok(Config::default());
    }
    Config::load(path)
        .map_err(|e| AppError::config(format!("Failed to load {}: {e}", path.display())))
}

/// Load the run input from a JSON file.
///
/// A missing file means default budgets and a start URL built from no filters.
pub fn load_input(path: &Path) -> Result<CrawlInput> {
    if !path.exists() {
        log::warn!("No input at {:?}; using default input", path);
        return Ok(CrawlInput::default());
    }
    let content = fs::read_to_string(path)?;
    CrawlInput::from_json(&content)
        .map_err(|e| AppError::config(format!("Failed to parse {}: {e}", path.display())))
}

/// Load and validate both config and input.
pub fn load_all(base_path: &Path) -> Result<(Config, CrawlInput)> {
    let config = load_config(&base_path.join(CONFIG_FILE))?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid configuration: {e}")))?;

    let input = load_input(&base_path.join(INPUT_FILE))?;
    Ok((config, input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_all_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let (config, input) = load_all(dir.path()).unwrap();
        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(input.results_wanted, 20);
        assert_eq!(input.max_pages, 50);
    }

    #[test]
    fn test_load_all_reads_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[crawler]\nmax_concurrent = 4\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(INPUT_FILE),
            r#"{"make": "Honda", "results_wanted": "7"}"#,
        )
        .unwrap();

        let (config, input) = load_all(dir.path()).unwrap();
        assert_eq!(config.crawler.max_concurrent, 4);
        assert_eq!(input.results_wanted, 7);
        assert_eq!(
            input.resolved_start_urls(),
            vec!["https://www.carfax.com/Used-Honda".to_string()]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[detection]\nnext_selectors = [\"[[bad\"]\n",
        )
        .unwrap();
        assert!(matches!(load_all(dir.path()), Err(AppError::Config(_))));
    }

    #[test]
    fn test_malformed_input_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(INPUT_FILE), "{not json").unwrap();
        assert!(load_input(&dir.path().join(INPUT_FILE)).is_err());
    }
}
