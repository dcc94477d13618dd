// src/pipeline/validate.rs

use std::path::Path;

use crate::config::load_all;
use crate::error::Result;
use crate::utils::console;

/// Validate configuration and input using load_all.
pub fn run_validate(base_path: &Path) -> Result<()> {
    console::header("Validating configuration");

    match load_all(base_path) {
        Ok((config, input)) => {
            console::success("Configuration is valid");
            console::sub_item(&format!("User agent: {}", config.crawler.user_agent));
            console::sub_item(&format!(
                "Navigation timeout: {}s",
                config.crawler.navigation_timeout_secs
            ));
            console::sub_item(&format!(
                "Max concurrent: {}",
                config.crawler.max_concurrent
            ));
            console::sub_item(&format!("Max retries: {}", config.crawler.max_retries));
            console::sub_item(&format!(
                "Proxies: {}",
                if config.crawler.proxies.is_empty() {
                    "none (direct)".to_string()
                } else {
                    config.crawler.proxies.len().to_string()
                }
            ));

            console::success("Input is valid");
            console::sub_item(&format!("Results wanted: {}", input.results_wanted));
            console::sub_item(&format!("Max pages: {}", input.max_pages));
            for url in input.resolved_start_urls() {
                console::sub_item(&format!("Start URL: {url}"));
            }
            Ok(())
        }
        Err(e) => {
            console::failure(&format!("Validation failed: {e}"));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(run_validate(dir.path()).is_ok());
    }

    #[test]
    fn test_validate_bad_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[crawler]\nmax_concurrent = 0\n").unwrap();
        assert!(run_validate(dir.path()).is_err());
    }
}
