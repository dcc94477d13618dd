//! Application configuration structures.

use std::fs;
use std::path::Path;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ListingSelectors;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Navigation, retry and worker-pool settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Data sources consulted by the strategy chain
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Markers used to tell results, empty pages and diversions apart
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Dataset output settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.navigation_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.navigation_timeout_secs must be > 0",
            ));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.extraction.state_global.trim().is_empty() {
            return Err(AppError::validation("extraction.state_global is empty"));
        }
        if self.extraction.state_paths.is_empty() {
            return Err(AppError::validation("extraction.state_paths is empty"));
        }
        if self.extraction.selectors.card.is_empty() {
            return Err(AppError::validation("extraction.selectors.card is empty"));
        }
        for selector in self
            .extraction
            .selectors
            .all()
            .chain(&self.detection.next_selectors)
        {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        Regex::new(&self.detection.expected_path_pattern).map_err(|e| {
            AppError::validation(format!("detection.expected_path_pattern: {e}"))
        })?;
        if self.output.source_site.trim().is_empty() {
            return Err(AppError::validation("output.source_site is empty"));
        }
        Ok(())
    }
}

/// Navigation and worker-pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for page requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header; the site serves a different locale without it
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Per-navigation timeout in seconds
    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Maximum start URLs processed in parallel
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Re-navigations allowed per page after a failure or diversion
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay between page advances in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Hosts the renderer must not load (trackers)
    #[serde(default = "defaults::blocked_hosts")]
    pub blocked_hosts: Vec<String>,

    /// Outbound proxies rotated on diversion; empty means direct
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            navigation_timeout_secs: defaults::navigation_timeout(),
            max_concurrent: defaults::max_concurrent(),
            max_retries: defaults::max_retries(),
            request_delay_ms: 0,
            blocked_hosts: defaults::blocked_hosts(),
            proxies: Vec::new(),
        }
    }
}

/// Where each strategy looks for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Name of the window global holding the reactive state
    #[serde(default = "defaults::state_global")]
    pub state_global: String,

    /// Dotted key paths to the listings array, tried in order
    #[serde(default = "defaults::state_paths")]
    pub state_paths: Vec<String>,

    /// Keys that mark a listings array inside captured responses
    #[serde(default = "defaults::response_keys")]
    pub response_keys: Vec<String>,

    /// JSON-LD `@type` values accepted as vehicles
    #[serde(default = "defaults::structured_types")]
    pub structured_types: Vec<String>,

    /// Listing-card selectors for the markup fallback
    #[serde(default)]
    pub selectors: ListingSelectors,

    /// Re-read a page once when nothing was extracted but a next control exists
    #[serde(default = "defaults::enabled")]
    pub retry_empty_extraction: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            state_global: defaults::state_global(),
            state_paths: defaults::state_paths(),
            response_keys: defaults::response_keys(),
            structured_types: defaults::structured_types(),
            selectors: ListingSelectors::default(),
            retry_empty_extraction: true,
        }
    }
}

/// Page classification markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Host suffix of the target site
    #[serde(default = "defaults::expected_host")]
    pub expected_host: String,

    /// Regex the search-result path must match
    #[serde(default = "defaults::expected_path_pattern")]
    pub expected_path_pattern: String,

    /// Markup substring present on genuine result pages
    #[serde(default = "defaults::results_marker")]
    pub results_marker: String,

    /// Markup substrings that identify an anti-automation challenge
    #[serde(default = "defaults::challenge_markers")]
    pub challenge_markers: Vec<String>,

    /// URL or markup substrings that identify a foreign-locale redirect
    #[serde(default = "defaults::locale_markers")]
    pub locale_markers: Vec<String>,

    /// Markup substrings logged as anti-bot hints on empty pages
    #[serde(default = "defaults::antibot_hints")]
    pub antibot_hints: Vec<String>,

    /// Selectors for the pagination-next control
    #[serde(default = "defaults::next_selectors")]
    pub next_selectors: Vec<String>,

    /// Text the next control must carry (empty disables the check)
    #[serde(default = "defaults::next_label")]
    pub next_label: String,

    /// HTTP statuses that mean the request was refused rather than answered
    #[serde(default = "defaults::blocked_statuses")]
    pub blocked_statuses: Vec<u16>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            expected_host: defaults::expected_host(),
            expected_path_pattern: defaults::expected_path_pattern(),
            results_marker: defaults::results_marker(),
            challenge_markers: defaults::challenge_markers(),
            locale_markers: defaults::locale_markers(),
            antibot_hints: defaults::antibot_hints(),
            next_selectors: defaults::next_selectors(),
            next_label: defaults::next_label(),
            blocked_statuses: defaults::blocked_statuses(),
        }
    }
}

/// Dataset output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Constant site tag stamped on every record
    #[serde(default = "defaults::source_site")]
    pub source_site: String,

    /// Drop repeats keyed on VIN, else listing URL
    #[serde(default = "defaults::enabled")]
    pub dedupe: bool,

    /// Dataset file name under `datasets/`
    #[serde(default = "defaults::dataset_name")]
    pub dataset_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            source_site: defaults::source_site(),
            dedupe: true,
            dataset_name: defaults::dataset_name(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0".into()
    }
    pub fn accept_language() -> String {
        "en-US,en;q=0.9".into()
    }
    pub fn navigation_timeout() -> u64 {
        90
    }
    pub fn max_concurrent() -> usize {
        2
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn blocked_hosts() -> Vec<String> {
        vec![
            "google-analytics".into(),
            "googletagmanager".into(),
            "facebook.net".into(),
            "doubleclick".into(),
        ]
    }

    // Extraction defaults
    pub fn state_global() -> String {
        "__MOBX_STATE__".into()
    }
    pub fn state_paths() -> Vec<String> {
        vec![
            "SearchRequestStore.results.listings".into(),
            "SearchRequestStore.searchResults.listings".into(),
        ]
    }
    pub fn response_keys() -> Vec<String> {
        vec!["listings".into(), "searchResults".into(), "vehicles".into()]
    }
    pub fn structured_types() -> Vec<String> {
        vec!["Car".into(), "Vehicle".into(), "MotorVehicle".into()]
    }
    pub fn enabled() -> bool {
        true
    }

    // Detection defaults
    pub fn expected_host() -> String {
        "carfax.com".into()
    }
    pub fn expected_path_pattern() -> String {
        r"^/(Used-|used-|cars-for-sale)".into()
    }
    pub fn results_marker() -> String {
        "srp-list-item".into()
    }
    pub fn challenge_markers() -> Vec<String> {
        vec![
            "captcha-delivery.com".into(),
            "geo.captcha-delivery".into(),
            "px-captcha".into(),
            "Access to this page has been denied".into(),
            "Please enable JS and disable any ad blocker".into(),
        ]
    }
    pub fn locale_markers() -> Vec<String> {
        vec!["carfax.eu".into(), "La confiance".into()]
    }
    pub fn antibot_hints() -> Vec<String> {
        vec!["datadome".into(), "captcha".into()]
    }
    pub fn next_selectors() -> Vec<String> {
        vec![
            "button.pagination_pages_nav:not([disabled])".into(),
            "a[rel='next']".into(),
        ]
    }
    pub fn next_label() -> String {
        "Next".into()
    }
    pub fn blocked_statuses() -> Vec<u16> {
        vec![401, 403, 407, 429]
    }

    // Output defaults
    pub fn source_site() -> String {
        "carfax.com".into()
    }
    pub fn dataset_name() -> String {
        "default".into()
    }
}
