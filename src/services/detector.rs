//! Block/redirect detection.
//!
//! Tells "the search has no more results" apart from "we were sent somewhere
//! else". Both questions are answered from the snapshot alone, so classifying
//! the same snapshot twice always gives the same answer.

use regex::Regex;
use scraper::Selector;

use crate::error::{AppError, Result};
use crate::models::{DetectionConfig, DivertReason, PageClass, PageSnapshot};
use crate::utils::parse_selectors;
use crate::utils::url::{host_matches, path_matches};

/// Classifies page snapshots as valid, empty or diverted.
pub struct BlockDetector {
    expected_host: String,
    expected_path: Regex,
    results_marker: String,
    challenge_markers: Vec<String>,
    locale_markers: Vec<String>,
    antibot_hints: Vec<String>,
    next_selectors: Vec<Selector>,
    next_label: String,
    blocked_statuses: Vec<u16>,
}

impl BlockDetector {
    /// Compile the detection markers.
    pub fn new(config: &DetectionConfig) -> Result<Self> {
        let expected_path = Regex::new(&config.expected_path_pattern).map_err(|e| {
            AppError::validation(format!("detection.expected_path_pattern: {e}"))
        })?;

        Ok(Self {
            expected_host: config.expected_host.clone(),
            expected_path,
            results_marker: config.results_marker.to_lowercase(),
            challenge_markers: lowercase_all(&config.challenge_markers),
            locale_markers: lowercase_all(&config.locale_markers),
            antibot_hints: lowercase_all(&config.antibot_hints),
            next_selectors: parse_selectors(&config.next_selectors)?,
            next_label: config.next_label.clone(),
            blocked_statuses: config.blocked_statuses.clone(),
        })
    }

    /// Why the page is not the requested search results, if it is not.
    pub fn diversion(&self, snapshot: &PageSnapshot) -> Option<DivertReason> {
        if let Some(status) = snapshot
            .status()
            .filter(|s| self.blocked_statuses.contains(s))
        {
            return Some(DivertReason::BlockedStatus(status));
        }

        let url = snapshot.url();
        let url_lower = url.to_lowercase();
        let html_lower = snapshot.markup().to_lowercase();

        if let Some(marker) = find_marker(&self.challenge_markers, &html_lower) {
            return Some(DivertReason::Challenge(marker.to_string()));
        }

        if let Some(marker) = self
            .locale_markers
            .iter()
            .find(|m| url_lower.contains(m.as_str()) || html_lower.contains(m.as_str()))
        {
            return Some(DivertReason::ForeignLocale(marker.clone()));
        }

        let on_search_path =
            host_matches(url, &self.expected_host) && path_matches(url, &self.expected_path);
        if !on_search_path && !html_lower.contains(&self.results_marker) {
            return Some(DivertReason::OffSearchPath(url.to_string()));
        }

        None
    }

    /// Whether an enabled pagination-next control is on the page.
    pub fn has_next(&self, snapshot: &PageSnapshot) -> bool {
        snapshot.has_next_control(&self.next_selectors, &self.next_label)
    }

    /// Classify a snapshot given how many listings the strategy chain found on it.
    pub fn classify(&self, snapshot: &PageSnapshot, yielded: usize) -> PageClass {
        if let Some(reason) = self.diversion(snapshot) {
            return PageClass::Diverted(reason);
        }
        if yielded == 0 && !self.has_next(snapshot) {
            return PageClass::Empty;
        }
        PageClass::Valid
    }

    /// Anti-bot hint found in the markup, for logging empty pages.
    pub fn antibot_hint(&self, snapshot: &PageSnapshot) -> Option<&str> {
        find_marker(&self.antibot_hints, &snapshot.markup().to_lowercase())
    }
}

fn lowercase_all(markers: &[String]) -> Vec<String> {
    markers
        .iter()
        .map(|m| m.to_lowercase())
        .filter(|m| !m.is_empty())
        .collect()
}

fn find_marker<'a>(markers: &'a [String], haystack: &str) -> Option<&'a str> {
    markers
        .iter()
        .find(|m| haystack.contains(m.as_str()))
        .map(String::as_str)
}
