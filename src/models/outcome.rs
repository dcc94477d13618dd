// src/models/outcome.rs

//! Page classifications and run outcomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a page was judged not to be the requested search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DivertReason {
    /// Markup carries an anti-automation challenge marker
    Challenge(String),
    /// URL or markup belongs to a foreign-locale site
    ForeignLocale(String),
    /// Landed off the search path without a results container
    OffSearchPath(String),
    /// Served with a status that refuses the request (rate limit, forbidden)
    BlockedStatus(u16),
}

impl fmt::Display for DivertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Challenge(marker) => write!(f, "challenge page ({marker})"),
            Self::ForeignLocale(marker) => write!(f, "foreign locale ({marker})"),
            Self::OffSearchPath(url) => write!(f, "not a search results page: {url}"),
            Self::BlockedStatus(status) => write!(f, "blocked with HTTP {status}"),
        }
    }
}

/// Detector verdict for one page snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PageClass {
    Valid,
    /// Structurally valid, nothing extracted, no way forward
    Empty,
    /// Retryable: re-navigate, ideally with a fresh identity
    Diverted(DivertReason),
}

/// Why pagination for a start URL ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    ResultBudgetReached,
    PageBudgetReached,
    NoNextControl,
    EmptyPage,
    Diverted,
    NavigationFailed,
}

impl StopReason {
    /// Whether the start URL ended in failure rather than normal completion.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Diverted | Self::NavigationFailed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ResultBudgetReached => "result budget reached",
            Self::PageBudgetReached => "page budget reached",
            Self::NoNextControl => "no next page",
            Self::EmptyPage => "empty page",
            Self::Diverted => "diverted",
            Self::NavigationFailed => "navigation failed",
        };
        f.write_str(text)
    }
}

/// Outcome of paginating one start URL.
#[derive(Debug, Clone, Serialize)]
pub struct UrlOutcome {
    pub start_url: String,
    /// Page number reached when pagination stopped
    pub pages: u32,
    /// Records this URL contributed to the dataset
    pub accepted: usize,
    pub stop: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results_wanted: usize,
    pub saved: usize,
    pub urls: Vec<UrlOutcome>,
}

impl CrawlSummary {
    pub fn failed_urls(&self) -> usize {
        self.urls.iter().filter(|u| u.stop.is_failure()).count()
    }
}
