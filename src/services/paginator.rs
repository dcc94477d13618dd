//! Pagination controller.
//!
//! Drives one page session for one start URL through an explicit state
//! machine:
//!
//! ```text
//! Fetching ──> Extracting ──> Emitting ──> AdvancingPage ──> Fetching
//!    │  ^          │  │            │
//!    │  └─ retry ──┘  │            │
//!    └────────────────┴────────────┴──> Stopped
//! ```
//!
//! Pages are handled strictly one after another; each advance depends on the
//! page the previous step left behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{AppError, Result};
use crate::models::{
    CanonicalListing, Config, CrawlInput, DivertReason, PageClass, PageSnapshot, StopReason,
    UrlOutcome,
};
use crate::render::{IdentityProvider, PageSession};
use crate::services::{BlockDetector, Normalizer, ResultAccumulator, StrategyChain};
use crate::storage::DiagnosticSink;

/// Budgets and retry policy for one run.
#[derive(Debug, Clone)]
pub struct PaginationSettings {
    /// Highest page number a start URL may reach
    pub max_pages: u32,
    /// Re-fetches allowed per page, counted separately for navigation
    /// failures and for diversions
    pub max_retries: u32,
    /// Re-read a page once when it yields nothing but shows a next control
    pub retry_empty_extraction: bool,
    /// Pause before each page advance
    pub request_delay: Duration,
}

impl PaginationSettings {
    pub fn new(config: &Config, input: &CrawlInput) -> Self {
        Self {
            max_pages: input.max_pages.max(1),
            max_retries: config.crawler.max_retries,
            retry_empty_extraction: config.extraction.retry_empty_extraction,
            request_delay: Duration::from_millis(config.crawler.request_delay_ms),
        }
    }
}

/// How the next snapshot is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fetch {
    Start,
    Reload,
    Advance,
}

enum Phase {
    Fetching(Fetch),
    Extracting(PageSnapshot),
    Emitting {
        snapshot: PageSnapshot,
        listings: Vec<CanonicalListing>,
    },
    AdvancingPage,
    Stopped(StopReason),
}

/// Counters owned by a single start URL's run.
#[derive(Debug)]
struct CrawlState {
    page: u32,
    /// Retries of the current page after a failed load
    nav_attempts: u32,
    /// Retries of the current page after a diversion
    divert_attempts: u32,
    accepted: usize,
    error: Option<String>,
}

impl CrawlState {
    fn new() -> Self {
        Self {
            page: 1,
            nav_attempts: 0,
            divert_attempts: 0,
            accepted: 0,
            error: None,
        }
    }

    fn reset_attempts(&mut self) {
        self.nav_attempts = 0;
        self.divert_attempts = 0;
    }

    /// The first page is retried from its start URL; later pages in place.
    fn retry_fetch(&self) -> Fetch {
        if self.page == 1 {
            Fetch::Start
        } else {
            Fetch::Reload
        }
    }
}

/// Pages through the results of one start URL at a time.
pub struct PaginationController {
    chain: StrategyChain,
    normalizer: Normalizer,
    detector: BlockDetector,
    accumulator: Arc<ResultAccumulator>,
    identity: Arc<dyn IdentityProvider>,
    diagnostics: Arc<dyn DiagnosticSink>,
    settings: PaginationSettings,
}

impl PaginationController {
    pub fn new(
        config: &Config,
        settings: PaginationSettings,
        accumulator: Arc<ResultAccumulator>,
        identity: Arc<dyn IdentityProvider>,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        Ok(Self {
            chain: StrategyChain::from_config(&config.extraction)?,
            normalizer: Normalizer::new(&config.output.source_site),
            detector: BlockDetector::new(&config.detection)?,
            accumulator,
            identity,
            diagnostics,
            settings,
        })
    }

    pub fn accumulator(&self) -> &ResultAccumulator {
        &self.accumulator
    }

    /// Paginate `start_url` until a budget, the last page or a failure stops it.
    ///
    /// Only sink errors are returned as `Err`; navigation failures and
    /// diversions end up in the outcome.
    pub async fn run(&self, session: &mut dyn PageSession, start_url: &str) -> Result<UrlOutcome> {
        let mut state = CrawlState::new();

        let stop = if self.accumulator.is_full() {
            state.page = 0;
            StopReason::ResultBudgetReached
        } else {
            let mut phase = Phase::Fetching(Fetch::Start);
            loop {
                phase = match phase {
                    Phase::Fetching(fetch) => {
                        self.fetch(session, start_url, fetch, &mut state).await
                    }
                    Phase::Extracting(snapshot) => {
                        self.extract(session, snapshot, &mut state).await
                    }
                    Phase::Emitting { snapshot, listings } => {
                        self.emit(&snapshot, listings, &mut state).await?
                    }
                    Phase::AdvancingPage => {
                        if !self.settings.request_delay.is_zero() {
                            tokio::time::sleep(self.settings.request_delay).await;
                        }
                        state.page += 1;
                        state.reset_attempts();
                        Phase::Fetching(Fetch::Advance)
                    }
                    Phase::Stopped(reason) => break reason,
                };
            }
        };

        log::info!(
            "Stopped {} at page {}: {} ({} saved from this URL)",
            start_url,
            state.page,
            stop,
            state.accepted
        );

        Ok(UrlOutcome {
            start_url: start_url.to_string(),
            pages: state.page,
            accepted: state.accepted,
            stop,
            error: state.error,
        })
    }

    async fn fetch(
        &self,
        session: &mut dyn PageSession,
        start_url: &str,
        fetch: Fetch,
        state: &mut CrawlState,
    ) -> Phase {
        log::info!("Processing page {}", state.page);
        let result = match fetch {
            Fetch::Start => session.navigate(start_url).await,
            Fetch::Reload => session.reload().await,
            Fetch::Advance => session.advance().await,
        };

        match result {
            Ok(snapshot) => Phase::Extracting(snapshot),
            Err(e) if e.is_retryable() && state.nav_attempts < self.settings.max_retries => {
                state.nav_attempts += 1;
                log::warn!(
                    "Page {} failed to load: {}. Retry {}/{}",
                    state.page,
                    e,
                    state.nav_attempts,
                    self.settings.max_retries
                );
                Phase::Fetching(state.retry_fetch())
            }
            Err(e) => {
                log::error!("Giving up on page {} of {}: {}", state.page, start_url, e);
                state.error = Some(e.to_string());
                Phase::Stopped(StopReason::NavigationFailed)
            }
        }
    }

    async fn extract(
        &self,
        session: &mut dyn PageSession,
        snapshot: PageSnapshot,
        state: &mut CrawlState,
    ) -> Phase {
        if let Some(reason) = self.detector.diversion(&snapshot) {
            return self.diverted(session, &snapshot, reason, state).await;
        }

        let mut snapshot = snapshot;
        let mut extraction = self.chain.run(&snapshot);

        if extraction.is_none()
            && self.settings.retry_empty_extraction
            && self.detector.has_next(&snapshot)
        {
            log::info!(
                "No vehicles on page {} but a next control is present; re-reading once",
                state.page
            );
            match session.settle().await {
                Ok(settled) => {
                    snapshot = settled;
                    extraction = self.chain.run(&snapshot);
                }
                Err(e) => log::warn!("Re-reading page {} failed: {}", state.page, e),
            }
        }

        let yielded = extraction.as_ref().map_or(0, |e| e.listings.len());
        match self.detector.classify(&snapshot, yielded) {
            PageClass::Diverted(reason) => self.diverted(session, &snapshot, reason, state).await,
            PageClass::Empty => {
                if let Some(hint) = self.detector.antibot_hint(&snapshot) {
                    log::error!(
                        "Detected anti-bot blocking page ({}) at {}",
                        hint,
                        snapshot.url()
                    );
                }
                log::warn!("No vehicles found on page {}", state.page);
                self.capture(session, "debug-page", state.page).await;
                Phase::Stopped(StopReason::EmptyPage)
            }
            PageClass::Valid => {
                state.reset_attempts();
                let listings = match extraction {
                    Some(extraction) => self
                        .normalizer
                        .normalize_all(&extraction.listings, extraction.method),
                    None => {
                        log::warn!(
                            "No strategy yielded vehicles on page {}; continuing",
                            state.page
                        );
                        self.capture(session, "debug-page", state.page).await;
                        Vec::new()
                    }
                };
                Phase::Emitting { snapshot, listings }
            }
        }
    }

    async fn diverted(
        &self,
        session: &mut dyn PageSession,
        snapshot: &PageSnapshot,
        reason: DivertReason,
        state: &mut CrawlState,
    ) -> Phase {
        log::warn!(
            "Wrong page detected on page {}: {} ({})",
            state.page,
            reason,
            snapshot.url()
        );
        self.capture(session, "wrong-page", state.page).await;

        if state.divert_attempts < self.settings.max_retries {
            state.divert_attempts += 1;
            self.identity.rotate();
            log::info!(
                "Retrying page {} ({}/{})",
                state.page,
                state.divert_attempts,
                self.settings.max_retries
            );
            Phase::Fetching(state.retry_fetch())
        } else {
            state.error = Some(AppError::diverted(snapshot.url(), reason).to_string());
            Phase::Stopped(StopReason::Diverted)
        }
    }

    async fn emit(
        &self,
        snapshot: &PageSnapshot,
        listings: Vec<CanonicalListing>,
        state: &mut CrawlState,
    ) -> Result<Phase> {
        state.accepted += self.accumulator.accept(listings).await?;
        log::info!(
            "Saved {}/{} vehicles",
            self.accumulator.saved(),
            self.accumulator.results_wanted()
        );

        let phase = if self.accumulator.is_full() {
            Phase::Stopped(StopReason::ResultBudgetReached)
        } else if state.page >= self.settings.max_pages {
            Phase::Stopped(StopReason::PageBudgetReached)
        } else if !self.detector.has_next(snapshot) {
            Phase::Stopped(StopReason::NoNextControl)
        } else {
            Phase::AdvancingPage
        };
        Ok(phase)
    }

    /// Persist a diagnostic of the current page; failures are only logged.
    async fn capture(&self, session: &mut dyn PageSession, prefix: &str, page: u32) {
        let key = format!("{prefix}-{page}-{}", Utc::now().timestamp_millis());
        let saved = match session.capture().await {
            Ok(artifact) => self.diagnostics.save_artifact(&key, &artifact).await,
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            log::warn!("Could not save diagnostic {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::mock::{Interruption, MockRenderer};
    use crate::render::{ProxyRotation, Renderer};
    use crate::storage::MemoryStorage;
    use serde_json::{Value, json};

    const START: &str = "https://www.carfax.com/Used-Honda-Civic";
    const NEXT_BUTTON: &str = r#"<button class="pagination_pages_nav">Next</button>"#;

    fn results_page(first: usize, count: usize, next: bool) -> PageSnapshot {
        let listings: Vec<Value> = (first..first + count)
            .map(|i| json!({"vin": format!("VIN{i:05}"), "title": format!("Car {i}")}))
            .collect();
        let pager = if next { NEXT_BUTTON } else { "" };
        PageSnapshot::new(
            START,
            format!(r#"<div class="srp-list-item"></div>{pager}"#),
        )
        .with_global(
            "__MOBX_STATE__",
            json!({"SearchRequestStore": {"results": {"listings": listings}}}),
        )
    }

    fn challenge_page() -> PageSnapshot {
        PageSnapshot::new(
            START,
            r#"<script src="https://geo.captcha-delivery.com/captcha/"></script>"#,
        )
    }

    struct Harness {
        renderer: MockRenderer,
        sink: Arc<MemoryStorage>,
        identity: Arc<ProxyRotation>,
        controller: PaginationController,
    }

    impl Harness {
        fn new(renderer: MockRenderer, results_wanted: usize, max_pages: u32) -> Self {
            let config = Config::default();
            let input = CrawlInput {
                results_wanted,
                max_pages,
                ..CrawlInput::default()
            };
            let sink = Arc::new(MemoryStorage::new());
            let identity = Arc::new(ProxyRotation::direct());
            let accumulator = Arc::new(ResultAccumulator::new(
                sink.clone(),
                input.results_wanted,
                config.output.dedupe,
            ));
            let controller = PaginationController::new(
                &config,
                PaginationSettings::new(&config, &input),
                accumulator,
                identity.clone(),
                sink.clone(),
            )
            .unwrap();
            Self {
                renderer,
                sink,
                identity,
                controller,
            }
        }

        async fn run(&self) -> UrlOutcome {
            let mut session = self.renderer.open_session().await.unwrap();
            self.controller.run(session.as_mut(), START).await.unwrap()
        }

        fn artifacts_with(&self, prefix: &str) -> usize {
            self.sink
                .artifact_keys()
                .iter()
                .filter(|k| k.starts_with(prefix))
                .count()
        }
    }

    #[tokio::test]
    async fn test_result_budget_stops_without_advancing() {
        let renderer = MockRenderer::new().with_pages(START, vec![results_page(0, 8, true)]);
        let h = Harness::new(renderer, 5, 50);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::ResultBudgetReached);
        assert_eq!(outcome.accepted, 5);
        assert_eq!(h.controller.accumulator().saved(), 5);
        assert_eq!(h.sink.listings().len(), 5);
        assert_eq!(h.renderer.advances(), 0);
        assert!(
            h.sink
                .listings()
                .iter()
                .all(|l| l.extraction_method == crate::models::ExtractionMethod::ReactiveState)
        );
    }

    #[tokio::test]
    async fn test_missing_next_control_stops() {
        let renderer = MockRenderer::new().with_pages(START, vec![results_page(0, 3, false)]);
        let h = Harness::new(renderer, 10, 2);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::NoNextControl);
        assert_eq!(outcome.pages, 1);
        assert_eq!(h.controller.accumulator().saved(), 3);
        assert_eq!(h.renderer.advances(), 0);
    }

    #[tokio::test]
    async fn test_challenge_page_exhausts_retries() {
        let renderer = MockRenderer::new().with_pages(START, vec![challenge_page()]);
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::Diverted);
        assert!(outcome.error.is_some());
        assert_eq!(outcome.accepted, 0);
        assert_eq!(h.renderer.navigations(), 1 + 3);
        assert_eq!(h.identity.current().generation, 3);
        assert_eq!(h.artifacts_with("wrong-page-1-"), 4);
        assert!(h.sink.listings().is_empty());
    }

    #[tokio::test]
    async fn test_diversion_recovers_after_rotation() {
        let renderer = MockRenderer::new()
            .with_pages(START, vec![results_page(0, 2, false)])
            .with_interruptions(START, vec![Interruption::Divert(challenge_page())]);
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::NoNextControl);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(h.renderer.navigations(), 2);
        assert_eq!(h.identity.current().generation, 1);
    }

    #[tokio::test]
    async fn test_page_budget() {
        let renderer = MockRenderer::new().with_pages(
            START,
            vec![
                results_page(0, 2, true),
                results_page(2, 2, true),
                results_page(4, 2, true),
            ],
        );
        let h = Harness::new(renderer, 100, 2);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::PageBudgetReached);
        assert_eq!(outcome.pages, 2);
        assert!(outcome.pages <= 2);
        assert_eq!(outcome.accepted, 4);
        assert_eq!(h.renderer.advances(), 1);
    }

    #[tokio::test]
    async fn test_navigation_failures_exhaust_retries() {
        let renderer = MockRenderer::new()
            .with_pages(START, vec![results_page(0, 2, false)])
            .with_interruptions(START, vec![Interruption::Fail; 4]);
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::NavigationFailed);
        assert_eq!(h.renderer.navigations(), 4);
        assert_eq!(outcome.accepted, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let renderer = MockRenderer::new()
            .with_pages(START, vec![results_page(0, 2, false)])
            .with_interruptions(START, vec![Interruption::Fail, Interruption::Fail]);
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::NoNextControl);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(h.renderer.navigations(), 3);
    }

    #[tokio::test]
    async fn test_failures_and_diversions_retry_independently() {
        let renderer = MockRenderer::new()
            .with_pages(START, vec![results_page(0, 2, false)])
            .with_interruptions(
                START,
                vec![
                    Interruption::Fail,
                    Interruption::Divert(challenge_page()),
                    Interruption::Fail,
                    Interruption::Divert(challenge_page()),
                    Interruption::Fail,
                    Interruption::Divert(challenge_page()),
                ],
            );
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::NoNextControl);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(h.renderer.navigations(), 7);
        assert_eq!(h.identity.current().generation, 3);
        assert_eq!(h.artifacts_with("wrong-page-1-"), 3);
    }

    #[tokio::test]
    async fn test_advanced_page_retried_in_place() {
        let renderer = MockRenderer::new()
            .with_pages(
                START,
                vec![results_page(0, 2, true), results_page(2, 2, false)],
            )
            .with_interruptions(
                START,
                vec![Interruption::Pass, Interruption::Divert(challenge_page())],
            );
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::NoNextControl);
        assert_eq!(outcome.pages, 2);
        assert_eq!(outcome.accepted, 4);
        assert_eq!(h.renderer.navigations(), 1);
        assert_eq!(h.renderer.reloads(), 1);
        assert_eq!(h.artifacts_with("wrong-page-2-"), 1);
    }

    #[tokio::test]
    async fn test_zero_yield_with_next_control_rereads_once() {
        let empty_with_next = PageSnapshot::new(
            START,
            format!(r#"<div class="srp-list-item"></div>{NEXT_BUTTON}"#),
        );
        let renderer = MockRenderer::new()
            .with_pages(START, vec![empty_with_next])
            .with_settled(START, vec![results_page(0, 2, false)]);
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(h.renderer.settles(), 1);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.stop, StopReason::NoNextControl);
        assert_eq!(h.artifacts_with("debug-page-"), 0);
    }

    #[tokio::test]
    async fn test_zero_yield_after_reread_continues_paginating() {
        let empty_with_next = PageSnapshot::new(
            START,
            format!(r#"<div class="srp-list-item"></div>{NEXT_BUTTON}"#),
        );
        let renderer = MockRenderer::new().with_pages(
            START,
            vec![empty_with_next, results_page(0, 2, false)],
        );
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(h.renderer.settles(), 1);
        assert_eq!(h.renderer.advances(), 1);
        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.pages, 2);
        assert_eq!(h.artifacts_with("debug-page-1-"), 1);
    }

    #[tokio::test]
    async fn test_empty_page_stops_with_diagnostic() {
        let empty = PageSnapshot::new(
            START,
            r#"<div class="srp-list-item">No matches</div><script src="https://js.datadome.co/tags.js"></script>"#,
        );
        let renderer = MockRenderer::new().with_pages(START, vec![empty]);
        let h = Harness::new(renderer, 10, 5);

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::EmptyPage);
        assert!(!outcome.stop.is_failure());
        assert_eq!(h.renderer.settles(), 0);
        assert_eq!(h.artifacts_with("debug-page-1-"), 1);
    }

    #[tokio::test]
    async fn test_full_budget_skips_url() {
        let renderer = MockRenderer::new().with_pages(START, vec![results_page(0, 3, false)]);
        let h = Harness::new(renderer, 3, 5);
        h.run().await;

        let outcome = h.run().await;
        assert_eq!(outcome.stop, StopReason::ResultBudgetReached);
        assert_eq!(outcome.pages, 0);
        assert_eq!(h.renderer.navigations(), 1);
    }
}
