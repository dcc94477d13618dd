// src/pipeline/crawl.rs

//! Crawl pipeline: a bounded worker pool over start URLs.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Config, CrawlInput, CrawlSummary, StopReason, UrlOutcome};
use crate::render::{IdentityProvider, Renderer};
use crate::services::{PaginationController, PaginationSettings, ResultAccumulator};
use crate::storage::{DatasetSink, DiagnosticSink};

/// Run the crawler over every resolved start URL.
///
/// Start URLs are paginated in parallel, at most `crawler.max_concurrent` at
/// a time, all feeding one shared accumulator. A failing start URL never
/// aborts the run; only sink errors do.
pub async fn run_crawler(
    config: &Config,
    input: &CrawlInput,
    renderer: Arc<dyn Renderer>,
    identity: Arc<dyn IdentityProvider>,
    sink: Arc<dyn DatasetSink>,
    diagnostics: Arc<dyn DiagnosticSink>,
) -> Result<CrawlSummary> {
    let started_at = Utc::now();
    let start_urls = input.resolved_start_urls();

    log::info!("Start URLs: {:?}", start_urls);
    log::info!(
        "Budgets: {} results, {} pages per URL",
        input.results_wanted,
        input.max_pages
    );

    let accumulator = Arc::new(ResultAccumulator::new(
        sink,
        input.results_wanted,
        config.output.dedupe,
    ));
    let controller = PaginationController::new(
        config,
        PaginationSettings::new(config, input),
        Arc::clone(&accumulator),
        identity,
        diagnostics,
    )?;

    let concurrency = config.crawler.max_concurrent.max(1);
    let results: Vec<Result<UrlOutcome>> = stream::iter(start_urls)
        .map(|url| {
            let controller = &controller;
            let renderer = Arc::clone(&renderer);
            async move {
                if controller.accumulator().is_full() {
                    return Ok(skipped(url));
                }
                match renderer.open_session().await {
                    Ok(mut session) => controller.run(session.as_mut(), &url).await,
                    Err(e) => {
                        log::error!("Could not open a page session for {}: {}", url, e);
                        Ok(UrlOutcome {
                            start_url: url,
                            pages: 0,
                            accepted: 0,
                            stop: StopReason::NavigationFailed,
                            error: Some(e.to_string()),
                        })
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let urls = results.into_iter().collect::<Result<Vec<_>>>()?;
    let summary = CrawlSummary {
        started_at,
        finished_at: Utc::now(),
        results_wanted: input.results_wanted,
        saved: accumulator.saved(),
        urls,
    };

    if summary.failed_urls() > 0 {
        log::warn!(
            "{} of {} start URLs failed",
            summary.failed_urls(),
            summary.urls.len()
        );
    }
    log::info!("Finished. Total saved: {} vehicles", summary.saved);

    Ok(summary)
}

fn skipped(url: String) -> UrlOutcome {
    log::info!("Result budget already reached; skipping {}", url);
    UrlOutcome {
        start_url: url,
        pages: 0,
        accepted: 0,
        stop: StopReason::ResultBudgetReached,
        error: None,
    }
}
