//! Static-fetch renderer over reqwest.
//!
//! No script runs, so the client-side state is recovered from the
//! `window.<global> = {...}` assignment in the served markup, and JSON script
//! blocks that carry listings stand in for intercepted background responses.
//! The response status travels on the snapshot so a refused request is never
//! mistaken for an empty result page.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, Proxy};
use scraper::{Html, Selector};
use serde_json::Value;

use super::{Artifact, IdentityProvider, PageSession, Renderer};
use crate::error::{AppError, Result};
use crate::models::{CaptureBuffer, Config, CrawlerConfig, PageSnapshot};
use crate::utils::resolve;
use crate::utils::url::{get_host, page_param, with_page};

static EMBEDDED_JSON_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("script[type='application/json']").expect("valid embedded json selector")
});

static NEXT_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[rel='next'][href]").expect("valid next link selector"));

/// How long `settle` waits before fetching the page again.
const SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// How deep to look for a listings key inside an embedded JSON block.
const EMBEDDED_DEPTH: usize = 4;

/// Renderer that fetches pages with plain HTTP requests.
pub struct HttpRenderer {
    inner: Arc<Inner>,
}

struct Inner {
    crawler: CrawlerConfig,
    state_global: String,
    state_pattern: Regex,
    response_keys: Vec<String>,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpRenderer {
    pub fn new(config: &Config, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let global = regex::escape(&config.extraction.state_global);
        let state_pattern = Regex::new(&format!(
            r#"window(?:\.{global}|\[\s*["']{global}["']\s*\])\s*=\s*"#
        ))
        .map_err(|e| AppError::config(format!("state pattern: {e}")))?;

        Ok(Self {
            inner: Arc::new(Inner {
                crawler: config.crawler.clone(),
                state_global: config.extraction.state_global.clone(),
                state_pattern,
                response_keys: config.extraction.response_keys.clone(),
                identity,
            }),
        })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn open_session(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(HttpSession {
            inner: Arc::clone(&self.inner),
            client: None,
            location: None,
            current: None,
        }))
    }
}

impl Inner {
    fn build_client(&self, proxy: Option<&str>) -> Result<Client> {
        let mut headers = HeaderMap::new();
        let language = HeaderValue::from_str(&self.crawler.accept_language)
            .map_err(|e| AppError::config(format!("crawler.accept_language: {e}")))?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let mut builder = Client::builder()
            .user_agent(&self.crawler.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(self.crawler.navigation_timeout_secs));
        builder = match proxy {
            Some(proxy) => builder.proxy(Proxy::all(proxy)?),
            None => builder.no_proxy(),
        };
        Ok(builder.build()?)
    }

    fn is_blocked(&self, url: &str) -> bool {
        get_host(url).is_some_and(|host| {
            self.crawler
                .blocked_hosts
                .iter()
                .any(|blocked| !blocked.is_empty() && host.contains(blocked.as_str()))
        })
    }

    /// Value assigned to `window.<global>` in the markup, if any.
    fn parse_state(&self, markup: &str) -> Option<Value> {
        let found = self.state_pattern.find(markup)?;
        let rest = &markup[found.end()..];
        match serde_json::Deserializer::from_str(rest)
            .into_iter::<Value>()
            .next()?
        {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Unparseable {} assignment: {}", self.state_global, e);
                None
            }
        }
    }

    /// JSON script blocks that carry a listings array.
    fn embedded_payloads(&self, url: &str, markup: &str) -> CaptureBuffer {
        let mut buffer = CaptureBuffer::new();
        let document = Html::parse_document(markup);
        for (i, script) in document.select(&EMBEDDED_JSON_SELECTOR).enumerate() {
            let text: String = script.text().collect();
            let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
                continue;
            };
            if has_listing_key(&value, &self.response_keys, EMBEDDED_DEPTH) {
                buffer.push(format!("{url}#embedded-{i}"), value);
            }
        }
        buffer
    }

    fn snapshot(&self, url: String, markup: String) -> PageSnapshot {
        let state = self.parse_state(&markup);
        let captured = self.embedded_payloads(&url, &markup);
        let snapshot = PageSnapshot::new(url, markup).with_captured(captured);
        match state {
            Some(state) => snapshot.with_global(self.state_global.clone(), state),
            None => snapshot,
        }
    }

    /// Follow `a[rel=next]`, else bump the `page` query parameter.
    fn next_url(&self, current: &PageSnapshot) -> Option<String> {
        let document = current.document();
        document
            .select(&NEXT_LINK_SELECTOR)
            .find_map(|a| a.value().attr("href"))
            .and_then(|href| resolve(current.url(), href))
            .or_else(|| {
                let page = page_param(current.url()).unwrap_or(1);
                with_page(current.url(), page + 1)
            })
    }
}

fn has_listing_key(value: &Value, keys: &[String], depth: usize) -> bool {
    if depth == 0 {
        return false;
    }
    match value {
        Value::Object(map) => map.iter().any(|(key, child)| {
            (child.is_array() && keys.iter().any(|k| k == key))
                || has_listing_key(child, keys, depth - 1)
        }),
        Value::Array(items) => items.iter().any(|i| has_listing_key(i, keys, depth - 1)),
        _ => false,
    }
}

/// One sequence of page loads sharing a client.
pub struct HttpSession {
    inner: Arc<Inner>,
    /// Client and the identity generation it was built for
    client: Option<(usize, Client)>,
    location: Option<String>,
    current: Option<PageSnapshot>,
}

impl HttpSession {
    fn client(&mut self) -> Result<Client> {
        let identity = self.inner.identity.current();
        if let Some((generation, client)) = &self.client {
            if *generation == identity.generation {
                return Ok(client.clone());
            }
        }
        let client = self.inner.build_client(identity.proxy.as_deref())?;
        self.client = Some((identity.generation, client.clone()));
        Ok(client)
    }

    async fn fetch(&mut self, url: String) -> Result<PageSnapshot> {
        self.location = Some(url.clone());
        self.current = None;

        if self.inner.is_blocked(&url) {
            return Err(AppError::navigation(&url, "host is blocked"));
        }

        let client = self.client()?;
        log::debug!("GET {}", url);
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::navigation(&url, e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AppError::navigation(&url, format!("HTTP {status}")));
        }
        if !status.is_success() {
            log::warn!("{} answered HTTP {}", url, status);
        }

        let final_url = response.url().to_string();
        let markup = response
            .text()
            .await
            .map_err(|e| AppError::navigation(&url, e))?;

        let snapshot = self
            .inner
            .snapshot(final_url, markup)
            .with_status(status.as_u16());
        self.current = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn current(&self) -> Result<&PageSnapshot> {
        self.current.as_ref().ok_or_else(|| {
            AppError::navigation(
                self.location.as_deref().unwrap_or_default(),
                "no page loaded",
            )
        })
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<PageSnapshot> {
        self.fetch(url.to_string()).await
    }

    async fn reload(&mut self) -> Result<PageSnapshot> {
        let location = self
            .location
            .clone()
            .ok_or_else(|| AppError::navigation("", "reload before navigate"))?;
        self.fetch(location).await
    }

    async fn advance(&mut self) -> Result<PageSnapshot> {
        let current = self.current()?;
        let next = self
            .inner
            .next_url(current)
            .ok_or_else(|| AppError::navigation(current.url(), "no next page url"))?;
        self.fetch(next).await
    }

    /// Wait, then fetch the current location again; a static page only
    /// changes when the server serves it anew.
    async fn settle(&mut self) -> Result<PageSnapshot> {
        let location = self.current()?.url().to_string();
        tokio::time::sleep(SETTLE_DELAY).await;
        self.fetch(location).await
    }

    async fn capture(&mut self) -> Result<Artifact> {
        Ok(Artifact::html(self.current()?.markup()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CrawlInput, StopReason};
    use crate::render::ProxyRotation;
    use crate::services::{PaginationController, PaginationSettings, ResultAccumulator};
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn renderer() -> HttpRenderer {
        HttpRenderer::new(&Config::default(), Arc::new(ProxyRotation::direct())).unwrap()
    }

    /// Serve `responses` in order on a local port, repeating the last one.
    /// Returns the base URL and the number of requests answered so far.
    async fn serve(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let served = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&served);

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let response = &responses[n.min(responses.len() - 1)];
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (base, served)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn local_config() -> Config {
        let mut config = Config::default();
        config.detection.expected_host = "127.0.0.1".into();
        config
    }

    #[test]
    fn test_state_assignment_parsed() {
        let markup = r#"<script>
            window.__MOBX_STATE__ = {"SearchRequestStore": {"results": {"listings": [{"vin": "A"}]}}};
            window.other = 1;
        </script>"#;
        let state = renderer().inner.parse_state(markup).unwrap();
        assert_eq!(
            state["SearchRequestStore"]["results"]["listings"][0]["vin"],
            json!("A")
        );
    }

    #[test]
    fn test_bracket_assignment_parsed() {
        let markup = r#"<script>window["__MOBX_STATE__"]={"a":1}</script>"#;
        assert_eq!(renderer().inner.parse_state(markup), Some(json!({"a": 1})));
    }

    #[test]
    fn test_missing_state() {
        assert!(renderer().inner.parse_state("<html></html>").is_none());
    }

    #[test]
    fn test_snapshot_collects_embedded_listings() {
        let markup = r#"
            <script type="application/json">{"props": {"pageProps": {"listings": [{"vin": "B"}]}}}</script>
            <script type="application/json">{"config": {"theme": "dark"}}</script>
            <script type="application/json">not json</script>"#;
        let snapshot = renderer()
            .inner
            .snapshot("https://www.carfax.com/Used-Cars".into(), markup.into());
        assert_eq!(snapshot.captured().len(), 1);
        assert!(snapshot.state("__MOBX_STATE__").is_none());
    }

    #[test]
    fn test_blocked_hosts() {
        let inner = renderer().inner;
        assert!(inner.is_blocked("https://www.google-analytics.com/collect"));
        assert!(!inner.is_blocked("https://www.carfax.com/Used-Cars"));
    }

    #[test]
    fn test_next_url_follows_rel_next() {
        let snapshot = PageSnapshot::new(
            "https://www.carfax.com/Used-Cars",
            r#"<a rel="next" href="/Used-Cars?page=2">Next</a>"#,
        );
        assert_eq!(
            renderer().inner.next_url(&snapshot).as_deref(),
            Some("https://www.carfax.com/Used-Cars?page=2")
        );
    }

    #[test]
    fn test_next_url_bumps_page_param() {
        let snapshot = PageSnapshot::new("https://www.carfax.com/Used-Cars?zip=78701&page=3", "");
        assert_eq!(
            renderer().inner.next_url(&snapshot).as_deref(),
            Some("https://www.carfax.com/Used-Cars?zip=78701&page=4")
        );
    }

    #[tokio::test]
    async fn test_snapshot_carries_status() {
        let (base, _) = serve(vec![http_response("429 Too Many Requests", "")]).await;
        let mut session = renderer().open_session().await.unwrap();
        let snapshot = session
            .navigate(&format!("{base}/Used-Honda-Civic"))
            .await
            .unwrap();
        assert_eq!(snapshot.status(), Some(429));
    }

    #[tokio::test]
    async fn test_server_error_is_navigation_failure() {
        let (base, _) = serve(vec![http_response("503 Service Unavailable", "")]).await;
        let mut session = renderer().open_session().await.unwrap();
        let err = session.navigate(&format!("{base}/Used-Cars")).await.unwrap_err();
        assert!(matches!(err, AppError::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_rate_limited_start_url_is_retried_then_failed() {
        let (base, served) = serve(vec![http_response("429 Too Many Requests", "")]).await;
        let config = local_config();
        let input = CrawlInput::default();
        let sink = Arc::new(MemoryStorage::new());
        let identity = Arc::new(ProxyRotation::direct());
        let accumulator = Arc::new(ResultAccumulator::new(sink.clone(), 10, true));
        let controller = PaginationController::new(
            &config,
            PaginationSettings::new(&config, &input),
            accumulator,
            identity.clone(),
            sink.clone(),
        )
        .unwrap();

        let renderer = HttpRenderer::new(&config, identity.clone()).unwrap();
        let mut session = renderer.open_session().await.unwrap();
        let outcome = controller
            .run(session.as_mut(), &format!("{base}/Used-Honda-Civic"))
            .await
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Diverted);
        assert!(outcome.stop.is_failure());
        assert!(outcome.error.unwrap().contains("429"));
        assert_eq!(served.load(Ordering::SeqCst), 1 + config.crawler.max_retries as usize);
        assert_eq!(
            identity.current().generation,
            config.crawler.max_retries as usize
        );
    }

    #[tokio::test]
    async fn test_settle_fetches_page_again() {
        let (base, served) = serve(vec![
            http_response("200 OK", "<div>loading</div>"),
            http_response("200 OK", r#"<div class="srp-list-item">2019 Honda Civic</div>"#),
        ])
        .await;
        let mut session = renderer().open_session().await.unwrap();
        let first = session.navigate(&format!("{base}/Used-Cars")).await.unwrap();
        assert!(!first.markup().contains("srp-list-item"));

        let settled = session.settle().await.unwrap();
        assert!(settled.markup().contains("srp-list-item"));
        assert_eq!(settled.url(), first.url());
        assert_eq!(served.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_blocked_navigation_fails_without_request() {
        let mut session = renderer().open_session().await.unwrap();
        let err = session
            .navigate("https://stats.doubleclick.net/x")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Navigation { .. }));
        assert!(session.capture().await.is_err());
    }
}
