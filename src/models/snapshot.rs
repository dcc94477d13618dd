// src/models/snapshot.rs

//! The engine's view of one navigated page.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A background response payload captured while the page was alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedResponse {
    pub url: String,
    pub body: Value,
}

/// Responses captured during a single page lifetime.
///
/// Owned by exactly one [`PageSnapshot`]; a new snapshot always starts with a
/// reset buffer so payloads never leak across pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureBuffer {
    responses: Vec<CapturedResponse>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, url: impl Into<String>, body: Value) {
        self.responses.push(CapturedResponse {
            url: url.into(),
            body,
        });
    }

    pub fn responses(&self) -> &[CapturedResponse] {
        &self.responses
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// The current rendered/fetched page.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    url: String,
    markup: String,
    globals: BTreeMap<String, Value>,
    captured: CaptureBuffer,
    status: Option<u16>,
}

impl PageSnapshot {
    /// Create a snapshot with an empty state and a freshly reset capture buffer.
    pub fn new(url: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            markup: markup.into(),
            globals: BTreeMap::new(),
            captured: CaptureBuffer::new(),
            status: None,
        }
    }

    /// Record the HTTP status the page was served with.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a client-side global (e.g. `__MOBX_STATE__`).
    pub fn with_global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    /// Attach the responses captured during this page's lifetime.
    pub fn with_captured(mut self, captured: CaptureBuffer) -> Self {
        self.captured = captured;
        self
    }

    /// URL the page ended up on, after any redirects.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// HTTP status, when the renderer saw one.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Accessor for a client-side state object, if the page exposed it.
    pub fn state(&self, global: &str) -> Option<&Value> {
        self.globals.get(global).filter(|v| !v.is_null())
    }

    pub fn captured(&self) -> &CaptureBuffer {
        &self.captured
    }

    /// Parse the markup for DOM queries.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.markup)
    }

    /// Whether an enabled pagination-next control is present.
    ///
    /// A control matches when one of `selectors` selects it and, if
    /// `label` is non-empty, its text or `aria-label` contains `label`.
    /// Links with `rel="next"` count regardless of their label.
    pub fn has_next_control(&self, selectors: &[Selector], label: &str) -> bool {
        let document = self.document();
        let label = label.to_lowercase();

        selectors.iter().any(|selector| {
            document.select(selector).any(|element| {
                let value = element.value();
                if value.attr("disabled").is_some()
                    || value.attr("aria-disabled") == Some("true")
                {
                    return false;
                }
                if label.is_empty() || value.attr("rel") == Some("next") {
                    return true;
                }
                let text: String = element.text().collect();
                text.to_lowercase().contains(&label)
                    || value
                        .attr("aria-label")
                        .is_some_and(|a| a.to_lowercase().contains(&label))
            })
        })
    }
}
