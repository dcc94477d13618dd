//! Page rendering collaborators.
//!
//! The engine never fetches pages itself. It asks a [`Renderer`] for a
//! [`PageSession`] and drives it through navigate/advance/reload calls,
//! getting a fresh [`PageSnapshot`] back from each.

pub mod http;
pub mod identity;
#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::PageSnapshot;

pub use http::HttpRenderer;
pub use identity::{Identity, IdentityProvider, ProxyRotation};

/// Opaque diagnostic payload (a screenshot, a markup dump) persisted by a
/// [`crate::storage::DiagnosticSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// File extension used when the artifact is stored on disk
    pub extension: String,
}

impl Artifact {
    pub fn new(
        bytes: Vec<u8>,
        content_type: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            extension: extension.into(),
        }
    }

    /// Markup dump of a page.
    pub fn html(markup: &str) -> Self {
        Self::new(markup.as_bytes().to_vec(), "text/html", "html")
    }
}

/// Creates page sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open an independent session; one per start URL.
    async fn open_session(&self) -> Result<Box<dyn PageSession>>;
}

/// One browsing context. Every call that returns a snapshot starts a new
/// page lifetime with an empty capture buffer.
#[async_trait]
pub trait PageSession: Send {
    /// Navigate to `url`.
    async fn navigate(&mut self, url: &str) -> Result<PageSnapshot>;

    /// Re-fetch the location of the last navigate or advance, even if it failed.
    async fn reload(&mut self) -> Result<PageSnapshot>;

    /// Trigger the pagination-next action on the current page.
    async fn advance(&mut self) -> Result<PageSnapshot>;

    /// Re-read the current page without navigating.
    async fn settle(&mut self) -> Result<PageSnapshot>;

    /// Diagnostic capture of the current page.
    async fn capture(&mut self) -> Result<Artifact>;
}
