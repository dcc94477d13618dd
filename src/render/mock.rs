//! Scripted renderer for driving the engine without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Artifact, PageSession, Renderer};
use crate::error::{AppError, Result};
use crate::models::PageSnapshot;

/// What a page load hands back instead of the scripted page.
#[derive(Debug, Clone)]
pub enum Interruption {
    /// Serve the scripted page
    Pass,
    /// The navigation times out
    Fail,
    /// The navigation lands on this page instead
    Divert(PageSnapshot),
}

#[derive(Default)]
struct Script {
    /// Page sequence per start URL; `advance` walks it
    pages: HashMap<String, Vec<PageSnapshot>>,
    /// Consumed, one per call, by navigate, reload and advance
    interruptions: HashMap<String, VecDeque<Interruption>>,
    /// Replaces the current page on `settle`
    settled: HashMap<String, VecDeque<PageSnapshot>>,
    navigations: usize,
    reloads: usize,
    advances: usize,
    settles: usize,
}

#[derive(Clone, Default)]
pub struct MockRenderer {
    script: Arc<Mutex<Script>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(self, start_url: &str, pages: Vec<PageSnapshot>) -> Self {
        self.lock().pages.insert(start_url.to_string(), pages);
        self
    }

    pub fn with_interruptions(self, start_url: &str, steps: Vec<Interruption>) -> Self {
        self.lock()
            .interruptions
            .insert(start_url.to_string(), steps.into());
        self
    }

    pub fn with_settled(self, start_url: &str, pages: Vec<PageSnapshot>) -> Self {
        self.lock().settled.insert(start_url.to_string(), pages.into());
        self
    }

    pub fn navigations(&self) -> usize {
        self.lock().navigations
    }

    pub fn reloads(&self) -> usize {
        self.lock().reloads
    }

    pub fn advances(&self) -> usize {
        self.lock().advances
    }

    pub fn settles(&self) -> usize {
        self.lock().settles
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn open_session(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(MockSession {
            script: Arc::clone(&self.script),
            start_url: None,
            index: 0,
            current: None,
        }))
    }
}

struct MockSession {
    script: Arc<Mutex<Script>>,
    start_url: Option<String>,
    index: usize,
    current: Option<PageSnapshot>,
}

impl MockSession {
    fn load(&mut self) -> Result<PageSnapshot> {
        let start_url = self.start_url.clone().unwrap_or_default();
        let mut script = self.script.lock().unwrap();

        let interruption = script
            .interruptions
            .get_mut(&start_url)
            .and_then(VecDeque::pop_front);
        let snapshot = match interruption {
            Some(Interruption::Fail) => {
                self.current = None;
                return Err(AppError::navigation(&start_url, "navigation timed out"));
            }
            Some(Interruption::Divert(page)) => page,
            Some(Interruption::Pass) | None => script
                .pages
                .get(&start_url)
                .and_then(|pages| pages.get(self.index))
                .cloned()
                .ok_or_else(|| AppError::navigation(&start_url, "no such page"))?,
        };
        self.current = Some(snapshot.clone());
        Ok(snapshot)
    }
}

#[async_trait]
impl PageSession for MockSession {
    async fn navigate(&mut self, url: &str) -> Result<PageSnapshot> {
        self.script.lock().unwrap().navigations += 1;
        self.start_url = Some(url.to_string());
        self.index = 0;
        self.load()
    }

    async fn reload(&mut self) -> Result<PageSnapshot> {
        self.script.lock().unwrap().reloads += 1;
        self.load()
    }

    async fn advance(&mut self) -> Result<PageSnapshot> {
        self.script.lock().unwrap().advances += 1;
        self.index += 1;
        self.load()
    }

    async fn settle(&mut self) -> Result<PageSnapshot> {
        let start_url = self.start_url.clone().unwrap_or_default();
        let mut script = self.script.lock().unwrap();
        script.settles += 1;
        if let Some(page) = script
            .settled
            .get_mut(&start_url)
            .and_then(VecDeque::pop_front)
        {
            self.current = Some(page);
        }
        self.current
            .clone()
            .ok_or_else(|| AppError::navigation(&start_url, "no page loaded"))
    }

    async fn capture(&mut self) -> Result<Artifact> {
        self.current
            .as_ref()
            .map(|page| Artifact::html(page.markup()))
            .ok_or_else(|| AppError::navigation("", "no page loaded"))
    }
}
