//! Result accumulator: filters, deduplicates and caps emitted records.
//!
//! One accumulator is shared by every worker of a run. A record only reaches
//! the sink after it has reserved a slot with a compare-and-increment on the
//! shared `saved` counter, so parallel workers can never push the run past
//! `results_wanted`.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AppError, Result};
use crate::models::CanonicalListing;
use crate::storage::DatasetSink;

pub struct ResultAccumulator {
    sink: Arc<dyn DatasetSink>,
    results_wanted: usize,
    saved: AtomicUsize,
    /// Dedupe keys already emitted; `None` when deduplication is off
    seen: Option<Mutex<HashSet<String>>>,
}

impl ResultAccumulator {
    pub fn new(sink: Arc<dyn DatasetSink>, results_wanted: usize, dedupe: bool) -> Self {
        Self {
            sink,
            results_wanted,
            saved: AtomicUsize::new(0),
            seen: dedupe.then(|| Mutex::new(HashSet::new())),
        }
    }

    pub fn results_wanted(&self) -> usize {
        self.results_wanted
    }

    /// Records emitted so far. Never decreases.
    pub fn saved(&self) -> usize {
        self.saved.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.results_wanted.saturating_sub(self.saved())
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    /// Emit the acceptable prefix of `listings`; returns how many were emitted.
    ///
    /// Unidentifiable records and repeats are dropped silently. Emission stops
    /// as soon as the result budget is exhausted.
    pub async fn accept(&self, listings: Vec<CanonicalListing>) -> Result<usize> {
        let mut accepted = 0;

        for listing in listings {
            if !listing.is_identifiable() {
                continue;
            }
            if self.is_full() {
                break;
            }
            if self.is_repeat(&listing)? {
                log::debug!("Skipping repeat listing {:?}", listing.dedupe_key());
                continue;
            }
            if !self.reserve() {
                break;
            }
            self.sink.push(&listing).await?;
            accepted += 1;
        }

        Ok(accepted)
    }

    /// Take one slot of the result budget, if any is left.
    fn reserve(&self) -> bool {
        self.saved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |saved| {
                (saved < self.results_wanted).then_some(saved + 1)
            })
            .is_ok()
    }

    fn is_repeat(&self, listing: &CanonicalListing) -> Result<bool> {
        let (Some(seen), Some(key)) = (&self.seen, listing.dedupe_key()) else {
            return Ok(false);
        };
        let mut seen = seen.lock().map_err(AppError::storage)?;
        Ok(!seen.insert(key))
    }
}
