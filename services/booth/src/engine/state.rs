//! services/booth/src/engine/state.rs
//!
//! Everything the engine tracks between awaits. Always accessed under the engine lock.

use dream_booth_core::domain::{PhotoId, PhotoRecord};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio_util::sync::CancellationToken;

/// How many finalized ids the latch remembers. Older ids have long left the
/// canvas; a late completion for one finds no record and is rejected as not found.
pub(crate) const FINALIZED_MEMORY: usize = 256;

#[derive(Default)]
pub(crate) struct EngineState {
    records: HashMap<PhotoId, PhotoRecord>,
    /// Capture order.
    order: Vec<PhotoId>,
    /// The single record awaiting its dream text, if any.
    pub confirming: Option<PhotoId>,
    /// One-shot archival latch over the most recent finalizations.
    finalized: HashSet<PhotoId>,
    /// `finalized` in claim order, oldest first.
    finalized_order: VecDeque<PhotoId>,
    /// Generation attempt per record; completions for older attempts are dropped.
    attempts: HashMap<PhotoId, u32>,
    /// Cancels a record's animation tickers.
    tickers: HashMap<PhotoId, CancellationToken>,
    /// Next default canvas slot.
    pub next_slot: usize,
}

impl EngineState {
    pub fn insert(&mut self, record: PhotoRecord, ticker: Option<CancellationToken>) {
        let id = record.id;
        self.order.push(id);
        self.records.insert(id, record);
        if let Some(token) = ticker {
            self.tickers.insert(id, token);
        }
    }

    /// Drops every trace of a record except its latch entry, cancelling its tickers.
    pub fn remove(&mut self, id: PhotoId) -> Option<PhotoRecord> {
        let record = self.records.remove(&id)?;
        self.order.retain(|other| *other != id);
        self.attempts.remove(&id);
        if let Some(token) = self.tickers.remove(&id) {
            token.cancel();
        }
        if self.confirming == Some(id) {
            self.confirming = None;
        }
        Some(record)
    }

    pub fn get(&self, id: PhotoId) -> Option<&PhotoRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: PhotoId) -> Option<&mut PhotoRecord> {
        self.records.get_mut(&id)
    }

    pub fn ordered(&self) -> Vec<PhotoRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .cloned()
            .collect()
    }

    pub fn ticker(&self, id: PhotoId) -> Option<CancellationToken> {
        self.tickers.get(&id).cloned()
    }

    /// Starts a new generation attempt and returns its number.
    pub fn next_attempt(&mut self, id: PhotoId) -> u32 {
        let attempt = self.attempts.entry(id).or_insert(0);
        *attempt += 1;
        *attempt
    }

    pub fn is_current_attempt(&self, id: PhotoId, attempt: u32) -> bool {
        self.attempts.get(&id) == Some(&attempt)
    }

    pub fn is_finalized(&self, id: PhotoId) -> bool {
        self.finalized.contains(&id)
    }

    /// Sets the latch. Returns `false` if finalization already happened.
    pub fn claim_finalization(&mut self, id: PhotoId) -> bool {
        if !self.finalized.insert(id) {
            return false;
        }
        self.finalized_order.push_back(id);
        while self.finalized_order.len() > FINALIZED_MEMORY {
            if let Some(oldest) = self.finalized_order.pop_front() {
                self.finalized.remove(&oldest);
            }
        }
        true
    }
}
