//! Incremental note scanning.
//!
//! A [`ScanTask`] is an explicit state machine driven by the caller:
//!
//! ```text
//! Idle -> FetchingPage -> Decoding -> Persisting -+-> FetchingPage
//!              |                                  +-> Done
//!              +-> Failed(reason)
//! ```
//!
//! The cursor is only written in `Persisting`, after a whole page has been
//! decoded, so abandoning a task between steps never leaves partial state.
//! [`NoteScanner`] owns one gate per wallet and runs at most one task per
//! wallet at a time. Tasks handed out by [`NoteScanner::task`] hold that gate
//! until they are dropped.

use crate::advanced::decoder::{NoteDecoder, PageDecode};
use crate::balance::SpendStatusOracle;
use crate::cache::ScanCache;
use crate::core::source::{NotePage, NoteSource};
use crate::error::{Result, ZertSdkError};
use crate::identity::Identity;
use crate::types::ScanCursor;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    /// Fetch failed; the persisted cursor is untouched and the scan can resume
    Transport(String),
    /// The cursor could not be read or committed
    Storage(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    FetchingPage,
    Decoding,
    Persisting,
    Done,
    Failed(ScanFailure),
}

impl ScanPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanPhase::Done | ScanPhase::Failed(_))
    }
}

/// Summary of one completed scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub pages: u64,
    pub fetched: u64,
    pub new_notes: u64,
    pub not_owned: u64,
    pub malformed: u64,
    /// The stored cursor was discarded and the stream replayed from 0
    pub resynced: bool,
    pub cursor: ScanCursor,
}

pub struct ScanTask {
    identity: Arc<Identity>,
    source: Arc<dyn NoteSource>,
    cache: ScanCache,
    decoder: NoteDecoder,
    page_size: u64,
    page_delay: Duration,
    phase: ScanPhase,
    cursor: ScanCursor,
    page: Option<NotePage>,
    decoded: Option<PageDecode>,
    report: ScanReport,
    _gate: Option<OwnedMutexGuard<Option<ScanReport>>>,
}

impl ScanTask {
    pub fn new(
        identity: Arc<Identity>,
        source: Arc<dyn NoteSource>,
        cache: ScanCache,
        page_size: u64,
    ) -> Self {
        Self {
            identity,
            source,
            cache,
            decoder: NoteDecoder::new(),
            page_size: page_size.max(1),
            page_delay: Duration::ZERO,
            phase: ScanPhase::Idle,
            cursor: ScanCursor::empty(),
            page: None,
            decoded: None,
            report: ScanReport::default(),
            _gate: None,
        }
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn phase(&self) -> &ScanPhase {
        &self.phase
    }

    /// Cursor as of the last committed page
    pub fn cursor(&self) -> &ScanCursor {
        &self.cursor
    }

    pub fn wallet(&self) -> &Pubkey {
        self.identity.wallet()
    }

    /// Abandon the task; any fetched but uncommitted page is dropped
    pub fn cancel(&mut self) {
        if !self.phase.is_terminal() {
            debug!(wallet = %self.wallet(), "scan cancelled");
            self.page = None;
            self.decoded = None;
            self.phase = ScanPhase::Failed(ScanFailure::Cancelled);
        }
    }

    /// Advance by one transition
    pub async fn step(&mut self) -> &ScanPhase {
        let next = match std::mem::replace(&mut self.phase, ScanPhase::Idle) {
            ScanPhase::Idle => self.load_cursor(),
            ScanPhase::FetchingPage => self.fetch_page().await,
            ScanPhase::Decoding => self.decode_page(),
            ScanPhase::Persisting => self.persist_page().await,
            terminal => terminal,
        };
        self.phase = next;
        &self.phase
    }

    /// Drive the task to completion
    pub async fn run(mut self) -> Result<ScanReport> {
        while !self.step().await.is_terminal() {}
        self.finish()
    }

    /// Outcome of a terminal task
    pub fn finish(self) -> Result<ScanReport> {
        match self.phase {
            ScanPhase::Done => {
                let mut report = self.report;
                report.cursor = self.cursor;
                Ok(report)
            },
            ScanPhase::Failed(ScanFailure::Transport(msg)) => Err(ZertSdkError::Transport(msg)),
            ScanPhase::Failed(ScanFailure::Storage(msg)) => Err(ZertSdkError::Storage(msg)),
            ScanPhase::Failed(ScanFailure::Cancelled) => Err(ZertSdkError::ScanCancelled),
            other => Err(ZertSdkError::Other(format!("scan finished in phase {:?}", other))),
        }
    }

    fn load_cursor(&mut self) -> ScanPhase {
        let wallet = *self.wallet();
        match self.cache.load(&wallet) {
            Ok(cursor) => {
                self.cursor = cursor;
                ScanPhase::FetchingPage
            },
            Err(ZertSdkError::CacheCorrupted(reason)) => {
                warn!(%wallet, %reason, "discarding corrupted scan cache");
                self.resync()
            },
            Err(e) => ScanPhase::Failed(ScanFailure::Storage(e.to_string())),
        }
    }

    fn resync(&mut self) -> ScanPhase {
        let wallet = *self.wallet();
        if let Err(e) = self.cache.clear(&wallet) {
            return ScanPhase::Failed(ScanFailure::Storage(e.to_string()));
        }
        self.cursor = ScanCursor::empty();
        self.report.resynced = true;
        ScanPhase::FetchingPage
    }

    async fn fetch_page(&mut self) -> ScanPhase {
        let position = self.cursor.next_position();
        let page = match self.source.fetch_notes_from(position, self.page_size).await {
            Ok(page) => page,
            Err(e) => {
                warn!(wallet = %self.wallet(), position, error = %e, "note fetch failed");
                return ScanPhase::Failed(ScanFailure::Transport(e.to_string()));
            },
        };

        // A cursor past the end of the stream means the ledger was reset under us
        if page.total < position {
            warn!(
                wallet = %self.wallet(),
                position,
                total = page.total,
                "scan cursor beyond stream end, resyncing"
            );
            return self.resync();
        }

        if page.is_empty() {
            return ScanPhase::Done;
        }

        self.report.pages += 1;
        self.report.fetched += page.notes.len() as u64;
        debug!(
            wallet = %self.wallet(),
            start = page.start,
            count = page.notes.len(),
            total = page.total,
            "fetched page"
        );
        self.page = Some(page);
        ScanPhase::Decoding
    }

    fn decode_page(&mut self) -> ScanPhase {
        let Some(page) = self.page.as_ref() else {
            return ScanPhase::FetchingPage;
        };
        let decoded = self.decoder.decode_page(&page.notes, &self.identity);
        self.report.not_owned += decoded.not_owned;
        self.report.malformed += decoded.malformed;
        self.decoded = Some(decoded);
        ScanPhase::Persisting
    }

    async fn persist_page(&mut self) -> ScanPhase {
        let (Some(page), Some(decoded)) = (self.page.take(), self.decoded.take()) else {
            return ScanPhase::FetchingPage;
        };
        let Some(last_position) = page.last_position() else {
            return ScanPhase::Done;
        };

        let wallet = *self.wallet();
        // Another writer got further while this page was in flight
        if let Ok(stored) = self.cache.load(&wallet) {
            if stored.next_position() > self.cursor.next_position() {
                debug!(
                    %wallet,
                    stored = stored.next_position(),
                    local = self.cursor.next_position(),
                    "stored cursor moved ahead, rebasing"
                );
                self.cursor = stored;
                return ScanPhase::FetchingPage;
            }
        }

        let before = self.cursor.owned_notes.len();
        let mut next = self.cursor.clone();
        next.absorb_page(last_position, decoded.owned);

        if let Err(e) = self.cache.save(&wallet, &next) {
            return ScanPhase::Failed(ScanFailure::Storage(e.to_string()));
        }
        self.report.new_notes += (next.owned_notes.len() - before) as u64;
        self.cursor = next;

        if !page.has_more() {
            return ScanPhase::Done;
        }
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
        ScanPhase::FetchingPage
    }
}

/// Serialization point for one wallet's cursor
#[derive(Default)]
struct WalletGate {
    last_report: Arc<Mutex<Option<ScanReport>>>,
    completed: AtomicU64,
}

/// Runs scans, resyncs and spend refreshes with at most one writer per wallet.
///
/// A scan requested while another scan of the same wallet is in flight waits
/// for it and returns its report instead of starting a second pass.
pub struct NoteScanner {
    source: Arc<dyn NoteSource>,
    cache: ScanCache,
    page_size: u64,
    page_delay: Duration,
    gates: Mutex<HashMap<Pubkey, Arc<WalletGate>>>,
}

impl NoteScanner {
    pub fn new(source: Arc<dyn NoteSource>, cache: ScanCache, page_size: u64) -> Self {
        Self {
            source,
            cache,
            page_size: page_size.max(1),
            page_delay: Duration::ZERO,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn cache(&self) -> &ScanCache {
        &self.cache
    }

    async fn gate(&self, wallet: &Pubkey) -> Arc<WalletGate> {
        let mut gates = self.gates.lock().await;
        gates.entry(*wallet).or_default().clone()
    }

    /// A task over this scanner's source and cache, for callers that drive
    /// the state machine themselves. The wallet's gate is held until the task
    /// is dropped, so other scans of that wallet wait for it.
    pub async fn task(&self, identity: Arc<Identity>) -> ScanTask {
        let gate = self.gate(identity.wallet()).await;
        let guard = gate.last_report.clone().lock_owned().await;
        let mut task = self.ungated_task(identity);
        task._gate = Some(guard);
        task
    }

    fn ungated_task(&self, identity: Arc<Identity>) -> ScanTask {
        ScanTask::new(identity, self.source.clone(), self.cache.clone(), self.page_size)
            .with_page_delay(self.page_delay)
    }

    /// Scan from the persisted cursor to the end of the stream
    pub async fn scan(&self, identity: Arc<Identity>) -> Result<ScanReport> {
        let wallet = *identity.wallet();
        let gate = self.gate(&wallet).await;

        let observed = gate.completed.load(Ordering::Acquire);
        let mut last_report = gate.last_report.lock().await;
        if gate.completed.load(Ordering::Acquire) != observed {
            if let Some(report) = last_report.as_ref() {
                debug!(%wallet, "joined in-flight scan");
                return Ok(report.clone());
            }
        }

        let report = self.ungated_task(identity).run().await?;
        info!(
            %wallet,
            pages = report.pages,
            new_notes = report.new_notes,
            malformed = report.malformed,
            next = report.cursor.next_position(),
            "scan complete"
        );
        *last_report = Some(report.clone());
        gate.completed.fetch_add(1, Ordering::AcqRel);
        Ok(report)
    }

    /// Drop the persisted cursor and replay the stream from position 0
    pub async fn force_resync(&self, identity: Arc<Identity>) -> Result<ScanReport> {
        let wallet = *identity.wallet();
        let gate = self.gate(&wallet).await;
        let mut last_report = gate.last_report.lock().await;

        info!(%wallet, "forced resync");
        self.cache.clear(&wallet)?;
        let mut report = self.ungated_task(identity).run().await?;
        report.resynced = true;
        *last_report = Some(report.clone());
        gate.completed.fetch_add(1, Ordering::AcqRel);
        Ok(report)
    }

    /// Consult the oracle for every unspent note and persist newly spent flags.
    ///
    /// Oracle failures leave the note unspent; the next refresh asks again.
    pub async fn refresh_spent(
        &self,
        wallet: &Pubkey,
        oracle: &dyn SpendStatusOracle,
    ) -> Result<ScanCursor> {
        let gate = self.gate(wallet).await;
        let _guard = gate.last_report.lock().await;

        let mut cursor = self.cache.load(wallet)?;
        let mut newly_spent = 0usize;
        for note in cursor.owned_notes.iter_mut().filter(|n| !n.spent) {
            match oracle.is_spent(note).await {
                Ok(true) => {
                    note.mark_spent();
                    newly_spent += 1;
                },
                Ok(false) => {},
                Err(e) => {
                    warn!(%wallet, position = note.position, error = %e, "spend status unavailable");
                },
            }
        }

        if newly_spent > 0 {
            debug!(%wallet, newly_spent, "persisting spent flags");
            self.cache.save(wallet, &cursor)?;
        }
        Ok(cursor)
    }

    /// Consistent read of the persisted cursor
    pub async fn load_cursor(&self, wallet: &Pubkey) -> Result<ScanCursor> {
        let gate = self.gate(wallet).await;
        let _guard = gate.last_report.lock().await;
        self.cache.load(wallet)
    }

    /// Remove the wallet's persisted cursor
    pub async fn forget(&self, wallet: &Pubkey) -> Result<()> {
        let gate = self.gate(wallet).await;
        let mut last_report = gate.last_report.lock().await;
        *last_report = None;
        self.cache.clear(wallet)
    }
}
