//! Sync orchestration: enqueue, flush, remote toggle and local persistence.
//!
//! Nothing here returns an error to the caller. Remote failures are counted
//! in the stats and retried on the next flush; local storage failures are
//! recovered by trimming, and as a last resort by a forced flush followed by
//! clearing the queue.
//!
//! The state lock is never held across the remote call. A flush removes
//! exactly as many records as it sent from the front of each category, so
//! records enqueued while it was in flight are kept for the next one.

use super::queue::{missing_from_queue, BatchSizes, CategoryCounts, SyncQueue, SyncRecord};
use super::state::{SyncState, SyncStatus};
use crate::config::SyncConfig;
use crate::models::Domain;
use crate::remote::RemoteStore;
use crate::storage::{LocalStore, StoreError, QUEUE_KEY, SYNC_STATE_KEY};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;

/// State transitions observers can react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    QueueChanged { pending: usize },
    Synced { accepted: usize, pending: usize },
    SyncFailed { reason: String },
    QuotaWarning { message: String },
    RemoteDisabled { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Nothing queued; the remote was not contacted.
    Empty,
    Synced {
        sent: CategoryCounts,
        accepted: usize,
    },
    Failed {
        reason: String,
    },
    /// Another flush is still waiting on the remote.
    InProgress,
}

impl FlushOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FlushOutcome::Empty | FlushOutcome::Synced { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Disabled,
    Enabled { seeded: usize },
    /// Enabling was refused because the remote has no endpoint or key.
    Unconfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersistOutcome {
    Saved,
    Trimmed,
    NeedsForcedFlush,
    Failed,
}

struct Inner {
    queue: SyncQueue,
    state: SyncState,
    store: Box<dyn LocalStore>,
    last_quota_warning: Option<Instant>,
    /// Bumped whenever the queue is cleared, so a flush that started
    /// before the clear does not remove records queued after it.
    epoch: u64,
}

pub struct SyncService {
    inner: Mutex<Inner>,
    /// Set while a batch is out at the remote; reset by `FlushGuard`.
    flushing: AtomicBool,
    remote: Arc<dyn RemoteStore>,
    config: SyncConfig,
    events: broadcast::Sender<SyncEvent>,
}

/// Clears the in-flight flag when dropped, including when the flush is cancelled.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn load_blob<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(blob)) => match serde_json::from_str(&blob) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding malformed persisted blob");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read persisted blob");
            None
        }
    }
}

fn write_queue(inner: &mut Inner) -> Result<(), StoreError> {
    let blob = inner
        .queue
        .to_blob()
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    inner.store.set(QUEUE_KEY, &blob)
}

fn write_state(inner: &mut Inner) {
    let blob = match serde_json::to_string(&inner.state) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "Failed to serialize sync state");
            return;
        }
    };
    if let Err(e) = inner.store.set(SYNC_STATE_KEY, &blob) {
        warn!(error = %e, "Failed to persist sync state");
    }
}

impl SyncService {
    /// Hydrate the queue and state from `store`.
    ///
    /// Sync is switched off if it was left enabled but the remote is not configured.
    pub fn new(config: SyncConfig, remote: Arc<dyn RemoteStore>, store: Box<dyn LocalStore>) -> Self {
        let mut queue: SyncQueue = load_blob(&*store, QUEUE_KEY).unwrap_or_default();
        let state: SyncState = load_blob(&*store, SYNC_STATE_KEY).unwrap_or_default();
        queue.trim_all(config.max_queue_items);

        let mut inner = Inner {
            queue,
            state,
            store,
            last_quota_warning: None,
            epoch: 0,
        };

        if inner.state.is_remote_enabled && !remote.is_configured() {
            warn!("Remote sync was enabled but the backend is not configured; disabling");
            inner.state.is_remote_enabled = false;
            write_state(&mut inner);
        }

        debug!(
            pending = inner.queue.total_len(),
            enabled = inner.state.is_remote_enabled,
            "Sync service hydrated"
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(inner),
            flushing: AtomicBool::new(false),
            remote,
            config,
            events,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> SyncStatus {
        let inner = self.inner.lock().await;
        SyncStatus {
            state: inner.state.clone(),
            pending: inner.queue.counts(),
        }
    }

    pub async fn is_remote_enabled(&self) -> bool {
        self.inner.lock().await.state.is_remote_enabled
    }

    fn emit(&self, event: SyncEvent) {
        // Err only means nobody is listening.
        let _ = self.events.send(event);
    }

    fn batch_sizes(&self) -> BatchSizes {
        BatchSizes {
            loops: self.config.batch_loops,
            nodes: self.config.batch_nodes,
            edges: self.config.batch_edges,
            domains: self.config.batch_domains,
        }
    }

    // ────────────────────────────────────────────────────────────
    // Enqueue
    // ────────────────────────────────────────────────────────────

    /// Queue one record. Returns false when remote sync is disabled.
    pub async fn enqueue(&self, record: SyncRecord) -> bool {
        self.enqueue_all(vec![record]).await > 0
    }

    /// Queue several records with a single persistence write.
    pub async fn enqueue_all(&self, records: Vec<SyncRecord>) -> usize {
        if records.is_empty() {
            return 0;
        }

        let (count, outcome, pending) = {
            let mut inner = self.inner.lock().await;
            if !inner.state.is_remote_enabled {
                debug!(records = records.len(), "Remote sync disabled; not queueing");
                return 0;
            }
            let count = records.len();
            for record in records {
                inner.queue.push(record, self.config.max_queue_items);
            }
            let outcome = self.persist_locked(&mut inner);
            (count, outcome, inner.queue.total_len())
        };

        self.emit(SyncEvent::QueueChanged { pending });
        if outcome == PersistOutcome::NeedsForcedFlush {
            self.force_flush_and_clear().await;
        }
        count
    }

    /// Queue the candidates whose ids are not already queued.
    pub async fn enqueue_missing(&self, candidates: Vec<SyncRecord>) -> usize {
        let missing = {
            let inner = self.inner.lock().await;
            if !inner.state.is_remote_enabled {
                return 0;
            }
            missing_from_queue(&inner.queue, candidates)
        };
        self.enqueue_all(missing).await
    }

    // ────────────────────────────────────────────────────────────
    // Flush
    // ────────────────────────────────────────────────────────────

    /// Send one bounded batch to the remote store.
    pub async fn flush(&self) -> FlushOutcome {
        let (batch, epoch) = {
            let inner = self.inner.lock().await;
            if self.flushing.load(Ordering::SeqCst) {
                debug!("Flush already in progress");
                return FlushOutcome::InProgress;
            }
            if inner.queue.is_empty() {
                return FlushOutcome::Empty;
            }
            self.flushing.store(true, Ordering::SeqCst);
            (inner.queue.batch(&self.batch_sizes()), inner.epoch)
        };
        let guard = FlushGuard(&self.flushing);

        let sent = batch.counts();
        info!(
            loops = sent.loops,
            nodes = sent.nodes,
            edges = sent.edges,
            domains = sent.domains,
            "Flushing sync batch"
        );

        let result = self.remote.write_batch(&batch).await;

        let mut inner = self.inner.lock().await;
        drop(guard);
        let now = Utc::now();

        let outcome = match result {
            Ok(report) if report.success => {
                if inner.epoch == epoch {
                    inner.queue.remove_sent(&sent);
                }
                let accepted = report.accepted.total();
                inner.state.record_success(accepted, now);
                info!(accepted, pending = inner.queue.total_len(), "Sync batch written");
                FlushOutcome::Synced { sent, accepted }
            }
            Ok(report) => {
                let reason = report
                    .error
                    .unwrap_or_else(|| "remote reported failure".to_string());
                inner.state.record_failure(now);
                warn!(%reason, "Sync batch rejected");
                FlushOutcome::Failed { reason }
            }
            Err(e) => {
                inner.state.record_failure(now);
                warn!(error = %e, "Sync batch failed");
                FlushOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        if self.persist_locked(&mut inner) == PersistOutcome::NeedsForcedFlush {
            warn!("Queue still does not fit local storage after flush");
        }
        let pending = inner.queue.total_len();
        drop(inner);

        match &outcome {
            FlushOutcome::Synced { accepted, .. } => self.emit(SyncEvent::Synced {
                accepted: *accepted,
                pending,
            }),
            FlushOutcome::Failed { reason } => self.emit(SyncEvent::SyncFailed {
                reason: reason.clone(),
            }),
            _ => {}
        }
        outcome
    }

    /// Flush only when sync is enabled and something is queued.
    pub async fn flush_if_pending(&self) -> Option<FlushOutcome> {
        {
            let inner = self.inner.lock().await;
            if !inner.state.is_remote_enabled || inner.queue.is_empty() {
                return None;
            }
        }
        Some(self.flush().await)
    }

    async fn force_flush_and_clear(&self) {
        let outcome = self.flush().await;
        warn!(?outcome, "Local storage full; forced flush done, clearing queue");

        let mut inner = self.inner.lock().await;
        inner.queue.clear();
        inner.epoch += 1;
        let _ = self.persist_locked(&mut inner);
        drop(inner);

        self.emit(SyncEvent::QueueChanged { pending: 0 });
    }

    // ────────────────────────────────────────────────────────────
    // Remote toggle and user actions
    // ────────────────────────────────────────────────────────────

    /// Enable or disable remote sync.
    ///
    /// Enabling loads the remote's domains and queues every local domain
    /// the remote does not know yet.
    pub async fn toggle_remote(&self, enabled: bool, local_domains: &[Domain]) -> ToggleOutcome {
        if enabled && !self.remote.is_configured() {
            {
                let mut inner = self.inner.lock().await;
                inner.state.is_remote_enabled = false;
                write_state(&mut inner);
            }
            let reason = "remote backend is not configured".to_string();
            warn!(%reason, "Refusing to enable remote sync");
            self.emit(SyncEvent::RemoteDisabled { reason });
            return ToggleOutcome::Unconfigured;
        }

        {
            let mut inner = self.inner.lock().await;
            inner.state.is_remote_enabled = enabled;
            write_state(&mut inner);
        }
        if !enabled {
            info!("Remote sync disabled");
            return ToggleOutcome::Disabled;
        }

        // Queueing a domain the remote already has is harmless (upsert),
        // so a failed lookup falls back to queueing everything.
        let known: HashSet<String> = match self.remote.load_domains().await {
            Ok(domains) => domains.into_iter().map(|d| d.id).collect(),
            Err(e) => {
                warn!(error = %e, "Could not load remote domains; queueing all local domains");
                HashSet::new()
            }
        };

        let records: Vec<SyncRecord> = local_domains
            .iter()
            .filter(|d| !known.contains(&d.id))
            .cloned()
            .map(SyncRecord::Domain)
            .collect();
        let seeded = self.enqueue_all(records).await;

        info!(seeded, "Remote sync enabled");
        ToggleOutcome::Enabled { seeded }
    }

    /// Drop everything queued and reset the counters.
    pub async fn clear_queue(&self) {
        let mut inner = self.inner.lock().await;
        inner.queue.clear();
        inner.state.sync_stats = Default::default();
        inner.epoch += 1;
        let _ = self.persist_locked(&mut inner);
        drop(inner);

        info!("Sync queue cleared");
        self.emit(SyncEvent::QueueChanged { pending: 0 });
    }

    // ────────────────────────────────────────────────────────────
    // Persistence
    // ────────────────────────────────────────────────────────────

    /// Write the queue and the state to local storage.
    ///
    /// Over the size threshold every category is halved before writing. A
    /// quota failure halves once more and retries; a second quota failure
    /// asks the caller to force a flush and clear the queue.
    fn persist_locked(&self, inner: &mut Inner) -> PersistOutcome {
        let mut trimmed = false;
        while !inner.queue.is_empty() && inner.queue.byte_size() > self.config.size_threshold_bytes
        {
            inner.queue.halve();
            trimmed = true;
        }
        if trimmed {
            warn!(
                threshold = self.config.size_threshold_bytes,
                pending = inner.queue.total_len(),
                "Sync queue over size threshold; trimmed"
            );
        }

        let outcome = match write_queue(inner) {
            Ok(()) if trimmed => PersistOutcome::Trimmed,
            Ok(()) => PersistOutcome::Saved,
            Err(e) if e.is_quota_exceeded() => {
                self.warn_quota(inner, &e);
                inner.queue.halve();
                match write_queue(inner) {
                    Ok(()) => PersistOutcome::Trimmed,
                    Err(e) if e.is_quota_exceeded() => {
                        error!(error = %e, "Sync queue does not fit local storage after trimming");
                        PersistOutcome::NeedsForcedFlush
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to persist sync queue");
                        PersistOutcome::Failed
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to persist sync queue");
                PersistOutcome::Failed
            }
        };

        write_state(inner);
        outcome
    }

    /// Surface a quota failure at most once per cooldown window.
    fn warn_quota(&self, inner: &mut Inner, err: &StoreError) {
        let now = Instant::now();
        let due = inner
            .last_quota_warning
            .map_or(true, |last| now.duration_since(last) >= self.config.quota_warning_cooldown());
        if !due {
            debug!(error = %err, "Storage quota exceeded (warning suppressed)");
            return;
        }

        inner.last_quota_warning = Some(now);
        let message = format!(
            "Local storage is full ({}); older queued records are being dropped",
            err
        );
        warn!(%message);
        self.emit(SyncEvent::QuotaWarning { message });
    }
}
