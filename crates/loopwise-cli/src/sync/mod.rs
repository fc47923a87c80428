//! Buffered synchronisation of local records to the remote store.

pub mod queue;
pub mod scheduler;
pub mod service;
pub mod state;

pub use queue::{Category, CategoryCounts, SyncBatch, SyncRecord};
pub use scheduler::SyncScheduler;
pub use service::{FlushOutcome, SyncEvent, SyncService, ToggleOutcome};
