//! Local key/value persistence.
//!
//! The sync queue, the sync state and the app state are each stored as one
//! JSON string under a fixed key. Stores have a byte capacity; a write that
//! would exceed it fails with `StoreError::QuotaExceeded` and leaves the
//! previous value in place.

use thiserror::Error;

pub const QUEUE_KEY: &str = "loopwise.sync_queue";
pub const SYNC_STATE_KEY: &str = "loopwise.sync_state";
pub const APP_STATE_KEY: &str = "loopwise.app_state";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage quota exceeded: {needed} bytes needed, capacity is {capacity}")]
    QuotaExceeded { needed: usize, capacity: usize },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

pub trait LocalStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}
