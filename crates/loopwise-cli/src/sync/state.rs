use super::queue::CategoryCounts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    pub total_synced: u64,
    pub failed_syncs: u64,
}

/// Health of the sync subsystem, persisted next to the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub is_remote_enabled: bool,
    #[serde(default)]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sync_stats: SyncStats,
}

impl SyncState {
    pub fn record_success(&mut self, accepted: usize, at: DateTime<Utc>) {
        self.sync_stats.total_synced += accepted as u64;
        self.last_sync_time = Some(at);
    }

    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.sync_stats.failed_syncs += 1;
        self.last_sync_time = Some(at);
    }
}

/// Point-in-time view for status displays.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub pending: CategoryCounts,
}

impl SyncStatus {
    pub fn format_summary(&self) -> String {
        let last = self
            .state
            .last_sync_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "remote: {} · pending: {} · last sync: {} · synced: {} · failed: {}",
            if self.state.is_remote_enabled { "on" } else { "off" },
            self.pending.total(),
            last,
            self.state.sync_stats.total_synced,
            self.state.sync_stats.failed_syncs,
        )
    }
}
