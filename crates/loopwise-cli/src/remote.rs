//! Remote persistence for synced records.
//!
//! `RestRemote` talks to a PostgREST-style endpoint (`/rest/v1/<table>`).
//! Writes are upserts, so re-sending a batch after a failed flush is safe.

use crate::config::RemoteConfig;
use crate::error::{LoopError, Result};
use crate::models::Domain;
use crate::sync::{Category, CategoryCounts, SyncBatch};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;

/// Outcome of one batched write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub success: bool,
    pub accepted: CategoryCounts,
    pub error: Option<String>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// False when the backend has no usable endpoint or credentials.
    fn is_configured(&self) -> bool;

    async fn write_batch(&self, batch: &SyncBatch) -> Result<BatchReport>;

    async fn load_domains(&self) -> Result<Vec<Domain>>;
}

fn table_for(category: Category) -> &'static str {
    match category {
        Category::Loops => "loop_results",
        Category::Nodes => "knowledge_nodes",
        Category::Edges => "knowledge_edges",
        Category::Domains => "domains",
    }
}

pub struct RestRemote {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RestRemote {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), table)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("apikey", HeaderValue::from_str(&self.config.api_key)?);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))?,
        );
        Ok(headers)
    }

    /// Upsert `rows` into `table`, returning how many rows were written.
    async fn upsert<T: Serialize + Sync>(&self, table: &str, rows: &[T]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoopError::Remote(format!(
                "{} upsert failed ({}): {}",
                table, status, body
            )));
        }

        tracing::debug!(table, rows = rows.len(), "Upserted rows");
        Ok(rows.len())
    }
}

#[async_trait]
impl RemoteStore for RestRemote {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn write_batch(&self, batch: &SyncBatch) -> Result<BatchReport> {
        if !self.is_configured() {
            return Err(LoopError::Remote("remote backend is not configured".to_string()));
        }

        let (loops, nodes, edges, domains) = futures::join!(
            self.upsert(table_for(Category::Loops), &batch.loops),
            self.upsert(table_for(Category::Nodes), &batch.nodes),
            self.upsert(table_for(Category::Edges), &batch.edges),
            self.upsert(table_for(Category::Domains), &batch.domains),
        );

        let mut report = BatchReport {
            success: true,
            ..Default::default()
        };
        let mut errors = Vec::new();
        for (category, result) in [
            (Category::Loops, loops),
            (Category::Nodes, nodes),
            (Category::Edges, edges),
            (Category::Domains, domains),
        ] {
            match result {
                Ok(count) => report.accepted.set(category, count),
                Err(e) => {
                    tracing::warn!(%category, error = %e, "Remote write failed");
                    report.success = false;
                    errors.push(format!("{}: {}", category, e));
                }
            }
        }
        if !errors.is_empty() {
            report.error = Some(errors.join("; "));
        }
        Ok(report)
    }

    async fn load_domains(&self) -> Result<Vec<Domain>> {
        if !self.is_configured() {
            return Err(LoopError::Remote("remote backend is not configured".to_string()));
        }

        let response = self
            .client
            .get(format!("{}?select=*", self.table_url(table_for(Category::Domains))))
            .headers(self.headers()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoopError::Remote(format!(
                "loading domains failed ({}): {}",
                status, body
            )));
        }

        Ok(response.json::<Vec<Domain>>().await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable `RemoteStore` for service and scheduler tests.

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Semaphore;

    #[derive(Default)]
    pub struct MockRemote {
        pub configured: bool,
        pub fail: AtomicBool,
        pub calls: AtomicUsize,
        pub batches: Mutex<Vec<SyncBatch>>,
        pub remote_domains: Mutex<Vec<Domain>>,
        /// When set, each write waits for a permit before answering.
        pub gate: Option<Arc<Semaphore>>,
    }

    impl MockRemote {
        pub fn configured() -> Self {
            Self {
                configured: true,
                ..Default::default()
            }
        }

        pub fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                configured: true,
                gate: Some(gate),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemote {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn write_batch(&self, batch: &SyncBatch) -> Result<BatchReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(batch.clone());

            if let Some(gate) = &self.gate {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|e| LoopError::Remote(e.to_string()))?;
                permit.forget();
            }

            if self.fail.load(Ordering::SeqCst) {
                return Err(LoopError::Remote("mock failure".to_string()));
            }
            Ok(BatchReport {
                success: true,
                accepted: batch.counts(),
                error: None,
            })
        }

        async fn load_domains(&self) -> Result<Vec<Domain>> {
            Ok(self.remote_domains.lock().unwrap().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(url: &str, key: &str) -> RestRemote {
        RestRemote::new(RemoteConfig {
            url: url.to_string(),
            api_key: key.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_table_url() {
        let r = remote("https://abc.example.co/", "k");
        assert_eq!(r.table_url("domains"), "https://abc.example.co/rest/v1/domains");
        assert_eq!(table_for(Category::Loops), "loop_results");
    }

    #[test]
    fn test_headers_carry_key() {
        let r = remote("https://abc.example.co", "secret");
        let headers = r.headers().unwrap();
        assert_eq!(headers.get("apikey").unwrap(), "secret");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
    }

    #[tokio::test]
    async fn test_unconfigured_remote_refuses_writes() {
        let r = remote("", "");
        assert!(!r.is_configured());
        assert!(r.write_batch(&SyncBatch::default()).await.is_err());
        assert!(r.load_domains().await.is_err());
    }
}
