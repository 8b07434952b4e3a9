/// Search Registry Module
///
/// Pull-based access to the registered searches. The durable store (and its
/// push/watch sync machinery) lives outside this service; the worker only
/// ever asks for the current set of records and stamps run results back.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use crate::types::SearchRecord;

/// Contract the worker holds against the search store.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch every registered search. The worker filters nothing here; due
    /// decisions happen per record.
    async fn list_searches(&self) -> Result<Vec<SearchRecord>>;

    /// Record a completed run for one search.
    async fn mark_run(&self, id: &str, at: DateTime<Utc>, num_results: u32) -> Result<()>;
}

/// In-process registry backed by a map, optionally seeded from a JSON file.
/// Stands in for the external user database.
pub struct InMemoryRegistry {
    records: RwLock<HashMap<String, SearchRecord>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Load a registry from a JSON array of search records.
    ///
    /// # Errors
    /// Returns an error if the file is unreadable, is not a JSON array of
    /// records, or contains an invalid or duplicate record.
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read searches file {}", path.display()))?;

        let records: Vec<SearchRecord> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse searches file {}", path.display()))?;

        let registry = Self::new();
        for record in records {
            registry.insert(record).await?;
        }

        let count = registry.records.read().await.len();
        log::info!("Loaded {} searches from {}", count, path.display());

        Ok(registry)
    }

    /// Register one search, validating it the way the configuration layer
    /// must before the scheduler ever sees it.
    pub async fn insert(&self, record: SearchRecord) -> Result<()> {
        if record.id.is_empty() {
            bail!("search '{}' has an empty id", record.search_name);
        }

        // reject records the scheduler would have to skip every tick
        record.schedule()?;

        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            bail!("duplicate search id '{}'", record.id);
        }
        records.insert(record.id.clone(), record);

        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn list_searches(&self) -> Result<Vec<SearchRecord>> {
        let records = self.records.read().await;
        let mut searches: Vec<SearchRecord> = records.values().cloned().collect();
        // stable iteration order keeps log output and tests deterministic
        searches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(searches)
    }

    async fn mark_run(&self, id: &str, at: DateTime<Utc>, num_results: u32) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .with_context(|| format!("unknown search id '{}'", id))?;

        record.last_search_time = at.timestamp();
        record.num_results = num_results;

        Ok(())
    }
}
