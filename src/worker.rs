/// Worker Module
///
/// The polling loop: once per tick, fetch every registered search, run the
/// ones whose interval window has opened, report results, and stamp the run
/// back into the registry.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time;

use crate::deals_client::{SearchError, SearchExecutor};
use crate::fmt::pretty_seconds;
use crate::interval;
use crate::notify::Notifier;
use crate::registry::Registry;
use crate::types::SearchRecord;

// Global lock so a forced run from the HTTP server cannot overlap the loop
lazy_static::lazy_static! {
    static ref TICK_LOCK: Mutex<()> = Mutex::new(());
}

/// Counters exposed on the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub started_at: DateTime<Utc>,
    pub ticks: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub searches_checked: u64,
    pub searches_run: u64,
    pub results_found: u64,
}

impl WorkerStatus {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ticks: 0,
            last_tick: None,
            searches_checked: 0,
            searches_run: 0,
            results_found: 0,
        }
    }
}

pub struct Worker {
    registry: Arc<dyn Registry>,
    executor: Arc<dyn SearchExecutor>,
    notifier: Arc<dyn Notifier>,
    status: Arc<RwLock<WorkerStatus>>,
    dry_run: bool,
}

impl Worker {
    pub fn new(
        registry: Arc<dyn Registry>,
        executor: Arc<dyn SearchExecutor>,
        notifier: Arc<dyn Notifier>,
        dry_run: bool,
    ) -> Self {
        Self {
            registry,
            executor,
            notifier,
            status: Arc::new(RwLock::new(WorkerStatus::new())),
            dry_run,
        }
    }

    pub fn status(&self) -> Arc<RwLock<WorkerStatus>> {
        self.status.clone()
    }

    /// Run the polling loop forever. The first evaluation happens
    /// immediately; a failed tick is logged and the loop keeps going.
    pub async fn run(self: Arc<Self>, poll_interval: Duration) -> Result<()> {
        log::info!(
            "Starting search worker (poll interval: {}s)",
            poll_interval.as_secs()
        );

        let mut ticker = time::interval(poll_interval);
        loop {
            ticker.tick().await;

            if let Err(e) = self.tick().await {
                log::error!("Worker tick failed: {:#}", e);
            }
        }
    }

    /// Evaluate every registered search once.
    pub async fn tick(&self) -> Result<()> {
        let _guard = TICK_LOCK.lock().await;

        let now = Utc::now();
        let records = self.registry.list_searches().await?;
        log::info!("Found {} searches", records.len());

        let mut ran: u64 = 0;
        let mut found: u64 = 0;

        for record in &records {
            match self.check_one(now, record).await {
                Ok(Some(num_results)) => {
                    ran += 1;
                    found += num_results as u64;
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("Search '{}' failed: {:#}", record.search_name, e);
                }
            }
        }

        let mut status = self.status.write().await;
        status.ticks += 1;
        status.last_tick = Some(now);
        status.searches_checked += records.len() as u64;
        status.searches_run += ran;
        status.results_found += found;

        Ok(())
    }

    /// Check one search and run it if due. Returns the result count when a
    /// search actually ran.
    async fn check_one(&self, now: DateTime<Utc>, record: &SearchRecord) -> Result<Option<u32>> {
        log::debug!("Checking search: {}", record.search_name);

        let schedule = match record.schedule() {
            Ok(schedule) => schedule,
            Err(e) => {
                // bad records keep surfacing each tick until fixed
                log::error!("Skipping misconfigured search: {:#}", e);
                return Ok(None);
            }
        };

        if !interval::is_due(now, &schedule) {
            log::debug!("Not within interval, skipping '{}'", record.search_name);
            return Ok(None);
        }

        if schedule.last_run > 0 {
            let since = (now.timestamp() - schedule.last_run).max(0) as u64;
            log::info!(
                "Search '{}' is due, last ran {} ago",
                record.search_name,
                pretty_seconds(since, true)
            );
        } else {
            log::info!("Search '{}' is due, never ran before", record.search_name);
        }

        if self.dry_run {
            log::info!("Dry run, not searching '{}'", record.search_name);
            return Ok(None);
        }

        let results = match self.executor.search_region(&record.region).await {
            Ok(results) => results,
            Err(SearchError::Retryable(message)) => {
                // leave last_search_time unstamped so the next tick retries
                log::warn!(
                    "Search '{}' hit a transient failure, will retry next tick: {}",
                    record.search_name,
                    message
                );
                return Ok(None);
            }
            Err(e @ SearchError::Fatal(_)) => return Err(e.into()),
        };

        let num_results = results.len() as u32;
        log::info!(
            "Found {} results for '{}'",
            num_results,
            record.search_name
        );

        if record.notify_results && !results.is_empty() {
            self.notifier.notify(record, &results).await?;
        }

        self.registry.mark_run(&record.id, now, num_results).await?;

        Ok(Some(num_results))
    }
}
