/// Notifier Module
///
/// Seam for telling a user about the results of a completed search. Actual
/// delivery (email, attachments) happens in an external service; this crate
/// only holds the contract and a logging implementation.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{SearchRecord, SearchResults};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &SearchRecord, results: &SearchResults) -> Result<()>;
}

/// Notifier that reports to the service log instead of delivering anywhere.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, record: &SearchRecord, results: &SearchResults) -> Result<()> {
        let cheapest = results
            .results
            .iter()
            .filter_map(|result| result.item.price_including_taxes.as_ref())
            .min_by_key(|price| price.minor_units);

        match cheapest {
            Some(price) => log::info!(
                "Search '{}' for {}: {} deals, from {}",
                record.search_name,
                record.user,
                results.len(),
                price.display()
            ),
            None => log::info!(
                "Search '{}' for {}: {} deals",
                record.search_name,
                record.user,
                results.len()
            ),
        }

        Ok(())
    }
}
