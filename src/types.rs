/// Data Types Module
///
/// Serde models shared across the crate: registered search records, the
/// search region, and the slice of the deals API response the worker
/// reports on.

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::interval::SearchSchedule;

/// Geographic circle a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in kilometers.
    pub radius: u32,
}

/// One registered search, as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: String,
    /// Owning user, an email address.
    pub user: String,
    pub search_name: String,
    pub region: Region,
    /// Local hour of day [0, 23] anchoring the daily interval grid.
    pub start_hour: u32,
    /// Interval bucket width in hours.
    pub interval_hour: u32,
    /// IANA zone identifier, e.g. "America/Los_Angeles".
    pub time_zone: String,
    /// Unix timestamp of the last completed run, 0 if never run.
    #[serde(default)]
    pub last_search_time: i64,
    /// Result count from the last completed run.
    #[serde(default)]
    pub num_results: u32,
    /// Whether the user wants to be notified about new results.
    #[serde(default)]
    pub notify_results: bool,
}

impl SearchRecord {
    /// Build the schedule view of this record, validating the fields the
    /// scheduler assumes are already well-formed.
    ///
    /// # Errors
    /// Returns an error for an out-of-range start hour or an unknown
    /// timezone identifier.
    pub fn schedule(&self) -> Result<SearchSchedule> {
        if self.start_hour > 23 {
            bail!(
                "search '{}' has start hour {} outside [0, 23]",
                self.search_name,
                self.start_hour
            );
        }

        let time_zone: Tz = self
            .time_zone
            .parse()
            .ok()
            .with_context(|| {
                format!(
                    "search '{}' has unknown timezone '{}'",
                    self.search_name, self.time_zone
                )
            })?;

        Ok(SearchSchedule {
            start_hour: self.start_hour,
            interval_hour: self.interval_hour,
            last_run: self.last_search_time,
            time_zone,
        })
    }
}

/// Monetary amount as the deals API encodes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub code: String,
    pub minor_units: i64,
    pub decimals: u32,
}

impl Price {
    /// Render as a display string, e.g. "4.99 EUR".
    pub fn display(&self) -> String {
        let value = self.minor_units as f64 / 10f64.powi(self.decimals as i32);
        format!("{:.2} {}", value, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealStore {
    pub store_id: String,
    pub store_name: String,
}

/// Local pickup window for a deal, RFC 3339 instants as sent by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealItem {
    pub item_id: String,
    pub name: String,
    pub item_category: Option<String>,
    pub price_including_taxes: Option<Price>,
    pub value_including_taxes: Option<Price>,
    #[serde(default)]
    pub favorite_count: u32,
}

/// One result row from a region search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealResult {
    pub item: DealItem,
    pub store: DealStore,
    #[serde(default)]
    pub items_available: u32,
    pub distance: Option<f64>,
    pub pickup_interval: Option<PickupWindow>,
}

/// Full response for one region search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub results: Vec<DealResult>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SearchRecord {
        SearchRecord {
            id: "abc123".to_string(),
            user: "someone@example.com".to_string(),
            search_name: "downtown".to_string(),
            region: Region {
                latitude: 37.77,
                longitude: -122.42,
                radius: 5,
            },
            start_hour: 6,
            interval_hour: 6,
            time_zone: "America/Los_Angeles".to_string(),
            last_search_time: 0,
            num_results: 0,
            notify_results: true,
        }
    }

    #[test]
    fn schedule_from_valid_record() {
        let schedule = record().schedule().unwrap();
        assert_eq!(schedule.start_hour, 6);
        assert_eq!(schedule.interval_hour, 6);
        assert_eq!(schedule.last_run, 0);
        assert_eq!(schedule.time_zone, chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn schedule_rejects_bad_timezone() {
        let mut bad = record();
        bad.time_zone = "Mars/Olympus_Mons".to_string();
        assert!(bad.schedule().is_err());
    }

    #[test]
    fn schedule_rejects_out_of_range_start_hour() {
        let mut bad = record();
        bad.start_hour = 24;
        assert!(bad.schedule().is_err());
    }

    #[test]
    fn price_display_uses_minor_units() {
        let price = Price {
            code: "USD".to_string(),
            minor_units: 499,
            decimals: 2,
        };
        assert_eq!(price.display(), "4.99 USD");

        let price = Price {
            code: "EUR".to_string(),
            minor_units: 1500,
            decimals: 3,
        };
        assert_eq!(price.display(), "1.50 EUR");
    }

    #[test]
    fn seed_json_defaults_optional_fields() {
        let json = r#"{
            "id": "abc123",
            "user": "someone@example.com",
            "search_name": "downtown",
            "region": {"latitude": 37.77, "longitude": -122.42, "radius": 5},
            "start_hour": 6,
            "interval_hour": 6,
            "time_zone": "America/Los_Angeles"
        }"#;

        let parsed: SearchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.last_search_time, 0);
        assert_eq!(parsed.num_results, 0);
        assert!(!parsed.notify_results);
    }
}
