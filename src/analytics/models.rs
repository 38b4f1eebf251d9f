//! Data models for analytics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::models::AnalyticsEvent;

/// Request metadata captured for one visit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visit {
    /// Raw User-Agent header, empty when absent
    pub user_agent: String,
    /// Raw Referer header, empty when absent
    pub referrer: String,
    /// Client address after proxy trust rules; `None` when unknown
    pub client_ip: Option<IpAddr>,
}

/// Per-link event counts along the three analytics dimensions
///
/// Maps are ordered by key so serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedAnalytics {
    pub browser_counts: BTreeMap<String, u64>,
    pub device_counts: BTreeMap<String, u64>,
    pub country_counts: BTreeMap<String, u64>,
}

impl AggregatedAnalytics {
    /// Fold events into counters. Every event counts once in every dimension.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a AnalyticsEvent>) -> Self {
        let mut aggregated = Self::default();
        for event in events {
            aggregated.add(event);
        }
        aggregated
    }

    pub fn add(&mut self, event: &AnalyticsEvent) {
        *self.browser_counts.entry(event.browser.clone()).or_insert(0) += 1;
        *self.device_counts.entry(event.device_type.clone()).or_insert(0) += 1;
        *self.country_counts.entry(event.country.clone()).or_insert(0) += 1;
    }

    /// Number of events folded in
    pub fn total(&self) -> u64 {
        self.browser_counts.values().sum()
    }

    pub fn top_browsers(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.browser_counts, n)
    }

    pub fn top_devices(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.device_counts, n)
    }

    pub fn top_countries(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.country_counts, n)
    }

    pub fn most_common_browser(&self) -> Option<String> {
        most_common(&self.browser_counts)
    }

    pub fn most_common_device(&self) -> Option<String> {
        most_common(&self.device_counts)
    }

    pub fn most_common_country(&self) -> Option<String> {
        most_common(&self.country_counts)
    }
}

/// Entries sorted by count descending; equal counts sort by key ascending.
pub fn ranked(counts: &BTreeMap<String, u64>) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts
        .iter()
        .map(|(key, count)| (key.clone(), *count))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

/// The first `n` entries of [`ranked`]; all of them when fewer exist.
pub fn top_n(counts: &BTreeMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut entries = ranked(counts);
    entries.truncate(n);
    entries
}

pub fn most_common(counts: &BTreeMap<String, u64>) -> Option<String> {
    top_n(counts, 1).into_iter().next().map(|(key, _)| key)
}
