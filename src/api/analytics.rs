//! Analytics API handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::handlers::{service_error, ApiError, AppState};
use crate::analytics::AggregatedAnalytics;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQueryParams {
    /// Length of the ranked lists (default: 3, max: 50)
    #[serde(default = "default_top")]
    pub top: usize,
}

fn default_top() -> usize {
    3
}

#[derive(Debug, Serialize)]
pub struct RankedEntry {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub link_id: String,
    pub total: u64,
    pub browser_counts: BTreeMap<String, u64>,
    pub device_counts: BTreeMap<String, u64>,
    pub country_counts: BTreeMap<String, u64>,
    pub top_countries: Vec<RankedEntry>,
    pub top_browsers: Vec<RankedEntry>,
    pub most_common_browser: Option<String>,
    pub most_common_device: Option<String>,
}

fn ranked_entries(entries: Vec<(String, u64)>) -> Vec<RankedEntry> {
    entries
        .into_iter()
        .map(|(key, count)| RankedEntry { key, count })
        .collect()
}

impl AnalyticsResponse {
    fn new(link_id: String, aggregated: AggregatedAnalytics, top: usize) -> Self {
        Self {
            link_id,
            total: aggregated.total(),
            top_countries: ranked_entries(aggregated.top_countries(top)),
            top_browsers: ranked_entries(aggregated.top_browsers(top)),
            most_common_browser: aggregated.most_common_browser(),
            most_common_device: aggregated.most_common_device(),
            browser_counts: aggregated.browser_counts,
            device_counts: aggregated.device_counts,
            country_counts: aggregated.country_counts,
        }
    }
}

/// Get aggregated analytics for a link
///
/// Analytics are public by link id; no owner header is required.
pub async fn get_link_analytics(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    Query(params): Query<AnalyticsQueryParams>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let top = params.top.clamp(1, 50);

    let aggregated = state
        .service
        .aggregate(&link_id)
        .await
        .map_err(service_error)?;

    Ok(Json(AnalyticsResponse::new(link_id, aggregated, top)))
}
