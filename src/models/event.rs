use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One recorded visit. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AnalyticsEvent {
    pub id: String,
    pub link_id: String,
    pub user_agent: String,
    pub referrer: String,
    pub browser: String,
    pub os: String,
    pub device_type: String,
    pub country: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct NewAnalyticsEvent {
    pub id: String,
    pub link_id: String,
    pub user_agent: String,
    pub referrer: String,
    pub browser: String,
    pub os: String,
    pub device_type: String,
    pub country: String,
    pub timestamp: i64,
}

impl NewAnalyticsEvent {
    pub fn into_event(self) -> AnalyticsEvent {
        AnalyticsEvent {
            id: self.id,
            link_id: self.link_id,
            user_agent: self.user_agent,
            referrer: self.referrer,
            browser: self.browser,
            os: self.os,
            device_type: self.device_type,
            country: self.country,
            timestamp: self.timestamp,
        }
    }
}
