//! Visitor analytics
//!
//! Each redirect queues a visit with the recorder, which classifies the
//! User-Agent, resolves the visitor's country and appends an event. The
//! aggregator folds a link's events into browser, device and country counts
//! on demand.

pub mod aggregator;
pub mod classify;
pub mod geoip;
pub mod ip_extractor;
pub mod models;
pub mod recorder;

pub use aggregator::AnalyticsAggregator;
pub use classify::{classify_user_agent, Browser, DeviceType, OperatingSystem, UserAgentInfo};
pub use geoip::{Country, CountryResolver, GeoIpService, NoGeoIp};
pub use ip_extractor::extract_client_ip;
pub use models::{AggregatedAnalytics, Visit};
pub use recorder::{AnalyticsRecorder, EventWriter, RecorderStats};
