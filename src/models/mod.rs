mod event;
mod link;

pub use event::{AnalyticsEvent, NewAnalyticsEvent};
pub use link::{CreateLinkRequest, NewShortLink, ShortLink};
