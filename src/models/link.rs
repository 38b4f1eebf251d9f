use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ShortLink {
    pub id: String,
    pub original_url: String,
    pub short_code: String,
    /// Set only when the short code was chosen by the user; equals `short_code`.
    pub custom_alias: Option<String>,
    pub owner_id: Option<String>,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
    /// Number of analytics events stored for this link
    pub click_count: i64,
}

impl ShortLink {
    pub fn is_owned_by(&self, owner_id: Option<&str>) -> bool {
        matches!((self.owner_id.as_deref(), owner_id), (Some(owner), Some(requester)) if owner == requester)
    }
}

/// Fields the caller supplies when inserting a link; the store assigns the rest.
#[derive(Debug, Clone)]
pub struct NewShortLink {
    pub id: String,
    pub original_url: String,
    pub short_code: String,
    pub custom_alias: Option<String>,
    pub owner_id: Option<String>,
    pub created_at: i64,
}

impl NewShortLink {
    pub fn new(
        original_url: impl Into<String>,
        short_code: impl Into<String>,
        custom_alias: Option<String>,
        owner_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_url: original_url.into(),
            short_code: short_code.into(),
            custom_alias,
            owner_id,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// The stored representation right after insert (no events yet).
    pub fn into_link(self) -> ShortLink {
        ShortLink {
            id: self.id,
            original_url: self.original_url,
            short_code: self.short_code,
            custom_alias: self.custom_alias,
            owner_id: self.owner_id,
            created_at: self.created_at,
            click_count: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    #[serde(default)]
    pub custom_alias: Option<String>,
}
