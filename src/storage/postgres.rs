use crate::models::{AnalyticsEvent, NewAnalyticsEvent, NewShortLink, ShortLink};
use crate::shortcode::random_code;
use crate::storage::{
    classify_sqlx_error, Storage, StorageError, StorageResult, UNIQUE_CODE_ATTEMPTS,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

const LINK_COLUMNS: &str = r#"
    l.id, l.original_url, l.short_code, l.custom_alias, l.owner_id, l.created_at,
    (SELECT COUNT(*) FROM analytics_events e WHERE e.link_id = l.id) AS click_count
"#;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn find_link_where(&self, column: &str, value: &str) -> StorageResult<Option<ShortLink>> {
        let query = format!("SELECT {LINK_COLUMNS} FROM short_links l WHERE l.{column} = $1");
        sqlx::query_as::<_, ShortLink>(&query)
            .bind(value)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(classify_sqlx_error)
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS short_links (
                id TEXT PRIMARY KEY,
                original_url TEXT NOT NULL,
                short_code TEXT NOT NULL UNIQUE,
                custom_alias TEXT,
                owner_id TEXT,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_short_links_owner ON short_links(owner_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analytics_events (
                id TEXT PRIMARY KEY,
                link_id TEXT NOT NULL REFERENCES short_links(id) ON DELETE CASCADE,
                user_agent TEXT NOT NULL,
                referrer TEXT NOT NULL,
                browser TEXT NOT NULL,
                os TEXT NOT NULL,
                device_type TEXT NOT NULL,
                country TEXT NOT NULL,
                timestamp BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_analytics_events_link ON analytics_events(link_id)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_link(&self, link: &NewShortLink) -> StorageResult<ShortLink> {
        let inserted = sqlx::query_scalar::<_, String>(
            r#"
            INSERT INTO short_links (id, original_url, short_code, custom_alias, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (short_code) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&link.id)
        .bind(&link.original_url)
        .bind(&link.short_code)
        .bind(&link.custom_alias)
        .bind(&link.owner_id)
        .bind(link.created_at)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(classify_sqlx_error)?;

        match inserted {
            Some(_) => Ok(link.clone().into_link()),
            None => Err(StorageError::Conflict),
        }
    }

    async fn find_link_by_code(&self, short_code: &str) -> StorageResult<Option<ShortLink>> {
        self.find_link_where("short_code", short_code).await
    }

    async fn find_link_by_id(&self, id: &str) -> StorageResult<Option<ShortLink>> {
        self.find_link_where("id", id).await
    }

    async fn delete_link(&self, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM short_links WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await
            .map_err(classify_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_links_by_owner(&self, owner_id: &str) -> StorageResult<Vec<ShortLink>> {
        let query = format!(
            "SELECT {LINK_COLUMNS} FROM short_links l WHERE l.owner_id = $1 \
             ORDER BY l.created_at DESC, l.id ASC"
        );
        sqlx::query_as::<_, ShortLink>(&query)
            .bind(owner_id)
            .fetch_all(self.pool.as_ref())
            .await
            .map_err(classify_sqlx_error)
    }

    async fn insert_event(&self, event: &NewAnalyticsEvent) -> StorageResult<AnalyticsEvent> {
        sqlx::query(
            r#"
            INSERT INTO analytics_events
                (id, link_id, user_agent, referrer, browser, os, device_type, country, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&event.id)
        .bind(&event.link_id)
        .bind(&event.user_agent)
        .bind(&event.referrer)
        .bind(&event.browser)
        .bind(&event.os)
        .bind(&event.device_type)
        .bind(&event.country)
        .bind(event.timestamp)
        .execute(self.pool.as_ref())
        .await
        .map_err(classify_sqlx_error)?;

        Ok(event.clone().into_event())
    }

    async fn list_events_for_link(&self, link_id: &str) -> StorageResult<Vec<AnalyticsEvent>> {
        sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            SELECT id, link_id, user_agent, referrer, browser, os, device_type, country, timestamp
            FROM analytics_events
            WHERE link_id = $1
            ORDER BY timestamp ASC, id ASC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(classify_sqlx_error)
    }

    async fn generate_unique_code(&self) -> StorageResult<String> {
        for _ in 0..UNIQUE_CODE_ATTEMPTS {
            let code = random_code();
            let taken = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM short_links WHERE short_code = $1)",
            )
            .bind(&code)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(classify_sqlx_error)?;

            if !taken {
                return Ok(code);
            }
        }

        Err(StorageError::Other(anyhow!(
            "no free short code after {} attempts",
            UNIQUE_CODE_ATTEMPTS
        )))
    }
}
