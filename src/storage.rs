// src/storage.rs
//! Postgres + pgvector backing for the item cache and the demand index.

use crate::cache::{InteractionKind, ItemStore, LegislativeItem};
use crate::error::StoreError;
use crate::geo::Location;
use crate::scope::ScopeLevel;
use crate::similarity::{DemandIndex, DemandQuery, SimilarDemand, ACTIVE_STATUS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("../migrations/0001_investigation.sql");

const UPSERT_ITEM_SQL: &str = r#"
INSERT INTO legislative_items (
    id, external_id, source, item_type, type_code, number, year, title, summary,
    full_text_excerpt, status, url, raw_payload, keywords, created_at, updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now(), now())
ON CONFLICT (external_id) DO UPDATE SET
    source = EXCLUDED.source,
    item_type = EXCLUDED.item_type,
    type_code = EXCLUDED.type_code,
    number = EXCLUDED.number,
    year = EXCLUDED.year,
    title = EXCLUDED.title,
    summary = EXCLUDED.summary,
    full_text_excerpt = EXCLUDED.full_text_excerpt,
    status = EXCLUDED.status,
    url = EXCLUDED.url,
    raw_payload = EXCLUDED.raw_payload,
    keywords = EXCLUDED.keywords,
    updated_at = now()
RETURNING id
"#;

const INSERT_INTERACTION_SQL: &str = r#"
INSERT INTO pl_interactions (id, user_id, legislative_item_id, interaction_type, created_at)
VALUES ($1, $2, $3, $4, now())
"#;

// Zero-norm vectors are excluded: their cosine distance is undefined.
const NEAREST_DEMANDS_SQL: &str = r#"
SELECT id, title, description, theme, scope_level, location, supporters_count, created_at,
       1 - (embedding <=> $1) AS similarity
FROM demands
WHERE status = $2
  AND theme = $3
  AND scope_level = $4
  AND embedding IS NOT NULL
  AND vector_norm(embedding) > 0
  AND 1 - (embedding <=> $1) >= $5
ORDER BY embedding <=> $1
LIMIT $6
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create the extension, tables and indexes if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        info!(target: "cache", "investigation schema ensured");
        Ok(())
    }
}

#[async_trait]
impl ItemStore for PgStore {
    async fn upsert_batch(&self, items: &[LegislativeItem]) -> Result<Vec<Uuid>, StoreError> {
        // dropped without commit on any error: rolls back
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id: Uuid = sqlx::query_scalar(UPSERT_ITEM_SQL)
                .bind(Uuid::new_v4())
                .bind(&item.external_id)
                .bind(item.source.as_str())
                .bind(item.item_type.as_str())
                .bind(&item.type_code)
                .bind(&item.number)
                .bind(item.year)
                .bind(&item.title)
                .bind(&item.summary)
                .bind(&item.full_text_excerpt)
                .bind(&item.status)
                .bind(&item.url)
                .bind(sqlx::types::Json(&item.raw_payload))
                .bind(&item.keywords)
                .fetch_one(&mut *tx)
                .await?;
            ids.push(id);
        }
        tx.commit().await?;
        Ok(ids)
    }

    async fn record_interaction(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        kind: InteractionKind,
    ) -> Result<(), StoreError> {
        sqlx::query(INSERT_INTERACTION_SQL)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(item_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DemandIndex for PgStore {
    async fn nearest(&self, q: &DemandQuery) -> Result<Vec<SimilarDemand>, StoreError> {
        let rows = sqlx::query(NEAREST_DEMANDS_SQL)
            .bind(Vector::from(q.vector.clone()))
            .bind(ACTIVE_STATUS)
            .bind(&q.theme)
            .bind(i32::from(q.scope.level()))
            .bind(f64::from(q.threshold))
            .bind(q.limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id")?;
            let scope_raw: i32 = row.try_get("scope_level")?;
            let Some(scope_level) = u8::try_from(scope_raw)
                .ok()
                .and_then(|v| ScopeLevel::try_from(v).ok())
            else {
                warn!(target: "cache", %id, scope_raw, "demand with invalid scope level skipped");
                continue;
            };
            // location shape is owned elsewhere; tolerate anything
            let location: Option<serde_json::Value> = row.try_get("location")?;
            let location: Option<Location> = location.and_then(|v| serde_json::from_value(v).ok());
            let similarity: f64 = row.try_get("similarity")?;
            let created_at: DateTime<Utc> = row.try_get("created_at")?;

            out.push(SimilarDemand {
                id,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                theme: row.try_get("theme")?,
                scope_level,
                location,
                supporters_count: row.try_get("supporters_count")?,
                created_at,
                similarity: similarity as f32,
                distance_km: None,
            });
        }
        Ok(out)
    }
}
