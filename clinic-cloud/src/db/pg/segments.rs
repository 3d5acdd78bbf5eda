use async_trait::async_trait;
use shared::models::{Segment, SegmentFilters};
use sqlx::types::Json;

use super::PgStore;
use crate::db::{DbResult, SegmentRepository};

#[derive(sqlx::FromRow)]
struct SegmentRow {
    id: i64,
    tenant_id: String,
    name: String,
    description: Option<String>,
    filters: Json<SegmentFilters>,
    is_active: bool,
    created_at: i64,
    updated_at: i64,
}

impl From<SegmentRow> for Segment {
    fn from(r: SegmentRow) -> Self {
        Segment {
            id: r.id,
            tenant_id: r.tenant_id,
            name: r.name,
            description: r.description,
            filters: r.filters.0,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const SEGMENT_COLUMNS: &str =
    "id, tenant_id, name, description, filters, is_active, created_at, updated_at";

#[async_trait]
impl SegmentRepository for PgStore {
    async fn insert_segment(&self, segment: &Segment) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO segments (id, tenant_id, name, description, filters, is_active,
                created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(segment.id)
        .bind(&segment.tenant_id)
        .bind(&segment.name)
        .bind(&segment.description)
        .bind(Json(&segment.filters))
        .bind(segment.is_active)
        .bind(segment.created_at)
        .bind(segment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_segment(&self, tenant_id: &str, id: i64) -> DbResult<Option<Segment>> {
        let row: Option<SegmentRow> = sqlx::query_as(&format!(
            "SELECT {SEGMENT_COLUMNS} FROM segments WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Segment::from))
    }

    async fn list_segments(&self, tenant_id: &str) -> DbResult<Vec<Segment>> {
        let rows: Vec<SegmentRow> = sqlx::query_as(&format!(
            "SELECT {SEGMENT_COLUMNS} FROM segments WHERE tenant_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Segment::from).collect())
    }

    async fn replace_segment(&self, segment: &Segment) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE segments SET name = $3, description = $4, filters = $5, is_active = $6,
                updated_at = $7
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(&segment.tenant_id)
        .bind(segment.id)
        .bind(&segment.name)
        .bind(&segment.description)
        .bind(Json(&segment.filters))
        .bind(segment.is_active)
        .bind(segment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_segment(&self, tenant_id: &str, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM segments WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
