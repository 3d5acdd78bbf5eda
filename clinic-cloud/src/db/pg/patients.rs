use async_trait::async_trait;
use shared::models::{PatientSummary, SegmentFilters, SegmentPreview};

use super::PgStore;
use crate::db::query_builder::{QueryBuilder, QueryValue};
use crate::db::{DbResult, PatientRepository};
use crate::services::segment_filter;

#[derive(sqlx::FromRow)]
struct PatientSummaryRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
}

impl From<PatientSummaryRow> for PatientSummary {
    fn from(r: PatientSummaryRow) -> Self {
        PatientSummary {
            id: r.id,
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            phone: r.phone,
        }
    }
}

#[async_trait]
impl PatientRepository for PgStore {
    async fn count_active_patients(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM patients WHERE tenant_id = $1 AND is_active = TRUE",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn query_audience(
        &self,
        tenant_id: &str,
        filters: &SegmentFilters,
        now: i64,
        limit: i64,
    ) -> DbResult<SegmentPreview> {
        let mut qb = QueryBuilder::new();
        qb.add_bound("p.tenant_id = {}", QueryValue::Text(tenant_id.to_string()));
        segment_filter::apply_to_query(&mut qb, filters, now);
        let where_clause = qb.build_where_clause();

        let count_sql = format!("SELECT COUNT(*) FROM patients p{where_clause}");
        let count: i64 = qb
            .apply_bindings_scalar(sqlx::query_scalar(&count_sql))
            .fetch_one(&self.pool)
            .await?;

        let mut page = QueryBuilder::new();
        page.add_bound("p.tenant_id = {}", QueryValue::Text(tenant_id.to_string()));
        segment_filter::apply_to_query(&mut page, filters, now);
        let limit_placeholder = page.push_binding(QueryValue::Integer(limit.max(0)));
        let sample_sql = format!(
            "SELECT p.id, p.first_name, p.last_name, p.email, p.phone FROM patients p{} \
             ORDER BY p.last_name, p.first_name, p.id LIMIT {limit_placeholder}",
            page.build_where_clause()
        );
        let rows: Vec<PatientSummaryRow> = page
            .apply_bindings_as(sqlx::query_as(&sample_sql))
            .fetch_all(&self.pool)
            .await?;

        Ok(SegmentPreview {
            count,
            patients: rows.into_iter().map(PatientSummary::from).collect(),
        })
    }
}
