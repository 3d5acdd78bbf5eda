use async_trait::async_trait;
use shared::models::{ComplianceDocument, ComplianceDocumentQuery, DocumentStatus, StatusCount};

use super::{PgStore, StatusCountRow, unknown_status};
use crate::BoxError;
use crate::db::query_builder::{QueryBuilder, QueryValue};
use crate::db::{ComplianceRepository, DbResult};

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    tenant_id: String,
    staff_id: Option<i64>,
    name: String,
    document_type: String,
    issue_date: i64,
    expiration_date: Option<i64>,
    status: String,
    renewal_started_at: Option<i64>,
    file_url: Option<String>,
    file_size: Option<i64>,
    mime_type: Option<String>,
    notes: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<DocumentRow> for ComplianceDocument {
    type Error = BoxError;

    fn try_from(r: DocumentRow) -> Result<Self, Self::Error> {
        let status = DocumentStatus::from_db(&r.status)
            .ok_or_else(|| unknown_status("document", &r.status))?;
        Ok(ComplianceDocument {
            id: r.id,
            tenant_id: r.tenant_id,
            staff_id: r.staff_id,
            name: r.name,
            document_type: r.document_type,
            issue_date: r.issue_date,
            expiration_date: r.expiration_date,
            status,
            renewal_started_at: r.renewal_started_at,
            file_url: r.file_url,
            file_size: r.file_size,
            mime_type: r.mime_type,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn into_documents(rows: Vec<DocumentRow>) -> DbResult<Vec<ComplianceDocument>> {
    rows.into_iter().map(ComplianceDocument::try_from).collect()
}

const DOCUMENT_COLUMNS: &str = "id, tenant_id, staff_id, name, document_type, issue_date, \
    expiration_date, status, renewal_started_at, file_url, file_size, mime_type, notes, \
    created_at, updated_at";

#[async_trait]
impl ComplianceRepository for PgStore {
    async fn insert_document(&self, doc: &ComplianceDocument) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO compliance_documents (id, tenant_id, staff_id, name, document_type,
                issue_date, expiration_date, status, renewal_started_at, file_url, file_size,
                mime_type, notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(doc.id)
        .bind(&doc.tenant_id)
        .bind(doc.staff_id)
        .bind(&doc.name)
        .bind(&doc.document_type)
        .bind(doc.issue_date)
        .bind(doc.expiration_date)
        .bind(doc.status.as_db())
        .bind(doc.renewal_started_at)
        .bind(&doc.file_url)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(&doc.notes)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_document(
        &self,
        tenant_id: &str,
        id: i64,
    ) -> DbResult<Option<ComplianceDocument>> {
        let row: Option<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM compliance_documents WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ComplianceDocument::try_from).transpose()
    }

    async fn list_documents(
        &self,
        tenant_id: &str,
        query: &ComplianceDocumentQuery,
    ) -> DbResult<Vec<ComplianceDocument>> {
        let mut qb = QueryBuilder::new();
        qb.add_bound("tenant_id = {}", QueryValue::Text(tenant_id.to_string()));
        if let Some(status) = query.status {
            qb.add_bound("status = {}", QueryValue::Text(status.as_db().to_string()));
        }
        if let Some(staff_id) = query.staff_id {
            qb.add_bound("staff_id = {}", QueryValue::Integer(staff_id));
        }
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM compliance_documents{} \
             ORDER BY expiration_date ASC NULLS LAST, id ASC",
            qb.build_where_clause()
        );
        let rows: Vec<DocumentRow> = qb
            .apply_bindings_as(sqlx::query_as(&sql))
            .fetch_all(&self.pool)
            .await?;
        into_documents(rows)
    }

    async fn replace_document(&self, doc: &ComplianceDocument) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE compliance_documents SET staff_id = $3, name = $4, document_type = $5,
                issue_date = $6, expiration_date = $7, status = $8, renewal_started_at = $9,
                file_url = $10, file_size = $11, mime_type = $12, notes = $13, updated_at = $14
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(&doc.tenant_id)
        .bind(doc.id)
        .bind(doc.staff_id)
        .bind(&doc.name)
        .bind(&doc.document_type)
        .bind(doc.issue_date)
        .bind(doc.expiration_date)
        .bind(doc.status.as_db())
        .bind(doc.renewal_started_at)
        .bind(&doc.file_url)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(&doc.notes)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_document(&self, tenant_id: &str, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM compliance_documents WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_recompute_candidates(
        &self,
        tenant_id: &str,
    ) -> DbResult<Vec<ComplianceDocument>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM compliance_documents
             WHERE tenant_id = $1 AND status <> $2 ORDER BY id"
        ))
        .bind(tenant_id)
        .bind(DocumentStatus::PendingRenewal.as_db())
        .fetch_all(&self.pool)
        .await?;
        into_documents(rows)
    }

    async fn set_document_status(
        &self,
        tenant_id: &str,
        id: i64,
        status: DocumentStatus,
        now: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE compliance_documents SET status = $3, updated_at = $4
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(status.as_db())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_documents_by_status(&self, tenant_id: &str) -> DbResult<Vec<StatusCount>> {
        let rows: Vec<StatusCountRow> = sqlx::query_as(
            "SELECT status, COUNT(*) AS count FROM compliance_documents
             WHERE tenant_id = $1 GROUP BY status ORDER BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(StatusCount::from).collect())
    }

    async fn total_file_bytes(&self, tenant_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(file_size), 0)::BIGINT FROM compliance_documents WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
