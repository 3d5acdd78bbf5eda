use async_trait::async_trait;
use shared::models::{Tenant, TenantStatus};

use super::{PgStore, unknown_status};
use crate::BoxError;
use crate::db::{DbResult, TenantRepository};

#[derive(sqlx::FromRow)]
struct TenantRow {
    id: String,
    name: String,
    email: String,
    status: String,
    billing_customer_id: Option<String>,
    created_at: i64,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = BoxError;

    fn try_from(r: TenantRow) -> Result<Self, Self::Error> {
        let status =
            TenantStatus::from_db(&r.status).ok_or_else(|| unknown_status("tenant", &r.status))?;
        Ok(Tenant {
            id: r.id,
            name: r.name,
            email: r.email,
            status,
            billing_customer_id: r.billing_customer_id,
            created_at: r.created_at,
        })
    }
}

const TENANT_COLUMNS: &str = "id, name, email, status, billing_customer_id, created_at";

#[async_trait]
impl TenantRepository for PgStore {
    async fn create_tenant(&self, tenant: &Tenant) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO tenants (id, name, email, status, billing_customer_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.email)
        .bind(tenant.status.as_db())
        .bind(&tenant.billing_customer_id)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_tenant(&self, tenant_id: &str) -> DbResult<Option<Tenant>> {
        let row: Option<TenantRow> =
            sqlx::query_as(&format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"))
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Tenant::try_from).transpose()
    }

    async fn find_tenant_by_billing_customer(
        &self,
        customer_id: &str,
    ) -> DbResult<Option<Tenant>> {
        let row: Option<TenantRow> = sqlx::query_as(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE billing_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Tenant::try_from).transpose()
    }

    async fn set_billing_customer(&self, tenant_id: &str, customer_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE tenants SET billing_customer_id = $1 WHERE id = $2")
            .bind(customer_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_tenant_status(&self, tenant_id: &str, status: TenantStatus) -> DbResult<()> {
        sqlx::query("UPDATE tenants SET status = $1 WHERE id = $2")
            .bind(status.as_db())
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_tenant_ids(&self) -> DbResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM tenants ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
