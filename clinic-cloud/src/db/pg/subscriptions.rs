use async_trait::async_trait;
use shared::models::{Plan, Subscription, SubscriptionStatus};

use super::{PgStore, unknown_status};
use crate::BoxError;
use crate::db::{DbResult, SubscriptionRepository};

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    tenant_id: String,
    plan_id: String,
    status: String,
    trial_ends_at: Option<i64>,
    current_period_end: Option<i64>,
    provider_customer_id: Option<String>,
    provider_subscription_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = BoxError;

    fn try_from(r: SubscriptionRow) -> Result<Self, Self::Error> {
        let status = SubscriptionStatus::from_db(&r.status)
            .ok_or_else(|| unknown_status("subscription", &r.status))?;
        Ok(Subscription {
            id: r.id,
            tenant_id: r.tenant_id,
            plan_id: r.plan_id,
            status,
            trial_ends_at: r.trial_ends_at,
            current_period_end: r.current_period_end,
            provider_customer_id: r.provider_customer_id,
            provider_subscription_id: r.provider_subscription_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PlanRow {
    id: String,
    name: String,
    max_users: i64,
    max_patients: i64,
    max_appointments_per_month: i64,
    max_storage_gb: i64,
    price_monthly_cents: i64,
    provider_price_id: Option<String>,
}

impl From<PlanRow> for Plan {
    fn from(r: PlanRow) -> Self {
        Plan {
            id: r.id,
            name: r.name,
            max_users: r.max_users,
            max_patients: r.max_patients,
            max_appointments_per_month: r.max_appointments_per_month,
            max_storage_gb: r.max_storage_gb,
            price_monthly_cents: r.price_monthly_cents,
            provider_price_id: r.provider_price_id,
        }
    }
}

const PLAN_COLUMNS: &str = "id, name, max_users, max_patients, max_appointments_per_month, \
    max_storage_gb, price_monthly_cents, provider_price_id";

#[async_trait]
impl SubscriptionRepository for PgStore {
    async fn find_subscription(&self, tenant_id: &str) -> DbResult<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            "SELECT id, tenant_id, plan_id, status, trial_ends_at, current_period_end,
                provider_customer_id, provider_subscription_id, created_at, updated_at
             FROM subscriptions WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Subscription::try_from).transpose()
    }

    async fn upsert_subscription(&self, sub: &Subscription) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO subscriptions (id, tenant_id, plan_id, status, trial_ends_at,
                current_period_end, provider_customer_id, provider_subscription_id,
                created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (tenant_id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id, status = EXCLUDED.status,
                trial_ends_at = EXCLUDED.trial_ends_at,
                current_period_end = EXCLUDED.current_period_end,
                provider_customer_id = EXCLUDED.provider_customer_id,
                provider_subscription_id = EXCLUDED.provider_subscription_id,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(sub.id)
        .bind(&sub.tenant_id)
        .bind(&sub.plan_id)
        .bind(sub.status.as_db())
        .bind(sub.trial_ends_at)
        .bind(sub.current_period_end)
        .bind(&sub.provider_customer_id)
        .bind(&sub.provider_subscription_id)
        .bind(sub.created_at)
        .bind(sub.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_subscription_status(
        &self,
        tenant_id: &str,
        status: SubscriptionStatus,
        now: i64,
    ) -> DbResult<bool> {
        let result =
            sqlx::query("UPDATE subscriptions SET status = $2, updated_at = $3 WHERE tenant_id = $1")
                .bind(tenant_id)
                .bind(status.as_db())
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_tenant_by_provider_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> DbResult<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT tenant_id FROM subscriptions WHERE provider_subscription_id = $1")
                .bind(provider_subscription_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    async fn find_plan(&self, plan_id: &str) -> DbResult<Option<Plan>> {
        let row: Option<PlanRow> =
            sqlx::query_as(&format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1"))
                .bind(plan_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Plan::from))
    }

    async fn list_plans(&self) -> DbResult<Vec<Plan>> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans ORDER BY price_monthly_cents"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Plan::from).collect())
    }
}
