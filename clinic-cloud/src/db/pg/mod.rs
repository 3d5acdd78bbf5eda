//! PostgreSQL store
//!
//! Runtime-checked `sqlx` queries. Status columns are TEXT holding the
//! enums' `as_db()` form; rows are read into `FromRow` structs and
//! converted into shared models here.

mod audit;
mod campaigns;
mod compliance;
mod patients;
mod reports;
mod segments;
mod subscriptions;
mod tenants;
mod usage;
mod webhook_events;

use sqlx::PgPool;
use shared::models::StatusCount;

use crate::BoxError;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run embedded migrations
    pub async fn connect(database_url: &str) -> Result<Self, BoxError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct StatusCountRow {
    status: String,
    count: i64,
}

impl From<StatusCountRow> for StatusCount {
    fn from(r: StatusCountRow) -> Self {
        StatusCount {
            status: r.status,
            count: r.count,
        }
    }
}

fn unknown_status(kind: &str, value: &str) -> BoxError {
    format!("unknown {kind} status in database: {value}").into()
}
