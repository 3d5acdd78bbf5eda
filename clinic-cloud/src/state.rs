//! Application state for clinic-cloud

use std::sync::Arc;

use crate::BoxError;
use crate::billing::{BillingProvider, StripeClient};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::{PgStore, Repositories};
use crate::services::Services;

/// Shared application state, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub services: Services,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to PostgreSQL, run migrations and wire the services
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store = PgStore::connect(&config.database_url).await?;
        tracing::info!("Database connected, migrations applied");

        let billing = Arc::new(StripeClient::new(config.stripe_secret_key.clone()));
        Ok(Self::from_parts(
            Repositories::from_store(Arc::new(store)),
            billing,
            Arc::new(SystemClock),
            config.clone(),
        ))
    }

    /// Wire state from explicit parts (alternate stores, fake providers, fixed clocks)
    pub fn from_parts(
        repos: Repositories,
        billing: Arc<dyn BillingProvider>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        let services = Services::new(&repos, billing, clock, &config);
        Self {
            repos,
            services,
            config: Arc::new(config),
        }
    }
}
