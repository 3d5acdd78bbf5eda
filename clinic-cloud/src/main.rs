//! clinic-cloud: multi-tenant clinic management core
//!
//! Long-running service that:
//! - Serves `/health` and the billing webhook ingress
//! - Periodically recomputes compliance document statuses for every tenant

use std::time::Duration;

use clinic_cloud::BoxError;
use clinic_cloud::api;
use clinic_cloud::config::Config;
use clinic_cloud::state::AppState;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_cloud=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting clinic-cloud (env: {})", config.environment);

    let state = AppState::new(&config).await?;

    if config.compliance_sweep_interval_secs > 0 {
        spawn_compliance_sweep(
            state.clone(),
            Duration::from_secs(config.compliance_sweep_interval_secs),
        );
    } else {
        tracing::info!("Compliance sweep disabled");
    }

    let app = api::create_router(state);
    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("clinic-cloud HTTP listening on {http_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Recompute document statuses for every tenant on a fixed period.
/// A failed tenant is logged and retried on the next tick.
fn spawn_compliance_sweep(state: AppState, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            let tenant_ids = match state.repos.tenants.list_tenant_ids().await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::error!(error = %e, "Compliance sweep: failed to list tenants");
                    continue;
                }
            };

            let mut changed = 0u64;
            for tenant_id in &tenant_ids {
                match state.services.compliance.update_statuses(tenant_id).await {
                    Ok(n) => changed += n,
                    Err(e) => {
                        tracing::error!(tenant_id = %tenant_id, error = %e, "Compliance sweep failed for tenant");
                    }
                }
            }
            tracing::info!(tenants = tenant_ids.len(), changed, "Compliance sweep finished");
        }
    });
}
