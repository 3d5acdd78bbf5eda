//! Cloud server configuration

use crate::BoxError;

/// Cloud server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port (health check + billing webhook)
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Redirect after a successful checkout
    pub billing_success_url: String,
    /// Redirect after an abandoned checkout
    pub billing_cancel_url: String,
    /// Return target for the billing portal
    pub billing_portal_return_url: String,
    /// Length of a new trial
    pub trial_days: i64,
    /// Sample size returned with segment previews
    pub segment_preview_limit: i64,
    /// Compliance sweep period; 0 disables the in-process sweep
    pub compliance_sweep_interval_secs: u64,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn positive_days(name: &str, days: i64) -> Result<i64, BoxError> {
        if days <= 0 {
            return Err(format!("{name} must be positive, got {days}").into());
        }
        Ok(days)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: Self::parsed_or("HTTP_PORT", 8080),
            environment: environment.clone(),
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            billing_success_url: std::env::var("BILLING_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:5173/billing/success".into()),
            billing_cancel_url: std::env::var("BILLING_CANCEL_URL")
                .unwrap_or_else(|_| "http://localhost:5173/billing/cancel".into()),
            billing_portal_return_url: std::env::var("BILLING_PORTAL_RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:5173/settings/billing".into()),
            trial_days: Self::positive_days("TRIAL_DAYS", Self::parsed_or("TRIAL_DAYS", 14))?,
            segment_preview_limit: Self::parsed_or("SEGMENT_PREVIEW_LIMIT", 20),
            compliance_sweep_interval_secs: Self::parsed_or("COMPLIANCE_SWEEP_INTERVAL_SECS", 3600),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trial_days_must_be_positive() {
        assert_eq!(Config::positive_days("TRIAL_DAYS", 14).unwrap(), 14);
        for days in [0, -7] {
            let err = Config::positive_days("TRIAL_DAYS", days).unwrap_err();
            assert!(err.to_string().contains("TRIAL_DAYS must be positive"));
        }
    }
}
