//! clinic-cloud: multi-tenant clinic management core
//!
//! Compliance document tracking, subscription and usage limits, patient
//! segments with campaign lifecycle, tenant reports, and billing provider
//! reconciliation. The binary only exposes `/health` and the billing
//! webhook; the services are meant to be driven by a tenant-facing API.

pub mod api;
pub mod billing;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod state;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
