//! Tenant activity report and CSV export

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{DocumentStatus, StatusCount, TenantReport};

use crate::clock::Clock;
use crate::db::{ComplianceRepository, Repositories, ReportRepository};
use crate::error::ServiceResult;

#[derive(Clone)]
pub struct ReportService {
    reports: Arc<dyn ReportRepository>,
    documents: Arc<dyn ComplianceRepository>,
    clock: Arc<dyn Clock>,
}

impl ReportService {
    pub fn new(repos: &Repositories, clock: Arc<dyn Clock>) -> Self {
        Self {
            reports: repos.reports.clone(),
            documents: repos.compliance.clone(),
            clock,
        }
    }

    /// Activity in `[from, to)`. Document and campaign counts are a
    /// snapshot of the current state.
    pub async fn tenant_report(
        &self,
        tenant_id: &str,
        from: i64,
        to: i64,
    ) -> ServiceResult<TenantReport> {
        if from > to {
            return Err(AppError::new(ErrorCode::InvalidDateRange)
                .with_detail("from", from)
                .with_detail("to", to)
                .into());
        }

        let appointments_by_status = self
            .reports
            .appointment_counts_by_status(tenant_id, from, to)
            .await?;
        let total_appointments = appointments_by_status.iter().map(|c| c.count).sum();
        let new_patients = self.reports.count_new_patients(tenant_id, from, to).await?;

        let document_counts = self.documents.count_documents_by_status(tenant_id).await?;
        let documents_by_status = DocumentStatus::ALL
            .iter()
            .map(|status| StatusCount {
                status: status.as_db().to_string(),
                count: document_counts
                    .iter()
                    .find(|c| c.status == status.as_db())
                    .map_or(0, |c| c.count),
            })
            .collect();
        let campaigns_by_status = self.reports.campaign_counts_by_status(tenant_id).await?;

        Ok(TenantReport {
            tenant_id: tenant_id.to_string(),
            from,
            to,
            appointments_by_status,
            total_appointments,
            new_patients,
            documents_by_status,
            campaigns_by_status,
            generated_at: self.clock.now_millis(),
        })
    }
}

/// Render a report as `metric,value` rows
pub fn export_csv(report: &TenantReport) -> ServiceResult<String> {
    let export_failed = |e: &dyn std::fmt::Display| {
        tracing::error!(tenant_id = %report.tenant_id, error = %e, "CSV export failed");
        AppError::with_message(ErrorCode::ExportFailed, "Failed to render report")
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut rows: Vec<(String, String)> = vec![
        ("tenant_id".into(), report.tenant_id.clone()),
        ("from".into(), report.from.to_string()),
        ("to".into(), report.to.to_string()),
        (
            "appointments.total".into(),
            report.total_appointments.to_string(),
        ),
    ];
    let grouped = [
        ("appointments", &report.appointments_by_status),
        ("documents", &report.documents_by_status),
        ("campaigns", &report.campaigns_by_status),
    ];
    for (prefix, counts) in grouped {
        for c in counts.iter() {
            rows.push((format!("{prefix}.{}", c.status), c.count.to_string()));
        }
    }
    rows.push(("patients.new".into(), report.new_patients.to_string()));

    writer
        .write_record(["metric", "value"])
        .map_err(|e| export_failed(&e))?;
    for (metric, value) in &rows {
        writer
            .write_record([metric.as_str(), value.as_str()])
            .map_err(|e| export_failed(&e))?;
    }
    let bytes = writer.into_inner().map_err(|e| export_failed(&e))?;
    Ok(String::from_utf8(bytes).map_err(|e| export_failed(&e))?)
}
