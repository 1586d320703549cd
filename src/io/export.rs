use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{BalanceEntry, LeaveService, RequestView};
use crate::domain::{Days, EmployeeId};

/// One line of a balance report, with the derived remaining days spelled out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRow {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub year: i32,
    pub entitlement: Days,
    pub carried_over: Days,
    pub used: Days,
    pub remaining: Days,
}

impl From<&BalanceEntry> for BalanceRow {
    fn from(entry: &BalanceEntry) -> Self {
        Self {
            employee_id: entry.balance.employee_id,
            employee_name: entry.employee_name.clone(),
            year: entry.balance.year,
            entitlement: entry.balance.entitlement,
            carried_over: entry.balance.carried_over,
            used: entry.balance.used,
            remaining: entry.balance.remaining(),
        }
    }
}

/// Balances of a year as exported to JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReport {
    pub year: i32,
    pub exported_at: DateTime<Utc>,
    pub balances: Vec<BalanceRow>,
}

/// Exporter for converting leave data to CSV and JSON
pub struct Exporter<'a> {
    service: &'a LeaveService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LeaveService) -> Self {
        Self { service }
    }

    async fn balance_rows(&self, year: i32) -> Result<Vec<BalanceRow>> {
        let entries = self.service.ledger().list_for_year(year).await?;
        Ok(entries.iter().map(BalanceRow::from).collect())
    }

    async fn request_views(&self, employee: Option<EmployeeId>) -> Result<Vec<RequestView>> {
        let requests = match employee {
            Some(id) => self.service.workflow().list_for_employee(id).await?,
            None => self.service.workflow().list_all().await?,
        };
        Ok(self.service.describe_requests(requests).await?)
    }

    /// Export the balances of a year to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W, year: i32) -> Result<usize> {
        let rows = self.balance_rows(year).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "employee_id",
            "employee_name",
            "year",
            "entitlement",
            "carried_over",
            "used",
            "remaining",
        ])?;

        for row in &rows {
            csv_writer.write_record(&[
                row.employee_id.to_string(),
                row.employee_name.clone(),
                row.year.to_string(),
                row.entitlement.to_string(),
                row.carried_over.to_string(),
                row.used.to_string(),
                row.remaining.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(rows.len())
    }

    /// Export the balances of a year as a JSON report
    pub async fn export_balances_json<W: Write>(
        &self,
        mut writer: W,
        year: i32,
    ) -> Result<BalanceReport> {
        let report = BalanceReport {
            year,
            exported_at: self.service.now(),
            balances: self.balance_rows(year).await?,
        };

        let json = serde_json::to_string_pretty(&report)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(report)
    }

    /// Export leave requests (all, or one employee's) to CSV format, newest first
    pub async fn export_requests_csv<W: Write>(
        &self,
        writer: W,
        employee: Option<EmployeeId>,
    ) -> Result<usize> {
        let views = self.request_views(employee).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "employee_id",
            "employee_name",
            "start_date",
            "end_date",
            "total_days",
            "status",
            "reason",
            "rejection_reason",
            "decided_by",
            "decided_at",
            "requested_on",
        ])?;

        for view in &views {
            let request = &view.request;
            csv_writer.write_record(&[
                request.id.to_string(),
                request.employee_id.to_string(),
                view.employee_name.clone(),
                request.start_date.to_string(),
                request.end_date.to_string(),
                view.total_days.to_string(),
                request.status.as_str().to_string(),
                request.reason.clone().unwrap_or_default(),
                request.rejection_reason.clone().unwrap_or_default(),
                view.decided_by_name.clone().unwrap_or_default(),
                request
                    .decided_at
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_default(),
                view.requested_on.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(views.len())
    }

    /// Export leave requests (all, or one employee's) as JSON
    pub async fn export_requests_json<W: Write>(
        &self,
        mut writer: W,
        employee: Option<EmployeeId>,
    ) -> Result<usize> {
        let views = self.request_views(employee).await?;

        let json = serde_json::to_string_pretty(&views)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(views.len())
    }
}
