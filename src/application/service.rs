use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Days, Employee, EmployeeId, LeaveRequest, Principal, Role, days_taken_label,
    request_date_label,
};
use crate::storage::Repository;

use super::{AppError, BalanceLedger, Clock, RequestWorkflow, SystemClock};

/// Application service wiring the employee directory, the balance ledger and
/// the request workflow over one database.
/// This is the primary interface for any client (CLI, API, etc.).
pub struct LeaveService {
    repo: Repository,
    clock: Arc<dyn Clock>,
    ledger: Arc<BalanceLedger>,
    workflow: RequestWorkflow,
}

/// A leave request with the names and labels needed for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestView {
    pub request: LeaveRequest,
    pub employee_name: String,
    pub decided_by_name: Option<String>,
    pub total_days: Days,
    /// e.g. "05/12 days"
    pub days_taken: String,
    /// e.g. "03/01/2024 - 09:05"
    pub requested_on: String,
}

/// Details for a new directory entry.
pub struct NewEmployee {
    pub full_name: String,
    pub role: Role,
    pub annual_leave_entitlement: Option<Days>,
    pub position: Option<String>,
    pub department: Option<String>,
}

impl NewEmployee {
    pub fn new(full_name: impl Into<String>, role: Role) -> Self {
        Self {
            full_name: full_name.into(),
            role,
            annual_leave_entitlement: None,
            position: None,
            department: None,
        }
    }

    pub fn with_entitlement(mut self, days: Days) -> Self {
        self.annual_leave_entitlement = Some(days);
        self
    }
}

impl LeaveService {
    /// Create a new service over the given repository and clock.
    pub fn new(repo: Repository, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(BalanceLedger::new(repo.clone(), clock.clone()));
        let workflow = RequestWorkflow::new(repo.clone(), ledger.clone(), clock.clone());
        Self {
            repo,
            clock,
            ledger,
            workflow,
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        Self::init_with_clock(database_path, Arc::new(SystemClock)).await
    }

    /// Initialize a new database at the given path, stamping times from `clock`.
    pub async fn init_with_clock(
        database_path: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, clock))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, Arc::new(SystemClock)))
    }

    pub fn ledger(&self) -> &BalanceLedger {
        &self.ledger
    }

    pub fn workflow(&self) -> &RequestWorkflow {
        &self.workflow
    }

    /// Current time according to the service's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================
    // Employee directory
    // ========================

    /// Add an employee to the directory.
    pub async fn add_employee(&self, new: NewEmployee) -> Result<Employee, AppError> {
        let full_name = new.full_name.trim();
        if full_name.is_empty() {
            return Err(AppError::InvalidEmployee("name must not be empty".to_string()));
        }

        let mut employee = Employee::new(full_name, new.role, self.clock.now());
        if let Some(days) = new.annual_leave_entitlement {
            if days < 0 {
                return Err(AppError::InvalidEmployee(format!(
                    "entitlement must not be negative (got {})",
                    days
                )));
            }
            employee = employee.with_entitlement(days);
        }
        if let Some(position) = new.position {
            employee = employee.with_position(position);
        }
        if let Some(department) = new.department {
            employee = employee.with_department(department);
        }

        self.repo.save_employee(&mut employee).await?;
        tracing::info!(employee_id = employee.id, role = %employee.role, "employee added");
        Ok(employee)
    }

    /// Get an employee by id.
    pub async fn get_employee(&self, id: EmployeeId) -> Result<Employee, AppError> {
        self.repo
            .get_employee(id)
            .await?
            .ok_or(AppError::EmployeeNotFound(id))
    }

    /// List all employees.
    pub async fn list_employees(&self) -> Result<Vec<Employee>, AppError> {
        Ok(self.repo.list_employees().await?)
    }

    /// Resolve the acting employee into the principal handed to decisions.
    pub async fn authenticate(&self, id: EmployeeId) -> Result<Principal, AppError> {
        Ok(self.get_employee(id).await?.principal())
    }

    // ========================
    // Request views
    // ========================

    /// Attach employee names and display labels to requests, keeping their order.
    pub async fn describe_requests(
        &self,
        requests: Vec<LeaveRequest>,
    ) -> Result<Vec<RequestView>, AppError> {
        let employees: HashMap<EmployeeId, Employee> = self
            .repo
            .list_employees()
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        requests
            .into_iter()
            .map(|request| -> Result<RequestView, AppError> {
                let employee = employees
                    .get(&request.employee_id)
                    .ok_or(AppError::EmployeeNotFound(request.employee_id))?;
                let decided_by_name = request
                    .decided_by
                    .and_then(|id| employees.get(&id))
                    .map(|e| e.full_name.clone());
                let total_days = request.total_days();

                Ok(RequestView {
                    employee_name: employee.full_name.clone(),
                    decided_by_name,
                    total_days,
                    days_taken: days_taken_label(total_days, employee.annual_leave_entitlement),
                    requested_on: request_date_label(request.created_at),
                    request,
                })
            })
            .collect()
    }
}
