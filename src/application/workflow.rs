use std::sync::Arc;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};

use crate::domain::{
    BalanceKey, EmployeeId, LeaveRequest, Principal, RequestId, RequestStatus, inclusive_days,
};
use crate::storage::Repository;

use super::{AppError, BalanceLedger, Clock};

/// Lifecycle of leave requests: creation and the approve / reject decisions.
///
/// Every operation that depends on a balance runs under the ledger's lock for
/// the request's (employee, balance year) and inside a single transaction, so
/// a failed check leaves nothing behind and two approvals can never spend
/// the same days.
pub struct RequestWorkflow {
    repo: Repository,
    ledger: Arc<BalanceLedger>,
    clock: Arc<dyn Clock>,
}

impl RequestWorkflow {
    pub fn new(repo: Repository, ledger: Arc<BalanceLedger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            ledger,
            clock,
        }
    }

    /// File a pending leave request.
    ///
    /// Fails when the range is reversed, when it intersects leave that was
    /// already approved, or when the balance of the start date's year does
    /// not cover it. Overlap is reported before the balance shortfall.
    pub async fn create(
        &self,
        employee_id: EmployeeId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
    ) -> Result<LeaveRequest, AppError> {
        let employee = self
            .repo
            .get_employee(employee_id)
            .await?
            .ok_or(AppError::EmployeeNotFound(employee_id))?;

        if end_date < start_date {
            return Err(AppError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }

        let total_days = inclusive_days(start_date, end_date);
        let key = BalanceKey::new(employee.id, start_date.year());
        let _guard = self.ledger.lock(key).await;

        let mut tx = self.repo.begin().await?;
        let balance = self.ledger.get_or_create_in(&mut tx, key).await?;

        let overlapping =
            Repository::find_approved_overlapping(&mut tx, employee.id, start_date, end_date)
                .await?;
        if let Some(existing) = overlapping.first() {
            return Err(AppError::OverlappingLeave {
                existing: existing.id,
                start: existing.start_date,
                end: existing.end_date,
            });
        }

        if !balance.covers(total_days) {
            return Err(AppError::InsufficientBalance {
                remaining: balance.remaining(),
                requested: total_days,
            });
        }

        let mut request = LeaveRequest::new(employee.id, start_date, end_date, self.clock.now());
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            request = request.with_reason(reason);
        }

        Repository::insert_request(&mut tx, &request).await?;
        tx.commit().await.context("Failed to commit leave request")?;

        tracing::info!(
            request_id = %request.id,
            employee_id = employee.id,
            total_days,
            "leave request created"
        );
        Ok(request)
    }

    /// Requests filed by one employee, newest first.
    pub async fn list_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        if self.repo.get_employee(employee_id).await?.is_none() {
            return Err(AppError::EmployeeNotFound(employee_id));
        }
        Ok(self.repo.list_requests_for_employee(employee_id).await?)
    }

    /// Every request, newest first.
    pub async fn list_all(&self) -> Result<Vec<LeaveRequest>, AppError> {
        Ok(self.repo.list_requests().await?)
    }

    /// Get a request by id.
    pub async fn get(&self, request_id: RequestId) -> Result<LeaveRequest, AppError> {
        self.repo
            .get_request(request_id)
            .await?
            .ok_or(AppError::RequestNotFound(request_id))
    }

    /// Approve a pending request and charge its days to the balance of its
    /// start year. Sufficiency is checked again against the balance as it is
    /// now, since other approvals may have used days since creation.
    pub async fn approve(
        &self,
        request_id: RequestId,
        approver: &Principal,
    ) -> Result<LeaveRequest, AppError> {
        if !approver.is_admin() {
            return Err(AppError::Unauthorized("approve"));
        }
        self.require_known(approver).await?;

        let request = self.get(request_id).await?;
        require_pending(&request, RequestStatus::Approved)?;

        let key = request.balance_key();
        let _guard = self.ledger.lock(key).await;

        let mut tx = self.repo.begin().await?;
        let balance = self.ledger.get_or_create_in(&mut tx, key).await?;

        // Re-read under the lock: the request may have been decided meanwhile
        let mut request = Repository::find_request(&mut tx, request_id)
            .await?
            .ok_or(AppError::RequestNotFound(request_id))?;
        require_pending(&request, RequestStatus::Approved)?;

        let total_days = request.total_days();
        if !balance.covers(total_days) {
            return Err(AppError::InsufficientBalance {
                remaining: balance.remaining(),
                requested: total_days,
            });
        }

        request
            .approve(approver.id, self.clock.now())
            .map_err(|e| AppError::from_transition(request_id, e))?;
        let balance = self.ledger.commit_usage_in(&mut tx, key, total_days).await?;

        if !Repository::record_decision(&mut tx, &request).await? {
            return Err(anyhow::anyhow!("Leave request {} changed during approval", request_id).into());
        }
        tx.commit().await.context("Failed to commit approval")?;

        tracing::info!(
            request_id = %request.id,
            employee_id = request.employee_id,
            approved_by = approver.id,
            total_days,
            remaining = balance.remaining(),
            "leave request approved"
        );
        Ok(request)
    }

    /// Reject a pending request. Balances are never touched.
    pub async fn reject(
        &self,
        request_id: RequestId,
        approver: &Principal,
        rejection_reason: &str,
    ) -> Result<LeaveRequest, AppError> {
        if !approver.is_admin() {
            return Err(AppError::Unauthorized("reject"));
        }
        self.require_known(approver).await?;

        let rejection_reason = rejection_reason.trim();
        if rejection_reason.is_empty() {
            return Err(AppError::MissingRejectionReason);
        }

        let mut request = self.get(request_id).await?;
        require_pending(&request, RequestStatus::Rejected)?;

        let _guard = self.ledger.lock(request.balance_key()).await;

        request
            .reject(approver.id, rejection_reason, self.clock.now())
            .map_err(|e| AppError::from_transition(request_id, e))?;

        let mut tx = self.repo.begin().await?;
        if !Repository::record_decision(&mut tx, &request).await? {
            drop(tx);
            let current = self.get(request_id).await?;
            return Err(AppError::NotPending {
                id: request_id,
                current: current.status,
                target: RequestStatus::Rejected,
            });
        }
        tx.commit().await.context("Failed to commit rejection")?;

        tracing::info!(
            request_id = %request.id,
            employee_id = request.employee_id,
            rejected_by = approver.id,
            "leave request rejected"
        );
        Ok(request)
    }

    // Employees are never removed, so a check outside the decision's
    // transaction stays valid until it commits.
    async fn require_known(&self, approver: &Principal) -> Result<(), AppError> {
        match self.repo.get_employee(approver.id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::EmployeeNotFound(approver.id)),
        }
    }
}

fn require_pending(request: &LeaveRequest, target: RequestStatus) -> Result<(), AppError> {
    if request.is_pending() {
        Ok(())
    } else {
        Err(AppError::NotPending {
            id: request.id,
            current: request.status,
            target,
        })
    }
}
