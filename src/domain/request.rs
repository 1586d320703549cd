use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BalanceKey, Days, EmployeeId};

pub type RequestId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Number of days in the inclusive range `[start, end]`.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> Days {
    (end - start).num_days() + 1
}

/// A request for annual leave over an inclusive date range.
///
/// Requests start out pending and are decided exactly once, either approved
/// (charging the balance of the start date's year) or rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: RequestId,
    pub employee_id: EmployeeId,
    pub start_date: NaiveDate,
    /// Last day of leave, inclusive
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub status: RequestStatus,
    /// Present only on rejected requests
    pub rejection_reason: Option<String>,
    /// Admin who approved or rejected the request
    pub decided_by: Option<EmployeeId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Create a pending request. Callers validate the range beforehand.
    pub fn new(
        employee_id: EmployeeId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Self {
        assert!(end_date >= start_date, "Leave must not end before it starts");
        Self {
            id: Uuid::new_v4(),
            employee_id,
            start_date,
            end_date,
            reason: None,
            status: RequestStatus::Pending,
            rejection_reason: None,
            decided_by: None,
            decided_at: None,
            created_at,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn total_days(&self) -> Days {
        inclusive_days(self.start_date, self.end_date)
    }

    /// Year whose balance pays for this request, even when it runs into the next one.
    pub fn balance_year(&self) -> i32 {
        self.start_date.year()
    }

    pub fn balance_key(&self) -> BalanceKey {
        BalanceKey::new(self.employee_id, self.balance_year())
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn approve(&mut self, by: EmployeeId, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_pending(RequestStatus::Approved)?;
        self.status = RequestStatus::Approved;
        self.decided_by = Some(by);
        self.decided_at = Some(at);
        Ok(())
    }

    pub fn reject(
        &mut self,
        by: EmployeeId,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_pending(RequestStatus::Rejected)?;
        self.status = RequestStatus::Rejected;
        self.rejection_reason = Some(reason.into());
        self.decided_by = Some(by);
        self.decided_at = Some(at);
        Ok(())
    }

    fn ensure_pending(&self, target: RequestStatus) -> Result<(), TransitionError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(TransitionError::NotPending {
                current: self.status,
                target,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    NotPending {
        current: RequestStatus,
        target: RequestStatus,
    },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::NotPending { current, target } => {
                write!(
                    f,
                    "Only pending requests can be {} (request is {})",
                    target, current
                )
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// "DD/EE days": days requested over the yearly entitlement, e.g. "05/12 days".
pub fn days_taken_label(total_days: Days, entitlement: Days) -> String {
    format!("{:02}/{} days", total_days, entitlement)
}

/// "MM/dd/yyyy - HH:mm" rendering of when a request was filed.
pub fn request_date_label(created_at: DateTime<Utc>) -> String {
    created_at.format("%m/%d/%Y - %H:%M").to_string()
}
