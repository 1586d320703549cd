use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{Days, EmployeeId, RequestId, RequestStatus, TransitionError};

/// Broad failure classes callers map onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Conflict,
    InvalidState,
    Unauthorized,
    Internal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Employee not found: {0}")]
    EmployeeNotFound(EmployeeId),

    #[error("Leave request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("Leave balance not found for employee {employee_id} in {year}")]
    BalanceNotFound { employee_id: EmployeeId, year: i32 },

    #[error("End date must not precede start date ({start} .. {end})")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error(
        "Insufficient leave balance: {remaining} days remaining but {requested} days requested"
    )]
    InsufficientBalance { remaining: Days, requested: Days },

    #[error("Invalid number of days: {0}")]
    InvalidDays(Days),

    #[error("Rejection reason is required")]
    MissingRejectionReason,

    #[error("Invalid employee: {0}")]
    InvalidEmployee(String),

    #[error("Approved leave already exists in this period ({start} .. {end})")]
    OverlappingLeave {
        existing: RequestId,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Only pending requests can be {target} (request {id} is {current})")]
    NotPending {
        id: RequestId,
        current: RequestStatus,
        target: RequestStatus,
    },

    #[error("Only admins can {0} leave requests")]
    Unauthorized(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::EmployeeNotFound(_)
            | AppError::RequestNotFound(_)
            | AppError::BalanceNotFound { .. } => ErrorKind::NotFound,
            AppError::InvalidDateRange { .. }
            | AppError::InsufficientBalance { .. }
            | AppError::InvalidDays(_)
            | AppError::MissingRejectionReason
            | AppError::InvalidEmployee(_) => ErrorKind::InvalidArgument,
            AppError::OverlappingLeave { .. } => ErrorKind::Conflict,
            AppError::NotPending { .. } => ErrorKind::InvalidState,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Database(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn from_transition(id: RequestId, err: TransitionError) -> Self {
        match err {
            TransitionError::NotPending { current, target } => AppError::NotPending {
                id,
                current,
                target,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AppError::EmployeeNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(
            AppError::InsufficientBalance {
                remaining: 3,
                requested: 5
            }
            .kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(AppError::MissingRejectionReason.kind(), ErrorKind::InvalidArgument);
        assert_eq!(AppError::Unauthorized("approve").kind(), ErrorKind::Unauthorized);
        assert_eq!(
            AppError::Database(anyhow::anyhow!("disk full")).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_insufficient_balance_message_has_both_counts() {
        let message = AppError::InsufficientBalance {
            remaining: 3,
            requested: 5,
        }
        .to_string();

        assert!(message.contains("3 days remaining"));
        assert!(message.contains("5 days requested"));
    }

    #[test]
    fn test_transition_error_maps_to_invalid_state() {
        let id = Uuid::new_v4();
        let err = AppError::from_transition(
            id,
            TransitionError::NotPending {
                current: RequestStatus::Rejected,
                target: RequestStatus::Approved,
            },
        );

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().starts_with("Only pending requests can be approved"));
    }
}
