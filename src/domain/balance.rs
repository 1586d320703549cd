use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EmployeeId;

pub type BalanceId = Uuid;

/// Leave days are whole days.
pub type Days = i64;

/// Key a balance is unique under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    pub employee_id: EmployeeId,
    pub year: i32,
}

impl BalanceKey {
    pub fn new(employee_id: EmployeeId, year: i32) -> Self {
        Self { employee_id, year }
    }
}

/// Leave allotment and usage of one employee for one calendar year.
/// Only `used` changes after creation, and it only grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub id: BalanceId,
    pub employee_id: EmployeeId,
    pub year: i32,
    pub entitlement: Days,
    /// Managed outside this system; never written here
    pub carried_over: Days,
    pub used: Days,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveBalance {
    pub fn available(&self) -> Days {
        self.entitlement + self.carried_over
    }

    /// Days still available: entitlement + carried over - used.
    pub fn remaining(&self) -> Days {
        self.available() - self.used
    }

    pub fn covers(&self, days: Days) -> bool {
        self.remaining() >= days
    }
}
