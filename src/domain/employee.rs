use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EmployeeId = i64;

/// Annual leave days granted to a new employee unless stated otherwise.
pub const DEFAULT_ANNUAL_ENTITLEMENT: i64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "employee" => Some(Role::Employee),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A person known to the employee directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    /// Assigned by the directory on insert
    pub id: EmployeeId,
    pub full_name: String,
    pub role: Role,
    /// Days granted per year; copied into each newly created balance
    pub annual_leave_entitlement: i64,
    pub position: Option<String>,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    /// Create an employee that has not been stored yet (id is 0 until saved).
    pub fn new(full_name: impl Into<String>, role: Role, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            full_name: full_name.into(),
            role,
            annual_leave_entitlement: DEFAULT_ANNUAL_ENTITLEMENT,
            position: None,
            department: None,
            created_at,
        }
    }

    pub fn with_entitlement(mut self, days: i64) -> Self {
        self.annual_leave_entitlement = days;
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// The authenticated identity of this employee.
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            role: self.role,
        }
    }
}

/// An already-authenticated caller. Deciding on leave requests requires
/// a principal with the admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: EmployeeId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: EmployeeId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
