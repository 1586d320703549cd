// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use leaveledger::application::{LeaveService, ManualClock, NewEmployee};
use leaveledger::domain::{Employee, Principal, Role};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database and a clock
/// fixed at 2024-03-01 09:00 UTC
pub async fn test_service() -> Result<(LeaveService, ManualClock, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let clock = ManualClock::new(parse_datetime("2024-03-01T09:00:00Z"));
    let service =
        LeaveService::init_with_clock(db_path.to_str().unwrap(), Arc::new(clock.clone())).await?;
    Ok((service, clock, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

/// Test fixture: a small team with one admin
pub struct Team {
    pub alice: Employee,
    pub bob: Employee,
    pub admin: Employee,
}

impl Team {
    /// Alice and Bob with the default 12 days, plus an admin
    pub async fn create(service: &LeaveService) -> Result<Self> {
        let alice = service
            .add_employee(NewEmployee::new("Alice Martin", Role::Employee))
            .await?;
        let bob = service
            .add_employee(NewEmployee::new("Bob Stone", Role::Employee))
            .await?;
        let admin = service
            .add_employee(NewEmployee::new("Hana Admin", Role::Admin))
            .await?;
        Ok(Self { alice, bob, admin })
    }

    pub fn approver(&self) -> Principal {
        self.admin.principal()
    }
}
