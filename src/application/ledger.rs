use std::sync::Arc;

use anyhow::Context;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::domain::{BalanceKey, Days, EmployeeId, LeaveBalance};
use crate::storage::Repository;

use super::{AppError, Clock, KeyedLocks};

/// Balance of one employee for one year, with the employee's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub balance: LeaveBalance,
    pub employee_name: String,
}

/// Owns the per-(employee, year) leave balances.
///
/// Balances are opened lazily from the employee's annual entitlement the
/// first time a year is touched, and afterwards only ever gain used days.
pub struct BalanceLedger {
    repo: Repository,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl BalanceLedger {
    pub fn new(repo: Repository, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Serialize balance-affecting work on `key` until the guard is dropped.
    pub(crate) async fn lock(&self, key: BalanceKey) -> OwnedMutexGuard<()> {
        self.locks.lock(key).await
    }

    /// Get the balance of an employee for a year, opening it if needed.
    pub async fn get_or_create(
        &self,
        employee_id: EmployeeId,
        year: i32,
    ) -> Result<LeaveBalance, AppError> {
        let mut tx = self.repo.begin().await?;
        let balance = self
            .get_or_create_in(&mut tx, BalanceKey::new(employee_id, year))
            .await?;
        tx.commit().await.context("Failed to commit leave balance")?;
        Ok(balance)
    }

    pub(crate) async fn get_or_create_in(
        &self,
        conn: &mut SqliteConnection,
        key: BalanceKey,
    ) -> Result<LeaveBalance, AppError> {
        let opened =
            Repository::ensure_balance(conn, key, Uuid::new_v4(), self.clock.now()).await?;

        // Nothing stored and nothing opened means the employee is unknown
        let balance = Repository::find_balance(conn, key)
            .await?
            .ok_or(AppError::EmployeeNotFound(key.employee_id))?;

        if opened {
            tracing::debug!(
                employee_id = key.employee_id,
                year = key.year,
                entitlement = balance.entitlement,
                "opened leave balance"
            );
        }
        Ok(balance)
    }

    /// Days the employee can still take in `year`.
    pub async fn remaining(&self, employee_id: EmployeeId, year: i32) -> Result<Days, AppError> {
        Ok(self.get_or_create(employee_id, year).await?.remaining())
    }

    /// Charge `days` against an existing balance.
    ///
    /// Does not check that the balance covers the days; callers check
    /// sufficiency first while holding the key's lock.
    pub async fn commit_usage(
        &self,
        employee_id: EmployeeId,
        year: i32,
        days: Days,
    ) -> Result<LeaveBalance, AppError> {
        let key = BalanceKey::new(employee_id, year);
        let _guard = self.lock(key).await;

        let mut tx = self.repo.begin().await?;
        let balance = self.commit_usage_in(&mut tx, key, days).await?;
        tx.commit().await.context("Failed to commit used days")?;
        Ok(balance)
    }

    pub(crate) async fn commit_usage_in(
        &self,
        conn: &mut SqliteConnection,
        key: BalanceKey,
        days: Days,
    ) -> Result<LeaveBalance, AppError> {
        if days <= 0 {
            return Err(AppError::InvalidDays(days));
        }

        Repository::add_used_days(conn, key, days, self.clock.now())
            .await?
            .ok_or(AppError::BalanceNotFound {
                employee_id: key.employee_id,
                year: key.year,
            })
    }

    /// All balances opened for `year`, ordered by employee name.
    pub async fn list_for_year(&self, year: i32) -> Result<Vec<BalanceEntry>, AppError> {
        let rows = self.repo.list_balances_for_year(year).await?;
        Ok(rows
            .into_iter()
            .map(|(balance, employee_name)| BalanceEntry {
                balance,
                employee_name,
            })
            .collect())
    }

    /// Balance of an employee for a year together with the employee's name.
    pub async fn balance(
        &self,
        employee_id: EmployeeId,
        year: i32,
    ) -> Result<BalanceEntry, AppError> {
        let balance = self.get_or_create(employee_id, year).await?;
        let employee = self
            .repo
            .get_employee(employee_id)
            .await?
            .ok_or(AppError::EmployeeNotFound(employee_id))?;

        Ok(BalanceEntry {
            balance,
            employee_name: employee.full_name,
        })
    }

    /// Balance for the clock's current year.
    pub async fn current_year_balance(
        &self,
        employee_id: EmployeeId,
    ) -> Result<BalanceEntry, AppError> {
        let year = self.clock.now().year();
        self.balance(employee_id, year).await
    }
}
