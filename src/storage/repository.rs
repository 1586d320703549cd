use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::{
    BalanceId, BalanceKey, Days, Employee, EmployeeId, LeaveBalance, LeaveRequest, RequestId,
    RequestStatus, Role,
};

use super::MIGRATION_001_INITIAL;

const EMPLOYEE_COLUMNS: &str =
    "id, full_name, role, annual_leave_entitlement, position, department, created_at";

const BALANCE_COLUMNS: &str =
    "id, employee_id, year, entitlement, carried_over, used, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, employee_id, start_date, end_date, reason, status, rejection_reason, decided_by, decided_at, created_at";

/// Repository for the employee directory, leave balances and leave requests.
///
/// Methods taking `&self` run on a pooled connection. The associated functions
/// taking a `SqliteConnection` are the building blocks of multi-statement
/// operations and are meant to run inside a transaction from [`Repository::begin`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a transaction. Dropping it without commit rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    // ========================
    // Employee directory
    // ========================

    /// Insert a new employee and assign its id.
    pub async fn save_employee(&self, employee: &mut Employee) -> Result<()> {
        let row = sqlx::query(
            r#"
            INSERT INTO employees (full_name, role, annual_leave_entitlement, position, department, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&employee.full_name)
        .bind(employee.role.as_str())
        .bind(employee.annual_leave_entitlement)
        .bind(&employee.position)
        .bind(&employee.department)
        .bind(format_timestamp(employee.created_at))
        .fetch_one(&self.pool)
        .await
        .context("Failed to save employee")?;

        employee.id = row.get("id");
        Ok(())
    }

    /// Get an employee by ID.
    pub async fn get_employee(&self, id: EmployeeId) -> Result<Option<Employee>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        Self::find_employee(&mut conn, id).await
    }

    /// Get an employee by ID on the given connection.
    pub async fn find_employee(
        conn: &mut SqliteConnection,
        id: EmployeeId,
    ) -> Result<Option<Employee>> {
        let row = sqlx::query(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch employee")?;

        row.as_ref().map(Self::row_to_employee).transpose()
    }

    /// List all employees ordered by name.
    pub async fn list_employees(&self) -> Result<Vec<Employee>> {
        let rows = sqlx::query(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY full_name, id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list employees")?;

        rows.iter().map(Self::row_to_employee).collect()
    }

    fn row_to_employee(row: &sqlx::sqlite::SqliteRow) -> Result<Employee> {
        let role_str: String = row.get("role");
        let created_at_str: String = row.get("created_at");

        Ok(Employee {
            id: row.get("id"),
            full_name: row.get("full_name"),
            role: Role::from_str(&role_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid role: {}", role_str))?,
            annual_leave_entitlement: row.get("annual_leave_entitlement"),
            position: row.get("position"),
            department: row.get("department"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    // ========================
    // Leave balances
    // ========================

    /// Open the balance for `key` unless one exists, seeding its entitlement
    /// from the employee's annual entitlement. Inserts nothing when the
    /// employee is unknown. Returns true when a row was inserted.
    ///
    /// Takes the database write lock. Transactions that write must call
    /// this before any read.
    pub async fn ensure_balance(
        conn: &mut SqliteConnection,
        key: BalanceKey,
        id: BalanceId,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now = format_timestamp(now);
        let result = sqlx::query(
            r#"
            INSERT INTO leave_balances (id, employee_id, year, entitlement, carried_over, used, created_at, updated_at)
            SELECT ?, e.id, ?, e.annual_leave_entitlement, 0, 0, ?, ?
            FROM employees e
            WHERE e.id = ?
            ON CONFLICT (employee_id, year) DO NOTHING
            "#,
        )
        .bind(id.to_string())
        .bind(key.year)
        .bind(&now)
        .bind(&now)
        .bind(key.employee_id)
        .execute(&mut *conn)
        .await
        .context("Failed to open leave balance")?;

        Ok(result.rows_affected() == 1)
    }

    /// Get the balance for an (employee, year) pair.
    pub async fn find_balance(
        conn: &mut SqliteConnection,
        key: BalanceKey,
    ) -> Result<Option<LeaveBalance>> {
        let row = sqlx::query(&format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances WHERE employee_id = ? AND year = ?"
        ))
        .bind(key.employee_id)
        .bind(key.year)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch leave balance")?;

        row.as_ref().map(Self::row_to_balance).transpose()
    }

    /// Add `days` to the used counter of a balance.
    /// Returns the updated balance, or None when no balance exists for the key.
    pub async fn add_used_days(
        conn: &mut SqliteConnection,
        key: BalanceKey,
        days: Days,
        now: DateTime<Utc>,
    ) -> Result<Option<LeaveBalance>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE leave_balances
            SET used = used + ?, updated_at = ?
            WHERE employee_id = ? AND year = ?
            RETURNING {BALANCE_COLUMNS}
            "#
        ))
        .bind(days)
        .bind(format_timestamp(now))
        .bind(key.employee_id)
        .bind(key.year)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to update used days")?;

        row.as_ref().map(Self::row_to_balance).transpose()
    }

    /// List every balance of a year together with the employee's name.
    pub async fn list_balances_for_year(&self, year: i32) -> Result<Vec<(LeaveBalance, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.employee_id, b.year, b.entitlement, b.carried_over, b.used,
                   b.created_at, b.updated_at, e.full_name
            FROM leave_balances b
            JOIN employees e ON e.id = b.employee_id
            WHERE b.year = ?
            ORDER BY e.full_name, b.employee_id
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list leave balances")?;

        rows.iter()
            .map(|row| -> Result<(LeaveBalance, String)> {
                Ok((Self::row_to_balance(row)?, row.get("full_name")))
            })
            .collect()
    }

    fn row_to_balance(row: &sqlx::sqlite::SqliteRow) -> Result<LeaveBalance> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        Ok(LeaveBalance {
            id: Uuid::parse_str(&id_str).context("Invalid balance ID")?,
            employee_id: row.get("employee_id"),
            year: row.get("year"),
            entitlement: row.get("entitlement"),
            carried_over: row.get("carried_over"),
            used: row.get("used"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at timestamp")?,
        })
    }

    // ========================
    // Leave requests
    // ========================

    /// Save a new leave request.
    pub async fn insert_request(conn: &mut SqliteConnection, request: &LeaveRequest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO leave_requests (id, employee_id, start_date, end_date, reason, status, rejection_reason, decided_by, decided_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.id.to_string())
        .bind(request.employee_id)
        .bind(day_number(request.start_date))
        .bind(day_number(request.end_date))
        .bind(&request.reason)
        .bind(request.status.as_str())
        .bind(&request.rejection_reason)
        .bind(request.decided_by)
        .bind(request.decided_at.map(format_timestamp))
        .bind(format_timestamp(request.created_at))
        .execute(&mut *conn)
        .await
        .context("Failed to save leave request")?;
        Ok(())
    }

    /// Persist the decision on a request that is still pending in the store.
    /// Returns false when the stored request was no longer pending.
    pub async fn record_decision(
        conn: &mut SqliteConnection,
        request: &LeaveRequest,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, rejection_reason = ?, decided_by = ?, decided_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(request.status.as_str())
        .bind(&request.rejection_reason)
        .bind(request.decided_by)
        .bind(request.decided_at.map(format_timestamp))
        .bind(request.id.to_string())
        .execute(&mut *conn)
        .await
        .context("Failed to record decision")?;

        Ok(result.rows_affected() == 1)
    }

    /// Get a leave request by ID.
    pub async fn get_request(&self, id: RequestId) -> Result<Option<LeaveRequest>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        Self::find_request(&mut conn, id).await
    }

    /// Get a leave request by ID on the given connection.
    pub async fn find_request(
        conn: &mut SqliteConnection,
        id: RequestId,
    ) -> Result<Option<LeaveRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch leave request")?;

        row.as_ref().map(Self::row_to_request).transpose()
    }

    /// Approved requests of an employee intersecting the inclusive range `[start, end]`.
    pub async fn find_approved_overlapping(
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<LeaveRequest>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM leave_requests
            WHERE employee_id = ? AND status = 'approved'
              AND start_date <= ? AND end_date >= ?
            ORDER BY start_date
            "#
        ))
        .bind(employee_id)
        .bind(day_number(end))
        .bind(day_number(start))
        .fetch_all(&mut *conn)
        .await
        .context("Failed to query overlapping requests")?;

        rows.iter().map(Self::row_to_request).collect()
    }

    /// List all requests, newest first.
    pub async fn list_requests(&self) -> Result<Vec<LeaveRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list leave requests")?;

        rows.iter().map(Self::row_to_request).collect()
    }

    /// List the requests of one employee, newest first.
    pub async fn list_requests_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<LeaveRequest>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM leave_requests
            WHERE employee_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#
        ))
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list leave requests for employee")?;

        rows.iter().map(Self::row_to_request).collect()
    }

    fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<LeaveRequest> {
        let id_str: String = row.get("id");
        let start_day: i32 = row.get("start_date");
        let end_day: i32 = row.get("end_date");
        let status_str: String = row.get("status");
        let decided_at_str: Option<String> = row.get("decided_at");
        let created_at_str: String = row.get("created_at");

        Ok(LeaveRequest {
            id: Uuid::parse_str(&id_str).context("Invalid request ID")?,
            employee_id: row.get("employee_id"),
            start_date: date_from_day_number(start_day).context("Invalid start_date")?,
            end_date: date_from_day_number(end_day).context("Invalid end_date")?,
            reason: row.get("reason"),
            status: RequestStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid request status: {}", status_str))?,
            rejection_reason: row.get("rejection_reason"),
            decided_by: row.get("decided_by"),
            decided_at: decided_at_str
                .map(|s| parse_timestamp(&s))
                .transpose()
                .context("Invalid decided_at timestamp")?,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }
}

// Fixed-width UTC timestamps keep text ordering equal to time ordering.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Calendar dates are stored as days since 0001-01-01 (day 1) so that SQL
/// comparisons follow calendar order for every representable year.
fn day_number(date: NaiveDate) -> i32 {
    date.num_days_from_ce()
}

fn date_from_day_number(days: i32) -> Result<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days)
        .ok_or_else(|| anyhow::anyhow!("Day number out of range: {}", days))
}
