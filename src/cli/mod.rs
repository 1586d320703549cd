use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::stdout;
use uuid::Uuid;

use crate::application::{LeaveService, NewEmployee};
use crate::domain::{EmployeeId, Role, days_taken_label};
use crate::io::Exporter;

/// Leaveledger - Annual leave balances and requests
#[derive(Parser)]
#[command(name = "leaveledger")]
#[command(about = "Track annual leave entitlement and decide leave requests against it")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(
        short,
        long,
        env = "LEAVELEDGER_DATABASE",
        default_value = "leaveledger.db"
    )]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Employee directory commands
    #[command(subcommand)]
    Employee(EmployeeCommands),

    /// Leave balance commands
    #[command(subcommand)]
    Balance(BalanceCommands),

    /// Leave request commands
    #[command(subcommand)]
    Request(RequestCommands),
}

#[derive(Subcommand)]
pub enum EmployeeCommands {
    /// Add an employee
    Add {
        /// Full name
        name: String,

        /// Role: employee, admin
        #[arg(short, long, default_value = "employee")]
        role: String,

        /// Annual leave entitlement in days (defaults to 12)
        #[arg(short, long)]
        entitlement: Option<i64>,

        /// Job position
        #[arg(long)]
        position: Option<String>,

        /// Department
        #[arg(long)]
        department: Option<String>,
    },

    /// List all employees
    List,

    /// Show an employee and their balance for the current year
    Show {
        /// Employee ID
        id: EmployeeId,
    },
}

#[derive(Subcommand)]
pub enum BalanceCommands {
    /// Show the balance of one employee
    Show {
        /// Employee ID
        employee: EmployeeId,

        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },

    /// List all balances of a year
    List {
        /// Year (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
pub enum RequestCommands {
    /// File a leave request
    Create {
        /// Employee requesting leave
        #[arg(long)]
        employee: EmployeeId,

        /// First day of leave (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Last day of leave, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Reason for the leave
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// List leave requests, newest first
    List {
        /// Only requests of this employee
        #[arg(long)]
        employee: Option<EmployeeId>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Approve a pending request
    Approve {
        /// Request ID
        id: String,

        /// Admin deciding the request
        #[arg(long = "as")]
        admin: EmployeeId,
    },

    /// Reject a pending request
    Reject {
        /// Request ID
        id: String,

        /// Admin deciding the request
        #[arg(long = "as")]
        admin: EmployeeId,

        /// Why the request is rejected
        #[arg(short, long)]
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl Cli {
    /// Install the stderr log subscriber. `--verbose` lowers the threshold to debug.
    pub fn init_tracing(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        };

        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(level)
            .with_target(false)
            .init();
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LeaveService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Employee(employee_cmd) => {
                let service = LeaveService::connect(&self.database).await?;
                run_employee_command(&service, employee_cmd).await?;
            }

            Commands::Balance(balance_cmd) => {
                let service = LeaveService::connect(&self.database).await?;
                run_balance_command(&service, balance_cmd).await?;
            }

            Commands::Request(request_cmd) => {
                let service = LeaveService::connect(&self.database).await?;
                run_request_command(&service, request_cmd).await?;
            }
        }

        Ok(())
    }
}

async fn run_employee_command(service: &LeaveService, cmd: EmployeeCommands) -> Result<()> {
    match cmd {
        EmployeeCommands::Add {
            name,
            role,
            entitlement,
            position,
            department,
        } => {
            let role = Role::from_str(&role).ok_or_else(|| {
                anyhow::anyhow!("Invalid role '{}'. Valid roles: employee, admin", role)
            })?;

            let mut new = NewEmployee::new(name, role);
            new.annual_leave_entitlement = entitlement;
            new.position = position;
            new.department = department;

            let employee = service.add_employee(new).await?;
            println!(
                "Added employee: {} ({}, id {}, {} days/year)",
                employee.full_name, employee.role, employee.id, employee.annual_leave_entitlement
            );
        }

        EmployeeCommands::List => {
            let employees = service.list_employees().await?;
            if employees.is_empty() {
                println!("No employees found.");
                return Ok(());
            }

            println!(
                "{:>6} {:<24} {:<9} {:>11} {:<20}",
                "ID", "NAME", "ROLE", "ENTITLEMENT", "DEPARTMENT"
            );
            println!("{}", "-".repeat(74));
            for employee in employees {
                println!(
                    "{:>6} {:<24} {:<9} {:>11} {:<20}",
                    employee.id,
                    truncate(&employee.full_name, 24),
                    employee.role,
                    employee.annual_leave_entitlement,
                    truncate(employee.department.as_deref().unwrap_or("-"), 20)
                );
            }
        }

        EmployeeCommands::Show { id } => {
            let employee = service.get_employee(id).await?;
            let entry = service.ledger().current_year_balance(id).await?;

            println!("Employee: {}", employee.full_name);
            println!("  ID:          {}", employee.id);
            println!("  Role:        {}", employee.role);
            println!(
                "  Position:    {}",
                employee.position.as_deref().unwrap_or("-")
            );
            println!(
                "  Department:  {}",
                employee.department.as_deref().unwrap_or("-")
            );
            println!(
                "  Entitlement: {} days/year",
                employee.annual_leave_entitlement
            );
            println!(
                "  {} balance: {} of {} days remaining",
                entry.balance.year,
                entry.balance.remaining(),
                entry.balance.available()
            );
        }
    }
    Ok(())
}

async fn run_balance_command(service: &LeaveService, cmd: BalanceCommands) -> Result<()> {
    let current_year = service.now().year();

    match cmd {
        BalanceCommands::Show { employee, year } => {
            let entry = service
                .ledger()
                .balance(employee, year.unwrap_or(current_year))
                .await?;
            let balance = &entry.balance;

            println!("{} - {}", entry.employee_name, balance.year);
            println!("  Entitlement:  {}", balance.entitlement);
            println!("  Carried over: {}", balance.carried_over);
            println!("  Used:         {}", balance.used);
            println!("  Remaining:    {}", balance.remaining());
        }

        BalanceCommands::List { year, format } => {
            let year = year.unwrap_or(current_year);
            let exporter = Exporter::new(service);

            match format {
                OutputFormat::Json => {
                    exporter.export_balances_json(stdout(), year).await?;
                    println!();
                }
                OutputFormat::Csv => {
                    exporter.export_balances_csv(stdout(), year).await?;
                }
                OutputFormat::Table => {
                    let entries = service.ledger().list_for_year(year).await?;
                    if entries.is_empty() {
                        println!("No balances for {}.", year);
                        return Ok(());
                    }

                    println!(
                        "{:<24} {:>11} {:>12} {:>6} {:>9}",
                        "EMPLOYEE", "ENTITLEMENT", "CARRIED OVER", "USED", "REMAINING"
                    );
                    println!("{}", "-".repeat(66));
                    for entry in entries {
                        println!(
                            "{:<24} {:>11} {:>12} {:>6} {:>9}",
                            truncate(&entry.employee_name, 24),
                            entry.balance.entitlement,
                            entry.balance.carried_over,
                            entry.balance.used,
                            entry.balance.remaining()
                        );
                    }
                }
            }
        }
    }
    Ok(())
}

async fn run_request_command(service: &LeaveService, cmd: RequestCommands) -> Result<()> {
    match cmd {
        RequestCommands::Create {
            employee,
            from,
            to,
            reason,
        } => {
            let start_date = parse_date(&from)
                .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", from))?;
            let end_date = parse_date(&to)
                .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", to))?;

            let request = service
                .workflow()
                .create(employee, start_date, end_date, reason)
                .await?;
            println!(
                "Created leave request: {} .. {} ({} days, {})",
                request.start_date,
                request.end_date,
                request.total_days(),
                request.id
            );
        }

        RequestCommands::List { employee, format } => {
            let exporter = Exporter::new(service);

            match format {
                OutputFormat::Json => {
                    exporter.export_requests_json(stdout(), employee).await?;
                    println!();
                }
                OutputFormat::Csv => {
                    exporter.export_requests_csv(stdout(), employee).await?;
                }
                OutputFormat::Table => {
                    let requests = match employee {
                        Some(id) => service.workflow().list_for_employee(id).await?,
                        None => service.workflow().list_all().await?,
                    };
                    if requests.is_empty() {
                        println!("No leave requests found.");
                        return Ok(());
                    }

                    let views = service.describe_requests(requests).await?;
                    println!(
                        "{:<36} {:<20} {:<10} {:<10} {:>10} {:<8} {:<18}",
                        "ID", "EMPLOYEE", "FROM", "TO", "DAYS", "STATUS", "REQUESTED"
                    );
                    println!("{}", "-".repeat(118));
                    for view in views {
                        println!(
                            "{:<36} {:<20} {:<10} {:<10} {:>10} {:<8} {:<18}",
                            view.request.id,
                            truncate(&view.employee_name, 20),
                            view.request.start_date,
                            view.request.end_date,
                            view.days_taken,
                            view.request.status,
                            view.requested_on
                        );
                    }
                }
            }
        }

        RequestCommands::Approve { id, admin } => {
            let request_id = parse_request_id(&id)?;
            let principal = service.authenticate(admin).await?;

            let request = service.workflow().approve(request_id, &principal).await?;
            let employee = service.get_employee(request.employee_id).await?;
            let remaining = service
                .ledger()
                .remaining(request.employee_id, request.balance_year())
                .await?;

            println!(
                "Approved leave for {}: {} .. {} ({})",
                employee.full_name,
                request.start_date,
                request.end_date,
                days_taken_label(request.total_days(), employee.annual_leave_entitlement)
            );
            println!(
                "Remaining in {}: {} days",
                request.balance_year(),
                remaining
            );
        }

        RequestCommands::Reject { id, admin, reason } => {
            let request_id = parse_request_id(&id)?;
            let principal = service.authenticate(admin).await?;

            let request = service
                .workflow()
                .reject(request_id, &principal, &reason)
                .await?;
            println!(
                "Rejected leave request {}: {}",
                request.id,
                request.rejection_reason.as_deref().unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn parse_request_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid request ID format (expected UUID)")
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").context("Date must be in YYYY-MM-DD format")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
