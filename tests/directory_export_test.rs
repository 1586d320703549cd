mod common;

use anyhow::Result;
use common::{Team, date, test_service};
use leaveledger::application::{ErrorKind, NewEmployee};
use leaveledger::domain::{DEFAULT_ANNUAL_ENTITLEMENT, Role};
use leaveledger::io::{BalanceReport, Exporter};

#[tokio::test]
async fn test_add_and_list_employees() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;

    let mut new = NewEmployee::new("  Zoe Park ", Role::Admin);
    new.position = Some("Head of People".into());
    new.department = Some("HR".into());
    let zoe = service.add_employee(new).await?;
    let abe = service
        .add_employee(NewEmployee::new("Abe Cole", Role::Employee))
        .await?;

    assert_eq!(zoe.full_name, "Zoe Park");
    assert!(zoe.is_admin());
    assert_eq!(zoe.department.as_deref(), Some("HR"));
    assert_eq!(abe.annual_leave_entitlement, DEFAULT_ANNUAL_ENTITLEMENT);
    assert_ne!(zoe.id, abe.id);

    let stored = service.get_employee(zoe.id).await?;
    assert_eq!(stored.position.as_deref(), Some("Head of People"));
    assert_eq!(stored.role, Role::Admin);

    let names: Vec<_> = service
        .list_employees()
        .await?
        .into_iter()
        .map(|e| e.full_name)
        .collect();
    assert_eq!(names, vec!["Abe Cole", "Zoe Park"]);

    Ok(())
}

#[tokio::test]
async fn test_add_employee_validates_input() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;

    let err = service
        .add_employee(NewEmployee::new("   ", Role::Employee))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = service
        .add_employee(NewEmployee::new("Ivy Moss", Role::Employee).with_entitlement(-1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    assert!(service.list_employees().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_authenticate() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;

    let principal = service.authenticate(team.admin.id).await?;
    assert_eq!(principal.id, team.admin.id);
    assert!(principal.is_admin());
    assert!(!service.authenticate(team.alice.id).await?.is_admin());

    let err = service.authenticate(404).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_export_balances() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;

    let request = service
        .workflow()
        .create(team.alice.id, date("2024-03-01"), date("2024-03-05"), None)
        .await?;
    service
        .workflow()
        .approve(request.id, &team.approver())
        .await?;
    service.ledger().get_or_create(team.bob.id, 2024).await?;

    let exporter = Exporter::new(&service);

    let mut csv_out = Vec::new();
    let count = exporter.export_balances_csv(&mut csv_out, 2024).await?;
    assert_eq!(count, 2);

    let csv_text = String::from_utf8(csv_out)?;
    let lines: Vec<_> = csv_text.lines().collect();
    assert_eq!(
        lines[0],
        "employee_id,employee_name,year,entitlement,carried_over,used,remaining"
    );
    assert_eq!(
        lines[1],
        format!("{},Alice Martin,2024,12,0,5,7", team.alice.id)
    );
    assert_eq!(lines[2], format!("{},Bob Stone,2024,12,0,0,12", team.bob.id));

    let mut json_out = Vec::new();
    exporter.export_balances_json(&mut json_out, 2024).await?;
    let report: BalanceReport = serde_json::from_slice(&json_out)?;
    assert_eq!(report.year, 2024);
    assert_eq!(report.exported_at, service.now());
    assert_eq!(report.balances.len(), 2);
    assert_eq!(report.balances[0].remaining, 7);

    Ok(())
}

#[tokio::test]
async fn test_export_requests() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;

    let request = service
        .workflow()
        .create(
            team.bob.id,
            date("2024-03-11"),
            date("2024-03-12"),
            Some("Moving house".into()),
        )
        .await?;
    service
        .workflow()
        .reject(request.id, &team.approver(), "Release week")
        .await?;
    service
        .workflow()
        .create(team.alice.id, date("2024-04-02"), date("2024-04-02"), None)
        .await?;

    let exporter = Exporter::new(&service);

    let mut csv_out = Vec::new();
    let count = exporter
        .export_requests_csv(&mut csv_out, Some(team.bob.id))
        .await?;
    assert_eq!(count, 1);

    let csv_text = String::from_utf8(csv_out)?;
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let headers = reader.headers()?.clone();
    let record = reader.records().next().unwrap()?;
    let field = |name: &str| {
        let index = headers.iter().position(|h| h == name).unwrap();
        record.get(index).unwrap().to_string()
    };
    assert_eq!(field("employee_name"), "Bob Stone");
    assert_eq!(field("total_days"), "2");
    assert_eq!(field("status"), "rejected");
    assert_eq!(field("reason"), "Moving house");
    assert_eq!(field("rejection_reason"), "Release week");
    assert_eq!(field("decided_by"), "Hana Admin");
    assert_eq!(field("requested_on"), "03/01/2024 - 09:00");

    let mut json_out = Vec::new();
    let count = exporter.export_requests_json(&mut json_out, None).await?;
    assert_eq!(count, 2);
    let views: serde_json::Value = serde_json::from_slice(&json_out)?;
    assert_eq!(views.as_array().map(|v| v.len()), Some(2));

    Ok(())
}
