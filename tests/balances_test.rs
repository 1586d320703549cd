mod common;

use anyhow::Result;
use common::{Team, date, parse_datetime, test_service};
use leaveledger::application::{ErrorKind, NewEmployee};
use leaveledger::domain::{RequestStatus, Role};

#[tokio::test]
async fn test_balance_opens_from_entitlement() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let dana = service
        .add_employee(NewEmployee::new("Dana Kim", Role::Employee).with_entitlement(20))
        .await?;

    let balance = service.ledger().get_or_create(dana.id, 2024).await?;
    assert_eq!(balance.employee_id, dana.id);
    assert_eq!(balance.year, 2024);
    assert_eq!(balance.entitlement, 20);
    assert_eq!(balance.carried_over, 0);
    assert_eq!(balance.used, 0);
    assert_eq!(balance.remaining(), 20);

    // Opening is idempotent
    let again = service.ledger().get_or_create(dana.id, 2024).await?;
    assert_eq!(again.id, balance.id);
    assert_eq!(service.ledger().list_for_year(2024).await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_balance_for_unknown_employee_is_not_found() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;

    let err = service.ledger().get_or_create(7, 2024).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.ledger().remaining(7, 2024).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_commit_usage() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;

    // No balance opened yet
    let err = service
        .ledger()
        .commit_usage(team.alice.id, 2024, 2)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    service.ledger().get_or_create(team.alice.id, 2024).await?;

    for days in [0, -3] {
        let err = service
            .ledger()
            .commit_usage(team.alice.id, 2024, days)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    let balance = service.ledger().commit_usage(team.alice.id, 2024, 2).await?;
    assert_eq!(balance.used, 2);
    let balance = service.ledger().commit_usage(team.alice.id, 2024, 3).await?;
    assert_eq!(balance.used, 5);
    assert_eq!(service.ledger().remaining(team.alice.id, 2024).await?, 7);

    Ok(())
}

#[tokio::test]
async fn test_list_for_year_includes_names() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;

    service.ledger().get_or_create(team.bob.id, 2024).await?;
    service.ledger().get_or_create(team.alice.id, 2024).await?;
    service.ledger().get_or_create(team.alice.id, 2025).await?;

    let entries = service.ledger().list_for_year(2024).await?;
    let names: Vec<_> = entries.iter().map(|e| e.employee_name.as_str()).collect();
    assert_eq!(names, vec!["Alice Martin", "Bob Stone"]);
    assert!(entries.iter().all(|e| e.balance.year == 2024));

    assert_eq!(service.ledger().list_for_year(2025).await?.len(), 1);
    assert!(service.ledger().list_for_year(2023).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_current_year_balance_follows_clock() -> Result<()> {
    let (service, clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;

    let entry = service.ledger().current_year_balance(team.bob.id).await?;
    assert_eq!(entry.balance.year, 2024);
    assert_eq!(entry.employee_name, "Bob Stone");

    clock.set(parse_datetime("2025-01-02T08:00:00Z"));
    let entry = service.ledger().current_year_balance(team.bob.id).await?;
    assert_eq!(entry.balance.year, 2025);
    assert_eq!(entry.balance.remaining(), 12);

    Ok(())
}

#[tokio::test]
async fn test_zero_entitlement_blocks_requests() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let zero = service
        .add_employee(NewEmployee::new("Eli Novak", Role::Employee).with_entitlement(0))
        .await?;

    let balance = service.ledger().get_or_create(zero.id, 2024).await?;
    assert_eq!(balance.remaining(), 0);

    let err = service
        .workflow()
        .create(zero.id, date("2024-03-01"), date("2024-03-01"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_never_overspend() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;
    let approver = team.approver();

    // 8 + 8 days against 12: only one can be approved
    let first = service
        .workflow()
        .create(team.alice.id, date("2024-06-03"), date("2024-06-10"), None)
        .await?;
    let second = service
        .workflow()
        .create(team.alice.id, date("2024-07-01"), date("2024-07-08"), None)
        .await?;

    let (a, b) = tokio::join!(
        service.workflow().approve(first.id, &approver),
        service.workflow().approve(second.id, &approver)
    );

    let outcomes = [a, b];
    let approved = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(approved, 1);
    for err in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    let balance = service.ledger().get_or_create(team.alice.id, 2024).await?;
    assert_eq!(balance.used, 8);
    assert_eq!(balance.remaining(), 4);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_request_approved_concurrently_charges_once() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;
    let approver = team.approver();

    let request = service
        .workflow()
        .create(team.bob.id, date("2024-03-04"), date("2024-03-06"), None)
        .await?;

    let (a, b) = tokio::join!(
        service.workflow().approve(request.id, &approver),
        service.workflow().approve(request.id, &approver)
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    for err in outcomes.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    assert_eq!(service.ledger().remaining(team.bob.id, 2024).await?, 9);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_both_stay_pending() -> Result<()> {
    let (service, _clock, _temp) = test_service().await?;
    let team = Team::create(&service).await?;

    // Each fits the balance on its own; creation never spends days
    let (a, b) = tokio::join!(
        service
            .workflow()
            .create(team.alice.id, date("2024-06-03"), date("2024-06-10"), None),
        service
            .workflow()
            .create(team.alice.id, date("2024-07-01"), date("2024-07-08"), None)
    );

    assert_eq!(a?.status, RequestStatus::Pending);
    assert_eq!(b?.status, RequestStatus::Pending);
    assert_eq!(service.ledger().list_for_year(2024).await?.len(), 1);
    assert_eq!(service.ledger().remaining(team.alice.id, 2024).await?, 12);

    Ok(())
}
