mod common;

use anyhow::Result;
use common::{all_services, balance, create_alice_and_bob, sqlite_service, transfer};
use ledgerd::application::{AppError, NewAccount, TransferRequest};
use serde_json::json;

#[tokio::test]
async fn test_scenario_create_and_list() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        create_alice_and_bob(&service).await?;

        let accounts = service.list_accounts().await?;
        let listed: Vec<(&str, i64)> = accounts
            .iter()
            .map(|a| (a.name.as_str(), a.balance))
            .collect();

        assert_eq!(listed, vec![("Alice", 10000), ("Bob", 5000)], "{store}");
    }
    Ok(())
}

#[tokio::test]
async fn test_list_order_is_stable() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        for name in ["Mallory", "Carol", "Dave"] {
            service.create_account(NewAccount::new(name, 1)).await?;
        }

        let first: Vec<String> = service.list_accounts().await?.into_iter().map(|a| a.name).collect();
        let second: Vec<String> = service.list_accounts().await?.into_iter().map(|a| a.name).collect();

        assert_eq!(first, vec!["Carol", "Dave", "Mallory"], "{store}");
        assert_eq!(first, second, "{store}");
    }
    Ok(())
}

#[tokio::test]
async fn test_scenario_transfer_then_overdraft() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        create_alice_and_bob(&service).await?;

        let receipt = service
            .transfer(TransferRequest::new("Alice", "Bob", 30))
            .await?;
        assert_eq!(receipt.from.name, "Alice");
        assert_eq!(receipt.from.new_balance, 7000, "{store}");
        assert_eq!(receipt.to.name, "Bob");
        assert_eq!(receipt.to.new_balance, 8000, "{store}");

        let result = service
            .transfer(TransferRequest::new("Alice", "Bob", 1000))
            .await;
        assert!(
            matches!(result, Err(AppError::InsufficientBalance { balance: 7000, required: 100000, .. })),
            "{store}: {result:?}"
        );

        assert_eq!(balance(&service, "Alice").await?, 7000, "{store}");
        assert_eq!(balance(&service, "Bob").await?, 8000, "{store}");
    }
    Ok(())
}

#[tokio::test]
async fn test_transfer_conserves_pair_total() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        create_alice_and_bob(&service).await?;

        for (from, to, amount) in [("Alice", "Bob", 12.34), ("Bob", "Alice", 0.01), ("Bob", "Alice", 61.0)] {
            let before = balance(&service, from).await? + balance(&service, to).await?;
            service.transfer(TransferRequest::new(from, to, amount)).await?;
            let after = balance(&service, from).await? + balance(&service, to).await?;
            assert_eq!(before, after, "{store}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_drain_account_to_zero() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        create_alice_and_bob(&service).await?;

        transfer(&service, "Bob", "Alice", 50).await?;

        assert_eq!(balance(&service, "Bob").await?, 0, "{store}");
        assert_eq!(balance(&service, "Alice").await?, 15000, "{store}");
        assert!(matches!(
            service.transfer(TransferRequest::new("Bob", "Alice", 0.01)).await,
            Err(AppError::InsufficientBalance { .. })
        ));
    }
    Ok(())
}

#[tokio::test]
async fn test_rejection_cases() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        create_alice_and_bob(&service).await?;

        let cases = [
            (TransferRequest::new("Alice", "Bob", 0), "non-positive"),
            (TransferRequest::new("Alice", "Bob", -5), "negative"),
            (TransferRequest::new("Alice", "Bob", -0.001), "negative fraction"),
            (TransferRequest::new("Alice", "Bob", 10.009), "sub-cent precision"),
            (TransferRequest::new("Alice", "Bob", json!("x")), "non-numeric"),
        ];
        for (request, label) in cases {
            assert!(
                matches!(service.transfer(request).await, Err(AppError::InvalidTransferDetails)),
                "{store}: {label}"
            );
        }

        assert!(matches!(
            service.transfer(TransferRequest::new("Alice", "Nobody", 1)).await,
            Err(AppError::ReceiverNotFound(name)) if name == "Nobody"
        ));
        assert!(matches!(
            service.transfer(TransferRequest::new("Nobody", "Bob", 1)).await,
            Err(AppError::SenderNotFound(name)) if name == "Nobody"
        ));
        assert!(matches!(
            service.transfer(TransferRequest::new("Ghost", "Nobody", 1)).await,
            Err(AppError::SenderNotFound(name)) if name == "Ghost"
        ));
        assert!(matches!(
            service.transfer(TransferRequest::new("Alice", "Alice", 1)).await,
            Err(AppError::SameAccount(name)) if name == "Alice"
        ));

        assert_eq!(balance(&service, "Alice").await?, 10000, "{store}");
        assert_eq!(balance(&service, "Bob").await?, 5000, "{store}");
    }
    Ok(())
}

#[tokio::test]
async fn test_duplicate_account() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        create_alice_and_bob(&service).await?;

        let result = service.create_account(NewAccount::new("Alice", 1)).await;

        assert!(
            matches!(result, Err(AppError::DuplicateAccount(ref name)) if name == "Alice"),
            "{store}: {result:?}"
        );
        assert_eq!(balance(&service, "Alice").await?, 10000, "{store}");
    }
    Ok(())
}

#[tokio::test]
async fn test_unknown_account_lookup() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        let result = service.get_account("Nobody").await;
        assert!(matches!(result, Err(AppError::AccountNotFound(_))), "{store}");
    }
    Ok(())
}

#[tokio::test]
async fn test_sqlite_state_survives_reconnect() -> Result<()> {
    let (service, temp) = sqlite_service().await?;
    create_alice_and_bob(&service).await?;
    transfer(&service, "Alice", "Bob", 30).await?;
    drop(service);

    let db_path = temp.path().join("test.db");
    let reopened = ledgerd::application::LedgerService::connect(
        db_path.to_str().unwrap(),
        &ledgerd::storage::StoreOptions::default(),
    )
    .await?;

    assert_eq!(balance(&reopened, "Alice").await?, 7000);
    assert_eq!(balance(&reopened, "Bob").await?, 8000);
    Ok(())
}

#[tokio::test]
async fn test_connect_to_missing_database_fails() -> Result<()> {
    let temp = tempfile::TempDir::new()?;
    let db_path = temp.path().join("missing.db");

    let result = ledgerd::application::LedgerService::connect(
        db_path.to_str().unwrap(),
        &ledgerd::storage::StoreOptions::default(),
    )
    .await;

    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    Ok(())
}
