// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use ledgerd::application::{LedgerService, NewAccount, TransferRequest};
use ledgerd::storage::StoreOptions;
use ledgerd::{Account, Cents};
use tempfile::TempDir;

/// Helper to create a test service with a temporary SQLite database
pub async fn sqlite_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), &StoreOptions::default()).await?;
    Ok((service, temp_dir))
}

/// Helper to create a test service over the in-memory store
pub fn memory_service() -> LedgerService {
    LedgerService::in_memory(&StoreOptions::default())
}

/// Both store flavours. The TempDir must outlive the SQLite service.
pub async fn all_services() -> Result<Vec<(&'static str, LedgerService, Option<TempDir>)>> {
    let (sqlite, temp) = sqlite_service().await?;
    Ok(vec![
        ("sqlite", sqlite, Some(temp)),
        ("memory", memory_service(), None),
    ])
}

/// Test fixture: Alice with 100.00 and Bob with 50.00
pub async fn create_alice_and_bob(service: &LedgerService) -> Result<()> {
    service.create_account(NewAccount::new("Alice", 100)).await?;
    service.create_account(NewAccount::new("Bob", 50)).await?;
    Ok(())
}

pub async fn transfer(service: &LedgerService, from: &str, to: &str, amount: i64) -> Result<()> {
    service
        .transfer(TransferRequest::new(from, to, amount))
        .await?;
    Ok(())
}

pub async fn balance(service: &LedgerService, name: &str) -> Result<Cents> {
    Ok(service.get_account(name).await?.balance)
}

pub fn total(accounts: &[Account]) -> Cents {
    accounts.iter().map(|a| a.balance).sum()
}
