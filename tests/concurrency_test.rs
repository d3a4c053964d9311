mod common;

use std::time::Duration;

use anyhow::Result;
use common::{all_services, create_alice_and_bob, total};
use ledgerd::application::{AppError, LedgerService, NewAccount, TransferRequest};
use tokio::task::JoinSet;

/// Generous bound: a deadlock shows up as this timeout rather than a hung test.
const DEADLOCK_GUARD: Duration = Duration::from_secs(60);

async fn run_transfers(
    service: &LedgerService,
    transfers: Vec<(&'static str, &'static str, i64)>,
) -> Result<Vec<Result<(), AppError>>> {
    let mut tasks = JoinSet::new();
    for (from, to, amount) in transfers {
        let service = service.clone();
        tasks.spawn(async move {
            service
                .transfer(TransferRequest::new(from, to, amount))
                .await
                .map(|_| ())
        });
    }

    let outcomes = tokio::time::timeout(DEADLOCK_GUARD, async {
        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined);
        }
        outcomes
    })
    .await?;

    Ok(outcomes.into_iter().collect::<Result<_, _>>()?)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_serialize() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        create_alice_and_bob(&service).await?;
        common::transfer(&service, "Alice", "Bob", 30).await?;

        // Alice=70, Bob=80
        let outcomes =
            run_transfers(&service, vec![("Alice", "Bob", 50), ("Bob", "Alice", 20)]).await?;
        for outcome in &outcomes {
            assert!(outcome.is_ok(), "{store}: {outcome:?}");
        }

        let accounts = service.list_accounts().await?;
        assert_eq!(total(&accounts), 15000, "{store}");
        // Both serial orders end in the same place when both succeed.
        assert_eq!(accounts[0].balance, 4000, "{store}");
        assert_eq!(accounts[1].balance, 11000, "{store}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_transfers_conserve_total() -> Result<()> {
    const NAMES: [&str; 4] = ["Alice", "Bob", "Carol", "Dave"];

    for (store, service, _temp) in all_services().await? {
        for name in NAMES {
            service.create_account(NewAccount::new(name, 100)).await?;
        }
        let initial = total(&service.list_accounts().await?);

        let mut transfers = Vec::new();
        for round in 0..50 {
            for (i, from) in NAMES.iter().enumerate() {
                let to = NAMES[(i + 1 + round % 3) % NAMES.len()];
                // Opposing pairs on every round
                transfers.push((*from, to, 7 + (round as i64 % 5)));
                transfers.push((to, *from, 3));
            }
        }

        let outcomes = run_transfers(&service, transfers).await?;

        let mut committed = 0;
        for outcome in outcomes {
            match outcome {
                Ok(()) => committed += 1,
                // Rejections and lock timeouts leave no trace.
                Err(AppError::InsufficientBalance { .. }) | Err(AppError::Timeout) => {}
                Err(other) => panic!("{store}: unexpected error {other:?}"),
            }
        }
        assert!(committed > 0, "{store}");

        let accounts = service.list_accounts().await?;
        assert_eq!(total(&accounts), initial, "{store}");
        assert!(accounts.iter().all(|a| a.balance >= 0), "{store}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_transfers() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        create_alice_and_bob(&service).await?;
        let expected = total(&service.list_accounts().await?);

        let writer = {
            let service = service.clone();
            tokio::spawn(async move {
                for i in 0..100 {
                    let (from, to) = if i % 2 == 0 { ("Alice", "Bob") } else { ("Bob", "Alice") };
                    let _ = service.transfer(TransferRequest::new(from, to, 25)).await;
                }
            })
        };

        while !writer.is_finished() {
            let accounts = service.list_accounts().await?;
            assert_eq!(total(&accounts), expected, "{store}");
            assert!(accounts.iter().all(|a| a.balance >= 0), "{store}");
            tokio::task::yield_now().await;
        }
        writer.await?;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_creation_has_one_winner() -> Result<()> {
    for (store, service, _temp) in all_services().await? {
        let mut tasks = JoinSet::new();
        for i in 0..8 {
            let service = service.clone();
            tasks.spawn(async move {
                service
                    .create_account(NewAccount::new("Alice", i))
                    .await
                    .map(|_| ())
            });
        }

        let mut created = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Ok(()) => created += 1,
                Err(AppError::DuplicateAccount(_)) | Err(AppError::Timeout) => {}
                Err(other) => panic!("{store}: unexpected error {other:?}"),
            }
        }

        assert_eq!(created, 1, "{store}");
        assert_eq!(service.list_accounts().await?.len(), 1, "{store}");
    }
    Ok(())
}
