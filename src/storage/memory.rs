use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use crate::domain::{Account, Cents};

use super::{AccountStore, StoreError, StoreOptions, validate_initial_balance, validate_transfer};

type AccountCell = Arc<Mutex<Account>>;

/// In-process account store with one lock per account.
///
/// Locks are always taken in ascending name order, whether for a transfer
/// (two accounts) or a listing (all accounts). Transfers on disjoint pairs
/// never contend with each other. Every lock wait is bounded by the
/// configured timeout.
#[derive(Debug)]
pub struct MemoryStore {
    accounts: RwLock<BTreeMap<String, AccountCell>>,
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&StoreOptions::default())
    }
}

impl MemoryStore {
    pub fn new(options: &StoreOptions) -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            lock_timeout: options.lock_timeout,
        }
    }

    /// Look up account cells by name. The index lock is released before returning.
    fn cells<const N: usize>(&self, names: [&str; N]) -> Result<[AccountCell; N], StoreError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| StoreError::Unavailable("account index lock poisoned".to_string()))?;

        let mut found = Vec::with_capacity(N);
        for name in names {
            let cell = accounts
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::AccountNotFound(name.to_string()))?;
            found.push(cell);
        }
        found
            .try_into()
            .map_err(|_| StoreError::Internal(anyhow::anyhow!("account lookup size mismatch")))
    }

    fn all_cells(&self) -> Result<Vec<AccountCell>, StoreError> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| StoreError::Unavailable("account index lock poisoned".to_string()))?;
        Ok(accounts.values().cloned().collect())
    }

    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Result<T, StoreError> {
        tokio::time::timeout(self.lock_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)
    }

    /// Lock a name-sorted run of accounts, front to back.
    async fn lock_sorted<'a>(
        &self,
        cells: &'a [AccountCell],
    ) -> Result<Vec<MutexGuard<'a, Account>>, StoreError> {
        self.bounded(async {
            let mut guards = Vec::with_capacity(cells.len());
            for cell in cells {
                guards.push(cell.lock().await);
            }
            guards
        })
        .await
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create(&self, name: &str, initial_balance: Cents) -> Result<Account, StoreError> {
        validate_initial_balance(initial_balance)?;

        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| StoreError::Unavailable("account index lock poisoned".to_string()))?;
        if accounts.contains_key(name) {
            return Err(StoreError::DuplicateAccount(name.to_string()));
        }

        let account = Account::new(name, initial_balance);
        accounts.insert(name.to_string(), Arc::new(Mutex::new(account.clone())));
        Ok(account)
    }

    async fn get(&self, name: &str) -> Result<Account, StoreError> {
        let [cell] = self.cells([name])?;
        let guard = self.bounded(cell.lock()).await?;
        Ok(guard.clone())
    }

    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        // BTreeMap iteration is name order, the same order transfers lock in.
        let cells = self.all_cells()?;
        let guards = self.lock_sorted(&cells).await?;
        Ok(guards.iter().map(|guard| (**guard).clone()).collect())
    }

    async fn atomic_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Cents,
    ) -> Result<(Account, Account), StoreError> {
        validate_transfer(from, to, amount)?;

        // Accounts are never removed, so existence cannot change once looked up.
        let [sender, receiver] = self.cells([from, to])?;
        let sender_first = from < to;
        let ordered = if sender_first {
            [sender, receiver]
        } else {
            [receiver, sender]
        };

        let mut guards = self.lock_sorted(&ordered).await?;
        let (first, second) = guards.split_at_mut(1);
        let (sender, receiver) = if sender_first {
            (&mut first[0], &mut second[0])
        } else {
            (&mut second[0], &mut first[0])
        };

        if !sender.can_cover(amount) {
            return Err(StoreError::InsufficientBalance {
                account: sender.name.clone(),
                balance: sender.balance,
                required: amount,
            });
        }
        let credited = receiver.balance.checked_add(amount).ok_or_else(|| {
            StoreError::InvalidAmount(format!("Balance of {} would overflow", receiver.name))
        })?;

        sender.balance -= amount;
        receiver.balance = credited;

        Ok(((**sender).clone(), (**receiver).clone()))
    }
}
