use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Cents, serialize_cents};

pub type AccountId = Uuid;

/// A named account holding a non-negative balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    /// Balance in cents, never negative
    #[serde(serialize_with = "serialize_cents")]
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: impl Into<String>, balance: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            balance,
            created_at: Utc::now(),
        }
    }

    pub fn can_cover(&self, amount: Cents) -> bool {
        self.balance >= amount
    }
}
