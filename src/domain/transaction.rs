use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

/// Immutable history row explaining one balance change on `account_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Money, // positive magnitude
    pub recipient_account_id: Option<AccountId>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl Transaction {
    /// Signed effect of this row on its account's balance.
    pub fn delta(&self) -> i64 {
        match self.kind {
            TransactionKind::Deposit => self.amount.as_minor(),
            TransactionKind::Withdraw => -self.amount.as_minor(),
        }
    }
}

/// A transaction staged inside an exclusive scope. The store numbers and
/// stamps it when the scope commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub recipient_account_id: Option<AccountId>,
    pub description: String,
}

impl TransactionDraft {
    pub fn into_transaction(self, transaction_id: TransactionId, timestamp: DateTime<Utc>) -> Transaction {
        Transaction {
            transaction_id,
            account_id: self.account_id,
            kind: self.kind,
            amount: self.amount,
            recipient_account_id: self.recipient_account_id,
            timestamp,
            description: self.description,
        }
    }
}

/// Folds a chronological (oldest first) history into the balance it explains,
/// starting from zero. `None` on overflow.
pub fn replay<'a, I>(history: I) -> Option<Money>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    history
        .into_iter()
        .try_fold(0i64, |balance, tx| balance.checked_add(tx.delta()))
        .map(Money::from_minor)
}
