use serde::{Deserialize, Serialize};

use crate::domain::{Account, Card, Loan, Transaction};

/// One durable row of the ledger log.
///
/// An account is logged once, when it opens. Loan and card records carry the
/// full row as of the commit that wrote them and the latest one wins on
/// replay. Balances are rebuilt by replaying transactions onto the opening
/// balance in id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    Account(Account),
    Loan(Loan),
    Card(Card),
    Transaction(Transaction),
}
