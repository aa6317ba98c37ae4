use crate::domain::{AccountId, CardId, LoanId, LoanStatus, Money};

/// Row a lookup failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Account(AccountId),
    AccountNumber(String),
    Loan(LoanId),
    Card(CardId),
    CardNumber(String),
}

impl core::fmt::Display for Entity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Entity::Account(id) => write!(f, "account {}", id),
            Entity::AccountNumber(number) => write!(f, "account number {}", number),
            Entity::Loan(id) => write!(f, "loan {}", id),
            Entity::Card(id) => write!(f, "card {}", id),
            Entity::CardNumber(number) => write!(f, "card number {}", number),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("Ingestion failed with: {0}")]
    Ingestion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(Entity),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Money,
        requested: Money,
    },

    #[error("Source and destination are the same account {0}")]
    SameAccount(AccountId),

    #[error("Account number {0} is already taken")]
    DuplicateAccountNumber(String),

    #[error("Invalid loan terms: {0}")]
    InvalidLoanTerms(String),

    #[error("Cannot {operation} loan {loan} in status {status}")]
    InvalidLoanState {
        loan: LoanId,
        status: LoanStatus,
        operation: &'static str,
    },

    #[error("Storage failed with: {0}")]
    Storage(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Expected rejections the caller can act on; nothing was mutated.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::InsufficientFunds { .. }
                | Error::SameAccount(_)
                | Error::InvalidLoanTerms(_)
                | Error::InvalidLoanState { .. }
                | Error::DuplicateAccountNumber(_)
        )
    }

    /// The store could not commit. The operation had no effect and may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
