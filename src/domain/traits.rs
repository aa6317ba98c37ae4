use chrono::{DateTime, Utc};
use futures::Stream;

use crate::domain::{
    Account, AccountId, Card, CardId, Command, Error, Loan, LoanId, OwnerId, Record, Scope, Transaction,
};

pub trait CommandStream {
    type CmdStream: Stream<Item = Result<Command, Error>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::CmdStream;
}

pub trait DeadLetterQueue {
    fn report(&self, error: &Error);
}

/// Durable append target for committed rows.
///
/// A batch is everything one atomic operation produced; an `Err` aborts that
/// operation with no effect on the store.
pub trait JournalSink: Send {
    fn append(&mut self, batch: &[Record]) -> Result<(), Error>;
}

/// Keyed storage for accounts, loans, cards and the transaction history.
///
/// Every balance change goes through `with_exclusive_accounts` or
/// `with_exclusive_loan`: the rows are locked, the closure works on a staged
/// [`Scope`], and the staged accounts, transactions and loan commit together
/// only when the closure returns `Ok`. Account rows are always locked in
/// ascending id order; a loan row is always locked before its account row.
pub trait LedgerStore: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Inserts the account built for the next free id. Account numbers are unique.
    fn create_account<F>(&self, build: F) -> Result<Account, Error>
    where
        F: FnOnce(AccountId) -> Account;

    fn get_account(&self, id: AccountId) -> Result<Account, Error>;

    fn get_account_by_number(&self, number: &str) -> Result<Account, Error>;

    fn accounts_by_owner(&self, owner: OwnerId) -> Vec<Account>;

    /// All accounts, ascending id.
    fn accounts(&self) -> Vec<Account>;

    fn with_exclusive_account<T, F>(&self, id: AccountId, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Scope) -> Result<T, Error>,
    {
        self.with_exclusive_accounts(&[id], f)
    }

    /// `ids` may be unordered and contain duplicates.
    fn with_exclusive_accounts<T, F>(&self, ids: &[AccountId], f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Scope) -> Result<T, Error>;

    /// The account and its history (newest first) read as one consistent snapshot.
    fn account_history(&self, id: AccountId) -> Result<(Account, Vec<Transaction>), Error>;

    /// History of one account, newest first. Each call is a fresh snapshot.
    fn list_transactions(&self, id: AccountId) -> Result<Vec<Transaction>, Error> {
        self.account_history(id).map(|(_, history)| history)
    }

    /// Inserts the loan built for the next free id against an existing account.
    fn create_loan<F>(&self, account_id: AccountId, build: F) -> Result<Loan, Error>
    where
        F: FnOnce(LoanId) -> Result<Loan, Error>;

    fn get_loan(&self, id: LoanId) -> Result<Loan, Error>;

    /// Loans of one account, newest first.
    fn list_loans(&self, account_id: AccountId) -> Result<Vec<Loan>, Error>;

    /// All loans, ascending id.
    fn loans(&self) -> Vec<Loan>;

    /// Locks the loan row and then its account row. The closure's changes to
    /// the loan commit together with the scope.
    fn with_exclusive_loan<T, F>(&self, id: LoanId, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Loan, &mut Scope) -> Result<T, Error>;

    /// Inserts the card built for the next free id against an existing account.
    fn create_card<F>(&self, account_id: AccountId, build: F) -> Result<Card, Error>
    where
        F: FnOnce(CardId) -> Result<Card, Error>;

    fn get_card(&self, id: CardId) -> Result<Card, Error>;

    fn get_card_by_number(&self, number: &str) -> Result<Card, Error>;

    /// Cards of one account, newest first.
    fn cards_by_account(&self, account_id: AccountId) -> Result<Vec<Card>, Error>;

    /// All cards, ascending id.
    fn cards(&self) -> Vec<Card>;

    /// Locks one card row. The closure's changes commit only when it returns `Ok`.
    fn with_exclusive_card<T, F>(&self, id: CardId, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Card) -> Result<T, Error>;
}
