use crate::domain::scope::ensure_positive;
use crate::domain::{
    Account, AccountId, AccountType, Error, LedgerStore, LendingPolicy, Money, OwnerId, Transaction, replay,
};

/// Both sides of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub source: Account,
    pub destination: Account,
}

/// Account operations and the loan engine over a [`LedgerStore`].
#[derive(Debug)]
pub struct Bank<S: LedgerStore> {
    pub(crate) store: S,
    pub(crate) policy: LendingPolicy,
    default_account_type: AccountType,
}

impl<S: LedgerStore> Bank<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: LendingPolicy::default(),
            default_account_type: AccountType::Savings,
        }
    }

    pub fn with_policy(mut self, policy: LendingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_account_type(mut self, account_type: AccountType) -> Self {
        self.default_account_type = account_type;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn open_account(&self, owner: OwnerId, account_type: AccountType) -> Result<Account, Error> {
        let account = self
            .store
            .create_account(|id| Account::open(id, owner, Account::number_for(id), account_type))?;

        tracing::info!(
            account_id = %account.account_id,
            owner_id = %owner,
            number = %account.account_number,
            account_type = %account_type,
            "Account opened"
        );
        Ok(account)
    }

    /// Opens the default account a newly registered owner starts with.
    pub fn register_owner(&self, owner: OwnerId) -> Result<Account, Error> {
        self.open_account(owner, self.default_account_type)
    }

    pub fn account(&self, id: AccountId) -> Result<Account, Error> {
        self.store.get_account(id)
    }

    pub fn account_by_number(&self, number: &str) -> Result<Account, Error> {
        self.store.get_account_by_number(number)
    }

    pub fn accounts_of(&self, owner: OwnerId) -> Vec<Account> {
        self.store.accounts_by_owner(owner)
    }

    pub fn deposit(&self, id: AccountId, amount: Money) -> Result<Account, Error> {
        ensure_positive(amount)?;
        let account = self.store.with_exclusive_account(id, |scope| {
            scope.credit(id, amount, None, "Deposit to account")?;
            scope.account(id).cloned()
        })?;

        tracing::info!(account_id = %id, amount = %amount, balance = %account.balance, "Deposit committed");
        Ok(account)
    }

    pub fn withdraw(&self, id: AccountId, amount: Money) -> Result<Account, Error> {
        ensure_positive(amount)?;
        let account = self
            .store
            .with_exclusive_account(id, |scope| {
                scope.debit(id, amount, None, "Withdrawal from account")?;
                scope.account(id).cloned()
            })
            .inspect_err(|e| tracing::debug!(account_id = %id, amount = %amount, error = %e, "Withdrawal rejected"))?;

        tracing::info!(account_id = %id, amount = %amount, balance = %account.balance, "Withdrawal committed");
        Ok(account)
    }

    /// Moves `amount` between two accounts as one unit: both balances and
    /// both history rows, or nothing.
    pub fn transfer(&self, source: AccountId, destination: AccountId, amount: Money) -> Result<Transfer, Error> {
        ensure_positive(amount)?;
        if source == destination {
            return Err(Error::SameAccount(source));
        }

        let transfer = self
            .store
            .with_exclusive_accounts(&[source, destination], |scope| {
                scope.debit(
                    source,
                    amount,
                    Some(destination),
                    format!("Transfer to account #{}", destination),
                )?;
                scope.credit(
                    destination,
                    amount,
                    Some(source),
                    format!("Transfer from account #{}", source),
                )?;
                Ok(Transfer {
                    source: scope.account(source)?.clone(),
                    destination: scope.account(destination)?.clone(),
                })
            })
            .inspect_err(|e| {
                tracing::debug!(%source, %destination, amount = %amount, error = %e, "Transfer rejected")
            })?;

        tracing::info!(
            %source,
            %destination,
            amount = %amount,
            source_balance = %transfer.source.balance,
            "Transfer committed"
        );
        Ok(transfer)
    }

    /// History of one account, newest first.
    pub fn transactions(&self, id: AccountId) -> Result<Vec<Transaction>, Error> {
        self.store.list_transactions(id)
    }

    /// Replays the account's history and checks it against the stored balance.
    pub fn reconcile(&self, id: AccountId) -> Result<Money, Error> {
        let (account, history) = self.store.account_history(id)?;
        let balance = account.balance;

        let replayed = replay(history.iter().rev())
            .ok_or_else(|| Error::InvariantViolation(format!("history of account {} overflows", id)))?;
        if replayed != balance {
            return Err(Error::InvariantViolation(format!(
                "account {} balance {} but history replays to {}",
                id, balance, replayed
            )));
        }
        Ok(balance)
    }
}
