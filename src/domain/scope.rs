use crate::domain::error::Entity;
use crate::domain::{Account, AccountId, Error, Money, TransactionDraft, TransactionKind};

/// Staged view of the account rows held under exclusive access.
///
/// Balances only move through [`Scope::credit`] and [`Scope::debit`], each of
/// which stages exactly one matching transaction. Nothing here is visible to
/// other callers until the store commits the scope.
#[derive(Debug)]
pub struct Scope {
    accounts: Vec<Account>,
    drafts: Vec<TransactionDraft>,
}

impl Scope {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            drafts: Vec::new(),
        }
    }

    pub fn account(&self, id: AccountId) -> Result<&Account, Error> {
        self.accounts
            .iter()
            .find(|a| a.account_id == id)
            .ok_or(Error::NotFound(Entity::Account(id)))
    }

    fn account_mut(&mut self, id: AccountId) -> Result<&mut Account, Error> {
        self.accounts
            .iter_mut()
            .find(|a| a.account_id == id)
            .ok_or(Error::NotFound(Entity::Account(id)))
    }

    pub fn balance(&self, id: AccountId) -> Result<Money, Error> {
        self.account(id).map(|a| a.balance)
    }

    pub fn credit(
        &mut self,
        id: AccountId,
        amount: Money,
        recipient: Option<AccountId>,
        description: impl Into<String>,
    ) -> Result<(), Error> {
        ensure_positive(amount)?;
        let account = self.account_mut(id)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| Error::InvalidAmount(format!("credit of {} overflows account {}", amount, id)))?;
        self.stage(id, TransactionKind::Deposit, amount, recipient, description);
        Ok(())
    }

    /// Fails with `InsufficientFunds` without touching the scope when the
    /// balance does not cover `amount`.
    pub fn debit(
        &mut self,
        id: AccountId,
        amount: Money,
        recipient: Option<AccountId>,
        description: impl Into<String>,
    ) -> Result<(), Error> {
        ensure_positive(amount)?;
        let account = self.account_mut(id)?;
        if account.balance < amount {
            return Err(Error::InsufficientFunds {
                account: id,
                balance: account.balance,
                requested: amount,
            });
        }
        account.balance = account.balance.saturating_sub_floor(amount);
        self.stage(id, TransactionKind::Withdraw, amount, recipient, description);
        Ok(())
    }

    fn stage(
        &mut self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Money,
        recipient_account_id: Option<AccountId>,
        description: impl Into<String>,
    ) {
        self.drafts.push(TransactionDraft {
            account_id,
            kind,
            amount,
            recipient_account_id,
            description: description.into(),
        });
    }

    pub fn drafts(&self) -> &[TransactionDraft] {
        &self.drafts
    }

    pub fn into_parts(self) -> (Vec<Account>, Vec<TransactionDraft>) {
        (self.accounts, self.drafts)
    }
}

pub fn ensure_positive(amount: Money) -> Result<(), Error> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(Error::InvalidAmount(format!("amount must be positive, got {}", amount)))
    }
}
