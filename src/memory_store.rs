use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::domain::{
    Account, AccountId, Card, CardId, Clock, Entity, Error, JournalSink, LedgerStore, Loan, LoanId, Money,
    OwnerId, Record, Scope, SystemClock, Transaction, TransactionDraft, TransactionId,
};
use crate::journal::{FileJournal, MemoryJournal, read_log};

type Row<T> = Arc<Mutex<T>>;

fn into_rows<K: Ord, T>(map: BTreeMap<K, T>) -> BTreeMap<K, Row<T>> {
    map.into_iter()
        .map(|(key, value)| (key, Arc::new(Mutex::new(value))))
        .collect()
}

struct Journal {
    entries: Vec<Transaction>,
    by_account: HashMap<AccountId, Vec<usize>>,
    next_id: u64,
    sink: Box<dyn JournalSink>,
}

impl Journal {
    fn new(sink: Box<dyn JournalSink>) -> Self {
        Self {
            entries: Vec::new(),
            by_account: HashMap::new(),
            next_id: 1,
            sink,
        }
    }

    /// Numbers and stamps the drafts, then durably appends them together with
    /// `rows` as one batch. Nothing is recorded unless the sink accepts it.
    fn commit(&mut self, drafts: Vec<TransactionDraft>, rows: Vec<Record>, at: DateTime<Utc>) -> Result<(), Error> {
        if drafts.is_empty() && rows.is_empty() {
            return Ok(());
        }
        let batch: Vec<Transaction> = drafts
            .into_iter()
            .zip(self.next_id..)
            .map(|(draft, id)| draft.into_transaction(TransactionId(id), at))
            .collect();
        let records: Vec<Record> = batch
            .iter()
            .cloned()
            .map(Record::Transaction)
            .chain(rows)
            .collect();

        self.sink.append(&records)?;

        for tx in batch {
            self.push(tx);
        }
        Ok(())
    }

    fn push(&mut self, tx: Transaction) {
        self.next_id = self.next_id.max(tx.transaction_id.0.saturating_add(1));
        self.by_account
            .entry(tx.account_id)
            .or_default()
            .push(self.entries.len());
        self.entries.push(tx);
    }

    fn history(&self, id: AccountId) -> Vec<Transaction> {
        self.by_account
            .get(&id)
            .map(|positions| positions.iter().rev().map(|&i| self.entries[i].clone()).collect())
            .unwrap_or_default()
    }
}

fn rejected(reason: String) -> Error {
    Error::Storage(format!("ledger log rejected: {}", reason))
}

/// Plain rows rebuilt from a ledger log before they go behind locks.
#[derive(Default)]
struct Restored {
    accounts: BTreeMap<AccountId, Account>,
    numbers: HashMap<String, AccountId>,
    loans: BTreeMap<LoanId, Loan>,
    cards: BTreeMap<CardId, Card>,
    card_numbers: HashMap<String, CardId>,
    transactions: Vec<Transaction>,
}

impl Restored {
    fn known(&self, id: AccountId, what: impl FnOnce() -> String) -> Result<(), Error> {
        if self.accounts.contains_key(&id) {
            Ok(())
        } else {
            Err(rejected(format!("{} references unknown account {}", what(), id)))
        }
    }

    fn apply(&mut self, record: Record) -> Result<(), Error> {
        match record {
            Record::Account(account) => {
                let id = account.account_id;
                if self.accounts.contains_key(&id) || self.numbers.contains_key(&account.account_number) {
                    return Err(rejected(format!("account {} is logged twice", id)));
                }
                if account.balance < Money::zero() {
                    return Err(rejected(format!("account {} opens with a negative balance", id)));
                }
                self.numbers.insert(account.account_number.clone(), id);
                self.accounts.insert(id, account);
            }
            Record::Transaction(tx) => {
                let id = tx.transaction_id;
                if self.transactions.last().is_some_and(|last| last.transaction_id >= id) {
                    return Err(rejected(format!("transaction {} is out of sequence", id)));
                }
                if let Some(recipient) = tx.recipient_account_id {
                    self.known(recipient, || format!("transaction {}", id))?;
                }
                let account = self
                    .accounts
                    .get_mut(&tx.account_id)
                    .ok_or_else(|| rejected(format!("transaction {} references unknown account {}", id, tx.account_id)))?;
                account.balance = account
                    .balance
                    .as_minor()
                    .checked_add(tx.delta())
                    .map(Money::from_minor)
                    .filter(|balance| *balance >= Money::zero())
                    .ok_or_else(|| {
                        rejected(format!("transaction {} takes account {} below zero", id, tx.account_id))
                    })?;
                self.transactions.push(tx);
            }
            Record::Loan(loan) => {
                self.known(loan.account_id, || format!("loan {}", loan.loan_id))?;
                self.loans.insert(loan.loan_id, loan);
            }
            Record::Card(card) => {
                self.known(card.account_id, || format!("card {}", card.card_id))?;
                if self
                    .card_numbers
                    .get(&card.card_number)
                    .is_some_and(|&other| other != card.card_id)
                {
                    return Err(rejected(format!("card number {} is logged twice", card.card_number)));
                }
                self.card_numbers.insert(card.card_number.clone(), card.card_id);
                self.cards.insert(card.card_id, card);
            }
        }
        Ok(())
    }
}

/// In-process [`LedgerStore`] with one lock per account, loan and card row
/// and an optional durable ledger log.
pub struct MemoryStore {
    accounts: RwLock<BTreeMap<AccountId, Row<Account>>>,
    numbers: RwLock<HashMap<String, AccountId>>,
    loans: RwLock<BTreeMap<LoanId, Row<Loan>>>,
    cards: RwLock<BTreeMap<CardId, Row<Card>>>,
    card_numbers: RwLock<HashMap<String, CardId>>,
    journal: Mutex<Journal>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("accounts", &self.accounts.read().len())
            .field("loans", &self.loans.read().len())
            .field("cards", &self.cards.read().len())
            .field("transactions", &self.journal.lock().entries.len())
            .finish()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_journal(Box::new(MemoryJournal))
    }

    pub fn with_journal(sink: Box<dyn JournalSink>) -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            numbers: RwLock::new(HashMap::new()),
            loans: RwLock::new(BTreeMap::new()),
            cards: RwLock::new(BTreeMap::new()),
            card_numbers: RwLock::new(HashMap::new()),
            journal: Mutex::new(Journal::new(sink)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Rebuilds the store from logged records and keeps appending to `sink`.
    ///
    /// Fails when the log references an account it never opened, repeats or
    /// reorders transaction ids, or drives a balance below zero.
    pub fn restore<I>(records: I, sink: Box<dyn JournalSink>) -> Result<Self, Error>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut restored = Restored::default();
        for record in records {
            restored.apply(record)?;
        }

        let mut journal = Journal::new(sink);
        for tx in restored.transactions {
            journal.push(tx);
        }

        Ok(Self {
            accounts: RwLock::new(into_rows(restored.accounts)),
            numbers: RwLock::new(restored.numbers),
            loans: RwLock::new(into_rows(restored.loans)),
            cards: RwLock::new(into_rows(restored.cards)),
            card_numbers: RwLock::new(restored.card_numbers),
            journal: Mutex::new(journal),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Store backed by the ledger log configured in `config`, replayed first.
    /// In-memory only when no log is configured.
    pub fn open(config: &Config) -> Result<Self, Error> {
        let Some(path) = &config.journal.path else {
            return Ok(Self::new());
        };

        let records = read_log(path)?;
        let store = Self::restore(records, Box::new(FileJournal::append_to(path)?))?;

        tracing::info!(
            path = %path.display(),
            accounts = store.accounts.read().len(),
            loans = store.loans.read().len(),
            cards = store.cards.read().len(),
            next_transaction_id = store.journal.lock().next_id,
            "Ledger restored"
        );
        Ok(store)
    }

    fn account_row(&self, id: AccountId) -> Result<Row<Account>, Error> {
        self.accounts
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(Entity::Account(id)))
    }

    fn loan_row(&self, id: LoanId) -> Result<Row<Loan>, Error> {
        self.loans
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(Entity::Loan(id)))
    }

    fn card_row(&self, id: CardId) -> Result<Row<Card>, Error> {
        self.cards
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(Entity::Card(id)))
    }

    /// Locks `ids` in ascending order and commits the scope's transactions
    /// together with the extra rows the closure hands back.
    fn commit_scope<T, F>(&self, ids: &[AccountId], f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Scope) -> Result<(T, Vec<Record>), Error>,
    {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let rows = ordered
            .iter()
            .map(|&id| self.account_row(id))
            .collect::<Result<Vec<_>, _>>()?;
        // Ascending id order; every multi-row caller takes the same path.
        let mut guards: Vec<_> = rows.iter().map(|row| row.lock()).collect();

        let mut scope = Scope::new(guards.iter().map(|g| (**g).clone()).collect());
        let (out, extra) = f(&mut scope)?;
        let (staged, drafts) = scope.into_parts();

        if let Some(negative) = staged.iter().find(|a| a.balance < Money::zero()) {
            return Err(Error::InvariantViolation(format!(
                "account {} would commit negative balance {}",
                negative.account_id, negative.balance
            )));
        }

        let staged_count = drafts.len();
        {
            let mut journal = self.journal.lock();
            journal.commit(drafts, extra, self.clock.now()).inspect_err(|e| {
                tracing::warn!(accounts = ?ordered, error = %e, "Ledger log append failed, aborting");
            })?;
        }
        for (guard, account) in guards.iter_mut().zip(staged) {
            **guard = account;
        }

        tracing::debug!(accounts = ?ordered, transactions = staged_count, "Scope committed");
        Ok(out)
    }
}

impl LedgerStore for MemoryStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn create_account<F>(&self, build: F) -> Result<Account, Error>
    where
        F: FnOnce(AccountId) -> Account,
    {
        let mut accounts = self.accounts.write();
        let mut numbers = self.numbers.write();
        let id = AccountId(accounts.keys().next_back().map_or(1, |last| last.0 + 1));
        let account = build(id);
        if account.account_id != id {
            return Err(Error::InvariantViolation(format!(
                "account built with id {} instead of {}",
                account.account_id, id
            )));
        }
        if numbers.contains_key(&account.account_number) {
            return Err(Error::DuplicateAccountNumber(account.account_number));
        }

        self.journal
            .lock()
            .commit(Vec::new(), vec![Record::Account(account.clone())], self.clock.now())?;
        numbers.insert(account.account_number.clone(), id);
        accounts.insert(id, Arc::new(Mutex::new(account.clone())));

        tracing::debug!(account_id = %id, number = %account.account_number, "Account stored");
        Ok(account)
    }

    fn get_account(&self, id: AccountId) -> Result<Account, Error> {
        Ok(self.account_row(id)?.lock().clone())
    }

    fn get_account_by_number(&self, number: &str) -> Result<Account, Error> {
        let id = self
            .numbers
            .read()
            .get(number)
            .copied()
            .ok_or_else(|| Error::NotFound(Entity::AccountNumber(number.to_string())))?;
        self.get_account(id)
    }

    fn accounts_by_owner(&self, owner: OwnerId) -> Vec<Account> {
        self.accounts()
            .into_iter()
            .filter(|a| a.owner_id == owner)
            .collect()
    }

    fn accounts(&self) -> Vec<Account> {
        let rows: Vec<Row<Account>> = self.accounts.read().values().cloned().collect();
        rows.iter().map(|row| row.lock().clone()).collect()
    }

    fn with_exclusive_accounts<T, F>(&self, ids: &[AccountId], f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Scope) -> Result<T, Error>,
    {
        self.commit_scope(ids, |scope| Ok((f(scope)?, Vec::new())))
    }

    fn account_history(&self, id: AccountId) -> Result<(Account, Vec<Transaction>), Error> {
        let row = self.account_row(id)?;
        // Holding the row keeps the history consistent with the balance.
        let guard = row.lock();
        let history = self.journal.lock().history(id);
        Ok((guard.clone(), history))
    }

    fn create_loan<F>(&self, account_id: AccountId, build: F) -> Result<Loan, Error>
    where
        F: FnOnce(LoanId) -> Result<Loan, Error>,
    {
        self.account_row(account_id)?;

        let mut loans = self.loans.write();
        let id = LoanId(loans.keys().next_back().map_or(1, |last| last.0 + 1));
        let loan = build(id)?;
        if loan.loan_id != id || loan.account_id != account_id {
            return Err(Error::InvariantViolation(format!(
                "loan built for {}/{} instead of {}/{}",
                loan.loan_id, loan.account_id, id, account_id
            )));
        }

        self.journal
            .lock()
            .commit(Vec::new(), vec![Record::Loan(loan.clone())], self.clock.now())?;
        loans.insert(id, Arc::new(Mutex::new(loan.clone())));

        tracing::debug!(loan_id = %id, account_id = %account_id, "Loan stored");
        Ok(loan)
    }

    fn get_loan(&self, id: LoanId) -> Result<Loan, Error> {
        Ok(self.loan_row(id)?.lock().clone())
    }

    fn list_loans(&self, account_id: AccountId) -> Result<Vec<Loan>, Error> {
        self.account_row(account_id)?;
        let mut loans: Vec<Loan> = self
            .loans()
            .into_iter()
            .filter(|l| l.account_id == account_id)
            .collect();
        loans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.loan_id.cmp(&a.loan_id)));
        Ok(loans)
    }

    fn loans(&self) -> Vec<Loan> {
        let rows: Vec<Row<Loan>> = self.loans.read().values().cloned().collect();
        rows.iter().map(|row| row.lock().clone()).collect()
    }

    fn with_exclusive_loan<T, F>(&self, id: LoanId, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Loan, &mut Scope) -> Result<T, Error>,
    {
        let row = self.loan_row(id)?;
        let mut guard = row.lock();
        let mut staged = guard.clone();
        let account_id = staged.account_id;

        let out = self.commit_scope(&[account_id], |scope| {
            let out = f(&mut staged, scope)?;
            Ok((out, vec![Record::Loan(staged.clone())]))
        })?;
        *guard = staged;

        tracing::debug!(loan_id = %id, status = %guard.status, "Loan row committed");
        Ok(out)
    }

    fn create_card<F>(&self, account_id: AccountId, build: F) -> Result<Card, Error>
    where
        F: FnOnce(CardId) -> Result<Card, Error>,
    {
        self.account_row(account_id)?;

        let mut cards = self.cards.write();
        let mut numbers = self.card_numbers.write();
        let id = CardId(cards.keys().next_back().map_or(1, |last| last.0 + 1));
        let card = build(id)?;
        if card.card_id != id || card.account_id != account_id {
            return Err(Error::InvariantViolation(format!(
                "card built for {}/{} instead of {}/{}",
                card.card_id, card.account_id, id, account_id
            )));
        }
        if numbers.contains_key(&card.card_number) {
            return Err(Error::InvariantViolation(format!(
                "card number {} is already issued",
                card.card_number
            )));
        }

        self.journal
            .lock()
            .commit(Vec::new(), vec![Record::Card(card.clone())], self.clock.now())?;
        numbers.insert(card.card_number.clone(), id);
        cards.insert(id, Arc::new(Mutex::new(card.clone())));

        tracing::debug!(card_id = %id, account_id = %account_id, "Card stored");
        Ok(card)
    }

    fn get_card(&self, id: CardId) -> Result<Card, Error> {
        Ok(self.card_row(id)?.lock().clone())
    }

    fn get_card_by_number(&self, number: &str) -> Result<Card, Error> {
        let id = self
            .card_numbers
            .read()
            .get(number)
            .copied()
            .ok_or_else(|| Error::NotFound(Entity::CardNumber(number.to_string())))?;
        self.get_card(id)
    }

    fn cards_by_account(&self, account_id: AccountId) -> Result<Vec<Card>, Error> {
        self.account_row(account_id)?;
        let mut cards: Vec<Card> = self
            .cards()
            .into_iter()
            .filter(|c| c.account_id == account_id)
            .collect();
        cards.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then(b.card_id.cmp(&a.card_id)));
        Ok(cards)
    }

    fn cards(&self) -> Vec<Card> {
        let rows: Vec<Row<Card>> = self.cards.read().values().cloned().collect();
        rows.iter().map(|row| row.lock().clone()).collect()
    }

    fn with_exclusive_card<T, F>(&self, id: CardId, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Card) -> Result<T, Error>,
    {
        let row = self.card_row(id)?;
        let mut guard = row.lock();
        let mut staged = guard.clone();

        let out = f(&mut staged)?;
        if staged == *guard {
            return Ok(out);
        }
        if staged.card_id != guard.card_id || staged.card_number != guard.card_number {
            return Err(Error::InvariantViolation(format!("card {} changed identity", id)));
        }

        self.journal
            .lock()
            .commit(Vec::new(), vec![Record::Card(staged.clone())], self.clock.now())?;
        *guard = staged;

        tracing::debug!(card_id = %id, status = %guard.status, "Card row committed");
        Ok(out)
    }
}
