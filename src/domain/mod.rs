pub mod account;
pub mod card;
pub mod clock;
pub mod command;
pub mod error;
pub mod loan;
pub mod money;
pub mod record;
pub mod scope;
pub mod traits;
pub mod transaction;

pub use account::{Account, AccountId, AccountType, OwnerId};
pub use card::{Card, CardId, CardStatus, CardType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use command::Command;
pub use error::{Entity, Error};
pub use loan::{Installment, LendingPolicy, Loan, LoanId, LoanStatus, LoanTerms, LoanType};
pub use money::Money;
pub use record::Record;
pub use scope::Scope;
pub use traits::{CommandStream, DeadLetterQueue, JournalSink, LedgerStore};
pub use transaction::{Transaction, TransactionDraft, TransactionId, TransactionKind, replay};
