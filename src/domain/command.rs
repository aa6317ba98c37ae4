use crate::domain::{AccountId, AccountType, CardId, CardType, LoanId, LoanTerms, Money, OwnerId};

/// A caller request against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Without a type the owner's default account is opened.
    OpenAccount {
        owner: OwnerId,
        account_type: Option<AccountType>,
    },
    Deposit {
        account: AccountId,
        amount: Money,
    },
    Withdraw {
        account: AccountId,
        amount: Money,
    },
    Transfer {
        source: AccountId,
        destination: AccountId,
        amount: Money,
    },
    ApplyLoan {
        account: AccountId,
        terms: LoanTerms,
    },
    ApproveLoan {
        loan: LoanId,
    },
    PayLoan {
        loan: LoanId,
        amount: Money,
    },
    DefaultLoan {
        loan: LoanId,
    },
    IssueCard {
        account: AccountId,
        card_type: CardType,
    },
    BlockCard {
        card: CardId,
    },
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Command::OpenAccount { owner, account_type } => match account_type {
                Some(account_type) => write!(f, "open,owner={},type={}", owner, account_type),
                None => write!(f, "open,owner={}", owner),
            },
            Command::Deposit { account, amount } => write!(f, "deposit,account={},amount={}", account, amount),
            Command::Withdraw { account, amount } => write!(f, "withdraw,account={},amount={}", account, amount),
            Command::Transfer {
                source,
                destination,
                amount,
            } => write!(f, "transfer,source={},destination={},amount={}", source, destination, amount),
            Command::ApplyLoan { account, terms } => write!(
                f,
                "loan,account={},type={},principal={},rate={},term={}",
                account, terms.loan_type, terms.principal, terms.annual_rate, terms.term_months
            ),
            Command::ApproveLoan { loan } => write!(f, "approve,loan={}", loan),
            Command::PayLoan { loan, amount } => write!(f, "pay,loan={},amount={}", loan, amount),
            Command::DefaultLoan { loan } => write!(f, "default,loan={}", loan),
            Command::IssueCard { account, card_type } => write!(f, "card,account={},type={}", account, card_type),
            Command::BlockCard { card } => write!(f, "block,card={}", card),
        }
    }
}
