use std::io::Write;

use serde::Serialize;

use crate::domain::{
    AccountId, AccountType, CardId, CardStatus, CardType, Error, LedgerStore, LoanId, LoanStatus, LoanType, Money,
    OwnerId,
};

#[derive(Debug, Serialize)]
struct AccountRow<'a> {
    account: AccountId,
    owner: OwnerId,
    number: &'a str,
    #[serde(rename = "type")]
    account_type: AccountType,
    balance: Money,
}

#[derive(Debug, Serialize)]
struct LoanRow {
    loan: LoanId,
    account: AccountId,
    #[serde(rename = "type")]
    loan_type: LoanType,
    principal: Money,
    rate: String,
    term: u32,
    monthly_payment: Money,
    remaining: Money,
    status: LoanStatus,
}

#[derive(Debug, Serialize)]
struct CardRow<'a> {
    card: CardId,
    account: AccountId,
    number: &'a str,
    #[serde(rename = "type")]
    card_type: CardType,
    expiry: String,
    status: CardStatus,
}

/// Writes the account, loan and card tables separated by blank lines, each
/// in ascending id order.
pub fn write_report<S, W>(store: &S, mut out: W) -> Result<(), Error>
where
    S: LedgerStore,
    W: Write,
{
    {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(&mut out);
        wtr.write_record(["account", "owner", "number", "type", "balance"])?;
        for account in store.accounts() {
            wtr.serialize(AccountRow {
                account: account.account_id,
                owner: account.owner_id,
                number: &account.account_number,
                account_type: account.account_type,
                balance: account.balance,
            })?;
        }
        wtr.flush()?;
    }

    writeln!(out)?;

    {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(&mut out);
        wtr.write_record([
            "loan",
            "account",
            "type",
            "principal",
            "rate",
            "term",
            "monthly_payment",
            "remaining",
            "status",
        ])?;
        for loan in store.loans() {
            wtr.serialize(LoanRow {
                loan: loan.loan_id,
                account: loan.account_id,
                loan_type: loan.loan_type,
                principal: loan.principal,
                rate: loan.interest_rate.normalize().to_string(),
                term: loan.term_months,
                monthly_payment: loan.monthly_payment,
                remaining: loan.remaining,
                status: loan.status,
            })?;
        }
        wtr.flush()?;
    }

    writeln!(out)?;

    {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(&mut out);
        wtr.write_record(["card", "account", "number", "type", "expiry", "status"])?;
        for card in store.cards() {
            wtr.serialize(CardRow {
                card: card.card_id,
                account: card.account_id,
                number: &card.card_number,
                card_type: card.card_type,
                expiry: card.expiry_date.format("%Y-%m").to_string(),
                status: card.status,
            })?;
        }
        wtr.flush()?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Bank;
    use crate::domain::{FixedClock, LoanTerms};
    use crate::memory_store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    #[test]
    fn test_report_layout() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()));
        let bank = Bank::new(MemoryStore::new().with_clock(clock));
        let savings = bank.open_account(OwnerId(9), AccountType::Savings).unwrap();
        bank.open_account(OwnerId(9), AccountType::Checking).unwrap();
        bank.deposit(savings.account_id, "250.5".parse().unwrap()).unwrap();
        let terms = LoanTerms::new(
            LoanType::Personal,
            "10000".parse().unwrap(),
            Decimal::new(600, 2),
            36,
        );
        bank.create_loan(savings.account_id, terms).unwrap();
        bank.issue_card(savings.account_id, CardType::Visa).unwrap();
        let blocked = bank.issue_card(savings.account_id, CardType::Mastercard).unwrap();
        bank.block_card(blocked.card_id).unwrap();

        let mut out = Vec::new();
        write_report(bank.store(), &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "account,owner,number,type,balance\n\
             1,9,ACC0000000001,SAVINGS,250.50\n\
             2,9,ACC0000000002,CHECKING,0.00\n\
             \n\
             loan,account,type,principal,rate,term,monthly_payment,remaining,status\n\
             1,1,PERSONAL,10000.00,6,36,304.22,10000.00,PENDING\n\
             \n\
             card,account,number,type,expiry,status\n\
             1,1,4000000000000001,VISA,2028-06,ACTIVE\n\
             2,1,5000000000000002,MASTERCARD,2028-06,BLOCKED\n"
        );
    }

    #[test]
    fn test_empty_report_has_every_header() {
        let store = MemoryStore::new();
        let mut out = Vec::new();
        write_report(&store, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("account,owner,number,type,balance\n\nloan,"));
        assert!(text.ends_with("\n\ncard,account,number,type,expiry,status\n"));
    }
}
