use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::traits::CommandStream;
use crate::domain::{AccountId, CardId, Command, Error, LoanId, LoanTerms, Money, OwnerId};

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Self {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        Self { reader: Some(rdr) }
    }
}

/// Internal shape used only for CSV deserialization.
///
/// `id` is the owner for `open`, the loan for `approve`/`pay`/`default`, the
/// card for `block` and the (source) account otherwise. `category` carries
/// the account, loan or card type.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "type")]
    kind: String,
    id: u32,
    #[serde(default)]
    target: Option<u32>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    rate: Option<String>,
    #[serde(default)]
    term: Option<u32>,
    #[serde(default)]
    category: Option<String>,
}

fn required<T>(value: Option<T>, column: &str, kind: &str) -> Result<T, Error> {
    value.ok_or_else(|| Error::Ingestion(format!("{} row without {}", kind, column)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TryFrom<CsvRow> for Command {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let kind = row.kind.to_ascii_lowercase();
        let amount = || -> Result<Money, Error> { required(non_empty(row.amount.clone()), "amount", &kind)?.parse() };

        let command = match kind.as_str() {
            "open" => Command::OpenAccount {
                owner: OwnerId(row.id),
                account_type: non_empty(row.category.clone())
                    .map(|category| category.parse())
                    .transpose()?,
            },
            "deposit" => Command::Deposit {
                account: AccountId(row.id),
                amount: amount()?,
            },
            "withdraw" | "withdrawal" => Command::Withdraw {
                account: AccountId(row.id),
                amount: amount()?,
            },
            "transfer" => Command::Transfer {
                source: AccountId(row.id),
                destination: AccountId(required(row.target, "target", &kind)?),
                amount: amount()?,
            },
            "loan" => {
                let rate = required(non_empty(row.rate.clone()), "rate", &kind)?;
                let annual_rate: Decimal = rate
                    .parse()
                    .map_err(|_| Error::InvalidLoanTerms(format!("invalid interest rate: {}", rate)))?;
                let loan_type = required(non_empty(row.category.clone()), "category", &kind)?.parse()?;
                Command::ApplyLoan {
                    account: AccountId(row.id),
                    terms: LoanTerms::new(loan_type, amount()?, annual_rate, required(row.term, "term", &kind)?),
                }
            }
            "approve" => Command::ApproveLoan { loan: LoanId(row.id) },
            "pay" => Command::PayLoan {
                loan: LoanId(row.id),
                amount: amount()?,
            },
            "default" => Command::DefaultLoan { loan: LoanId(row.id) },
            "card" => Command::IssueCard {
                account: AccountId(row.id),
                card_type: non_empty(row.category.clone())
                    .map(|category| category.parse())
                    .transpose()?
                    .unwrap_or_default(),
            },
            "block" => Command::BlockCard { card: CardId(row.id) },
            other => {
                return Err(Error::Ingestion(format!("Invalid command type: {}", other)));
            }
        };

        Ok(command)
    }
}

impl<R: Read + Send + 'static> CommandStream for CsvReader<R> {
    type CmdStream = Pin<Box<dyn Stream<Item = Result<Command, Error>> + Send>>;

    fn stream(&mut self) -> Self::CmdStream {
        // Owning the reader keeps the stream 'static.
        let reader = match self.reader.take() {
            Some(r) => r,
            None => return Box::pin(stream::empty::<Result<Command, Error>>()),
        };

        let iter = reader.into_deserialize::<CsvRow>().map(|row_res| match row_res {
            Ok(row) => Command::try_from(row),
            Err(e) => Err(Error::Ingestion(format!("CSV deserialization error: {}", e))),
        });

        Box::pin(stream::iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountType, CardType, LoanType};
    use futures::StreamExt;

    async fn collect(input: &'static str) -> Vec<Result<Command, Error>> {
        CsvReader::new(input.as_bytes()).stream().collect().await
    }

    #[tokio::test]
    async fn test_parses_every_command_type() {
        let commands = collect(
            "type,id,target,amount,rate,term,category
open,7,,,,,checking
open,8,,,,,
deposit,1,,100.5,,,
withdraw,1,,20,,,
transfer,1,2,10.25,,,
loan,1,,10000,6,36,personal
approve,1,,,,,
pay,1,,304.22,,,
default,1,,,,,
card,2,,,,,mastercard
card,2,,,,,
block,3,,,,,
",
        )
        .await;

        let commands: Vec<Command> = commands.into_iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            commands,
            vec![
                Command::OpenAccount {
                    owner: OwnerId(7),
                    account_type: Some(AccountType::Checking)
                },
                Command::OpenAccount {
                    owner: OwnerId(8),
                    account_type: None
                },
                Command::Deposit {
                    account: AccountId(1),
                    amount: Money::from_minor(10_050)
                },
                Command::Withdraw {
                    account: AccountId(1),
                    amount: Money::from_minor(2_000)
                },
                Command::Transfer {
                    source: AccountId(1),
                    destination: AccountId(2),
                    amount: Money::from_minor(1_025)
                },
                Command::ApplyLoan {
                    account: AccountId(1),
                    terms: LoanTerms::new(LoanType::Personal, Money::from_minor(1_000_000), Decimal::from(6), 36),
                },
                Command::ApproveLoan { loan: LoanId(1) },
                Command::PayLoan {
                    loan: LoanId(1),
                    amount: Money::from_minor(30_422)
                },
                Command::DefaultLoan { loan: LoanId(1) },
                Command::IssueCard {
                    account: AccountId(2),
                    card_type: CardType::Mastercard
                },
                Command::IssueCard {
                    account: AccountId(2),
                    card_type: CardType::Visa
                },
                Command::BlockCard { card: CardId(3) },
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_rows_do_not_stop_the_stream() {
        let results = collect(
            "type,id,target,amount,rate,term,category
refund,1,,5,,,
deposit,1,,abc,,,
transfer,1,,5,,,
loan,1,,1000,x,12,auto
loan,1,,1000,5,12,yacht
card,1,,,,,amex
deposit,1,,5,,,
",
        )
        .await;

        assert_eq!(results.len(), 7);
        assert!(matches!(results[0], Err(Error::Ingestion(_))));
        assert!(matches!(results[1], Err(Error::InvalidAmount(_))));
        assert!(matches!(results[2], Err(Error::Ingestion(_))));
        assert!(matches!(results[3], Err(Error::InvalidLoanTerms(_))));
        assert!(matches!(results[4], Err(Error::InvalidLoanTerms(_))));
        assert!(matches!(results[5], Err(Error::Ingestion(_))));
        assert!(results[6].is_ok());
    }

    #[tokio::test]
    async fn test_short_rows_and_whitespace() {
        let results = collect("type, id, target, amount\n Deposit , 3 , , 1.999\napprove,2\n").await;

        assert_eq!(
            results.into_iter().collect::<Result<Vec<_>, _>>().unwrap(),
            vec![
                Command::Deposit {
                    account: AccountId(3),
                    amount: Money::from_minor(200)
                },
                Command::ApproveLoan { loan: LoanId(2) },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_is_consumed_once() {
        let mut reader = CsvReader::new("type,id\napprove,1\n".as_bytes());
        assert_eq!(reader.stream().count().await, 1);
        assert_eq!(reader.stream().count().await, 0);
    }
}
