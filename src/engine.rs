use std::io::Write;

use futures::StreamExt;

use crate::bank::Bank;
use crate::domain::{
    Command, Error,
    traits::{CommandStream, DeadLetterQueue, LedgerStore},
};
use crate::report::write_report;

/// Totals of one `process` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub applied: usize,
    pub rejected: usize,
}

#[derive(Debug)]
pub struct Engine<I, S, D>
where
    I: CommandStream,
    S: LedgerStore,
    D: DeadLetterQueue,
{
    ingestion: I,
    bank: Bank<S>,
    dlq: D,
}

impl<I, S, D> Engine<I, S, D>
where
    I: CommandStream,
    S: LedgerStore,
    D: DeadLetterQueue,
{
    pub fn new(ingestion: I, bank: Bank<S>, dlq: D) -> Self {
        Self { ingestion, bank, dlq }
    }

    pub fn bank(&self) -> &Bank<S> {
        &self.bank
    }

    /// Applies every command in stream order. Unreadable and rejected
    /// commands go to the dead letter queue and processing continues.
    pub async fn process(&mut self) -> Result<Summary, Error> {
        let mut summary = Summary::default();
        let mut commands = self.ingestion.stream();

        while let Some(command) = commands.next().await {
            let outcome = command.and_then(|command| {
                let result = self.apply(&command);
                if let Err(e) = &result {
                    tracing::debug!(%command, error = %e, "Command rejected");
                }
                result
            });

            match outcome {
                Ok(()) => summary.applied += 1,
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!(error = %e, "Command failed in storage");
                    }
                    summary.rejected += 1;
                    self.dlq.report(&e);
                }
            }
        }

        tracing::info!(applied = summary.applied, rejected = summary.rejected, "Command stream drained");
        Ok(summary)
    }

    fn apply(&self, command: &Command) -> Result<(), Error> {
        match command {
            Command::OpenAccount { owner, account_type } => {
                match account_type {
                    Some(account_type) => self.bank.open_account(*owner, *account_type)?,
                    None => self.bank.register_owner(*owner)?,
                };
            }
            Command::Deposit { account, amount } => {
                self.bank.deposit(*account, *amount)?;
            }
            Command::Withdraw { account, amount } => {
                self.bank.withdraw(*account, *amount)?;
            }
            Command::Transfer {
                source,
                destination,
                amount,
            } => {
                self.bank.transfer(*source, *destination, *amount)?;
            }
            Command::ApplyLoan { account, terms } => {
                self.bank.create_loan(*account, terms.clone())?;
            }
            Command::ApproveLoan { loan } => {
                self.bank.approve_loan(*loan)?;
            }
            Command::PayLoan { loan, amount } => {
                self.bank.make_payment(*loan, *amount)?;
            }
            Command::DefaultLoan { loan } => {
                self.bank.default_loan(*loan)?;
            }
            Command::IssueCard { account, card_type } => {
                self.bank.issue_card(*account, *card_type)?;
            }
            Command::BlockCard { card } => {
                self.bank.block_card(*card)?;
            }
        }
        Ok(())
    }

    pub fn flush<W: Write>(&self, out: W) -> Result<(), Error> {
        write_report(self.bank.store(), out)
    }
}
