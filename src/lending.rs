use crate::bank::Bank;
use crate::domain::scope::ensure_positive;
use crate::domain::{Account, AccountId, Error, LedgerStore, Loan, LoanId, LoanTerms, Money};

/// Loan and repayment account after a committed loan operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanPosting {
    pub loan: Loan,
    pub account: Account,
}

impl<S: LedgerStore> Bank<S> {
    /// Records a PENDING loan application. No money moves until approval.
    pub fn create_loan(&self, account_id: AccountId, terms: LoanTerms) -> Result<Loan, Error> {
        terms.validate(&self.policy)?;
        // Quoted before the store takes its loan table lock.
        let monthly_payment = terms.monthly_payment()?;
        let now = self.store.now();
        let loan = self
            .store
            .create_loan(account_id, |id| Loan::originate(id, account_id, &terms, monthly_payment, now))?;

        tracing::info!(
            loan_id = %loan.loan_id,
            account_id = %account_id,
            loan_type = %loan.loan_type,
            principal = %loan.principal,
            rate = %loan.interest_rate,
            term_months = loan.term_months,
            monthly_payment = %loan.monthly_payment,
            "Loan application recorded"
        );
        Ok(loan)
    }

    /// PENDING -> ACTIVE, crediting the principal to the loan's account in
    /// the same commit.
    pub fn approve_loan(&self, id: LoanId) -> Result<LoanPosting, Error> {
        let now = self.store.now();
        let posting = self
            .store
            .with_exclusive_loan(id, |loan, scope| {
                loan.activate(now)?;
                scope.credit(
                    loan.account_id,
                    loan.principal,
                    None,
                    format!("Loan disbursement for loan #{}", loan.loan_id),
                )?;
                Ok(LoanPosting {
                    loan: loan.clone(),
                    account: scope.account(loan.account_id)?.clone(),
                })
            })
            .inspect_err(|e| tracing::debug!(loan_id = %id, error = %e, "Approval rejected"))?;

        tracing::info!(
            loan_id = %id,
            account_id = %posting.account.account_id,
            disbursed = %posting.loan.principal,
            "Loan approved and disbursed"
        );
        Ok(posting)
    }

    /// Debits `amount` from the loan's account and reduces the outstanding
    /// amount, flooring at zero. Reaching zero marks the loan PAID.
    pub fn make_payment(&self, id: LoanId, amount: Money) -> Result<LoanPosting, Error> {
        ensure_positive(amount)?;
        let now = self.store.now();
        let posting = self
            .store
            .with_exclusive_loan(id, |loan, scope| {
                loan.ensure_payable()?;
                scope.debit(
                    loan.account_id,
                    amount,
                    None,
                    format!("Loan payment for loan #{}", loan.loan_id),
                )?;
                loan.apply_payment(amount, now)?;
                Ok(LoanPosting {
                    loan: loan.clone(),
                    account: scope.account(loan.account_id)?.clone(),
                })
            })
            .inspect_err(|e| tracing::debug!(loan_id = %id, amount = %amount, error = %e, "Loan payment rejected"))?;

        tracing::info!(
            loan_id = %id,
            amount = %amount,
            remaining = %posting.loan.remaining,
            status = %posting.loan.status,
            "Loan payment committed"
        );
        Ok(posting)
    }

    /// ACTIVE/APPROVED -> DEFAULTED. Called by whatever policy decides a loan
    /// has defaulted; no balance moves.
    pub fn default_loan(&self, id: LoanId) -> Result<Loan, Error> {
        let now = self.store.now();
        let loan = self.store.with_exclusive_loan(id, |loan, _| {
            loan.mark_defaulted(now)?;
            Ok(loan.clone())
        })?;

        tracing::warn!(loan_id = %id, remaining = %loan.remaining, "Loan marked defaulted");
        Ok(loan)
    }

    pub fn loan(&self, id: LoanId) -> Result<Loan, Error> {
        self.store.get_loan(id)
    }

    /// Loans of one account, newest first.
    pub fn loans(&self, account_id: AccountId) -> Result<Vec<Loan>, Error> {
        self.store.list_loans(account_id)
    }
}
