use chrono::{DateTime, Months, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Error, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub u32);

impl core::fmt::Display for LoanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanType {
    Personal,
    Home,
    Auto,
    Education,
    Business,
}

impl LoanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanType::Personal => "PERSONAL",
            LoanType::Home => "HOME",
            LoanType::Auto => "AUTO",
            LoanType::Education => "EDUCATION",
            LoanType::Business => "BUSINESS",
        }
    }
}

impl core::fmt::Display for LoanType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for LoanType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PERSONAL" => Ok(LoanType::Personal),
            "HOME" => Ok(LoanType::Home),
            "AUTO" => Ok(LoanType::Auto),
            "EDUCATION" => Ok(LoanType::Education),
            "BUSINESS" => Ok(LoanType::Business),
            other => Err(Error::InvalidLoanTerms(format!("unknown loan type {}", other))),
        }
    }
}

/// PENDING is the only initial status; PAID and DEFAULTED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Approved,
    Active,
    Paid,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "PENDING",
            LoanStatus::Approved => "APPROVED",
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Paid => "PAID",
            LoanStatus::Defaulted => "DEFAULTED",
        }
    }

    /// Statuses that accept repayments.
    pub fn is_payable(&self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Active)
    }
}

impl core::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional origination bounds on top of the positivity rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingPolicy {
    pub min_principal: Option<Money>,
    pub max_principal: Option<Money>,
    pub min_rate: Option<Decimal>,
    pub max_rate: Option<Decimal>,
    pub max_term_months: Option<u32>,
}

/// Loan application parameters. `annual_rate` is a percentage (6.0 = 6%).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanTerms {
    pub loan_type: LoanType,
    pub principal: Money,
    pub annual_rate: Decimal,
    pub term_months: u32,
}

/// One row of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installment {
    pub number: u32,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub remaining: Money,
}

fn terms_error(msg: impl Into<String>) -> Error {
    Error::InvalidLoanTerms(msg.into())
}

impl LoanTerms {
    pub fn new(loan_type: LoanType, principal: Money, annual_rate: Decimal, term_months: u32) -> Self {
        Self {
            loan_type,
            principal,
            annual_rate,
            term_months,
        }
    }

    pub fn validate(&self, policy: &LendingPolicy) -> Result<(), Error> {
        if !self.principal.is_positive() {
            return Err(terms_error(format!("principal must be positive, got {}", self.principal)));
        }
        if self.annual_rate <= Decimal::ZERO {
            return Err(terms_error(format!("interest rate must be positive, got {}", self.annual_rate)));
        }
        if self.term_months == 0 {
            return Err(terms_error("term must be at least one month"));
        }
        if policy.min_principal.is_some_and(|min| self.principal < min)
            || policy.max_principal.is_some_and(|max| self.principal > max)
        {
            return Err(terms_error(format!("principal {} outside lending policy", self.principal)));
        }
        if policy.min_rate.is_some_and(|min| self.annual_rate < min)
            || policy.max_rate.is_some_and(|max| self.annual_rate > max)
        {
            return Err(terms_error(format!("rate {}% outside lending policy", self.annual_rate)));
        }
        if policy.max_term_months.is_some_and(|max| self.term_months > max) {
            return Err(terms_error(format!("term of {} months exceeds lending policy", self.term_months)));
        }
        Ok(())
    }

    pub fn monthly_rate(&self) -> Decimal {
        self.annual_rate / Decimal::from(1200)
    }

    /// Level payment `P·r / (1 − (1+r)^−n)`, rounded half-up to cents.
    ///
    /// The discount factor `(1+r)^−n` only shrinks as the term grows, so long
    /// terms converge on `P·r` instead of overflowing.
    pub fn monthly_payment(&self) -> Result<Money, Error> {
        let principal = self.principal.to_decimal();
        let rate = self.monthly_rate();
        let overflow = || terms_error("amortization overflow");

        let straight_line = || {
            principal
                .checked_div(Decimal::from(self.term_months))
                .ok_or_else(|| terms_error("term must be at least one month"))
        };

        let payment = if rate.is_zero() {
            straight_line()?
        } else {
            let discount = Decimal::ONE
                .checked_add(rate)
                .and_then(|base| Decimal::ONE.checked_div(base))
                .and_then(|v| v.checked_powu(u64::from(self.term_months)))
                .ok_or_else(overflow)?;
            let denominator = Decimal::ONE - discount;
            if denominator.is_zero() {
                straight_line()?
            } else {
                principal
                    .checked_mul(rate)
                    .and_then(|v| v.checked_div(denominator))
                    .ok_or_else(overflow)?
            }
        };
        Money::from_decimal(payment).ok_or_else(overflow)
    }

    /// Full repayment plan. The last installment absorbs rounding so the
    /// remaining principal ends at exactly zero.
    pub fn schedule(&self) -> Result<Vec<Installment>, Error> {
        let payment = self.monthly_payment()?;
        let rate = self.monthly_rate();
        let overflow = || terms_error("amortization overflow");

        let mut remaining = self.principal;
        let mut rows = Vec::new();
        for number in 1..=self.term_months {
            let interest = remaining
                .to_decimal()
                .checked_mul(rate)
                .and_then(Money::from_decimal)
                .ok_or_else(overflow)?;
            let mut principal = payment.checked_sub(interest).ok_or_else(overflow)?;
            if number == self.term_months || principal > remaining {
                principal = remaining;
            }
            remaining = remaining.checked_sub(principal).ok_or_else(overflow)?;
            rows.push(Installment {
                number,
                payment: principal.checked_add(interest).ok_or_else(overflow)?,
                interest,
                principal,
                remaining,
            });
        }
        Ok(rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    pub account_id: AccountId, // disbursement and repayment account
    pub loan_type: LoanType,
    pub principal: Money,
    pub interest_rate: Decimal,
    pub term_months: u32,
    pub monthly_payment: Money,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    pub remaining: Money,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn maturity(from: DateTime<Utc>, term_months: u32) -> Result<DateTime<Utc>, Error> {
    from.checked_add_months(Months::new(term_months))
        .ok_or_else(|| terms_error(format!("term of {} months overflows the calendar", term_months)))
}

impl Loan {
    /// Builds a PENDING loan from already validated terms and the payment
    /// quoted for them by [`LoanTerms::monthly_payment`].
    pub fn originate(
        loan_id: LoanId,
        account_id: AccountId,
        terms: &LoanTerms,
        monthly_payment: Money,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        Ok(Self {
            loan_id,
            account_id,
            loan_type: terms.loan_type,
            principal: terms.principal,
            interest_rate: terms.annual_rate,
            term_months: terms.term_months,
            monthly_payment,
            start_date: None,
            end_date: maturity(now, terms.term_months)?,
            remaining: terms.principal,
            status: LoanStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn total_repayment(&self) -> Option<Money> {
        self.monthly_payment
            .as_minor()
            .checked_mul(i64::from(self.term_months))
            .map(Money::from_minor)
    }

    fn invalid_state(&self, operation: &'static str) -> Error {
        Error::InvalidLoanState {
            loan: self.loan_id,
            status: self.status,
            operation,
        }
    }

    /// PENDING -> ACTIVE. Maturity is recomputed from the approval time.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        if self.status != LoanStatus::Pending {
            return Err(self.invalid_state("approve"));
        }
        self.end_date = maturity(now, self.term_months)?;
        self.start_date = Some(now);
        self.status = LoanStatus::Active;
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_payable(&self) -> Result<(), Error> {
        if self.status.is_payable() {
            Ok(())
        } else {
            Err(self.invalid_state("pay"))
        }
    }

    /// Reduces the outstanding amount, flooring at zero. Any excess is absorbed.
    pub fn apply_payment(&mut self, amount: Money, now: DateTime<Utc>) -> Result<(), Error> {
        self.ensure_payable()?;
        self.remaining = self.remaining.saturating_sub_floor(amount);
        if self.remaining.is_zero() {
            self.status = LoanStatus::Paid;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_defaulted(&mut self, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.status.is_payable() {
            return Err(self.invalid_state("default"));
        }
        self.status = LoanStatus::Defaulted;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn terms(principal: i64, rate: Decimal, months: u32) -> LoanTerms {
        LoanTerms::new(LoanType::Personal, Money::from_major(principal).unwrap(), rate, months)
    }

    fn end_of_january() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn standard_amortization_to_the_cent() {
        let t = terms(10_000, Decimal::new(60, 1), 36);
        assert_eq!(t.monthly_rate(), Decimal::new(5, 3));
        assert_eq!(t.monthly_payment().unwrap(), Money::from_minor(30_422));
    }

    #[test]
    fn other_known_payments() {
        // 200k over 30 years at 4.5%
        let t = terms(200_000, Decimal::new(45, 1), 360);
        assert_eq!(t.monthly_payment().unwrap(), Money::from_minor(101_337));
        // single period: principal plus one month of interest
        let t = terms(1_200, Decimal::new(12, 0), 1);
        assert_eq!(t.monthly_payment().unwrap(), Money::from_minor(121_200));
    }

    #[test]
    fn long_terms_converge_instead_of_overflowing() {
        // (1.005)^20000 is far beyond Decimal's range
        let t = terms(10_000, Decimal::new(60, 1), 20_000);
        assert_eq!(t.monthly_payment().unwrap(), Money::from_minor(5_000));

        let started = std::time::Instant::now();
        let t = terms(10_000, Decimal::new(60, 1), 3_000_000);
        assert_eq!(t.monthly_payment().unwrap(), Money::from_minor(5_000));
        assert!(started.elapsed() < std::time::Duration::from_millis(250));
    }

    #[test]
    fn long_schedules_settle_in_the_last_installment() {
        // the payment only covers interest, so the balloon lands at the end
        let rows = terms(10_000, Decimal::new(60, 1), 20_000).schedule().unwrap();
        assert_eq!(rows.len(), 20_000);
        assert!(rows[..19_999].iter().all(|r| r.principal.is_zero() && r.remaining == Money::from_minor(1_000_000)));
        let last = rows.last().unwrap();
        assert_eq!(last.principal, Money::from_minor(1_000_000));
        assert_eq!(last.payment, Money::from_minor(1_005_000));
        assert!(last.remaining.is_zero());
    }

    #[test]
    fn rejects_non_positive_terms() {
        let policy = LendingPolicy::default();
        assert!(matches!(terms(0, Decimal::ONE, 12).validate(&policy), Err(Error::InvalidLoanTerms(_))));
        assert!(matches!(terms(100, Decimal::ZERO, 12).validate(&policy), Err(Error::InvalidLoanTerms(_))));
        assert!(matches!(terms(100, Decimal::NEGATIVE_ONE, 12).validate(&policy), Err(Error::InvalidLoanTerms(_))));
        assert!(matches!(terms(100, Decimal::ONE, 0).validate(&policy), Err(Error::InvalidLoanTerms(_))));
        assert!(terms(100, Decimal::ONE, 12).validate(&policy).is_ok());
    }

    #[test]
    fn policy_bounds_are_enforced() {
        let policy = LendingPolicy {
            min_principal: Money::from_major(1_000),
            max_principal: Money::from_major(1_000_000),
            min_rate: Some(Decimal::ONE),
            max_rate: Some(Decimal::from(20)),
            max_term_months: Some(360),
        };
        assert!(terms(999, Decimal::from(5), 12).validate(&policy).is_err());
        assert!(terms(5_000, Decimal::from(21), 12).validate(&policy).is_err());
        assert!(terms(5_000, Decimal::from(5), 361).validate(&policy).is_err());
        assert!(terms(5_000, Decimal::from(5), 360).validate(&policy).is_ok());
    }

    #[test]
    fn schedule_pays_down_exactly() {
        let t = terms(10_000, Decimal::new(60, 1), 36);
        let rows = t.schedule().unwrap();
        assert_eq!(rows.len(), 36);
        assert_eq!(rows[0].interest, Money::from_minor(5_000));
        assert_eq!(rows[0].payment, Money::from_minor(30_422));
        assert_eq!(rows.last().unwrap().remaining, Money::zero());

        let repaid: i64 = rows.iter().map(|r| r.principal.as_minor()).sum();
        assert_eq!(repaid, t.principal.as_minor());
        assert!(rows[..35].iter().all(|r| r.payment == Money::from_minor(30_422)));
    }

    #[test]
    fn lifecycle_transitions() {
        let t = terms(1_000, Decimal::from(12), 2);
        let created = end_of_january();
        let mut loan = Loan::originate(LoanId(1), AccountId(1), &t, t.monthly_payment().unwrap(), created).unwrap();
        assert_eq!(loan.status, LoanStatus::Pending);
        assert_eq!(loan.remaining, t.principal);
        assert_eq!(loan.end_date, Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap());
        assert!(matches!(loan.ensure_payable(), Err(Error::InvalidLoanState { .. })));

        let approved = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        loan.activate(approved).unwrap();
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.start_date, Some(approved));
        assert_eq!(loan.end_date, Utc.with_ymd_and_hms(2024, 4, 10, 0, 0, 0).unwrap());
        assert!(matches!(loan.activate(approved), Err(Error::InvalidLoanState { .. })));

        loan.apply_payment(Money::from_major(400).unwrap(), approved).unwrap();
        assert_eq!(loan.remaining, Money::from_major(600).unwrap());
        assert_eq!(loan.status, LoanStatus::Active);

        loan.apply_payment(Money::from_major(700).unwrap(), approved).unwrap();
        assert_eq!(loan.remaining, Money::zero());
        assert_eq!(loan.status, LoanStatus::Paid);
        assert!(matches!(
            loan.apply_payment(Money::from_minor(1), approved),
            Err(Error::InvalidLoanState { status: LoanStatus::Paid, .. })
        ));
        assert!(loan.mark_defaulted(approved).is_err());
    }

    #[test]
    fn total_repayment_is_payment_times_term() {
        let t = terms(10_000, Decimal::new(60, 1), 36);
        let loan = Loan::originate(LoanId(7), AccountId(2), &t, t.monthly_payment().unwrap(), end_of_january()).unwrap();
        assert_eq!(loan.total_repayment(), Some(Money::from_minor(30_422 * 36)));
    }
}
