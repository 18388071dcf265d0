use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::schedule::PaymentRecord;
use crate::types::{
    CreditLineId, CreditLineStatus, Currency, LoanTermId, LoanTermStatus, PaymentId,
    PaymentStatus, RepaymentFrequency, SublineId, SublineStatus,
};

/// monetary columns carry at most 12 digits
const MAX_AMOUNT_DIGITS: u32 = 12;

pub(crate) fn validate_amount(amount: Money) -> Result<()> {
    if !amount.is_positive() {
        return Err(LendingError::AmountNotPositive { amount });
    }
    if amount.digit_count() > MAX_AMOUNT_DIGITS as usize {
        return Err(LendingError::DigitLimitExceeded {
            amount,
            max_digits: MAX_AMOUNT_DIGITS,
        });
    }
    Ok(())
}

/// a customer's top-level credit line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditLine {
    pub id: CreditLineId,
    pub customer_id: String,
    pub credit_limit: Money,
    pub currency: Currency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: CreditLineStatus,
    pub created: DateTime<Utc>,
}

impl CreditLine {
    pub fn new(
        customer_id: String,
        credit_limit: Money,
        currency: Currency,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        created: DateTime<Utc>,
    ) -> Result<Self> {
        let line = Self {
            id: Uuid::new_v4(),
            customer_id,
            credit_limit,
            currency,
            start_date,
            end_date,
            status: CreditLineStatus::Pending,
            created,
        };
        line.validate()?;
        Ok(line)
    }

    /// input-shape checks, run before any persistence
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.credit_limit)?;
        if let Some(end) = self.end_date {
            if self.start_date >= end {
                return Err(LendingError::InvalidPeriod {
                    start: self.start_date,
                    end,
                });
            }
        }
        Ok(())
    }

    pub fn is_approved(&self) -> bool {
        self.status == CreditLineStatus::Approved
    }
}

/// a sub-allocation of a credit line's limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSubline {
    pub id: SublineId,
    pub credit_line: CreditLineId,
    pub subline_type: Option<String>,
    pub subline_amount: Money,
    pub amount_disbursed: Money,
    pub outstanding_balance: Money,
    /// always stored as a fraction in [0, 1]
    pub interest_rate: Rate,
    pub status: SublineStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl CreditSubline {
    pub fn new(
        credit_line: CreditLineId,
        subline_type: Option<String>,
        subline_amount: Money,
        interest_rate: Rate,
        created: DateTime<Utc>,
    ) -> Result<Self> {
        let subline = Self {
            id: Uuid::new_v4(),
            credit_line,
            subline_type,
            subline_amount,
            amount_disbursed: Money::ZERO,
            outstanding_balance: Money::ZERO,
            interest_rate: interest_rate.normalized(),
            status: SublineStatus::Pending,
            created,
            updated: created,
        };
        subline.validate()?;
        Ok(subline)
    }

    /// input-shape checks; parent-dependent activation is guarded separately
    pub fn validate(&self) -> Result<()> {
        validate_amount(self.subline_amount)?;
        if self.interest_rate.is_negative() {
            return Err(LendingError::NegativeRate {
                rate: self.interest_rate,
            });
        }
        Ok(())
    }

    /// overwrite the rate, normalizing percentage-form input
    ///
    /// A value supplied as a percentage greater than 1 (e.g. 35.5) is
    /// stored as the fraction 0.355.
    pub fn set_interest_rate(&mut self, rate: Rate) {
        self.interest_rate = rate.normalized();
    }

    /// activation requires the owning credit line to be approved
    pub fn check_activation(&self, line: &CreditLine) -> Result<()> {
        if !line.is_approved() {
            return Err(LendingError::ParentLineNotApproved {
                subline: self.id,
                credit_line: line.id,
                status: line.status,
            });
        }
        Ok(())
    }
}

/// repayment terms attached one-to-one to a sub-line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerm {
    pub id: LoanTermId,
    pub credit_subline: SublineId,
    pub term_length: u32,
    pub repayment_frequency: RepaymentFrequency,
    pub payment_due_day: Option<u32>,
    pub start_date: NaiveDate,
    pub status: LoanTermStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl LoanTerm {
    pub fn new(
        credit_subline: SublineId,
        term_length: u32,
        repayment_frequency: RepaymentFrequency,
        payment_due_day: Option<u32>,
        start_date: NaiveDate,
        status: LoanTermStatus,
        created: DateTime<Utc>,
    ) -> Result<Self> {
        if let Some(day) = payment_due_day {
            if !(1..=31).contains(&day) {
                return Err(LendingError::PaymentDueDayOutOfRange { day });
            }
        }
        Ok(Self {
            id: Uuid::new_v4(),
            credit_subline,
            term_length,
            repayment_frequency,
            payment_due_day,
            start_date,
            status,
            created,
            updated: created,
        })
    }
}

/// one materialized installment of an approved loan term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledPayment {
    pub id: PaymentId,
    pub loan_term: LoanTermId,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub principal_component: Money,
    pub interest_component: Money,
    pub payment_status: PaymentStatus,
    pub actual_payment_date: Option<NaiveDate>,
}

impl ScheduledPayment {
    /// build from one schedule row, initially pending
    pub fn from_record(loan_term: LoanTermId, record: &PaymentRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_term,
            due_date: record.payment_date,
            amount_due: record.total_payment,
            principal_component: record.principal,
            interest_component: record.interest,
            payment_status: PaymentStatus::Pending,
            actual_payment_date: None,
        }
    }

    pub fn mark_completed(&mut self, paid_on: NaiveDate) {
        self.payment_status = PaymentStatus::Completed;
        self.actual_payment_date = Some(paid_on);
    }

    pub fn mark_delayed(&mut self) {
        self.payment_status = PaymentStatus::Delayed;
    }
}
