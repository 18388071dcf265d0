//! Amortization engine.
//!
//! Pure computation: loan parameters in, ordered payment schedule out.
//! No I/O and no shared state, so it is safe to call repeatedly and
//! concurrently.

pub mod calendar;

use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{LendingError, Result};
use crate::types::RepaymentFrequency;

/// immutable input to schedule generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanParameters {
    pub principal: Money,
    /// annual rate as a fraction in [0, 1]
    pub annual_rate: Rate,
    /// number of payment periods
    pub term_length: u32,
    pub frequency: RepaymentFrequency,
    pub start_date: NaiveDate,
    /// day-of-month anchor for monthly-style frequencies, ignored for biweekly
    pub payment_due_day: Option<u32>,
}

impl LoanParameters {
    pub fn new(
        principal: Money,
        annual_rate: Rate,
        term_length: u32,
        frequency: RepaymentFrequency,
        start_date: NaiveDate,
        payment_due_day: Option<u32>,
    ) -> Result<Self> {
        if let Some(day) = payment_due_day {
            if !(1..=31).contains(&day) {
                return Err(LendingError::PaymentDueDayOutOfRange { day });
            }
        }
        Ok(Self {
            principal,
            annual_rate,
            term_length,
            frequency,
            start_date,
            payment_due_day,
        })
    }
}

/// one row of an amortization schedule
///
/// The first row of every schedule is an anchor at the start date with
/// zero components; it is not a real payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// due date, already adjusted for weekends and holidays
    pub payment_date: NaiveDate,
    pub principal: Money,
    pub interest: Money,
    pub total_payment: Money,
    pub remaining_balance: Money,
}

/// periodic rate from an annual rate and a repayment frequency
///
/// The annual rate must be a fraction in [0, 1].
pub fn periodic_rate(annual_rate: Rate, frequency: RepaymentFrequency) -> Result<Decimal> {
    let rate = annual_rate.as_decimal();
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(LendingError::InvalidRate { rate: annual_rate });
    }
    Ok(rate / Decimal::from(frequency.periods_per_year()))
}

/// generate the full amortization schedule for the given parameters
///
/// Balances terminate at zero (snapped within 0.01) and generation stops
/// early once the balance is exhausted or the date range runs out.
pub fn generate_schedule(params: &LoanParameters) -> Result<Vec<PaymentRecord>> {
    let rate = periodic_rate(params.annual_rate, params.frequency)?;
    let payment = annuity_payment(params.principal.as_decimal(), rate, params.term_length);

    let mut records = Vec::with_capacity(params.term_length as usize + 1);
    records.push(PaymentRecord {
        payment_date: params.start_date,
        principal: Money::ZERO,
        interest: Money::ZERO,
        total_payment: Money::ZERO,
        remaining_balance: params.principal.to_currency(),
    });

    let mut cursor = params.start_date;
    let mut balance = params.principal.as_decimal();

    for _ in 0..params.term_length {
        let (next_cursor, payment_date) =
            match advance(cursor, params.frequency, params.payment_due_day) {
                Some(step) => step,
                // date range exhausted: stop generating, not an error
                None => break,
            };
        cursor = next_cursor;

        let interest = balance * rate;
        let mut principal_part = payment - interest;
        // final-period rounding: never pay down more than the balance
        if principal_part > balance {
            principal_part = balance;
        }
        balance -= principal_part;
        if balance.abs() < dec!(0.01) {
            balance = Decimal::ZERO;
        }

        records.push(PaymentRecord {
            payment_date,
            principal: Money::from_decimal(principal_part).to_currency(),
            interest: Money::from_decimal(interest).to_currency(),
            total_payment: Money::from_decimal(principal_part + interest).to_currency(),
            remaining_balance: Money::from_decimal(balance).to_currency(),
        });

        if balance <= Decimal::ZERO {
            break;
        }
    }

    Ok(records)
}

/// advance the date cursor by one period
///
/// Returns (new cursor, recorded payment date). Biweekly keeps the
/// unadjusted cursor so the 14-day grid never drifts; monthly-style
/// frequencies carry the adjusted date forward and re-anchor on the due
/// day each period. None means the date range overflowed.
fn advance(
    cursor: NaiveDate,
    frequency: RepaymentFrequency,
    payment_due_day: Option<u32>,
) -> Option<(NaiveDate, NaiveDate)> {
    match frequency.months_per_period() {
        None => {
            let next = cursor.checked_add_days(Days::new(14))?;
            Some((next, calendar::previous_business_day(next)))
        }
        Some(months) => {
            let mut next = cursor.checked_add_months(Months::new(months))?;
            if let Some(day) = payment_due_day {
                let clamped = day
                    .min(days_in_month(next.year(), next.month()))
                    .max(1);
                next = next.with_day(clamped)?;
            }
            let adjusted = calendar::previous_business_day(next);
            Some((adjusted, adjusted))
        }
    }
}

/// level payment via the ordinary-annuity formula
///
/// P * r * (1 + r)^n / ((1 + r)^n - 1), with the zero-rate and zero-term
/// degenerate cases handled explicitly.
fn annuity_payment(principal: Decimal, periodic_rate: Decimal, periods: u32) -> Decimal {
    if periods == 0 {
        return principal;
    }
    if periodic_rate.is_zero() {
        return principal / Decimal::from(periods);
    }

    let base = Decimal::ONE + periodic_rate;
    let mut compound = Decimal::ONE;
    for _ in 0..periods {
        compound *= base;
        // annuity factor saturates long before Decimal overflows
        if compound > dec!(1_000_000_000_000_000) {
            break;
        }
    }

    principal * periodic_rate * compound / (compound - Decimal::ONE)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
