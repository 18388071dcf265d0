use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::types::{CreditLineId, CreditLineStatus, SublineId};

#[derive(Error, Debug)]
pub enum LendingError {
    #[error("annual interest rate must be between 0 and 1 (e.g., 0.05 for 5%): got {rate}")]
    InvalidRate {
        rate: Rate,
    },

    #[error("{entity}: cannot transition from {current} to {requested}")]
    InvalidTransition {
        entity: &'static str,
        current: String,
        requested: String,
    },

    #[error("amount must be greater than 0: got {amount}")]
    AmountNotPositive {
        amount: Money,
    },

    #[error("amount {amount} exceeds {max_digits} digits")]
    DigitLimitExceeded {
        amount: Money,
        max_digits: u32,
    },

    #[error("adjusted interest rate must be greater than 0: got {rate}")]
    RateNotPositive {
        rate: Rate,
    },

    #[error("interest rate cannot be negative: got {rate}")]
    NegativeRate {
        rate: Rate,
    },

    #[error("start date {start} must be before end date {end}")]
    InvalidPeriod {
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("payment due day must be between 1 and 31: got {day}")]
    PaymentDueDayOutOfRange {
        day: u32,
    },

    #[error("a reason for the adjustment is required")]
    ReasonRequired,

    #[error("sub-line {subline} can only be active while its credit line {credit_line} is approved: line is {status}")]
    ParentLineNotApproved {
        subline: SublineId,
        credit_line: CreditLineId,
        status: CreditLineStatus,
    },

    #[error("sub-line {subline} already has a loan term")]
    DuplicateLoanTerm {
        subline: SublineId,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("unknown repayment frequency: {value}")]
    UnknownFrequency {
        value: String,
    },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// coarse classification the calling layer maps to response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// bad input shape, surfaced synchronously, never retried
    Validation,
    /// illegal state-machine move, caller picks a legal one
    Transition,
    /// broken reference or uniqueness invariant, fatal
    Integrity,
    /// programmer or configuration error, fatal
    Lookup,
}

impl LendingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LendingError::InvalidRate { .. }
            | LendingError::AmountNotPositive { .. }
            | LendingError::DigitLimitExceeded { .. }
            | LendingError::RateNotPositive { .. }
            | LendingError::NegativeRate { .. }
            | LendingError::InvalidPeriod { .. }
            | LendingError::PaymentDueDayOutOfRange { .. }
            | LendingError::ReasonRequired
            | LendingError::ParentLineNotApproved { .. } => ErrorKind::Validation,
            LendingError::InvalidTransition { .. } => ErrorKind::Transition,
            LendingError::DuplicateLoanTerm { .. } | LendingError::NotFound { .. } => {
                ErrorKind::Integrity
            }
            LendingError::UnknownFrequency { .. } | LendingError::Serialization(_) => {
                ErrorKind::Lookup
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LendingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_transition_error_names_both_endpoints() {
        let err = LendingError::InvalidTransition {
            entity: "adjustment",
            current: "approved".to_string(),
            requested: "pending_review".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("approved"));
        assert!(message.contains("pending_review"));
        assert_eq!(err.kind(), ErrorKind::Transition);
    }

    #[test]
    fn test_kind_partitions() {
        let validation = LendingError::AmountNotPositive {
            amount: Money::from_major(-5),
        };
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let integrity = LendingError::DuplicateLoanTerm {
            subline: Uuid::new_v4(),
        };
        assert_eq!(integrity.kind(), ErrorKind::Integrity);

        let lookup = LendingError::UnknownFrequency {
            value: "yearly".to_string(),
        };
        assert_eq!(lookup.kind(), ErrorKind::Lookup);

        let rate = LendingError::InvalidRate {
            rate: Rate::from_decimal(dec!(12)),
        };
        assert_eq!(rate.kind(), ErrorKind::Validation);
    }
}
