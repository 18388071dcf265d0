use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::LendingError;

/// unique identifier for a credit line
pub type CreditLineId = Uuid;

/// unique identifier for a credit sub-line
pub type SublineId = Uuid;

/// unique identifier for a loan term
pub type LoanTermId = Uuid;

/// unique identifier for an adjustment of any kind
pub type AdjustmentId = Uuid;

/// unique identifier for a scheduled payment
pub type PaymentId = Uuid;

/// how often a loan term repays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepaymentFrequency {
    /// every 14 days, no day-of-month awareness
    Biweekly,
    Monthly,
    /// once every two months
    Bimonthly,
    /// once every three months
    Quarterly,
}

impl RepaymentFrequency {
    /// payment periods per year, used to derive the periodic rate
    pub fn periods_per_year(self) -> u32 {
        match self {
            RepaymentFrequency::Biweekly => 26,
            RepaymentFrequency::Monthly => 12,
            RepaymentFrequency::Bimonthly => 6,
            RepaymentFrequency::Quarterly => 4,
        }
    }

    /// calendar months advanced per period, none for biweekly
    pub fn months_per_period(self) -> Option<u32> {
        match self {
            RepaymentFrequency::Biweekly => None,
            RepaymentFrequency::Monthly => Some(1),
            RepaymentFrequency::Bimonthly => Some(2),
            RepaymentFrequency::Quarterly => Some(3),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepaymentFrequency::Biweekly => "biweekly",
            RepaymentFrequency::Monthly => "monthly",
            RepaymentFrequency::Bimonthly => "bimonthly",
            RepaymentFrequency::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for RepaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepaymentFrequency {
    type Err = LendingError;

    /// an unrecognized frequency is a configuration error, not user input
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "biweekly" => Ok(RepaymentFrequency::Biweekly),
            "monthly" => Ok(RepaymentFrequency::Monthly),
            "bimonthly" => Ok(RepaymentFrequency::Bimonthly),
            "quarterly" => Ok(RepaymentFrequency::Quarterly),
            other => Err(LendingError::UnknownFrequency {
                value: other.to_string(),
            }),
        }
    }
}

/// supported settlement currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    Mxn,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Mxn => f.write_str("mxn"),
        }
    }
}

/// credit line review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CreditLineStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for CreditLineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreditLineStatus::Pending => f.write_str("pending"),
            CreditLineStatus::Approved => f.write_str("approved"),
            CreditLineStatus::Rejected => f.write_str("rejected"),
        }
    }
}

/// credit sub-line operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SublineStatus {
    #[default]
    Pending,
    Active,
    Inactive,
}

impl fmt::Display for SublineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SublineStatus::Pending => f.write_str("pending"),
            SublineStatus::Active => f.write_str("active"),
            SublineStatus::Inactive => f.write_str("inactive"),
        }
    }
}

/// loan term review status
///
/// Approved is terminal here: once a term is approved its schedule is
/// materialized and the term is never re-reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoanTermStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for LoanTermStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanTermStatus::Pending => f.write_str("pending"),
            LoanTermStatus::Approved => f.write_str("approved"),
            LoanTermStatus::Rejected => f.write_str("rejected"),
        }
    }
}

/// adjustment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentStatus {
    #[default]
    PendingReview,
    Approved,
    Rejected,
    Implemented,
}

impl fmt::Display for AdjustmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentStatus::PendingReview => f.write_str("pending_review"),
            AdjustmentStatus::Approved => f.write_str("approved"),
            AdjustmentStatus::Rejected => f.write_str("rejected"),
            AdjustmentStatus::Implemented => f.write_str("implemented"),
        }
    }
}

/// settlement status of a single scheduled payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Delayed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => f.write_str("pending"),
            PaymentStatus::Completed => f.write_str("completed"),
            PaymentStatus::Delayed => f.write_str("delayed"),
        }
    }
}
