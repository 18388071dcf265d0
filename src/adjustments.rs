//! Proposed, auditable changes to lending entities.
//!
//! One generic `Adjustment<D>` record serves every adjustable attribute
//! set; each delta type declares how to snapshot its parent's current
//! values, how to validate proposed input, and how to overwrite the
//! parent once the adjustment is approved. The previous snapshot is
//! captured at creation and never backfilled.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::entities::{validate_amount, CreditLine, CreditSubline};
use crate::errors::{LendingError, Result};
use crate::lifecycle::validate_transition;
use crate::types::{AdjustmentId, AdjustmentStatus, CreditLineStatus, Currency, SublineStatus};

/// the changeable part of one adjustment kind
pub trait AdjustmentDelta:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Sized
{
    /// entity the adjustment mutates on implementation
    type Parent;
    /// parent values captured at proposal time
    type Snapshot: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned;

    /// name used in events and errors
    const ENTITY: &'static str;

    /// record the parent's current authoritative values
    fn capture(parent: &Self::Parent) -> Self::Snapshot;

    /// input-shape guards, run before the proposal is accepted
    fn validate(&self, parent: &Self::Parent) -> Result<()>;

    /// overwrite each proposed (non-null) field on the parent
    fn apply(&self, parent: &mut Self::Parent);
}

/// a reviewable change proposal against a parent entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "D: Serialize, D::Snapshot: Serialize",
    deserialize = "D: DeserializeOwned, D::Snapshot: DeserializeOwned"
))]
pub struct Adjustment<D: AdjustmentDelta> {
    pub id: AdjustmentId,
    pub parent_id: Uuid,
    /// parent state at the moment this adjustment was created
    pub previous: D::Snapshot,
    pub proposed: D,
    pub status: AdjustmentStatus,
    /// set to "now" at creation, refreshed at implementation
    pub effective_date: NaiveDate,
    pub reason: String,
}

impl<D: AdjustmentDelta> Adjustment<D> {
    /// create a new proposal in pending review
    pub fn propose(
        parent_id: Uuid,
        parent: &D::Parent,
        proposed: D,
        reason: impl Into<String>,
        today: NaiveDate,
    ) -> Result<Self> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(LendingError::ReasonRequired);
        }
        proposed.validate(parent)?;
        Ok(Self {
            id: Uuid::new_v4(),
            parent_id,
            previous: D::capture(parent),
            proposed,
            status: AdjustmentStatus::PendingReview,
            effective_date: today,
            reason,
        })
    }

    /// move to a requested status, returning the prior one
    pub fn set_status(&mut self, requested: AdjustmentStatus) -> Result<AdjustmentStatus> {
        let previous = self.status;
        self.status = validate_transition(self.status, requested)?;
        Ok(previous)
    }

    /// flip to implemented and stamp the effective date
    pub fn implement(&mut self, today: NaiveDate) -> Result<()> {
        self.status = validate_transition(self.status, AdjustmentStatus::Implemented)?;
        self.effective_date = today;
        Ok(())
    }
}

/// proposed changes to a credit line's mutable fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CreditLineDelta {
    pub credit_limit: Option<Money>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<CreditLineStatus>,
    pub currency: Option<Currency>,
}

/// credit line values as of proposal time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditLineSnapshot {
    pub credit_limit: Money,
    pub end_date: Option<NaiveDate>,
    pub status: CreditLineStatus,
    pub currency: Currency,
}

impl AdjustmentDelta for CreditLineDelta {
    type Parent = CreditLine;
    type Snapshot = CreditLineSnapshot;

    const ENTITY: &'static str = "credit line adjustment";

    fn capture(parent: &CreditLine) -> CreditLineSnapshot {
        CreditLineSnapshot {
            credit_limit: parent.credit_limit,
            end_date: parent.end_date,
            status: parent.status,
            currency: parent.currency,
        }
    }

    fn validate(&self, parent: &CreditLine) -> Result<()> {
        if let Some(limit) = self.credit_limit {
            validate_amount(limit)?;
        }
        if let Some(end) = self.end_date {
            if parent.start_date >= end {
                return Err(LendingError::InvalidPeriod {
                    start: parent.start_date,
                    end,
                });
            }
        }
        if let Some(status) = self.status {
            validate_transition(parent.status, status)?;
        }
        Ok(())
    }

    fn apply(&self, parent: &mut CreditLine) {
        if let Some(limit) = self.credit_limit {
            parent.credit_limit = limit;
        }
        if let Some(end) = self.end_date {
            parent.end_date = Some(end);
        }
        if let Some(status) = self.status {
            parent.status = status;
        }
        if let Some(currency) = self.currency {
            parent.currency = currency;
        }
    }
}

/// proposed change to a sub-line's amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CreditAmountDelta {
    pub adjusted_amount: Option<Money>,
}

impl AdjustmentDelta for CreditAmountDelta {
    type Parent = CreditSubline;
    type Snapshot = Money;

    const ENTITY: &'static str = "credit amount adjustment";

    fn capture(parent: &CreditSubline) -> Money {
        parent.subline_amount
    }

    fn validate(&self, _parent: &CreditSubline) -> Result<()> {
        if let Some(amount) = self.adjusted_amount {
            validate_amount(amount)?;
        }
        Ok(())
    }

    fn apply(&self, parent: &mut CreditSubline) {
        if let Some(amount) = self.adjusted_amount {
            parent.subline_amount = amount;
        }
    }
}

/// proposed change to a sub-line's interest rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRateDelta {
    pub adjusted_rate: Rate,
}

impl AdjustmentDelta for InterestRateDelta {
    type Parent = CreditSubline;
    type Snapshot = Rate;

    const ENTITY: &'static str = "interest rate adjustment";

    fn capture(parent: &CreditSubline) -> Rate {
        parent.interest_rate
    }

    fn validate(&self, _parent: &CreditSubline) -> Result<()> {
        if self.adjusted_rate.as_decimal() <= rust_decimal::Decimal::ZERO {
            return Err(LendingError::RateNotPositive {
                rate: self.adjusted_rate,
            });
        }
        Ok(())
    }

    fn apply(&self, parent: &mut CreditSubline) {
        // percentage-form input is normalized to a fraction on write
        parent.set_interest_rate(self.adjusted_rate);
    }
}

/// proposed change to a sub-line's operational status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SublineStatusDelta {
    pub adjusted_status: SublineStatus,
}

impl SublineStatusDelta {
    /// whether approval of this delta would activate the sub-line
    pub fn proposes_activation(&self) -> bool {
        self.adjusted_status == SublineStatus::Active
    }
}

impl AdjustmentDelta for SublineStatusDelta {
    type Parent = CreditSubline;
    type Snapshot = SublineStatus;

    const ENTITY: &'static str = "sub-line status adjustment";

    fn capture(parent: &CreditSubline) -> SublineStatus {
        parent.status
    }

    fn validate(&self, parent: &CreditSubline) -> Result<()> {
        validate_transition(parent.status, self.adjusted_status)?;
        Ok(())
    }

    fn apply(&self, parent: &mut CreditSubline) {
        parent.status = self.adjusted_status;
    }
}

pub type CreditLineAdjustment = Adjustment<CreditLineDelta>;
pub type CreditAmountAdjustment = Adjustment<CreditAmountDelta>;
pub type InterestRateAdjustment = Adjustment<InterestRateDelta>;
pub type CreditSublineStatusAdjustment = Adjustment<SublineStatusDelta>;
