//! In-memory persistence boundary for the lending workflow.
//!
//! Entities live in typed maps keyed by id. Every mutation runs inside a
//! transaction: the state is staged, the mutation closure runs against the
//! stage, and the stage is swapped in only on success. Approval side
//! effects and domain events are buffered per transaction and released
//! strictly after the commit swap; a failed closure releases nothing.

pub mod hooks;

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::adjustments::{
    Adjustment, AdjustmentDelta, CreditAmountAdjustment, CreditAmountDelta,
    CreditLineAdjustment, CreditLineDelta, CreditSublineStatusAdjustment, InterestRateAdjustment,
    InterestRateDelta, SublineStatusDelta,
};
use crate::decimal::{Money, Rate};
use crate::entities::{CreditLine, CreditSubline, LoanTerm, ScheduledPayment};
use crate::errors::{LendingError, Result};
use crate::events::{Event, EventStore};
use crate::lifecycle::validate_transition;
use crate::schedule::{generate_schedule, LoanParameters};
use crate::types::{
    AdjustmentId, AdjustmentStatus, CreditLineId, Currency, LoanTermId, LoanTermStatus,
    PaymentId, RepaymentFrequency, SublineId,
};

pub use hooks::{Effect, PostCommitQueue};

/// all persisted rows, cloned wholesale to stage a transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    credit_lines: HashMap<CreditLineId, CreditLine>,
    sublines: HashMap<SublineId, CreditSubline>,
    loan_terms: HashMap<LoanTermId, LoanTerm>,
    scheduled_payments: HashMap<PaymentId, ScheduledPayment>,
    line_adjustments: HashMap<AdjustmentId, CreditLineAdjustment>,
    amount_adjustments: HashMap<AdjustmentId, CreditAmountAdjustment>,
    rate_adjustments: HashMap<AdjustmentId, InterestRateAdjustment>,
    subline_status_adjustments: HashMap<AdjustmentId, CreditSublineStatusAdjustment>,
}

/// storage plumbing for one adjustment kind
trait AdjustmentArena<D: AdjustmentDelta> {
    fn arena(&self) -> &HashMap<AdjustmentId, Adjustment<D>>;
    fn arena_mut(&mut self) -> &mut HashMap<AdjustmentId, Adjustment<D>>;
    fn parent(&self, id: Uuid) -> Result<&D::Parent>;
    fn parent_mut(&mut self, id: Uuid) -> Result<&mut D::Parent>;

    /// post-commit effect implementing an approval of this kind
    fn implement_effect(id: AdjustmentId) -> Effect;

    /// checked before an approval is accepted, ahead of any mutation
    fn approval_guard(&self, _adjustment: &Adjustment<D>) -> Result<()> {
        Ok(())
    }

    /// events describing the parent mutation, computed before apply
    fn change_events(parent: &D::Parent, delta: &D, timestamp: DateTime<Utc>) -> Vec<Event>;

    fn touch(_parent: &mut D::Parent, _now: DateTime<Utc>) {}
}

impl AdjustmentArena<CreditLineDelta> for StoreState {
    fn arena(&self) -> &HashMap<AdjustmentId, CreditLineAdjustment> {
        &self.line_adjustments
    }

    fn arena_mut(&mut self) -> &mut HashMap<AdjustmentId, CreditLineAdjustment> {
        &mut self.line_adjustments
    }

    fn parent(&self, id: Uuid) -> Result<&CreditLine> {
        self.credit_lines.get(&id).ok_or(LendingError::NotFound {
            entity: "credit line",
            id,
        })
    }

    fn parent_mut(&mut self, id: Uuid) -> Result<&mut CreditLine> {
        self.credit_lines
            .get_mut(&id)
            .ok_or(LendingError::NotFound {
                entity: "credit line",
                id,
            })
    }

    fn implement_effect(id: AdjustmentId) -> Effect {
        Effect::ImplementCreditLineAdjustment(id)
    }

    fn change_events(
        parent: &CreditLine,
        _delta: &CreditLineDelta,
        timestamp: DateTime<Utc>,
    ) -> Vec<Event> {
        vec![Event::CreditLineChanged {
            credit_line_id: parent.id,
            timestamp,
        }]
    }
}

impl AdjustmentArena<CreditAmountDelta> for StoreState {
    fn arena(&self) -> &HashMap<AdjustmentId, CreditAmountAdjustment> {
        &self.amount_adjustments
    }

    fn arena_mut(&mut self) -> &mut HashMap<AdjustmentId, CreditAmountAdjustment> {
        &mut self.amount_adjustments
    }

    fn parent(&self, id: Uuid) -> Result<&CreditSubline> {
        self.sublines.get(&id).ok_or(LendingError::NotFound {
            entity: "credit sub-line",
            id,
        })
    }

    fn parent_mut(&mut self, id: Uuid) -> Result<&mut CreditSubline> {
        self.sublines.get_mut(&id).ok_or(LendingError::NotFound {
            entity: "credit sub-line",
            id,
        })
    }

    fn implement_effect(id: AdjustmentId) -> Effect {
        Effect::ImplementCreditAmountAdjustment(id)
    }

    fn change_events(
        parent: &CreditSubline,
        delta: &CreditAmountDelta,
        timestamp: DateTime<Utc>,
    ) -> Vec<Event> {
        match delta.adjusted_amount {
            Some(new_amount) => vec![Event::SublineAmountChanged {
                subline_id: parent.id,
                old_amount: parent.subline_amount,
                new_amount,
                timestamp,
            }],
            None => Vec::new(),
        }
    }

    fn touch(parent: &mut CreditSubline, now: DateTime<Utc>) {
        parent.updated = now;
    }
}

impl AdjustmentArena<InterestRateDelta> for StoreState {
    fn arena(&self) -> &HashMap<AdjustmentId, InterestRateAdjustment> {
        &self.rate_adjustments
    }

    fn arena_mut(&mut self) -> &mut HashMap<AdjustmentId, InterestRateAdjustment> {
        &mut self.rate_adjustments
    }

    fn parent(&self, id: Uuid) -> Result<&CreditSubline> {
        self.sublines.get(&id).ok_or(LendingError::NotFound {
            entity: "credit sub-line",
            id,
        })
    }

    fn parent_mut(&mut self, id: Uuid) -> Result<&mut CreditSubline> {
        self.sublines.get_mut(&id).ok_or(LendingError::NotFound {
            entity: "credit sub-line",
            id,
        })
    }

    fn implement_effect(id: AdjustmentId) -> Effect {
        Effect::ImplementInterestRateAdjustment(id)
    }

    fn change_events(
        parent: &CreditSubline,
        delta: &InterestRateDelta,
        timestamp: DateTime<Utc>,
    ) -> Vec<Event> {
        vec![Event::SublineRateChanged {
            subline_id: parent.id,
            old_rate: parent.interest_rate,
            new_rate: delta.adjusted_rate.normalized(),
            timestamp,
        }]
    }

    fn touch(parent: &mut CreditSubline, now: DateTime<Utc>) {
        parent.updated = now;
    }
}

impl AdjustmentArena<SublineStatusDelta> for StoreState {
    fn arena(&self) -> &HashMap<AdjustmentId, CreditSublineStatusAdjustment> {
        &self.subline_status_adjustments
    }

    fn arena_mut(&mut self) -> &mut HashMap<AdjustmentId, CreditSublineStatusAdjustment> {
        &mut self.subline_status_adjustments
    }

    fn parent(&self, id: Uuid) -> Result<&CreditSubline> {
        self.sublines.get(&id).ok_or(LendingError::NotFound {
            entity: "credit sub-line",
            id,
        })
    }

    fn parent_mut(&mut self, id: Uuid) -> Result<&mut CreditSubline> {
        self.sublines.get_mut(&id).ok_or(LendingError::NotFound {
            entity: "credit sub-line",
            id,
        })
    }

    fn implement_effect(id: AdjustmentId) -> Effect {
        Effect::ImplementSublineStatusAdjustment(id)
    }

    /// activating a sub-line requires its credit line to be approved
    fn approval_guard(&self, adjustment: &CreditSublineStatusAdjustment) -> Result<()> {
        if adjustment.proposed.proposes_activation() {
            let subline = AdjustmentArena::<SublineStatusDelta>::parent(self, adjustment.parent_id)?;
            let line =
                self.credit_lines
                    .get(&subline.credit_line)
                    .ok_or(LendingError::NotFound {
                        entity: "credit line",
                        id: subline.credit_line,
                    })?;
            subline.check_activation(line)?;
        }
        Ok(())
    }

    fn change_events(
        parent: &CreditSubline,
        delta: &SublineStatusDelta,
        timestamp: DateTime<Utc>,
    ) -> Vec<Event> {
        vec![Event::SublineStatusChanged {
            subline_id: parent.id,
            old_status: parent.status,
            new_status: delta.adjusted_status,
            timestamp,
        }]
    }

    fn touch(parent: &mut CreditSubline, now: DateTime<Utc>) {
        parent.updated = now;
    }
}

/// the lending workflow store
#[derive(Debug, Default)]
pub struct LendingStore {
    state: StoreState,
    events: EventStore,
}

impl LendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// events published by committed transactions
    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    /// run a mutation atomically
    ///
    /// The closure works on a staged copy of the state; an error drops the
    /// stage along with any queued effects and buffered events. On success
    /// the stage is swapped in first, then events publish and the effect
    /// queue flushes, so effects only ever observe durable approvals.
    fn transact<T>(
        &mut self,
        time: &SafeTimeProvider,
        f: impl FnOnce(&mut StoreState, &mut PostCommitQueue, &mut Vec<Event>) -> Result<T>,
    ) -> Result<T> {
        let mut staged = self.state.clone();
        let mut queue = PostCommitQueue::new();
        let mut pending_events = Vec::new();

        let value = f(&mut staged, &mut queue, &mut pending_events)?;

        self.state = staged;
        self.events.extend(pending_events);
        for effect in queue.drain() {
            debug!(?effect, "flushing post-commit effect");
            self.apply_effect(effect, time)?;
        }
        Ok(value)
    }

    fn apply_effect(&mut self, effect: Effect, time: &SafeTimeProvider) -> Result<()> {
        match effect {
            Effect::ImplementCreditLineAdjustment(id) => {
                self.implement_adjustment::<CreditLineDelta>(id, time)
            }
            Effect::ImplementCreditAmountAdjustment(id) => {
                self.implement_adjustment::<CreditAmountDelta>(id, time)
            }
            Effect::ImplementInterestRateAdjustment(id) => {
                self.implement_adjustment::<InterestRateDelta>(id, time)
            }
            Effect::ImplementSublineStatusAdjustment(id) => {
                self.implement_adjustment::<SublineStatusDelta>(id, time)
            }
            Effect::MaterializeSchedule(id) => self.materialize_schedule(id, time),
        }
    }

    // ---- creation ----

    pub fn create_credit_line(
        &mut self,
        customer_id: impl Into<String>,
        credit_limit: Money,
        currency: Currency,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        time: &SafeTimeProvider,
    ) -> Result<CreditLineId> {
        let line = CreditLine::new(
            customer_id.into(),
            credit_limit,
            currency,
            start_date,
            end_date,
            time.now(),
        )?;
        let id = line.id;
        self.transact(time, move |state, _queue, _events| {
            state.credit_lines.insert(id, line);
            Ok(())
        })?;
        Ok(id)
    }

    pub fn create_subline(
        &mut self,
        credit_line: CreditLineId,
        subline_type: Option<String>,
        subline_amount: Money,
        interest_rate: Rate,
        time: &SafeTimeProvider,
    ) -> Result<SublineId> {
        self.credit_line(credit_line)?;
        let subline = CreditSubline::new(
            credit_line,
            subline_type,
            subline_amount,
            interest_rate,
            time.now(),
        )?;
        let id = subline.id;
        self.transact(time, move |state, _queue, _events| {
            state.sublines.insert(id, subline);
            Ok(())
        })?;
        Ok(id)
    }

    /// create a loan term for a sub-line
    ///
    /// A sub-line carries at most one term; a second is an integrity
    /// error. Creating a term directly in approved does not materialize a
    /// schedule — only a status update into approved does.
    pub fn create_loan_term(
        &mut self,
        credit_subline: SublineId,
        term_length: u32,
        repayment_frequency: RepaymentFrequency,
        payment_due_day: Option<u32>,
        start_date: NaiveDate,
        status: LoanTermStatus,
        time: &SafeTimeProvider,
    ) -> Result<LoanTermId> {
        self.subline(credit_subline)?;
        if self
            .state
            .loan_terms
            .values()
            .any(|term| term.credit_subline == credit_subline)
        {
            return Err(LendingError::DuplicateLoanTerm {
                subline: credit_subline,
            });
        }
        let term = LoanTerm::new(
            credit_subline,
            term_length,
            repayment_frequency,
            payment_due_day,
            start_date,
            status,
            time.now(),
        )?;
        let id = term.id;
        self.transact(time, move |state, _queue, _events| {
            state.loan_terms.insert(id, term);
            Ok(())
        })?;
        Ok(id)
    }

    // ---- lookups ----

    pub fn credit_line(&self, id: CreditLineId) -> Result<&CreditLine> {
        self.state.credit_lines.get(&id).ok_or(LendingError::NotFound {
            entity: "credit line",
            id,
        })
    }

    pub fn subline(&self, id: SublineId) -> Result<&CreditSubline> {
        self.state.sublines.get(&id).ok_or(LendingError::NotFound {
            entity: "credit sub-line",
            id,
        })
    }

    pub fn loan_term(&self, id: LoanTermId) -> Result<&LoanTerm> {
        self.state.loan_terms.get(&id).ok_or(LendingError::NotFound {
            entity: "loan term",
            id,
        })
    }

    pub fn scheduled_payment(&self, id: PaymentId) -> Result<&ScheduledPayment> {
        self.state
            .scheduled_payments
            .get(&id)
            .ok_or(LendingError::NotFound {
                entity: "scheduled payment",
                id,
            })
    }

    /// payments of a loan term ordered by due date
    pub fn payments_for_term(&self, loan_term: LoanTermId) -> Vec<&ScheduledPayment> {
        let mut payments: Vec<&ScheduledPayment> = self
            .state
            .scheduled_payments
            .values()
            .filter(|payment| payment.loan_term == loan_term)
            .collect();
        payments.sort_by_key(|payment| payment.due_date);
        payments
    }

    pub fn line_adjustment(&self, id: AdjustmentId) -> Result<&CreditLineAdjustment> {
        self.adjustment::<CreditLineDelta>(id)
    }

    pub fn amount_adjustment(&self, id: AdjustmentId) -> Result<&CreditAmountAdjustment> {
        self.adjustment::<CreditAmountDelta>(id)
    }

    pub fn rate_adjustment(&self, id: AdjustmentId) -> Result<&InterestRateAdjustment> {
        self.adjustment::<InterestRateDelta>(id)
    }

    pub fn subline_status_adjustment(
        &self,
        id: AdjustmentId,
    ) -> Result<&CreditSublineStatusAdjustment> {
        self.adjustment::<SublineStatusDelta>(id)
    }

    fn adjustment<D: AdjustmentDelta>(&self, id: AdjustmentId) -> Result<&Adjustment<D>>
    where
        StoreState: AdjustmentArena<D>,
    {
        <StoreState as AdjustmentArena<D>>::arena(&self.state)
            .get(&id)
            .ok_or(LendingError::NotFound {
                entity: D::ENTITY,
                id,
            })
    }

    // ---- adjustment proposals ----

    pub fn propose_line_adjustment(
        &mut self,
        credit_line: CreditLineId,
        delta: CreditLineDelta,
        reason: impl Into<String>,
        time: &SafeTimeProvider,
    ) -> Result<AdjustmentId> {
        self.propose(credit_line, delta, reason, time)
    }

    pub fn propose_amount_adjustment(
        &mut self,
        subline: SublineId,
        delta: CreditAmountDelta,
        reason: impl Into<String>,
        time: &SafeTimeProvider,
    ) -> Result<AdjustmentId> {
        self.propose(subline, delta, reason, time)
    }

    pub fn propose_rate_adjustment(
        &mut self,
        subline: SublineId,
        delta: InterestRateDelta,
        reason: impl Into<String>,
        time: &SafeTimeProvider,
    ) -> Result<AdjustmentId> {
        self.propose(subline, delta, reason, time)
    }

    pub fn propose_subline_status_adjustment(
        &mut self,
        subline: SublineId,
        delta: SublineStatusDelta,
        reason: impl Into<String>,
        time: &SafeTimeProvider,
    ) -> Result<AdjustmentId> {
        self.propose(subline, delta, reason, time)
    }

    fn propose<D: AdjustmentDelta>(
        &mut self,
        parent_id: Uuid,
        delta: D,
        reason: impl Into<String>,
        time: &SafeTimeProvider,
    ) -> Result<AdjustmentId>
    where
        StoreState: AdjustmentArena<D>,
    {
        let now = time.now();
        let adjustment = {
            let parent = <StoreState as AdjustmentArena<D>>::parent(&self.state, parent_id)?;
            Adjustment::propose(parent_id, parent, delta, reason, now.date_naive())?
        };
        let id = adjustment.id;
        self.transact(time, move |state, _queue, events| {
            <StoreState as AdjustmentArena<D>>::arena_mut(state).insert(id, adjustment);
            events.push(Event::AdjustmentProposed {
                adjustment_id: id,
                entity: D::ENTITY.to_string(),
                timestamp: now,
            });
            Ok(())
        })?;
        Ok(id)
    }

    // ---- adjustment review ----

    pub fn review_line_adjustment(
        &mut self,
        id: AdjustmentId,
        requested: AdjustmentStatus,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        self.review_adjustment::<CreditLineDelta>(id, requested, time)
    }

    pub fn review_amount_adjustment(
        &mut self,
        id: AdjustmentId,
        requested: AdjustmentStatus,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        self.review_adjustment::<CreditAmountDelta>(id, requested, time)
    }

    pub fn review_rate_adjustment(
        &mut self,
        id: AdjustmentId,
        requested: AdjustmentStatus,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        self.review_adjustment::<InterestRateDelta>(id, requested, time)
    }

    pub fn review_subline_status_adjustment(
        &mut self,
        id: AdjustmentId,
        requested: AdjustmentStatus,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        self.review_adjustment::<SublineStatusDelta>(id, requested, time)
    }

    /// move an adjustment through its review lifecycle
    ///
    /// Entering approved from any other state enqueues the implementation
    /// effect; the before/after comparison happens here, at write time, so
    /// re-saving an already approved adjustment never re-fires it.
    fn review_adjustment<D: AdjustmentDelta>(
        &mut self,
        id: AdjustmentId,
        requested: AdjustmentStatus,
        time: &SafeTimeProvider,
    ) -> Result<()>
    where
        StoreState: AdjustmentArena<D>,
    {
        let now = time.now();
        self.transact(time, |state, queue, events| {
            {
                let adjustment = <StoreState as AdjustmentArena<D>>::arena(state)
                    .get(&id)
                    .ok_or(LendingError::NotFound {
                        entity: D::ENTITY,
                        id,
                    })?;
                validate_transition(adjustment.status, requested)?;
                if requested == AdjustmentStatus::Approved {
                    <StoreState as AdjustmentArena<D>>::approval_guard(state, adjustment)?;
                }
            }

            let adjustment = <StoreState as AdjustmentArena<D>>::arena_mut(state)
                .get_mut(&id)
                .ok_or(LendingError::NotFound {
                    entity: D::ENTITY,
                    id,
                })?;
            let before = adjustment.set_status(requested)?;
            if requested == AdjustmentStatus::Implemented && before != AdjustmentStatus::Implemented
            {
                adjustment.effective_date = now.date_naive();
            }

            if before != requested {
                events.push(Event::AdjustmentStatusChanged {
                    adjustment_id: id,
                    old_status: before,
                    new_status: requested,
                    timestamp: now,
                });
            }
            if requested == AdjustmentStatus::Approved && before != AdjustmentStatus::Approved {
                queue.enqueue(<StoreState as AdjustmentArena<D>>::implement_effect(id));
            }
            Ok(())
        })
    }

    /// apply an approved adjustment to its parent and mark it implemented
    ///
    /// Runs as a post-commit effect in its own transaction: the parent
    /// mutation and the implemented flip land together or not at all.
    fn implement_adjustment<D: AdjustmentDelta>(
        &mut self,
        id: AdjustmentId,
        time: &SafeTimeProvider,
    ) -> Result<()>
    where
        StoreState: AdjustmentArena<D>,
    {
        let now = time.now();
        let today = now.date_naive();
        self.transact(time, |state, _queue, events| {
            let adjustment = <StoreState as AdjustmentArena<D>>::arena(state)
                .get(&id)
                .ok_or(LendingError::NotFound {
                    entity: D::ENTITY,
                    id,
                })?
                .clone();

            {
                let parent =
                    <StoreState as AdjustmentArena<D>>::parent_mut(state, adjustment.parent_id)?;
                events.extend(<StoreState as AdjustmentArena<D>>::change_events(
                    parent,
                    &adjustment.proposed,
                    now,
                ));
                adjustment.proposed.apply(parent);
                <StoreState as AdjustmentArena<D>>::touch(parent, now);
            }

            let stored = <StoreState as AdjustmentArena<D>>::arena_mut(state)
                .get_mut(&id)
                .ok_or(LendingError::NotFound {
                    entity: D::ENTITY,
                    id,
                })?;
            stored.implement(today)?;
            events.push(Event::AdjustmentImplemented {
                adjustment_id: id,
                effective_date: today,
                timestamp: now,
            });
            Ok(())
        })?;
        debug!(adjustment = %id, entity = D::ENTITY, "adjustment implemented");
        Ok(())
    }

    // ---- loan term review ----

    /// move a loan term through its review lifecycle
    ///
    /// An update into approved from a captured non-approved status
    /// enqueues schedule materialization; creation never passes through
    /// here, so a term created directly in approved stays scheduleless.
    pub fn review_loan_term(
        &mut self,
        id: LoanTermId,
        requested: LoanTermStatus,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        let now = time.now();
        self.transact(time, |state, queue, events| {
            let term = state.loan_terms.get_mut(&id).ok_or(LendingError::NotFound {
                entity: "loan term",
                id,
            })?;
            let before = term.status;
            term.status = validate_transition(term.status, requested)?;
            term.updated = now;

            if before != requested {
                events.push(Event::LoanTermStatusChanged {
                    loan_term_id: id,
                    old_status: before,
                    new_status: requested,
                    timestamp: now,
                });
            }
            if requested == LoanTermStatus::Approved && before != LoanTermStatus::Approved {
                queue.enqueue(Effect::MaterializeSchedule(id));
            }
            Ok(())
        })
    }

    /// generate and bulk-insert the payment schedule of an approved term
    ///
    /// Runs as a post-commit effect. Idempotency rests on the before/after
    /// capture gate in `review_loan_term`; there is no separate existence
    /// check on purpose.
    fn materialize_schedule(&mut self, id: LoanTermId, time: &SafeTimeProvider) -> Result<()> {
        let now = time.now();
        let count = self.transact(time, |state, _queue, events| {
            let term = state
                .loan_terms
                .get(&id)
                .ok_or(LendingError::NotFound {
                    entity: "loan term",
                    id,
                })?
                .clone();
            let subline =
                state
                    .sublines
                    .get(&term.credit_subline)
                    .ok_or(LendingError::NotFound {
                        entity: "credit sub-line",
                        id: term.credit_subline,
                    })?;

            let params = LoanParameters::new(
                subline.subline_amount,
                subline.interest_rate,
                term.term_length,
                term.repayment_frequency,
                term.start_date,
                term.payment_due_day,
            )?;
            let schedule = generate_schedule(&params)?;

            // the anchor row is not a payable installment
            let mut count = 0usize;
            for record in schedule.iter().skip(1) {
                let payment = ScheduledPayment::from_record(id, record);
                state.scheduled_payments.insert(payment.id, payment);
                count += 1;
            }
            events.push(Event::ScheduleGenerated {
                loan_term_id: id,
                payment_count: count,
                timestamp: now,
            });
            Ok(count)
        })?;
        info!(loan_term = %id, payments = count, "payment schedule materialized");
        Ok(())
    }

    // ---- scheduled payment updates ----

    pub fn record_payment_completed(
        &mut self,
        id: PaymentId,
        paid_on: NaiveDate,
        time: &SafeTimeProvider,
    ) -> Result<()> {
        self.transact(time, |state, _queue, _events| {
            let payment = state
                .scheduled_payments
                .get_mut(&id)
                .ok_or(LendingError::NotFound {
                    entity: "scheduled payment",
                    id,
                })?;
            payment.mark_completed(paid_on);
            Ok(())
        })
    }

    pub fn record_payment_delayed(&mut self, id: PaymentId, time: &SafeTimeProvider) -> Result<()> {
        self.transact(time, |state, _queue, _events| {
            let payment = state
                .scheduled_payments
                .get_mut(&id)
                .ok_or(LendingError::NotFound {
                    entity: "scheduled payment",
                    id,
                })?;
            payment.mark_delayed();
            Ok(())
        })
    }

    // ---- snapshots ----

    /// serialize the persisted state as pretty-printed json
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.state)?)
    }

    /// rebuild a store from a json snapshot, with a fresh event store
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            state: serde_json::from_str(json)?,
            events: EventStore::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    use crate::types::{CreditLineStatus, PaymentStatus, SublineStatus};

    fn provider() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_line(store: &mut LendingStore, time: &SafeTimeProvider) -> CreditLineId {
        store
            .create_credit_line(
                "customer-1",
                Money::from_major(500_000),
                Currency::Mxn,
                date(2024, 1, 1),
                None,
                time,
            )
            .unwrap()
    }

    fn approve_line(store: &mut LendingStore, line: CreditLineId, time: &SafeTimeProvider) {
        let id = store
            .propose_line_adjustment(
                line,
                CreditLineDelta {
                    status: Some(CreditLineStatus::Approved),
                    ..Default::default()
                },
                "credit committee sign-off",
                time,
            )
            .unwrap();
        store
            .review_line_adjustment(id, AdjustmentStatus::Approved, time)
            .unwrap();
    }

    fn new_subline(
        store: &mut LendingStore,
        line: CreditLineId,
        time: &SafeTimeProvider,
    ) -> SublineId {
        store
            .create_subline(
                line,
                Some("working capital".to_string()),
                Money::from_major(10_000),
                Rate::from_decimal(dec!(0.12)),
                time,
            )
            .unwrap()
    }

    #[test]
    fn test_create_and_lookup() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);

        assert_eq!(store.credit_line(line).unwrap().status, CreditLineStatus::Pending);
        let missing = store.credit_line(Uuid::new_v4()).unwrap_err();
        assert!(matches!(missing, LendingError::NotFound { .. }));
    }

    #[test]
    fn test_line_adjustment_approval_implements_and_stamps() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);

        let id = store
            .propose_line_adjustment(
                line,
                CreditLineDelta {
                    credit_limit: Some(Money::from_major(750_000)),
                    status: Some(CreditLineStatus::Approved),
                    ..Default::default()
                },
                "expanded facility",
                &time,
            )
            .unwrap();

        // previous snapshot captured at proposal time
        let adjustment = store.line_adjustment(id).unwrap();
        assert_eq!(adjustment.previous.credit_limit, Money::from_major(500_000));
        assert_eq!(adjustment.previous.status, CreditLineStatus::Pending);

        store
            .review_line_adjustment(id, AdjustmentStatus::Approved, &time)
            .unwrap();

        let updated = store.credit_line(line).unwrap();
        assert_eq!(updated.credit_limit, Money::from_major(750_000));
        assert_eq!(updated.status, CreditLineStatus::Approved);

        let implemented = store.line_adjustment(id).unwrap();
        assert_eq!(implemented.status, AdjustmentStatus::Implemented);
        assert_eq!(implemented.effective_date, date(2024, 6, 1));
    }

    #[test]
    fn test_rejection_is_terminal_and_leaves_parent_alone() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let id = store
            .propose_amount_adjustment(
                subline,
                CreditAmountDelta {
                    adjusted_amount: Some(Money::from_major(20_000)),
                },
                "requested increase",
                &time,
            )
            .unwrap();

        store
            .review_amount_adjustment(id, AdjustmentStatus::Rejected, &time)
            .unwrap();

        assert_eq!(
            store.subline(subline).unwrap().subline_amount,
            Money::from_major(10_000)
        );

        // re-saving the same status stays idempotent
        store
            .review_amount_adjustment(id, AdjustmentStatus::Rejected, &time)
            .unwrap();

        let err = store
            .review_amount_adjustment(id, AdjustmentStatus::Approved, &time)
            .unwrap_err();
        assert!(matches!(err, LendingError::InvalidTransition { .. }));
    }

    #[test]
    fn test_amount_adjustment_applies_on_approval() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let id = store
            .propose_amount_adjustment(
                subline,
                CreditAmountDelta {
                    adjusted_amount: Some(Money::from_major(25_000)),
                },
                "seasonal expansion",
                &time,
            )
            .unwrap();
        store
            .review_amount_adjustment(id, AdjustmentStatus::Approved, &time)
            .unwrap();

        assert_eq!(
            store.subline(subline).unwrap().subline_amount,
            Money::from_major(25_000)
        );
        assert_eq!(
            store.amount_adjustment(id).unwrap().status,
            AdjustmentStatus::Implemented
        );
        // the previous value is never backfilled
        assert_eq!(
            store.amount_adjustment(id).unwrap().previous,
            Money::from_major(10_000)
        );
    }

    #[test]
    fn test_rate_adjustment_normalizes_percentage_input() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let id = store
            .propose_rate_adjustment(
                subline,
                InterestRateDelta {
                    adjusted_rate: Rate::from_decimal(dec!(35.5)),
                },
                "repricing to market",
                &time,
            )
            .unwrap();
        store
            .review_rate_adjustment(id, AdjustmentStatus::Approved, &time)
            .unwrap();

        assert_eq!(
            store.subline(subline).unwrap().interest_rate,
            Rate::from_decimal(dec!(0.355))
        );
    }

    #[test]
    fn test_subline_activation_blocked_without_approved_line() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let id = store
            .propose_subline_status_adjustment(
                subline,
                SublineStatusDelta {
                    adjusted_status: SublineStatus::Active,
                },
                "go live",
                &time,
            )
            .unwrap();

        let err = store
            .review_subline_status_adjustment(id, AdjustmentStatus::Approved, &time)
            .unwrap_err();
        assert!(matches!(err, LendingError::ParentLineNotApproved { .. }));

        // the failed approval mutated nothing
        assert_eq!(store.subline(subline).unwrap().status, SublineStatus::Pending);
        assert_eq!(
            store.subline_status_adjustment(id).unwrap().status,
            AdjustmentStatus::PendingReview
        );
    }

    #[test]
    fn test_subline_activation_after_line_approval() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);
        approve_line(&mut store, line, &time);

        let id = store
            .propose_subline_status_adjustment(
                subline,
                SublineStatusDelta {
                    adjusted_status: SublineStatus::Active,
                },
                "go live",
                &time,
            )
            .unwrap();
        store
            .review_subline_status_adjustment(id, AdjustmentStatus::Approved, &time)
            .unwrap();

        assert_eq!(store.subline(subline).unwrap().status, SublineStatus::Active);
        assert_eq!(
            store.subline_status_adjustment(id).unwrap().status,
            AdjustmentStatus::Implemented
        );
    }

    #[test]
    fn test_loan_term_approval_materializes_schedule() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let term = store
            .create_loan_term(
                subline,
                12,
                RepaymentFrequency::Monthly,
                None,
                date(2024, 1, 1),
                LoanTermStatus::Pending,
                &time,
            )
            .unwrap();

        assert!(store.payments_for_term(term).is_empty());

        store
            .review_loan_term(term, LoanTermStatus::Approved, &time)
            .unwrap();

        let payments = store.payments_for_term(term);
        assert_eq!(payments.len(), 12);
        assert!(payments
            .iter()
            .all(|p| p.payment_status == PaymentStatus::Pending));
        // the zero-value anchor row is excluded
        assert!(payments.iter().all(|p| p.amount_due.is_positive()));
        // ordered by due date, starting one month in
        assert_eq!(payments[0].due_date, date(2024, 2, 1));
        for pair in payments.windows(2) {
            assert!(pair[0].due_date < pair[1].due_date);
        }
    }

    #[test]
    fn test_loan_term_reapproval_does_not_duplicate_payments() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let term = store
            .create_loan_term(
                subline,
                12,
                RepaymentFrequency::Monthly,
                None,
                date(2024, 1, 1),
                LoanTermStatus::Pending,
                &time,
            )
            .unwrap();
        store
            .review_loan_term(term, LoanTermStatus::Approved, &time)
            .unwrap();
        assert_eq!(store.payments_for_term(term).len(), 12);

        // idempotent self-transition, no second materialization
        store
            .review_loan_term(term, LoanTermStatus::Approved, &time)
            .unwrap();
        assert_eq!(store.payments_for_term(term).len(), 12);
    }

    #[test]
    fn test_loan_term_created_approved_is_exempt() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let term = store
            .create_loan_term(
                subline,
                12,
                RepaymentFrequency::Monthly,
                None,
                date(2024, 1, 1),
                LoanTermStatus::Approved,
                &time,
            )
            .unwrap();

        // initial-state exemption: no update, no schedule
        assert!(store.payments_for_term(term).is_empty());
        store
            .review_loan_term(term, LoanTermStatus::Approved, &time)
            .unwrap();
        assert!(store.payments_for_term(term).is_empty());
    }

    #[test]
    fn test_duplicate_loan_term_is_an_integrity_error() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        store
            .create_loan_term(
                subline,
                12,
                RepaymentFrequency::Monthly,
                None,
                date(2024, 1, 1),
                LoanTermStatus::Pending,
                &time,
            )
            .unwrap();

        let err = store
            .create_loan_term(
                subline,
                24,
                RepaymentFrequency::Biweekly,
                None,
                date(2024, 2, 1),
                LoanTermStatus::Pending,
                &time,
            )
            .unwrap_err();
        assert!(matches!(err, LendingError::DuplicateLoanTerm { .. }));
    }

    #[test]
    fn test_rejected_loan_term_is_terminal() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let term = store
            .create_loan_term(
                subline,
                12,
                RepaymentFrequency::Monthly,
                None,
                date(2024, 1, 1),
                LoanTermStatus::Pending,
                &time,
            )
            .unwrap();
        store
            .review_loan_term(term, LoanTermStatus::Rejected, &time)
            .unwrap();

        let err = store
            .review_loan_term(term, LoanTermStatus::Approved, &time)
            .unwrap_err();
        assert!(matches!(err, LendingError::InvalidTransition { .. }));
        assert!(store.payments_for_term(term).is_empty());
    }

    #[test]
    fn test_payment_status_updates_after_materialization() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let term = store
            .create_loan_term(
                subline,
                6,
                RepaymentFrequency::Monthly,
                None,
                date(2024, 1, 1),
                LoanTermStatus::Pending,
                &time,
            )
            .unwrap();
        store
            .review_loan_term(term, LoanTermStatus::Approved, &time)
            .unwrap();

        let first = store.payments_for_term(term)[0].id;
        store
            .record_payment_completed(first, date(2024, 2, 3), &time)
            .unwrap();

        let paid = store.scheduled_payment(first).unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Completed);
        assert_eq!(paid.actual_payment_date, Some(date(2024, 2, 3)));

        let second = store.payments_for_term(term)[1].id;
        store.record_payment_delayed(second, &time).unwrap();
        assert_eq!(
            store.scheduled_payment(second).unwrap().payment_status,
            PaymentStatus::Delayed
        );
    }

    #[test]
    fn test_events_publish_in_commit_order() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        store.take_events();
        let id = store
            .propose_amount_adjustment(
                subline,
                CreditAmountDelta {
                    adjusted_amount: Some(Money::from_major(25_000)),
                },
                "seasonal expansion",
                &time,
            )
            .unwrap();
        store
            .review_amount_adjustment(id, AdjustmentStatus::Approved, &time)
            .unwrap();

        let events = store.take_events();
        assert!(matches!(events[0], Event::AdjustmentProposed { .. }));
        assert!(matches!(events[1], Event::AdjustmentStatusChanged { .. }));
        assert!(matches!(events[2], Event::SublineAmountChanged { .. }));
        assert!(matches!(events[3], Event::AdjustmentImplemented { .. }));
    }

    #[test]
    fn test_failed_transaction_publishes_no_events() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);

        let id = store
            .propose_subline_status_adjustment(
                subline,
                SublineStatusDelta {
                    adjusted_status: SublineStatus::Active,
                },
                "go live",
                &time,
            )
            .unwrap();
        store.take_events();

        assert!(store
            .review_subline_status_adjustment(id, AdjustmentStatus::Approved, &time)
            .is_err());
        assert!(store.events().is_empty());
    }

    #[test]
    fn test_json_snapshot_round_trip() {
        let time = provider();
        let mut store = LendingStore::new();
        let line = new_line(&mut store, &time);
        let subline = new_subline(&mut store, line, &time);
        let term = store
            .create_loan_term(
                subline,
                12,
                RepaymentFrequency::Monthly,
                None,
                date(2024, 1, 1),
                LoanTermStatus::Pending,
                &time,
            )
            .unwrap();
        store
            .review_loan_term(term, LoanTermStatus::Approved, &time)
            .unwrap();

        let json = store.to_json().unwrap();
        let restored = LendingStore::from_json(&json).unwrap();

        assert_eq!(restored.payments_for_term(term).len(), 12);
        assert_eq!(
            restored.loan_term(term).unwrap().status,
            LoanTermStatus::Approved
        );
        assert_eq!(
            restored.subline(subline).unwrap().subline_amount,
            Money::from_major(10_000)
        );
    }
}
