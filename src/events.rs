use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::types::{
    AdjustmentId, AdjustmentStatus, CreditLineId, LoanTermId, LoanTermStatus, SublineId,
    SublineStatus,
};

/// all events emitted by the lending workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // adjustment lifecycle events
    AdjustmentProposed {
        adjustment_id: AdjustmentId,
        entity: String,
        timestamp: DateTime<Utc>,
    },
    AdjustmentStatusChanged {
        adjustment_id: AdjustmentId,
        old_status: AdjustmentStatus,
        new_status: AdjustmentStatus,
        timestamp: DateTime<Utc>,
    },
    AdjustmentImplemented {
        adjustment_id: AdjustmentId,
        effective_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    // parent mutation events
    CreditLineChanged {
        credit_line_id: CreditLineId,
        timestamp: DateTime<Utc>,
    },
    SublineAmountChanged {
        subline_id: SublineId,
        old_amount: Money,
        new_amount: Money,
        timestamp: DateTime<Utc>,
    },
    SublineRateChanged {
        subline_id: SublineId,
        old_rate: Rate,
        new_rate: Rate,
        timestamp: DateTime<Utc>,
    },
    SublineStatusChanged {
        subline_id: SublineId,
        old_status: SublineStatus,
        new_status: SublineStatus,
        timestamp: DateTime<Utc>,
    },

    // loan term events
    LoanTermStatusChanged {
        loan_term_id: LoanTermId,
        old_status: LoanTermStatus,
        new_status: LoanTermStatus,
        timestamp: DateTime<Utc>,
    },
    ScheduleGenerated {
        loan_term_id: LoanTermId,
        payment_count: usize,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: Vec<Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_take_events_drains_the_store() {
        let mut store = EventStore::new();
        store.emit(Event::ScheduleGenerated {
            loan_term_id: Uuid::new_v4(),
            payment_count: 12,
            timestamp: Utc::now(),
        });
        assert_eq!(store.events().len(), 1);

        let taken = store.take_events();
        assert_eq!(taken.len(), 1);
        assert!(store.events().is_empty());
    }
}
