pub mod adjustments;
pub mod decimal;
pub mod entities;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod schedule;
pub mod store;
pub mod types;

// re-export key types
pub use decimal::{Money, Rate};
pub use errors::{ErrorKind, LendingError, Result};
pub use events::{Event, EventStore};
pub use lifecycle::{validate_transition, LifecycleStatus};
pub use schedule::{generate_schedule, LoanParameters, PaymentRecord};
pub use adjustments::{
    Adjustment, AdjustmentDelta, CreditAmountAdjustment, CreditAmountDelta,
    CreditLineAdjustment, CreditLineDelta, CreditSublineStatusAdjustment, InterestRateAdjustment,
    InterestRateDelta, SublineStatusDelta,
};
pub use entities::{CreditLine, CreditSubline, LoanTerm, ScheduledPayment};
pub use store::LendingStore;
pub use types::{
    AdjustmentId, AdjustmentStatus, CreditLineId, CreditLineStatus, Currency, LoanTermId,
    LoanTermStatus, PaymentId, PaymentStatus, RepaymentFrequency, SublineId, SublineStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
