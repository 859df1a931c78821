pub mod decimal;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod plan;
pub mod reports;
pub mod schedule;
pub mod store;
pub mod types;

// re-export key types
pub use decimal::{Money, Rate};
pub use errors::{InstallmentError, Result};
pub use events::{Event, EventStore};
pub use ledger::{InstallmentLedger, STORAGE_KEY};
pub use plan::InstallmentPlan;
pub use reports::{LedgerStatistics, OverduePayment, UpcomingPayment, UPCOMING_WINDOW_DAYS};
pub use schedule::{FlatRateSchedule, ScheduleEntry};
pub use store::{BlobStore, FileStore, MemoryStore};
pub use types::{EntryStatus, PaymentOverrides, PlanId, PlanRequest, PlanStatus};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
