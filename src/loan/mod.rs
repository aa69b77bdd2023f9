//! Loan Lifecycle
//!
//! Opens and closes bicycle loans against a [`ResourceStore`], charging fees
//! through a [`PaymentGateway`] and announcing results through a notification
//! channel.
//!
//! # State Machine
//!
//! ```text
//! IN_PROGRESS → COMPLETED
//! ```
//!
//! # Invariants
//!
//! 1. **One ride per rider**: at most one IN_PROGRESS loan per rider, also under
//!    concurrent callers
//! 2. **Docks**: a dock holds a bicycle exactly when it is OCCUPIED
//! 3. **All or nothing**: a rejected operation leaves the store untouched
//! 4. **Notify after commit**: notifications go out only for committed work and
//!    never fail the operation

pub mod clock;
pub mod engine;
pub mod error;
pub mod notify;
pub mod payment;
pub mod state;
pub mod store;
pub mod types;


pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineSettings, LoanEngine, OvertimeFailurePolicy};
pub use error::LoanError;
pub use notify::{
    LogNotifier, LoanNotification, NotificationReceiver, NotificationSender, NotificationWorker,
    Notifier, NotifyError, notification_channel,
};
pub use payment::{PaymentGateway, SimulatedCardGateway};
pub use state::LoanState;
pub use store::{MemoryStore, MemoryTables, PgResourceStore, ResourceStore, UnitOfWork};
pub use types::{ChargeResult, ClosedLoan, Loan, LoanEventKind, LoanId, LoanView};
