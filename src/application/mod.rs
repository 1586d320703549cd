// Application layer - use cases and orchestration.
// BalanceLedger owns balances, RequestWorkflow owns requests and only
// changes balances through the ledger; LeaveService wires both together.

pub mod clock;
pub mod error;
pub mod ledger;
mod locks;
pub mod service;
pub mod workflow;

pub use clock::*;
pub use error::*;
pub use ledger::*;
pub(crate) use locks::KeyedLocks;
pub use service::*;
pub use workflow::*;
