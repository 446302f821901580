//! Contest ingestion: provider aggregation, reconciliation into the store,
//! and the scheduler that runs both as one sync cycle.

mod aggregator;
mod reconciler;
mod scheduler;

pub use aggregator::*;
pub use reconciler::*;
pub use scheduler::*;
