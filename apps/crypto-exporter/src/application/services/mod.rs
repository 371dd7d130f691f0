//! Application Services
//!
//! The poll cycle coordinates one exchange adapter and a metric sink; the
//! retry policy drives the symbol-list retries inside it.

mod poll_cycle;
mod retry;

pub use poll_cycle::{BalanceAccess, CycleStage, PollCycle, PollSettings};
pub use retry::{RetryConfig, RetryPolicy};
