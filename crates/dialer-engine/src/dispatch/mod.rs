//! Dispatch drivers
//!
//! Two ways to run agent sessions against a shared pool:
//!
//! - [`RoundRobinDispatcher`]: one cooperative loop, dials awaited inline,
//!   fully deterministic with a seeded or scripted transport
//! - [`DialerEngine`]: one worker task per agent, dials concurrent, outcomes
//!   delivered over channels in completion order

pub mod events;
pub mod engine;
pub mod round_robin;
mod worker;

pub use events::AgentCommand;
pub use engine::{DialerEngine, DialerStats};
pub use round_robin::{PassSummary, RoundRobinDispatcher};
