//! Agent sessions
//!
//! An [`AgentSession`] is one logged-in agent plus the leads being dialed for
//! it. It keeps up to `dial_ratio` claims in flight while the agent is idle,
//! hands the agent the first call that connects, and reconciles the rest.

pub mod types;
pub mod session;

pub use types::{AgentId, AgentState, SessionReport, SessionStats};
pub use session::{AgentSession, OutcomeEffect};
