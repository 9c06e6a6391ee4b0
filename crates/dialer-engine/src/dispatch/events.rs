//! Messages delivered to agent workers

use crate::lead::{Claim, ClaimTicket};
use crate::transport::DialOutcome;

/// Command carried on an agent worker's channel
///
/// Dial completions, hang-ups and logout share one channel so a worker sees
/// them in a single order and never needs to lock its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    /// A dial placed for this agent finished
    DialCompleted {
        claim: Claim,
        outcome: DialOutcome,
    },

    /// End the engaged call
    ///
    /// `Some(ticket)` only ends the call with that ticket, so a talk-time
    /// timer that fires after its call was already hung up is ignored.
    /// `None` ends whatever call is engaged.
    HangUp {
        ticket: Option<ClaimTicket>,
    },

    /// Log the agent out now
    Logout,
}
