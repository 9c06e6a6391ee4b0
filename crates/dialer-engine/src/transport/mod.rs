//! Dial transport abstraction
//!
//! The engine never places calls itself. A [`DialTransport`] takes a phone
//! number, rings it, and eventually reports whether a person answered. The
//! engine only cares about that binary outcome; signalling and media live
//! behind the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::error::Result;
use crate::lead::{LeadState, PhoneNumber};

pub mod simulated;
pub mod scripted;

pub use simulated::SimulatedTransport;
pub use scripted::ScriptedTransport;

/// Result of one dial attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialOutcome {
    /// Someone picked up
    Connected,
    /// No answer, busy, or the call could not be placed
    NotConnected,
}

impl DialOutcome {
    /// Lead state recorded for this outcome
    pub fn lead_state(self) -> LeadState {
        match self {
            DialOutcome::Connected => LeadState::Started,
            DialOutcome::NotConnected => LeadState::Failed,
        }
    }

    pub fn is_connected(self) -> bool {
        self == DialOutcome::Connected
    }
}

impl From<bool> for DialOutcome {
    fn from(connected: bool) -> Self {
        if connected {
            DialOutcome::Connected
        } else {
            DialOutcome::NotConnected
        }
    }
}

/// Places outbound calls on behalf of agents
///
/// Implementations must be safe to call concurrently: the concurrent engine
/// runs many dials at once from different agent workers. An `Err` return is
/// treated by the drivers as [`DialOutcome::NotConnected`].
#[async_trait]
pub trait DialTransport: Send + Sync {
    /// Ring `phone` for `agent` and report whether it connected
    async fn dial(&self, agent: &AgentId, phone: &PhoneNumber) -> Result<DialOutcome>;
}
