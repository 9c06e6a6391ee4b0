//! Core types for agent sessions

use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lead::PhoneNumber;

/// Agent identifier type for strongly-typed agent references
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        AgentId(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        AgentId(s.to_string())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Agent lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// Not logged in; holds no claims
    Offline,
    /// Logged in, waiting for one of the in-flight dials to connect
    Idle,
    /// Talking to exactly one connected lead
    Engaged,
}

impl std::str::FromStr for AgentState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "offline" | "Offline" | "OFFLINE" => Ok(AgentState::Offline),
            "idle" | "Idle" | "IDLE" => Ok(AgentState::Idle),
            "engaged" | "Engaged" | "ENGAGED" => Ok(AgentState::Engaged),
            _ => Err(format!("Unknown agent state: {}", s)),
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Offline => write!(f, "offline"),
            AgentState::Idle => write!(f, "idle"),
            AgentState::Engaged => write!(f, "engaged"),
        }
    }
}

/// Counters kept by a session over one login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Leads claimed and handed out for dialing
    pub dialed: u64,
    /// Dials that connected, including ones that were later abandoned
    pub connected: u64,
    /// Dials that did not connect
    pub failed: u64,
    /// Connected calls nobody took
    pub abandoned: u64,
    /// Calls the agent finished talking on
    pub completed: u64,
}

/// Summary produced when a session logs out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub agent_id: AgentId,
    pub session_id: Uuid,
    pub stats: SessionStats,
    /// `Queued` leads returned to the pool at logout
    pub released: Vec<PhoneNumber>,
    /// Leads abandoned at logout
    pub abandoned_at_logout: Vec<PhoneNumber>,
    pub logged_in_at: Option<DateTime<Utc>>,
    pub logged_out_at: DateTime<Utc>,
}
