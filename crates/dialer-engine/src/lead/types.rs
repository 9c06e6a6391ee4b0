//! Core types for lead management

use std::fmt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentId;

/// Phone number of a lead, the lead's unique key in the pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhoneNumber(pub String);

impl PhoneNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PhoneNumber {
    fn from(s: String) -> Self {
        PhoneNumber(s)
    }
}

impl From<&str> for PhoneNumber {
    fn from(s: &str) -> Self {
        PhoneNumber(s.to_string())
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lead lifecycle state
///
/// ```text
/// Available ──claim──▶ Queued ──connect──▶ Started ──handed to agent──▶ Ended
///     ▲                  │                    │
///     │ release/reseed   └──no answer──▶ Failed └──lost the race──▶ Abandoned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadState {
    /// Waiting to be claimed
    Available,
    /// Claimed by exactly one agent session, dial in progress
    Queued,
    /// The dial connected
    Started,
    /// The dial did not connect
    Failed,
    /// The call was handed to the agent
    Ended,
    /// The call connected but no agent took it
    Abandoned,
}

impl LeadState {
    /// `Queued` or `Started`: states in which exactly one session must hold the lead
    pub fn is_claimed(self) -> bool {
        matches!(self, LeadState::Queued | LeadState::Started)
    }

    /// States a lead never leaves on its own
    ///
    /// `Failed` counts as terminal: it only becomes `Available` again through an
    /// explicit reseed or `requeue_failed` sweep.
    pub fn is_terminal(self) -> bool {
        matches!(self, LeadState::Failed | LeadState::Ended | LeadState::Abandoned)
    }
}

impl std::str::FromStr for LeadState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "available" | "Available" | "AVAILABLE" => Ok(LeadState::Available),
            "queued" | "Queued" | "QUEUED" => Ok(LeadState::Queued),
            "started" | "Started" | "STARTED" => Ok(LeadState::Started),
            "failed" | "Failed" | "FAILED" => Ok(LeadState::Failed),
            "ended" | "Ended" | "ENDED" => Ok(LeadState::Ended),
            "abandoned" | "Abandoned" | "ABANDONED" => Ok(LeadState::Abandoned),
            _ => Err(format!("Unknown lead state: {}", s)),
        }
    }
}

impl fmt::Display for LeadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeadState::Available => "available",
            LeadState::Queued => "queued",
            LeadState::Started => "started",
            LeadState::Failed => "failed",
            LeadState::Ended => "ended",
            LeadState::Abandoned => "abandoned",
        };
        write!(f, "{}", s)
    }
}

/// Identifies one particular claim of a lead
///
/// Tickets increase monotonically per pool, so an outcome carrying an old
/// ticket can be recognised as stale even if the same number was claimed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimTicket(pub u64);

impl fmt::Display for ClaimTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A session's reference to a lead it claimed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub phone: PhoneNumber,
    pub ticket: ClaimTicket,
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.phone, self.ticket)
    }
}

/// A lead as recorded by the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub phone: PhoneNumber,

    pub state: LeadState,

    /// Session currently holding a claim on this lead
    pub holder: Option<AgentId>,

    /// Ticket of the current claim, if any
    pub ticket: Option<ClaimTicket>,

    /// How many times the lead has been claimed for dialing
    pub dial_attempts: u32,

    /// Last time the state or holder changed
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(phone: PhoneNumber) -> Self {
        Self {
            phone,
            state: LeadState::Available,
            holder: None,
            ticket: None,
            dial_attempts: 0,
            updated_at: Utc::now(),
        }
    }

    /// Whether `agent` holds exactly this `claim`
    pub fn is_held_by(&self, agent: &AgentId, claim: &Claim) -> bool {
        self.holder.as_ref() == Some(agent) && self.ticket == Some(claim.ticket)
    }
}

/// Per-state lead counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub available: usize,
    pub queued: usize,
    pub started: usize,
    pub failed: usize,
    pub ended: usize,
    pub abandoned: usize,
}

impl PoolStats {
    pub(crate) fn record(&mut self, state: LeadState) {
        self.total += 1;
        match state {
            LeadState::Available => self.available += 1,
            LeadState::Queued => self.queued += 1,
            LeadState::Started => self.started += 1,
            LeadState::Failed => self.failed += 1,
            LeadState::Ended => self.ended += 1,
            LeadState::Abandoned => self.abandoned += 1,
        }
    }

    /// Leads that are still claimed (`Queued` or `Started`)
    pub fn in_progress(&self) -> usize {
        self.queued + self.started
    }
}
