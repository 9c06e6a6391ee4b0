//! # Agent Session
//!
//! One agent's side of the dialer: its lifecycle state and the set of leads
//! currently being dialed on its behalf. The session never dials by itself;
//! every operation that takes new claims returns them, and the driver
//! (round-robin loop or per-agent worker) hands them to the transport.
//!
//! ```text
//!             login                  dial connects
//!  Offline ──────────▶ Idle ◀──────────────────────▶ Engaged
//!     ▲                 │      agent hangs up (backfill)
//!     └──── logout ─────┘
//! ```

use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::LogoutPolicy;
use crate::error::{DialerError, Result};
use crate::lead::{Claim, LeadPool, LeadState, PhoneNumber};
use crate::transport::DialOutcome;
use super::types::{AgentId, AgentState, SessionReport, SessionStats};

/// What a dial outcome did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeEffect {
    /// The dial failed; these new claims refill the freed slot and must be dialed
    Backfilled(Vec<Claim>),
    /// The dial connected and the agent is now engaged on it
    Engaged(Claim),
    /// A dial that had lost the race resolved; the lead was left in this state
    OrphanResolved(LeadState),
    /// The claim is not held by this session any more
    Stale,
}

/// A logged-in agent and its in-flight claims
///
/// Invariants kept by every method:
/// - `in_flight().len() <= dial_ratio()`
/// - every in-flight lead is `Queued`, `Started` or `Failed` in the pool, except
///   the single engaged call, which is `Ended`
/// - the pool records this agent as holder of every in-flight and orphaned claim
pub struct AgentSession {
    agent_id: AgentId,
    session_id: Uuid,
    state: AgentState,
    dial_ratio: usize,
    /// Claims being dialed (or the engaged call), oldest first
    in_flight: Vec<Claim>,
    /// Claims that lost the race while still dialing
    orphaned: Vec<Claim>,
    pool: Arc<LeadPool>,
    logout_policy: LogoutPolicy,
    stats: SessionStats,
    logged_in_at: Option<DateTime<Utc>>,
}

impl AgentSession {
    /// Create an offline session bound to `pool`
    pub fn new(agent_id: impl Into<AgentId>, dial_ratio: usize, pool: Arc<LeadPool>) -> Result<Self> {
        if dial_ratio == 0 {
            return Err(DialerError::configuration("dial_ratio must be greater than 0"));
        }
        Ok(Self {
            agent_id: agent_id.into(),
            session_id: Uuid::new_v4(),
            state: AgentState::Offline,
            dial_ratio,
            in_flight: Vec::new(),
            orphaned: Vec::new(),
            pool,
            logout_policy: LogoutPolicy::Release,
            stats: SessionStats::default(),
            logged_in_at: None,
        })
    }

    pub fn with_logout_policy(mut self, policy: LogoutPolicy) -> Self {
        self.logout_policy = policy;
        self
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn dial_ratio(&self) -> usize {
        self.dial_ratio
    }

    pub fn in_flight(&self) -> &[Claim] {
        &self.in_flight
    }

    pub fn orphaned(&self) -> &[Claim] {
        &self.orphaned
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn pool(&self) -> &Arc<LeadPool> {
        &self.pool
    }

    /// The oldest in-flight claim, the one a round-robin pass inspects
    pub fn next_lead(&self) -> Option<&Claim> {
        self.in_flight.first()
    }

    /// The call the agent is talking on, if engaged
    pub fn engaged_call(&self) -> Option<&Claim> {
        match self.state {
            AgentState::Engaged => self.in_flight.first(),
            _ => None,
        }
    }

    /// Whether this session holds `claim` (in flight or orphaned)
    pub fn holds(&self, claim: &Claim) -> bool {
        self.in_flight.contains(claim) || self.orphaned.contains(claim)
    }

    /// No in-flight and no orphaned claims left
    pub fn is_drained(&self) -> bool {
        self.in_flight.is_empty() && self.orphaned.is_empty()
    }

    /// `Offline -> Idle`, then fill every slot
    ///
    /// Returns the claims to dial. An exhausted pool leaves the session under
    /// ratio without error.
    pub fn login(&mut self) -> Result<Vec<Claim>> {
        if self.state != AgentState::Offline {
            return Err(DialerError::invalid_agent_state(format!(
                "agent {} cannot log in while {}", self.agent_id, self.state
            )));
        }
        self.session_id = Uuid::new_v4();
        self.state = AgentState::Idle;
        self.stats = SessionStats::default();
        self.logged_in_at = Some(Utc::now());
        info!("🟢 Agent {} logged in (session {}, dial ratio {})",
              self.agent_id, self.session_id, self.dial_ratio);
        Ok(self.backfill())
    }

    /// Write a dial outcome into the pool without running any handler
    ///
    /// `Connected` moves the lead to `Started`, `NotConnected` to `Failed`.
    /// Returns `false` (and writes nothing) when the claim is not in flight.
    pub fn record_outcome(&mut self, claim: &Claim, outcome: DialOutcome) -> Result<bool> {
        if !self.in_flight.contains(claim) {
            return Ok(false);
        }
        let current = self.pool.get_state(&claim.phone)?;
        if current != LeadState::Queued {
            return Err(DialerError::invalid_transition(format!(
                "outcome {:?} for lead {} which is already {}", outcome, claim, current
            )));
        }
        self.pool.update_claimed(&self.agent_id, claim, outcome.lead_state())?;
        match outcome {
            DialOutcome::Connected => self.stats.connected += 1,
            DialOutcome::NotConnected => self.stats.failed += 1,
        }
        debug!("Agent {} dial {} -> {:?}", self.agent_id, claim, outcome);
        Ok(true)
    }

    /// Event entry point for an asynchronous dial outcome
    ///
    /// Records the outcome and runs the matching handler for in-flight claims,
    /// settles orphaned claims (`Connected -> Abandoned`, `NotConnected -> Failed`),
    /// and ignores everything else as stale.
    pub fn on_dial_outcome(&mut self, claim: &Claim, outcome: DialOutcome) -> Result<OutcomeEffect> {
        if self.in_flight.contains(claim) {
            self.record_outcome(claim, outcome)?;
            return match outcome {
                DialOutcome::Connected => {
                    self.on_call_started(&claim.phone)?;
                    Ok(OutcomeEffect::Engaged(claim.clone()))
                }
                DialOutcome::NotConnected => {
                    Ok(OutcomeEffect::Backfilled(self.on_call_failed(&claim.phone)?))
                }
            };
        }

        if let Some(pos) = self.orphaned.iter().position(|c| c == claim) {
            let orphan = self.orphaned.remove(pos);
            let final_state = match outcome {
                DialOutcome::Connected => {
                    self.stats.connected += 1;
                    self.stats.abandoned += 1;
                    LeadState::Abandoned
                }
                DialOutcome::NotConnected => {
                    self.stats.failed += 1;
                    LeadState::Failed
                }
            };
            self.pool.update_claimed(&self.agent_id, &orphan, final_state)?;
            self.pool.relinquish(&self.agent_id, &orphan)?;
            info!("🧹 Agent {} settled late dial {} as {}", self.agent_id, orphan, final_state);
            return Ok(OutcomeEffect::OrphanResolved(final_state));
        }

        debug!("Agent {} ignoring stale outcome {:?} for {}", self.agent_id, outcome, claim);
        Ok(OutcomeEffect::Stale)
    }

    /// A dial connected: `Idle -> Engaged`
    ///
    /// The connected lead is marked `Ended` and becomes the only in-flight
    /// claim. Other in-flight leads that also connected are `Abandoned`, ones
    /// that already failed are let go, and ones still dialing become orphans
    /// settled when their outcome arrives. No backfill happens here.
    pub fn on_call_started(&mut self, phone: &PhoneNumber) -> Result<()> {
        self.expect_state(AgentState::Idle, "start a call")?;
        let pos = self.position(phone)?;
        let current = self.pool.get_state(phone)?;
        if current != LeadState::Started {
            return Err(DialerError::invalid_transition(format!(
                "lead {} has not connected (state {})", phone, current
            )));
        }

        self.pool.update_claimed(&self.agent_id, &self.in_flight[pos], LeadState::Ended)?;
        let winner = self.in_flight.remove(pos);
        let losers: Vec<Claim> = self.in_flight.drain(..).collect();
        self.state = AgentState::Engaged;
        info!("📞 Agent {} engaged on {}", self.agent_id, winner.phone);

        let mut first_err = None;
        for loser in losers {
            let lost = loser.clone();
            if let Err(err) = self.settle_loser(loser, &winner.phone) {
                error!("Agent {} could not settle lead {}: {}", self.agent_id, lost, err);
                first_err.get_or_insert(err);
            }
        }
        self.in_flight.push(winner);
        first_err.map_or(Ok(()), Err)
    }

    /// A dial did not connect: drop it and backfill. The agent stays `Idle`.
    pub fn on_call_failed(&mut self, phone: &PhoneNumber) -> Result<Vec<Claim>> {
        self.expect_state(AgentState::Idle, "handle a failed dial")?;
        let pos = self.position(phone)?;
        let current = self.pool.get_state(phone)?;
        if current != LeadState::Failed {
            return Err(DialerError::invalid_transition(format!(
                "lead {} has not failed (state {})", phone, current
            )));
        }

        let failed = self.in_flight.remove(pos);
        self.pool.relinquish(&self.agent_id, &failed)?;
        debug!("Agent {} dropped failed lead {}", self.agent_id, failed.phone);
        Ok(self.backfill())
    }

    /// The agent hung up: `Engaged -> Idle`, drop the call and backfill
    pub fn on_call_ended(&mut self, phone: &PhoneNumber) -> Result<Vec<Claim>> {
        self.expect_state(AgentState::Engaged, "end a call")?;
        let pos = self.position(phone)?;

        let finished = self.in_flight.remove(pos);
        self.state = AgentState::Idle;
        self.pool.relinquish(&self.agent_id, &finished)?;
        self.stats.completed += 1;
        info!("📴 Agent {} finished call with {}", self.agent_id, finished.phone);
        Ok(self.backfill())
    }

    /// `* -> Offline`, reconciling every outstanding claim
    ///
    /// `Queued` claims follow the logout policy, `Started` claims are
    /// abandoned, anything else is let go. A claim that cannot be reconciled
    /// does not stop the rest; the first such error is returned after every
    /// claim has been visited.
    pub fn logout(&mut self) -> Result<SessionReport> {
        let mut released = Vec::new();
        let mut abandoned = Vec::new();
        let mut first_err = None;

        let outstanding: Vec<Claim> = self.in_flight.drain(..).chain(self.orphaned.drain(..)).collect();
        for claim in outstanding {
            match self.settle_at_logout(&claim) {
                Ok(Some(LeadState::Available)) => released.push(claim.phone),
                Ok(Some(_)) => abandoned.push(claim.phone),
                Ok(None) => {}
                Err(err) => {
                    error!("Agent {} could not reconcile lead {} at logout: {}", self.agent_id, claim, err);
                    first_err.get_or_insert(err);
                }
            }
        }

        if self.state != AgentState::Offline {
            info!("🔴 Agent {} logged out ({} released, {} abandoned)",
                  self.agent_id, released.len(), abandoned.len());
        }
        self.state = AgentState::Offline;
        if let Some(err) = first_err {
            return Err(err);
        }

        Ok(SessionReport {
            agent_id: self.agent_id.clone(),
            session_id: self.session_id,
            stats: self.stats.clone(),
            released,
            abandoned_at_logout: abandoned,
            logged_in_at: self.logged_in_at,
            logged_out_at: Utc::now(),
        })
    }

    /// Resolve a claim that lost the race to `winner`
    fn settle_loser(&mut self, loser: Claim, winner: &PhoneNumber) -> Result<()> {
        match self.pool.get_state(&loser.phone)? {
            LeadState::Started => {
                self.pool.update_claimed(&self.agent_id, &loser, LeadState::Abandoned)?;
                self.pool.relinquish(&self.agent_id, &loser)?;
                self.stats.abandoned += 1;
                info!("📵 Abandoned {} (lost the race to {})", loser.phone, winner);
            }
            LeadState::Queued => {
                debug!("Lead {} still dialing, orphaned until its outcome arrives", loser);
                self.orphaned.push(loser);
            }
            _ => {
                self.pool.relinquish(&self.agent_id, &loser)?;
            }
        }
        Ok(())
    }

    /// Apply the logout policy to one claim
    ///
    /// Returns the state the lead was moved to, or `None` if it was only let go.
    fn settle_at_logout(&mut self, claim: &Claim) -> Result<Option<LeadState>> {
        match (self.pool.get_state(&claim.phone)?, self.logout_policy) {
            (LeadState::Queued, LogoutPolicy::Release) => {
                self.pool.release(&self.agent_id, claim)?;
                Ok(Some(LeadState::Available))
            }
            (LeadState::Queued, LogoutPolicy::Abandon) | (LeadState::Started, _) => {
                self.pool.update_claimed(&self.agent_id, claim, LeadState::Abandoned)?;
                self.pool.relinquish(&self.agent_id, claim)?;
                self.stats.abandoned += 1;
                Ok(Some(LeadState::Abandoned))
            }
            _ => {
                self.pool.relinquish(&self.agent_id, claim)?;
                Ok(None)
            }
        }
    }

    /// Top the in-flight set back up to the dial ratio
    ///
    /// Stops at the ratio or at the first empty claim, so it makes at most
    /// `dial_ratio - in_flight` successful claims plus one miss.
    fn backfill(&mut self) -> Vec<Claim> {
        let mut claimed = Vec::new();
        while self.in_flight.len() < self.dial_ratio {
            match self.pool.claim_next(&self.agent_id) {
                Some(claim) => {
                    self.in_flight.push(claim.clone());
                    claimed.push(claim);
                }
                None => {
                    warn!("⚠️ Lead pool exhausted, agent {} dialing {}/{} lines",
                          self.agent_id, self.in_flight.len(), self.dial_ratio);
                    break;
                }
            }
        }
        self.stats.dialed += claimed.len() as u64;
        claimed
    }

    fn position(&self, phone: &PhoneNumber) -> Result<usize> {
        self.in_flight
            .iter()
            .position(|c| &c.phone == phone)
            .ok_or_else(|| DialerError::not_found(format!(
                "lead {} is not in flight for agent {}", phone, self.agent_id
            )))
    }

    fn expect_state(&self, expected: AgentState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DialerError::invalid_agent_state(format!(
                "agent {} cannot {} while {}", self.agent_id, action, self.state
            )))
        }
    }
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("agent_id", &self.agent_id)
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("dial_ratio", &self.dial_ratio)
            .field("in_flight", &self.in_flight)
            .field("orphaned", &self.orphaned)
            .finish()
    }
}
