//! Deterministic round-robin dispatch
//!
//! A single loop visits every active session once per pass and applies at
//! most one transition to it, based on the agent state and the pool state of
//! its oldest in-flight lead:
//!
//! | agent    | lead      | action                        |
//! |----------|-----------|-------------------------------|
//! | `Idle`   | `Started` | `on_call_started`             |
//! | `Idle`   | `Failed`  | `on_call_failed` + new dials  |
//! | `Engaged`| any       | `on_call_ended` + new dials   |
//! | any      | none left | logout, session retires       |
//!
//! Dials are awaited inline and their outcome recorded before the pass moves
//! on, so a seeded transport reproduces the same run every time.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::{AgentId, AgentSession, AgentState, SessionReport};
use crate::config::DialerConfig;
use crate::error::{DialerError, Result};
use crate::lead::{Claim, LeadPool, LeadState, PhoneNumber};
use crate::transport::{DialOutcome, DialTransport};

/// What one pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Sessions that took a transition
    pub transitions: usize,
    /// Sessions that ran out of leads and logged out
    pub retired: usize,
}

impl PassSummary {
    pub fn made_progress(&self) -> bool {
        self.transitions > 0 || self.retired > 0
    }
}

enum Step {
    Advanced,
    Waiting,
    Retire,
}

/// Cooperative single-task driver
pub struct RoundRobinDispatcher {
    config: DialerConfig,
    pool: Arc<LeadPool>,
    transport: Arc<dyn DialTransport>,
    sessions: VecDeque<AgentSession>,
    reports: Vec<SessionReport>,
    passes: u64,
}

impl RoundRobinDispatcher {
    pub fn new(config: DialerConfig, pool: Arc<LeadPool>, transport: Arc<dyn DialTransport>) -> Result<Self> {
        config.validate().map_err(DialerError::configuration)?;
        Ok(Self {
            config,
            pool,
            transport,
            sessions: VecDeque::new(),
            reports: Vec::new(),
            passes: 0,
        })
    }

    pub fn pool(&self) -> &Arc<LeadPool> {
        &self.pool
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Log an agent in and dial its first leads
    pub async fn login_agent(&mut self, agent_id: impl Into<AgentId>) -> Result<()> {
        let agent_id = agent_id.into();
        if self.sessions.iter().any(|s| s.agent_id() == &agent_id) {
            return Err(DialerError::already_exists(format!("agent {} is already logged in", agent_id)));
        }

        let mut session = AgentSession::new(agent_id, self.config.general.dial_ratio, Arc::clone(&self.pool))?
            .with_logout_policy(self.config.policy.logout);
        let claims = session.login()?;
        self.dial_inline(&mut session, claims).await?;
        self.sessions.push_back(session);
        Ok(())
    }

    /// Log in `number_of_agents` agents named from `agent_id_prefix`
    pub async fn login_configured_agents(&mut self) -> Result<Vec<AgentId>> {
        let mut agents = Vec::new();
        for i in 1..=self.config.general.number_of_agents {
            let agent_id = AgentId(self.config.general.agent_id(i));
            self.login_agent(agent_id.clone()).await?;
            agents.push(agent_id);
        }
        Ok(agents)
    }

    /// Agents still being dispatched, in visiting order
    pub fn active_agents(&self) -> Vec<AgentId> {
        self.sessions.iter().map(|s| s.agent_id().clone()).collect()
    }

    pub fn session(&self, agent_id: &AgentId) -> Option<&AgentSession> {
        self.sessions.iter().find(|s| s.agent_id() == agent_id)
    }

    /// Reports of sessions that retired or were logged out so far
    pub fn reports(&self) -> &[SessionReport] {
        &self.reports
    }

    /// Visit every active session once
    pub async fn run_pass(&mut self) -> Result<PassSummary> {
        let mut summary = PassSummary::default();
        let mut next = VecDeque::with_capacity(self.sessions.len());

        while let Some(mut session) = self.sessions.pop_front() {
            let visited = match self.step(&mut session).await {
                Ok(Step::Advanced) => {
                    summary.transitions += 1;
                    Ok(())
                }
                Ok(Step::Waiting) => Ok(()),
                Ok(Step::Retire) => session.logout().map(|report| {
                    self.reports.push(report);
                    summary.retired += 1;
                }),
                Err(err) => Err(err),
            };

            if let Err(err) = visited {
                debug_assert!(!err.is_invariant_violation(), "{}", err);
                next.push_back(session);
                next.append(&mut self.sessions);
                self.sessions = next;
                return Err(err);
            }

            if session.state() != AgentState::Offline {
                next.push_back(session);
            }
        }

        self.sessions = next;
        self.passes += 1;
        debug!("Pass {}: {} transitions, {} retired, {} agents left",
               self.passes, summary.transitions, summary.retired, self.sessions.len());
        Ok(summary)
    }

    /// Run passes until every session has retired
    ///
    /// Returns the reports of all sessions, in retirement order. A pass that
    /// changes nothing is an `Internal` error rather than a spin.
    pub async fn run(&mut self) -> Result<Vec<SessionReport>> {
        info!("🔄 Starting round-robin dispatch for {} agents", self.sessions.len());
        while !self.sessions.is_empty() {
            let summary = self.run_pass().await?;
            if !summary.made_progress() {
                return Err(DialerError::internal(format!(
                    "dispatch pass {} made no progress with {} agents active",
                    self.passes,
                    self.sessions.len()
                )));
            }
        }
        info!("✅ Round-robin dispatch finished after {} passes", self.passes);
        Ok(std::mem::take(&mut self.reports))
    }

    /// Log an agent out before it retires on its own
    pub fn logout_agent(&mut self, agent_id: &AgentId) -> Result<SessionReport> {
        let pos = self
            .sessions
            .iter()
            .position(|s| s.agent_id() == agent_id)
            .ok_or_else(|| DialerError::not_found(format!("agent {} is not logged in", agent_id)))?;
        let mut session = self
            .sessions
            .remove(pos)
            .ok_or_else(|| DialerError::internal("session vanished during logout"))?;
        let report = session.logout()?;
        self.reports.push(report.clone());
        Ok(report)
    }

    /// Operator sweep returning eligible `Failed` leads to the pool
    pub fn requeue_failed(&self) -> Vec<PhoneNumber> {
        self.pool.requeue_failed(self.config.policy.max_dial_attempts)
    }

    async fn step(&self, session: &mut AgentSession) -> Result<Step> {
        let Some(claim) = session.next_lead().cloned() else {
            return Ok(Step::Retire);
        };
        let lead_state = self.pool.get_state(&claim.phone)?;

        let claims = match (session.state(), lead_state) {
            (AgentState::Idle, LeadState::Started) => {
                session.on_call_started(&claim.phone)?;
                Vec::new()
            }
            (AgentState::Idle, LeadState::Failed) => session.on_call_failed(&claim.phone)?,
            (AgentState::Engaged, _) => session.on_call_ended(&claim.phone)?,
            (AgentState::Idle, LeadState::Queued) => return Ok(Step::Waiting),
            (agent_state, lead_state) => {
                return Err(DialerError::invariant(format!(
                    "agent {} is {} with lead {} in state {}",
                    session.agent_id(), agent_state, claim, lead_state
                )));
            }
        };

        self.dial_inline(session, claims).await?;
        Ok(Step::Advanced)
    }

    async fn dial_inline(&self, session: &mut AgentSession, claims: Vec<Claim>) -> Result<()> {
        for claim in claims {
            let outcome = match self.transport.dial(session.agent_id(), &claim.phone).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("⚠️ Dial {} for agent {} failed, treating as not connected: {}",
                          claim.phone, session.agent_id(), e);
                    DialOutcome::NotConnected
                }
            };
            session.record_outcome(&claim, outcome)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RoundRobinDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundRobinDispatcher")
            .field("agents", &self.active_agents())
            .field("passes", &self.passes)
            .field("pool", &self.pool)
            .finish()
    }
}
