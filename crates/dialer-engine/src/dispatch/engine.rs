//! # Concurrent Dialer Engine
//!
//! Runs one worker task per logged-in agent against a shared [`LeadPool`].
//! Dials are placed concurrently; outcomes come back over each worker's
//! bounded command channel in whatever order the transport finishes them.
//!
//! ```text
//!                 ┌──────────────┐
//!  login_agent ──▶│ DialerEngine │── hang_up / logout_agent ──┐
//!                 └──────┬───────┘                            │
//!                        │ spawn                              ▼
//!          ┌─────────────┴─────────────┐          ┌────────────────────┐
//!          │ AgentWorker (agent-1)     │◀─ mpsc ──│ AgentCommand       │
//!          │   AgentSession            │          │ DialCompleted      │
//!          │   dial tasks ── transport │── mpsc ─▶│ HangUp / Logout    │
//!          └─────────────┬─────────────┘          └────────────────────┘
//!                        │ claim / update
//!                        ▼
//!                 Arc<LeadPool>
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rvoip_dialer_engine::prelude::*;
//!
//! # async fn example() -> rvoip_dialer_engine::Result<()> {
//! let pool = Arc::new(LeadPool::with_leads(["865-384-6115", "682-911-0414", "618-763-9619"])?);
//! let transport = Arc::new(SimulatedTransport::instant(0.5, 7)?);
//!
//! let engine = DialerEngine::new(DialerConfig::default(), pool, transport)?;
//! engine.login_configured_agents()?;
//!
//! let reports = engine.run_to_completion().await?;
//! assert_eq!(reports.len(), 2);
//! assert_eq!(engine.stats().pool.in_progress(), 0);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::{AgentId, AgentSession, SessionReport};
use crate::config::DialerConfig;
use crate::error::{DialerError, Result};
use crate::lead::{LeadPool, PhoneNumber, PoolStats};
use crate::transport::DialTransport;
use super::events::AgentCommand;
use super::worker::AgentWorker;

/// Snapshot of engine activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialerStats {
    pub pool: PoolStats,
    /// Agents whose worker is still running
    pub active_agents: usize,
}

struct AgentHandle {
    session_id: Uuid,
    commands: mpsc::Sender<AgentCommand>,
    /// Taken by whoever awaits the worker's report
    task: Option<JoinHandle<Result<SessionReport>>>,
}

/// Concurrent power dialer
pub struct DialerEngine {
    config: DialerConfig,
    pool: Arc<LeadPool>,
    transport: Arc<dyn DialTransport>,
    agents: DashMap<AgentId, AgentHandle>,
}

impl DialerEngine {
    /// Create an engine after validating `config`
    pub fn new(config: DialerConfig, pool: Arc<LeadPool>, transport: Arc<dyn DialTransport>) -> Result<Self> {
        config.validate().map_err(DialerError::configuration)?;
        info!("🚀 Creating DialerEngine (dial ratio {}, {} leads)", config.general.dial_ratio, pool.len());
        Ok(Self {
            config,
            pool,
            transport,
            agents: DashMap::new(),
        })
    }

    pub fn pool(&self) -> &Arc<LeadPool> {
        &self.pool
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    /// Log an agent in and start its worker
    ///
    /// The agent's first `dial_ratio` leads are claimed before this returns.
    /// Fails with `AlreadyExists` while a previous session of the same agent
    /// has not been collected by [`logout_agent`](Self::logout_agent) or
    /// [`run_to_completion`](Self::run_to_completion). Must be called from
    /// within a Tokio runtime.
    pub fn login_agent(&self, agent_id: impl Into<AgentId>) -> Result<()> {
        let agent_id = agent_id.into();
        let Entry::Vacant(slot) = self.agents.entry(agent_id.clone()) else {
            return Err(DialerError::already_exists(format!("agent {} is already logged in", agent_id)));
        };

        let mut session = AgentSession::new(agent_id, self.config.general.dial_ratio, Arc::clone(&self.pool))?
            .with_logout_policy(self.config.policy.logout);
        let claims = session.login()?;
        let session_id = session.session_id();

        let (tx, rx) = mpsc::channel(self.config.dispatch.command_channel_capacity);
        let worker = AgentWorker::new(
            session,
            Arc::clone(&self.transport),
            rx,
            &tx,
            self.config.dispatch.talk_time(),
        );
        let task = tokio::spawn(worker.run(claims));

        slot.insert(AgentHandle {
            session_id,
            commands: tx,
            task: Some(task),
        });
        Ok(())
    }

    /// Log in `number_of_agents` agents named from `agent_id_prefix`
    pub fn login_configured_agents(&self) -> Result<Vec<AgentId>> {
        let mut agents = Vec::new();
        for i in 1..=self.config.general.number_of_agents {
            let agent_id = AgentId(self.config.general.agent_id(i));
            self.login_agent(agent_id.clone())?;
            agents.push(agent_id);
        }
        info!("👥 Logged in {} agents", agents.len());
        Ok(agents)
    }

    /// Ask an engaged agent to hang up its current call
    ///
    /// A hang-up for an agent that is not engaged is ignored by its worker.
    pub async fn hang_up(&self, agent_id: &AgentId) -> Result<()> {
        let commands = self.sender(agent_id)?;
        commands
            .send(AgentCommand::HangUp { ticket: None })
            .await
            .map_err(|_| DialerError::not_found(format!("agent {} has already retired", agent_id)))
    }

    /// Log an agent out and return its session report
    ///
    /// Works for retired agents too; their report is simply collected.
    pub async fn logout_agent(&self, agent_id: &AgentId) -> Result<SessionReport> {
        let (_, handle) = self
            .agents
            .remove(agent_id)
            .ok_or_else(|| DialerError::not_found(format!("agent {} is not logged in", agent_id)))?;

        // a retired worker has dropped its receiver; nothing to tell it
        let _ = handle.commands.send(AgentCommand::Logout).await;

        let task = handle.task.ok_or_else(|| {
            DialerError::invalid_agent_state(format!(
                "session {} of agent {} is being collected by run_to_completion", handle.session_id, agent_id
            ))
        })?;
        join_worker(agent_id, task).await
    }

    /// Wait for every worker to retire and collect their reports, ordered by agent id
    ///
    /// Engaged agents only retire once their call ends, so with automatic
    /// hang-up disabled this waits for [`hang_up`](Self::hang_up).
    pub async fn run_to_completion(&self) -> Result<Vec<SessionReport>> {
        let mut reports = Vec::new();
        let mut first_error = None;

        loop {
            let next = self
                .agents
                .iter()
                .filter(|entry| entry.task.is_some())
                .map(|entry| entry.key().clone())
                .min();
            let Some(agent_id) = next else {
                break;
            };
            let Some(task) = self.agents.get_mut(&agent_id).and_then(|mut h| h.task.take()) else {
                continue;
            };

            // keep the handle registered while waiting so hang_up still reaches the worker
            let result = join_worker(&agent_id, task).await;
            self.agents.remove(&agent_id);

            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("Agent {} ended with an error: {}", agent_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        reports.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        let stats = self.pool.stats();
        info!("✅ All agents retired: {} ended, {} failed, {} abandoned, {} available",
              stats.ended, stats.failed, stats.abandoned, stats.available);
        Ok(reports)
    }

    /// Agents whose worker is still running, sorted
    pub fn active_agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|entry| entry.task.as_ref().map_or(true, |t| !t.is_finished()))
            .map(|entry| entry.key().clone())
            .collect();
        agents.sort();
        agents
    }

    /// Operator sweep returning eligible `Failed` leads to the pool
    ///
    /// Uses `policy.max_dial_attempts`; with the default of 1 nothing is requeued.
    pub fn requeue_failed(&self) -> Vec<PhoneNumber> {
        self.pool.requeue_failed(self.config.policy.max_dial_attempts)
    }

    pub fn stats(&self) -> DialerStats {
        DialerStats {
            pool: self.pool.stats(),
            active_agents: self.active_agents().len(),
        }
    }

    fn sender(&self, agent_id: &AgentId) -> Result<mpsc::Sender<AgentCommand>> {
        self.agents
            .get(agent_id)
            .map(|h| h.commands.clone())
            .ok_or_else(|| DialerError::not_found(format!("agent {} is not logged in", agent_id)))
    }
}

async fn join_worker(agent_id: &AgentId, task: JoinHandle<Result<SessionReport>>) -> Result<SessionReport> {
    task.await
        .map_err(|e| DialerError::internal(format!("worker for agent {} panicked: {}", agent_id, e)))?
}

impl std::fmt::Debug for DialerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialerEngine")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("agents", &self.agents.len())
            .finish()
    }
}
