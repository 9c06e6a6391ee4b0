//! Per-agent worker task
//!
//! Each logged-in agent gets one worker that owns its [`AgentSession`]
//! outright. Dials run as child tasks and report back over the worker's
//! command channel, so the session is only ever touched from one task.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::agent::{AgentSession, AgentState, OutcomeEffect, SessionReport};
use crate::error::Result;
use crate::lead::{Claim, ClaimTicket};
use crate::transport::{DialOutcome, DialTransport};
use super::events::AgentCommand;

pub(crate) struct AgentWorker {
    session: AgentSession,
    transport: Arc<dyn DialTransport>,
    commands: mpsc::Receiver<AgentCommand>,
    /// Handed to dial and timer tasks; weak so the worker alone never keeps its channel open
    sender: mpsc::WeakSender<AgentCommand>,
    talk_time: Option<Duration>,
    /// Outstanding dials and hang-up timers, aborted when the worker exits
    tasks: JoinSet<()>,
}

impl AgentWorker {
    pub(crate) fn new(
        session: AgentSession,
        transport: Arc<dyn DialTransport>,
        commands: mpsc::Receiver<AgentCommand>,
        sender: &mpsc::Sender<AgentCommand>,
        talk_time: Option<Duration>,
    ) -> Self {
        Self {
            session,
            transport,
            commands,
            sender: sender.downgrade(),
            talk_time,
            tasks: JoinSet::new(),
        }
    }

    /// Dial the login claims, then process commands until the agent retires or logs out
    pub(crate) async fn run(mut self, initial_claims: Vec<Claim>) -> Result<SessionReport> {
        self.dial_all(initial_claims);

        loop {
            if self.session.state() == AgentState::Idle && self.session.is_drained() {
                info!("🏁 Agent {} has nothing left to dial, retiring", self.session.agent_id());
                break;
            }

            let command = tokio::select! {
                command = self.commands.recv() => command,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Dial task for agent {} failed: {}", self.session.agent_id(), e);
                    }
                    continue;
                }
            };

            let Some(command) = command else {
                debug!("Command channel for agent {} closed", self.session.agent_id());
                break;
            };

            let handled = match command {
                AgentCommand::DialCompleted { claim, outcome } => self.handle_outcome(claim, outcome),
                AgentCommand::HangUp { ticket } => self.handle_hang_up(ticket),
                AgentCommand::Logout => break,
            };

            if let Err(err) = handled {
                error!("🚨 Agent {} worker stopping: {}", self.session.agent_id(), err);
                debug_assert!(!err.is_invariant_violation(), "{}", err);
                if let Err(logout_err) = self.session.logout() {
                    error!("Agent {} could not reconcile its leads: {}", self.session.agent_id(), logout_err);
                }
                return Err(err);
            }
        }

        self.tasks.abort_all();
        self.session.logout()
    }

    fn handle_outcome(&mut self, claim: Claim, outcome: DialOutcome) -> Result<()> {
        match self.session.on_dial_outcome(&claim, outcome)? {
            OutcomeEffect::Backfilled(claims) => self.dial_all(claims),
            OutcomeEffect::Engaged(call) => self.schedule_hang_up(call.ticket),
            OutcomeEffect::OrphanResolved(_) => {}
            OutcomeEffect::Stale => {
                warn!("Agent {} received a stale outcome for {}", self.session.agent_id(), claim);
            }
        }
        Ok(())
    }

    fn handle_hang_up(&mut self, ticket: Option<ClaimTicket>) -> Result<()> {
        let Some(call) = self.session.engaged_call().cloned() else {
            debug!("Agent {} has no call to hang up", self.session.agent_id());
            return Ok(());
        };
        if ticket.is_some_and(|t| t != call.ticket) {
            debug!("Ignoring hang-up for an earlier call of agent {}", self.session.agent_id());
            return Ok(());
        }
        let claims = self.session.on_call_ended(&call.phone)?;
        self.dial_all(claims);
        Ok(())
    }

    fn dial_all(&mut self, claims: Vec<Claim>) {
        for claim in claims {
            let Some(tx) = self.sender.upgrade() else {
                warn!("Agent {} channel closed, not dialing {}", self.session.agent_id(), claim);
                return;
            };
            let transport = Arc::clone(&self.transport);
            let agent = self.session.agent_id().clone();

            self.tasks.spawn(async move {
                let outcome = match transport.dial(&agent, &claim.phone).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("⚠️ Dial {} for agent {} failed, treating as not connected: {}", claim.phone, agent, e);
                        DialOutcome::NotConnected
                    }
                };
                if tx.send(AgentCommand::DialCompleted { claim, outcome }).await.is_err() {
                    debug!("Agent {} is gone, dropping dial outcome", agent);
                }
            });
        }
    }

    fn schedule_hang_up(&mut self, ticket: ClaimTicket) {
        let Some(talk_time) = self.talk_time else {
            return;
        };
        let Some(tx) = self.sender.upgrade() else {
            return;
        };
        self.tasks.spawn(async move {
            tokio::time::sleep(talk_time).await;
            let _ = tx.send(AgentCommand::HangUp { ticket: Some(ticket) }).await;
        });
    }
}
