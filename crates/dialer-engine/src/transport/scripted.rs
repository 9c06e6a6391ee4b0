//! Deterministic dial transport driven by per-number scripts
//!
//! Used by tests and demos that need exact control over which numbers
//! connect, how long they ring, and in what order outcomes arrive.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use crate::agent::AgentId;
use crate::error::{DialerError, Result};
use crate::lead::PhoneNumber;
use super::{DialOutcome, DialTransport};

/// Record of one `dial` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialRecord {
    pub agent: AgentId,
    pub phone: PhoneNumber,
}

/// Transport whose outcomes are set per phone number
///
/// Numbers without a script get the default outcome. A number can also be
/// given a ring delay, made to fail with a transport error, or gated so its
/// dial does not complete until [`open_gate`](Self::open_gate) is called.
pub struct ScriptedTransport {
    default_outcome: DialOutcome,
    outcomes: DashMap<PhoneNumber, DialOutcome>,
    delays: DashMap<PhoneNumber, Duration>,
    errors: DashMap<PhoneNumber, String>,
    gates: DashMap<PhoneNumber, Arc<Notify>>,
    log: Mutex<Vec<DialRecord>>,
}

impl ScriptedTransport {
    pub fn new(default_outcome: DialOutcome) -> Self {
        Self {
            default_outcome,
            outcomes: DashMap::new(),
            delays: DashMap::new(),
            errors: DashMap::new(),
            gates: DashMap::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Every number connects unless scripted otherwise
    pub fn connecting() -> Self {
        Self::new(DialOutcome::Connected)
    }

    /// No number connects unless scripted otherwise
    pub fn failing() -> Self {
        Self::new(DialOutcome::NotConnected)
    }

    pub fn with_outcome(self, phone: impl Into<PhoneNumber>, outcome: DialOutcome) -> Self {
        self.set_outcome(phone, outcome);
        self
    }

    pub fn with_delay(self, phone: impl Into<PhoneNumber>, delay: Duration) -> Self {
        self.delays.insert(phone.into(), delay);
        self
    }

    /// Make dials to `phone` return a transport error
    pub fn with_error(self, phone: impl Into<PhoneNumber>, message: impl Into<String>) -> Self {
        self.errors.insert(phone.into(), message.into());
        self
    }

    pub fn set_outcome(&self, phone: impl Into<PhoneNumber>, outcome: DialOutcome) {
        self.outcomes.insert(phone.into(), outcome);
    }

    /// Hold dials to `phone` until the gate is opened
    pub fn with_gate(self, phone: impl Into<PhoneNumber>) -> Self {
        self.gates.insert(phone.into(), Arc::new(Notify::new()));
        self
    }

    /// Let one held dial to `phone` complete
    ///
    /// Opening a gate before the dial reaches it is fine; the permit is kept.
    pub fn open_gate(&self, phone: &PhoneNumber) -> Result<()> {
        let gate = self
            .gates
            .get(phone)
            .map(|g| Arc::clone(g.value()))
            .ok_or_else(|| DialerError::not_found(format!("no gate for {}", phone)))?;
        gate.notify_one();
        Ok(())
    }

    /// Every dial placed so far, in call order
    pub fn dials(&self) -> Vec<DialRecord> {
        self.log.lock().clone()
    }

    /// How many times `phone` has been dialed
    pub fn dial_count(&self, phone: &PhoneNumber) -> usize {
        self.log.lock().iter().filter(|r| &r.phone == phone).count()
    }

    /// Numbers dialed in call order
    pub fn dialed_numbers(&self) -> Vec<PhoneNumber> {
        self.log.lock().iter().map(|r| r.phone.clone()).collect()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::failing()
    }
}

#[async_trait]
impl DialTransport for ScriptedTransport {
    async fn dial(&self, agent: &AgentId, phone: &PhoneNumber) -> Result<DialOutcome> {
        self.log.lock().push(DialRecord { agent: agent.clone(), phone: phone.clone() });

        // clone out of the maps so no shard guard is held across an await
        let gate = self.gates.get(phone).map(|g| Arc::clone(g.value()));
        let delay = self.delays.get(phone).map(|d| *d.value());

        if let Some(gate) = gate {
            debug!("Dial {} for agent {} held at gate", phone, agent);
            gate.notified().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.errors.get(phone) {
            return Err(DialerError::transport(message.value().clone()));
        }

        let outcome = self.outcomes.get(phone).map(|o| *o.value()).unwrap_or(self.default_outcome);
        debug!("Scripted dial {} for agent {} -> {:?}", phone, agent, outcome);
        Ok(outcome)
    }
}
