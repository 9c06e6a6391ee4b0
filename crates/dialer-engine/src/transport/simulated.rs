//! Random dial transport for simulations and load runs

use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::agent::AgentId;
use crate::config::TransportConfig;
use crate::error::{DialerError, Result};
use crate::lead::PhoneNumber;
use super::{DialOutcome, DialTransport};

/// Connects each dial with a fixed probability after a random ring time
///
/// With a seed the sequence of outcomes is reproducible for a given order of
/// `dial` calls. Under the concurrent engine the order itself depends on task
/// scheduling, so only the round-robin driver gives fully repeatable runs.
pub struct SimulatedTransport {
    success_probability: f64,
    latency_ms: (u64, u64),
    rng: Mutex<SmallRng>,
}

impl SimulatedTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let p = config.success_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(DialerError::configuration(format!(
                "success_probability must be within [0, 1], got {}", p
            )));
        }
        if config.min_dial_latency_ms > config.max_dial_latency_ms {
            return Err(DialerError::configuration("min_dial_latency_ms exceeds max_dial_latency_ms"));
        }

        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Ok(Self {
            success_probability: p,
            latency_ms: (config.min_dial_latency_ms, config.max_dial_latency_ms),
            rng: Mutex::new(rng),
        })
    }

    /// Zero-latency transport with the given connect probability and seed
    pub fn instant(success_probability: f64, seed: u64) -> Result<Self> {
        Self::new(&TransportConfig {
            success_probability,
            min_dial_latency_ms: 0,
            max_dial_latency_ms: 0,
            seed: Some(seed),
        })
    }

    fn roll(&self) -> (DialOutcome, Duration) {
        let mut rng = self.rng.lock();
        let connected = rng.gen_bool(self.success_probability);
        let (min, max) = self.latency_ms;
        let latency = if min == max { min } else { rng.gen_range(min..=max) };
        (DialOutcome::from(connected), Duration::from_millis(latency))
    }
}

#[async_trait]
impl DialTransport for SimulatedTransport {
    async fn dial(&self, agent: &AgentId, phone: &PhoneNumber) -> Result<DialOutcome> {
        let (outcome, latency) = self.roll();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        debug!("☎️ Simulated dial {} for agent {} -> {:?} after {:?}", phone, agent, outcome, latency);
        Ok(outcome)
    }
}

impl std::fmt::Debug for SimulatedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedTransport")
            .field("success_probability", &self.success_probability)
            .field("latency_ms", &self.latency_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn outcomes(transport: &SimulatedTransport, n: usize) -> Vec<DialOutcome> {
        let agent = AgentId::from("agent-1");
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            out.push(transport.dial(&agent, &PhoneNumber(format!("{}", i))).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_same_seed_same_outcomes() {
        let a = SimulatedTransport::instant(0.5, 42).unwrap();
        let b = SimulatedTransport::instant(0.5, 42).unwrap();
        assert_eq!(outcomes(&a, 50).await, outcomes(&b, 50).await);
    }

    #[tokio::test]
    async fn test_probability_extremes() {
        let always = SimulatedTransport::instant(1.0, 1).unwrap();
        assert!(outcomes(&always, 20).await.iter().all(|o| o.is_connected()));

        let never = SimulatedTransport::instant(0.0, 1).unwrap();
        assert!(outcomes(&never, 20).await.iter().all(|o| !o.is_connected()));
    }

    #[test]
    fn test_rejects_invalid_probability() {
        assert!(SimulatedTransport::instant(1.2, 0).is_err());
    }
}
