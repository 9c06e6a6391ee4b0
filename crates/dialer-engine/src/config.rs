use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Power dialer configuration
///
/// # Configuration Sections
///
/// - [`general`]: dial ratio and agent count
/// - [`transport`]: behaviour of the simulated dial transport
/// - [`policy`]: how stranded, failed and abandoned leads are reconciled
/// - [`dispatch`]: which driver runs the sessions and how
///
/// Every section is `#[serde(default)]`, so a partial TOML/JSON document only
/// needs the keys it overrides.
///
/// # Examples
///
/// ```
/// use rvoip_dialer_engine::config::{DialerConfig, DispatchMode};
///
/// let mut config = DialerConfig::default();
/// assert_eq!(config.general.dial_ratio, 2);
///
/// config.general.dial_ratio = 3;
/// config.dispatch.mode = DispatchMode::RoundRobin;
/// config.validate().expect("configuration should be valid");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DialerConfig {
    /// Dial ratio and agent count
    pub general: GeneralConfig,

    /// Simulated transport behaviour (collaborator only)
    pub transport: TransportConfig,

    /// Lead reconciliation policies
    pub policy: PolicyConfig,

    /// Dispatch driver settings
    pub dispatch: DispatchConfig,
}

/// General dialer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Lines opened concurrently per agent
    ///
    /// The upper bound of every session's in-flight set.
    pub dial_ratio: usize,

    /// Number of agents logged in by a simulated run
    pub number_of_agents: usize,

    /// Prefix used to build agent ids (`agent-1`, `agent-2`, ...)
    pub agent_id_prefix: String,
}

/// Settings for the simulated dial transport
///
/// The engine treats the transport as opaque; these values only shape
/// [`SimulatedTransport`](crate::transport::SimulatedTransport).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Probability in `[0, 1]` that a dial connects
    pub success_probability: f64,

    /// Lower bound of the simulated ring time in milliseconds
    pub min_dial_latency_ms: u64,

    /// Upper bound of the simulated ring time in milliseconds
    pub max_dial_latency_ms: u64,

    /// Seed for reproducible outcomes; `None` seeds from entropy
    pub seed: Option<u64>,
}

/// Reconciliation policies for leads the reference behaviour left stranded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// What happens to still-dialing leads when an agent logs out
    pub logout: LogoutPolicy,

    /// Total dial attempts a lead may receive before `requeue_failed` gives up on it
    ///
    /// The default of 1 disables retries entirely.
    pub max_dial_attempts: u32,
}

/// Logout reconciliation policy for `Queued` claims
///
/// `Started` claims are always abandoned on logout (the callee is on the line
/// and nobody will take the call); `Failed` and `Ended` claims are simply let go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutPolicy {
    /// Return `Queued` leads to `Available` so another agent can dial them
    Release,
    /// Mark `Queued` leads `Abandoned`
    Abandon,
}

/// Largest accepted per-agent command channel
pub const MAX_COMMAND_CHANNEL_CAPACITY: usize = 65_536;

/// Dispatch driver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Which driver runs the agent sessions
    pub mode: DispatchMode,

    /// Simulated talk time before an engaged agent hangs up, in milliseconds
    ///
    /// `0` disables automatic hang-up; calls then end only through
    /// `DialerEngine::hang_up`.
    pub talk_time_ms: u64,

    /// Capacity of each agent worker's command channel
    pub command_channel_capacity: usize,
}

/// Dispatch driver selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One worker task per agent, dial outcomes delivered over channels
    Concurrent,
    /// Single cooperative loop, one transition per agent per pass
    RoundRobin,
}

impl DialerConfig {
    /// Validate the configuration for consistency and correctness
    ///
    /// # Examples
    ///
    /// ```
    /// use rvoip_dialer_engine::config::DialerConfig;
    ///
    /// let mut config = DialerConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.general.dial_ratio = 0;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), String> {
        if self.general.dial_ratio == 0 {
            return Err("dial_ratio must be greater than 0".to_string());
        }

        if self.general.number_of_agents == 0 {
            return Err("number_of_agents must be greater than 0".to_string());
        }

        if self.general.agent_id_prefix.is_empty() {
            return Err("agent_id_prefix cannot be empty".to_string());
        }

        let p = self.transport.success_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(format!("success_probability must be within [0, 1], got {}", p));
        }

        if self.transport.min_dial_latency_ms > self.transport.max_dial_latency_ms {
            return Err(format!(
                "min_dial_latency_ms ({}) cannot exceed max_dial_latency_ms ({})",
                self.transport.min_dial_latency_ms, self.transport.max_dial_latency_ms
            ));
        }

        if self.policy.max_dial_attempts == 0 {
            return Err("max_dial_attempts must be greater than 0".to_string());
        }

        let capacity = self.dispatch.command_channel_capacity;
        if capacity == 0 || capacity > MAX_COMMAND_CHANNEL_CAPACITY {
            return Err(format!(
                "command_channel_capacity must be within [1, {}], got {}",
                MAX_COMMAND_CHANNEL_CAPACITY, capacity
            ));
        }

        Ok(())
    }
}

impl GeneralConfig {
    /// Agent id for the `index`-th simulated agent (1-based)
    ///
    /// ```
    /// use rvoip_dialer_engine::config::GeneralConfig;
    ///
    /// let config = GeneralConfig::default();
    /// assert_eq!(config.agent_id(1), "agent-1");
    /// ```
    pub fn agent_id(&self, index: usize) -> String {
        format!("{}-{}", self.agent_id_prefix, index)
    }
}

impl DispatchConfig {
    /// Talk time as a duration, `None` when automatic hang-up is disabled
    pub fn talk_time(&self) -> Option<Duration> {
        (self.talk_time_ms > 0).then(|| Duration::from_millis(self.talk_time_ms))
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dial_ratio: 2,
            number_of_agents: 2,
            agent_id_prefix: "agent".to_string(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            success_probability: 0.5,
            min_dial_latency_ms: 5,
            max_dial_latency_ms: 50,
            seed: None,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            logout: LogoutPolicy::Release,
            max_dial_attempts: 1,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Concurrent,
            talk_time_ms: 20,
            command_channel_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DialerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.dial_ratio, 2);
        assert_eq!(config.general.number_of_agents, 2);
        assert_eq!(config.transport.success_probability, 0.5);
        assert_eq!(config.policy.logout, LogoutPolicy::Release);
        assert_eq!(config.dispatch.mode, DispatchMode::Concurrent);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = DialerConfig::default();
        config.transport.success_probability = 1.5;
        assert!(config.validate().unwrap_err().contains("success_probability"));

        let mut config = DialerConfig::default();
        config.transport.min_dial_latency_ms = 100;
        config.transport.max_dial_latency_ms = 10;
        assert!(config.validate().is_err());

        let mut config = DialerConfig::default();
        config.policy.max_dial_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = DialerConfig::default();
        config.general.number_of_agents = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_values_are_bounded() {
        let mut config = DialerConfig::default();
        config.general.dial_ratio = usize::MAX / 2;
        assert!(config.validate().is_ok());

        config.dispatch.command_channel_capacity = usize::MAX / 2;
        assert!(config.validate().unwrap_err().contains("command_channel_capacity"));

        config.dispatch.command_channel_capacity = MAX_COMMAND_CHANNEL_CAPACITY;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_talk_time_zero_disables_hangup() {
        let mut dispatch = DispatchConfig::default();
        assert_eq!(dispatch.talk_time(), Some(Duration::from_millis(20)));

        dispatch.talk_time_ms = 0;
        assert_eq!(dispatch.talk_time(), None);
    }
}
