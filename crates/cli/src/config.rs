//! Configuration file loading and command-line overrides

use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use rvoip_dialer_engine::config::{DialerConfig, DispatchMode, LogoutPolicy};

const CONFIG_DIR: &str = "rvoip-dialer";
const CONFIG_FILE: &str = "dialer.toml";

/// `<config_dir>/rvoip-dialer/dialer.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the dialer configuration
///
/// An explicit path must exist. Without one the default location is used if
/// a file is there, otherwise built-in defaults. Returns the file actually
/// read, if any.
pub fn load_config(explicit: Option<&Path>) -> Result<(DialerConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.is_file()),
    };

    let Some(path) = path else {
        return Ok((DialerConfig::default(), None));
    };

    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse_config(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok((config, Some(path)))
}

pub fn parse_config(text: &str) -> Result<DialerConfig> {
    Ok(toml::from_str(text)?)
}

/// Values given on the command line or through `DIALER_*` variables
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dial_ratio: Option<usize>,
    pub agents: Option<usize>,
    pub success_probability: Option<f64>,
    pub mode: Option<DispatchMode>,
    pub seed: Option<u64>,
    pub talk_time_ms: Option<u64>,
    pub logout_policy: Option<LogoutPolicy>,
    pub max_dial_attempts: Option<u32>,
}

impl Overrides {
    pub fn apply(&self, config: &mut DialerConfig) {
        if let Some(ratio) = self.dial_ratio {
            config.general.dial_ratio = ratio;
        }
        if let Some(agents) = self.agents {
            config.general.number_of_agents = agents;
        }
        if let Some(p) = self.success_probability {
            config.transport.success_probability = p;
        }
        if let Some(mode) = self.mode {
            config.dispatch.mode = mode;
        }
        if let Some(seed) = self.seed {
            config.transport.seed = Some(seed);
        }
        if let Some(talk) = self.talk_time_ms {
            config.dispatch.talk_time_ms = talk;
        }
        if let Some(policy) = self.logout_policy {
            config.policy.logout = policy;
        }
        if let Some(attempts) = self.max_dial_attempts {
            config.policy.max_dial_attempts = attempts;
        }
    }
}

/// Validate the merged configuration for an unattended run
pub fn validate(config: &DialerConfig) -> Result<()> {
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    if config.dispatch.mode == DispatchMode::Concurrent && config.dispatch.talk_time_ms == 0 {
        return Err(anyhow!(
            "talk_time_ms must be greater than 0 in concurrent mode, nobody would hang up"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = parse_config(
            r#"
            [general]
            dial_ratio = 3

            [dispatch]
            mode = "round_robin"
            "#,
        )
        .unwrap();

        assert_eq!(config.general.dial_ratio, 3);
        assert_eq!(config.general.number_of_agents, 2);
        assert_eq!(config.dispatch.mode, DispatchMode::RoundRobin);
        assert_eq!(config.transport.success_probability, 0.5);
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        assert!(parse_config("[policy]\nlogout = \"sometimes\"\n").is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = parse_config("[general]\ndial_ratio = 3\n").unwrap();
        let overrides = Overrides {
            dial_ratio: Some(5),
            seed: Some(7),
            logout_policy: Some(LogoutPolicy::Abandon),
            ..Default::default()
        };
        overrides.apply(&mut config);

        assert_eq!(config.general.dial_ratio, 5);
        assert_eq!(config.transport.seed, Some(7));
        assert_eq!(config.policy.logout, LogoutPolicy::Abandon);
        assert_eq!(config.general.number_of_agents, 2);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let missing = std::env::temp_dir().join("rvoip-dialer-missing-config.toml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_concurrent_run_needs_talk_time() {
        let mut config = DialerConfig::default();
        assert!(validate(&config).is_ok());

        config.dispatch.talk_time_ms = 0;
        assert!(validate(&config).is_err());

        config.dispatch.mode = DispatchMode::RoundRobin;
        assert!(validate(&config).is_ok());
    }
}
