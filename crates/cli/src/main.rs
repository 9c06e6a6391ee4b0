//! Power dialer simulator
//!
//! Loads a lead list, logs in the configured agents and dials the list with a
//! simulated transport until every agent runs out of leads, then prints the
//! final pool state.

mod config;
mod leads;
mod logging;
mod report;

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};

use rvoip_dialer_engine::config::{DispatchMode, LogoutPolicy};
use rvoip_dialer_engine::prelude::*;

use crate::config::Overrides;
use crate::logging::{LogFormat, LogOptions};
use crate::report::RunReport;

#[derive(Parser, Debug)]
#[command(name = "power-dialer", version, about = "Simulated outbound power dialer")]
struct Args {
    /// TOML configuration file (defaults to <config dir>/rvoip-dialer/dialer.toml if present)
    #[arg(short, long, env = "DIALER_CONFIG")]
    config: Option<PathBuf>,

    /// File with one phone number per line
    #[arg(long, env = "DIALER_LEADS_FILE", conflicts_with = "leads")]
    leads_file: Option<PathBuf>,

    /// Number of generated leads when no leads file is given
    #[arg(long, env = "DIALER_LEADS", default_value_t = 20)]
    leads: usize,

    /// Lines dialed concurrently per agent
    #[arg(long, env = "DIALER_DIAL_RATIO")]
    dial_ratio: Option<usize>,

    /// Number of agents to log in
    #[arg(long, env = "DIALER_AGENTS")]
    agents: Option<usize>,

    /// Probability that a simulated dial connects
    #[arg(long, env = "DIALER_SUCCESS_PROBABILITY")]
    success_probability: Option<f64>,

    /// Dispatch driver
    #[arg(long, env = "DIALER_MODE", value_enum)]
    mode: Option<ModeArg>,

    /// Seed for reproducible simulated outcomes
    #[arg(long, env = "DIALER_SEED")]
    seed: Option<u64>,

    /// Simulated talk time before an agent hangs up, in milliseconds
    #[arg(long, env = "DIALER_TALK_TIME_MS")]
    talk_time_ms: Option<u64>,

    /// What happens to still-ringing leads when an agent logs out
    #[arg(long, env = "DIALER_LOGOUT_POLICY", value_enum)]
    logout_policy: Option<LogoutArg>,

    /// Dial attempts allowed per lead by the requeue sweep
    #[arg(long, env = "DIALER_MAX_DIAL_ATTEMPTS")]
    max_dial_attempts: Option<u32>,

    /// Run the requeue sweep and dial eligible failed leads again before reporting
    #[arg(long)]
    retry_failed: bool,

    /// Log level for the dialer (trace, debug, info, warn, error); RUST_LOG wins if set
    #[arg(long, env = "DIALER_LOG_LEVEL", default_value = "info", value_parser = logging::parse_level)]
    log_level: Level,

    /// Log line format
    #[arg(long, env = "DIALER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    /// Include file and line in log lines
    #[arg(long)]
    file_info: bool,

    /// Log span enter and exit events
    #[arg(long)]
    log_spans: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Concurrent,
    RoundRobin,
}

impl From<ModeArg> for DispatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Concurrent => DispatchMode::Concurrent,
            ModeArg::RoundRobin => DispatchMode::RoundRobin,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogoutArg {
    Release,
    Abandon,
}

impl From<LogoutArg> for LogoutPolicy {
    fn from(policy: LogoutArg) -> Self {
        match policy {
            LogoutArg::Release => LogoutPolicy::Release,
            LogoutArg::Abandon => LogoutPolicy::Abandon,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            dial_ratio: self.dial_ratio,
            agents: self.agents,
            success_probability: self.success_probability,
            mode: self.mode.map(Into::into),
            seed: self.seed,
            talk_time_ms: self.talk_time_ms,
            logout_policy: self.logout_policy.map(Into::into),
            max_dial_attempts: self.max_dial_attempts,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(&LogOptions {
        level: args.log_level,
        format: args.log_format,
        file_info: args.file_info,
        spans: args.log_spans,
    })?;
    info!("📞 Starting power-dialer v{}", env!("CARGO_PKG_VERSION"));

    let (mut dialer_config, source) = config::load_config(args.config.as_deref())?;
    match &source {
        Some(path) => info!("⚙️  Loaded configuration from {}", path.display()),
        None => info!("⚙️  Using built-in configuration defaults"),
    }
    args.overrides().apply(&mut dialer_config);
    config::validate(&dialer_config)?;

    if args.print_config {
        print!("{}", toml::to_string_pretty(&dialer_config)?);
        return Ok(());
    }

    let numbers = match &args.leads_file {
        Some(path) => leads::read_leads_file(path)?,
        None => leads::generate_leads(args.leads),
    };
    let pool = Arc::new(LeadPool::with_leads(numbers).context("Failed to build lead pool")?);
    let transport: Arc<dyn DialTransport> = Arc::new(SimulatedTransport::new(&dialer_config.transport)?);

    info!("📋 {} leads, {} agents, dial ratio {}, {:?} mode",
          pool.len(), dialer_config.general.number_of_agents,
          dialer_config.general.dial_ratio, dialer_config.dispatch.mode);

    let mut agents = run(&dialer_config, &pool, &transport).await?;

    if args.retry_failed {
        let requeued = pool.requeue_failed(dialer_config.policy.max_dial_attempts);
        info!("🔁 Retrying {} failed leads", requeued.len());
        if !requeued.is_empty() {
            agents.extend(run(&dialer_config, &pool, &transport).await?);
        }
    }

    let report = RunReport {
        mode: format!("{:?}", dialer_config.dispatch.mode).to_lowercase(),
        pool: pool.stats(),
        agents,
        leads: pool.snapshot(),
    };
    match args.output {
        OutputFormat::Table => println!("{}", report.render()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }
    Ok(())
}

/// Log every configured agent in and dial until they all retire
async fn run(
    config: &DialerConfig,
    pool: &Arc<LeadPool>,
    transport: &Arc<dyn DialTransport>,
) -> Result<Vec<SessionReport>> {
    let reports = match config.dispatch.mode {
        DispatchMode::RoundRobin => {
            let mut dispatcher =
                RoundRobinDispatcher::new(config.clone(), Arc::clone(pool), Arc::clone(transport))?;
            dispatcher.login_configured_agents().await?;
            dispatcher.run().await?
        }
        DispatchMode::Concurrent => {
            let engine = DialerEngine::new(config.clone(), Arc::clone(pool), Arc::clone(transport))?;
            engine.login_configured_agents()?;
            engine.run_to_completion().await?
        }
    };
    info!("🏁 Run finished with {} agent sessions", reports.len());
    Ok(reports)
}
