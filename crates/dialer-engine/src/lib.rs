//! # RVOIP Dialer Engine
//!
//! Outbound power dialer for the rvoip stack. Each logged-in agent keeps
//! `dial_ratio` leads ringing at once; the first call that connects goes to
//! the agent, other calls that also connected are abandoned, and failed or
//! finished calls are immediately backfilled from a shared lead pool.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  DialerEngine  │  RoundRobinDispatcher       │   dispatch
//! ├──────────────────────────────────────────────┤
//! │  AgentSession (one per agent)                │   agent
//! ├──────────────────────┬───────────────────────┤
//! │  LeadPool (shared)   │  DialTransport        │   lead / transport
//! └──────────────────────┴───────────────────────┘
//! ```
//!
//! - [`lead`]: the shared pool and the lead lifecycle. Claiming is atomic, so
//!   no lead is ever dialed for two agents at once.
//! - [`agent`]: the per-agent state machine and its single backfill routine.
//! - [`transport`]: the dialing collaborator trait plus simulated and
//!   scripted implementations.
//! - [`dispatch`]: the drivers that feed dial outcomes and hang-ups into
//!   sessions.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rvoip_dialer_engine::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let pool = Arc::new(LeadPool::with_leads([
//!     "865-384-6115",
//!     "682-911-0414",
//!     "618-763-9619",
//! ])?);
//! let transport = Arc::new(SimulatedTransport::instant(0.5, 42)?);
//!
//! let mut config = DialerConfig::default();
//! config.dispatch.mode = DispatchMode::RoundRobin;
//!
//! let mut dispatcher = RoundRobinDispatcher::new(config, pool.clone(), transport)?;
//! dispatcher.login_configured_agents().await?;
//! let reports = dispatcher.run().await?;
//!
//! for report in &reports {
//!     println!("{}: {} completed", report.agent_id, report.stats.completed);
//! }
//! assert_eq!(pool.stats().in_progress(), 0);
//! # Ok::<(), DialerError>(())
//! # }).unwrap();
//! ```
//!
//! ## Lead reconciliation
//!
//! Leads never stay claimed by a session that no longer tracks them:
//!
//! - on logout, still-dialing leads follow [`LogoutPolicy`](config::LogoutPolicy)
//!   and connected-but-untaken leads are abandoned
//! - a lead still ringing when another call wins is kept as an orphan and
//!   settled (`Abandoned` or `Failed`) when its outcome arrives
//! - failed leads are never redialed automatically; see
//!   [`LeadPool::requeue_failed`](lead::LeadPool::requeue_failed)

pub mod error;
pub mod config;

pub mod lead;
pub mod agent;
pub mod transport;
pub mod dispatch;

pub use error::{DialerError, Result};
pub use config::DialerConfig;
pub use dispatch::{DialerEngine, DialerStats, RoundRobinDispatcher};

/// Prelude module for convenient imports
///
/// ```rust
/// use rvoip_dialer_engine::prelude::*;
///
/// let pool = LeadPool::new();
/// assert!(pool.is_empty());
/// ```
pub mod prelude {
    //! Commonly used types for building and running a dialer

    pub use crate::{DialerError, DialerConfig, Result};

    pub use crate::config::{
        GeneralConfig, TransportConfig, PolicyConfig, DispatchConfig,
        LogoutPolicy, DispatchMode,
    };

    pub use crate::lead::{Claim, ClaimTicket, Lead, LeadPool, LeadState, PhoneNumber, PoolStats};

    pub use crate::agent::{
        AgentId, AgentSession, AgentState, OutcomeEffect, SessionReport, SessionStats,
    };

    pub use crate::transport::{DialOutcome, DialTransport, ScriptedTransport, SimulatedTransport};

    pub use crate::dispatch::{
        AgentCommand, DialerEngine, DialerStats, PassSummary, RoundRobinDispatcher,
    };

    pub use chrono::{DateTime, Utc};
    pub use uuid::Uuid;
}
