//! Integration tests for the concurrent dialer engine
//!
//! Each agent runs in its own worker task and dial outcomes arrive in
//! completion order, so these tests wait on pool state rather than stepping.

use std::sync::Arc;
use std::time::Duration;
use rvoip_dialer_engine::prelude::*;
use serial_test::serial;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rvoip_dialer_engine=debug")
        .with_test_writer()
        .try_init();
}

fn pool_of(n: usize) -> Arc<LeadPool> {
    Arc::new(LeadPool::with_leads((1..=n).map(|i| format!("L{}", i))).expect("pool creation failed"))
}

fn config(agents: usize, ratio: usize, talk_time_ms: u64) -> DialerConfig {
    let mut config = DialerConfig::default();
    config.general.number_of_agents = agents;
    config.general.dial_ratio = ratio;
    config.dispatch.talk_time_ms = talk_time_ms;
    config
}

fn state(pool: &LeadPool, s: &str) -> LeadState {
    pool.get_state(&PhoneNumber::from(s)).expect("lead should exist")
}

async fn wait_until(what: &str, check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_many_agents_drain_pool_without_double_dials() {
    init_tracing();
    let pool = pool_of(200);
    let mut transport = ScriptedTransport::failing();
    for i in 1..=200u64 {
        let number = format!("L{}", i);
        if i % 3 == 0 {
            transport.set_outcome(number.clone(), DialOutcome::Connected);
        }
        transport = transport.with_delay(number, Duration::from_millis(i % 4));
    }
    let transport = Arc::new(transport);

    let engine = DialerEngine::new(config(8, 3, 1), Arc::clone(&pool), transport.clone()).unwrap();
    let agents = engine.login_configured_agents().unwrap();
    assert_eq!(agents.len(), 8);

    let reports = engine.run_to_completion().await.unwrap();
    assert_eq!(reports.len(), 8);
    assert_eq!(reports[0].agent_id, AgentId::from("agent-1"));
    assert!(engine.active_agents().is_empty());

    for lead in pool.snapshot() {
        assert_eq!(transport.dial_count(&lead.phone), 1, "{} dialed {} times", lead.phone, transport.dial_count(&lead.phone));
        assert!(lead.state.is_terminal(), "{} left {}", lead.phone, lead.state);
        assert!(lead.holder.is_none(), "{} still held", lead.phone);
    }

    let stats = engine.stats();
    assert_eq!(stats.pool.in_progress(), 0);
    assert_eq!(stats.pool.available, 0);
    assert_eq!(stats.pool.failed, 134);
    assert_eq!(stats.pool.ended + stats.pool.abandoned, 66);

    let dialed: u64 = reports.iter().map(|r| r.stats.dialed).sum();
    let completed: u64 = reports.iter().map(|r| r.stats.completed).sum();
    assert_eq!(dialed, 200);
    assert_eq!(completed as usize, stats.pool.ended);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_simulated_run_leaves_nothing_in_progress() {
    init_tracing();
    let pool = pool_of(100);
    let mut cfg = config(5, 2, 1);
    cfg.transport.min_dial_latency_ms = 0;
    cfg.transport.max_dial_latency_ms = 3;
    cfg.transport.seed = Some(99);
    let transport = Arc::new(SimulatedTransport::new(&cfg.transport).unwrap());

    let engine = DialerEngine::new(cfg, Arc::clone(&pool), transport).unwrap();
    engine.login_configured_agents().unwrap();
    engine.run_to_completion().await.unwrap();

    let stats = pool.stats();
    assert_eq!(stats.in_progress(), 0);
    assert_eq!(stats.ended + stats.failed + stats.abandoned, 100);
}

#[tokio::test]
#[serial]
async fn test_manual_hang_up_ends_call_and_backfills() {
    let pool = pool_of(2);
    let transport = Arc::new(ScriptedTransport::failing().with_outcome("L1", DialOutcome::Connected));
    let engine = DialerEngine::new(config(1, 1, 0), Arc::clone(&pool), transport).unwrap();
    let agent = AgentId::from("agent-1");

    engine.login_agent(agent.clone()).unwrap();
    wait_until("L1 to be handed to the agent", || state(&pool, "L1") == LeadState::Ended).await;

    // talk time is disabled, so the agent stays engaged
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.active_agents(), vec![agent.clone()]);
    assert_eq!(state(&pool, "L2"), LeadState::Available);

    assert_ok!(engine.hang_up(&agent).await);
    let reports = engine.run_to_completion().await.unwrap();

    assert_eq!(state(&pool, "L2"), LeadState::Failed);
    let stats = &reports[0].stats;
    assert_eq!(stats.connected, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
#[serial]
async fn test_empty_pool_agent_retires_immediately() {
    let pool = Arc::new(LeadPool::new());
    let transport = Arc::new(ScriptedTransport::connecting());
    let engine = DialerEngine::new(config(1, 2, 0), Arc::clone(&pool), transport).unwrap();
    let agent = AgentId::from("agent-1");

    engine.login_agent(agent.clone()).unwrap();
    wait_until("the worker to retire", || engine.active_agents().is_empty()).await;

    // the worker is gone but its report has not been collected yet
    let err = assert_err!(engine.hang_up(&agent).await);
    assert!(matches!(err, DialerError::NotFound(_)));
    assert!(matches!(engine.login_agent(agent.clone()), Err(DialerError::AlreadyExists(_))));

    let report = engine.logout_agent(&agent).await.unwrap();
    assert_eq!(report.stats.dialed, 0);
    assert!(report.logged_in_at.is_some());

    // collected, so the agent may log in again
    assert_ok!(engine.login_agent(agent.clone()));
    assert_eq!(engine.run_to_completion().await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_unknown_agents_and_bad_config() {
    let pool = pool_of(1);
    let transport: Arc<dyn DialTransport> = Arc::new(ScriptedTransport::failing());
    let engine = DialerEngine::new(config(1, 1, 0), Arc::clone(&pool), Arc::clone(&transport)).unwrap();
    let ghost = AgentId::from("ghost");

    assert!(matches!(engine.hang_up(&ghost).await, Err(DialerError::NotFound(_))));
    assert!(matches!(engine.logout_agent(&ghost).await, Err(DialerError::NotFound(_))));
    assert!(engine.run_to_completion().await.unwrap().is_empty());

    let mut bad = config(1, 1, 0);
    bad.general.dial_ratio = 0;
    let err = assert_err!(DialerEngine::new(bad, pool, transport));
    assert!(matches!(err, DialerError::Configuration(_)));
}
