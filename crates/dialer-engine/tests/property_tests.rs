//! Property tests for sessions sharing one pool
//!
//! Random interleavings of dial outcomes and hang-ups across several agents,
//! checking after every step that no lead is held twice, that no session
//! exceeds its ratio, and that an idle session is always full or the pool empty.

use std::collections::HashMap;
use std::sync::Arc;
use proptest::prelude::*;
use rvoip_dialer_engine::prelude::*;

#[derive(Debug, Clone)]
enum Event {
    Outcome { agent: usize, pick: usize, connected: bool },
    HangUp { agent: usize },
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => (0..4usize, 0..8usize, any::<bool>())
            .prop_map(|(agent, pick, connected)| Event::Outcome { agent, pick, connected }),
        1 => (0..4usize).prop_map(|agent| Event::HangUp { agent }),
    ]
}

fn apply(session: &mut AgentSession, event: &Event) {
    match *event {
        Event::Outcome { pick, connected, .. } => {
            // engaged sessions only have orphans left ringing
            let ringing = match session.state() {
                AgentState::Idle => session.in_flight(),
                _ => session.orphaned(),
            };
            if ringing.is_empty() {
                return;
            }
            let claim = ringing[pick % ringing.len()].clone();
            let effect = session
                .on_dial_outcome(&claim, DialOutcome::from(connected))
                .expect("outcome for a held claim");
            assert_ne!(effect, OutcomeEffect::Stale);
        }
        Event::HangUp { .. } => {
            if let Some(call) = session.engaged_call().cloned() {
                session.on_call_ended(&call.phone).expect("hang-up of the engaged call");
            }
        }
    }
}

fn check(pool: &LeadPool, sessions: &[AgentSession]) -> std::result::Result<(), TestCaseError> {
    let mut owners: HashMap<Claim, &AgentId> = HashMap::new();
    for session in sessions {
        prop_assert!(session.in_flight().len() <= session.dial_ratio());
        if session.state() == AgentState::Idle {
            prop_assert!(
                session.in_flight().len() == session.dial_ratio() || pool.available_count() == 0,
                "{} idle with {} of {} lines and {} leads available",
                session.agent_id(), session.in_flight().len(), session.dial_ratio(), pool.available_count()
            );
        }
        for claim in session.in_flight().iter().chain(session.orphaned()) {
            prop_assert!(owners.insert(claim.clone(), session.agent_id()).is_none(), "{} held twice", claim);
        }
    }

    for lead in pool.snapshot() {
        if lead.state.is_claimed() {
            let ticket = lead.ticket.expect("claimed lead has a ticket");
            let claim = Claim { phone: lead.phone.clone(), ticket };
            prop_assert_eq!(owners.get(&claim).copied(), lead.holder.as_ref(), "{} owner mismatch", claim);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_sessions_share_pool_consistently(
        leads in 0..30usize,
        ratios in prop::collection::vec(1..5usize, 1..4),
        events in prop::collection::vec(event(), 0..120),
    ) {
        let pool = Arc::new(LeadPool::with_leads((0..leads).map(|i| format!("555-{:04}", i))).unwrap());
        let mut sessions: Vec<AgentSession> = ratios
            .iter()
            .enumerate()
            .map(|(i, &ratio)| AgentSession::new(format!("agent-{}", i), ratio, Arc::clone(&pool)).unwrap())
            .collect();

        for i in 0..sessions.len() {
            sessions[i].login().unwrap();
            check(&pool, &sessions)?;
        }

        for event in &events {
            let agent = match *event {
                Event::Outcome { agent, .. } | Event::HangUp { agent } => agent % sessions.len(),
            };
            apply(&mut sessions[agent], event);
            check(&pool, &sessions)?;
        }

        let total_dialed: u64 = sessions.iter().map(|s| s.stats().dialed).sum();
        for session in sessions.iter_mut() {
            session.logout().unwrap();
        }
        let stats = pool.stats();
        prop_assert_eq!(stats.in_progress(), 0);
        prop_assert!(pool.snapshot().iter().all(|l| l.holder.is_none()));
        prop_assert_eq!(stats.total, leads);
        prop_assert!(total_dialed as usize >= leads - stats.available);
    }

    #[test]
    fn prop_login_fills_to_min_of_ratio_and_pool(leads in 0..12usize, ratio in 1..8usize) {
        let pool = Arc::new(LeadPool::with_leads((0..leads).map(|i| format!("555-{:04}", i))).unwrap());
        let mut session = AgentSession::new("agent-1", ratio, Arc::clone(&pool)).unwrap();

        let claims = session.login().unwrap();
        prop_assert_eq!(claims.len(), ratio.min(leads));
        prop_assert_eq!(pool.available_count(), leads - claims.len());

        // claims follow registration order
        let expected: Vec<PhoneNumber> = (0..claims.len()).map(|i| PhoneNumber(format!("555-{:04}", i))).collect();
        let claimed: Vec<PhoneNumber> = claims.into_iter().map(|c| c.phone).collect();
        prop_assert_eq!(claimed, expected);
    }
}
