//! # Lead Pool Implementation
//!
//! The pool is the only state shared between agent sessions. Every mutation
//! goes through one `parking_lot::Mutex`, which makes the scan-and-transition
//! in [`LeadPool::claim_next`] atomic: two sessions can never walk away with
//! the same `Available` lead.

use std::collections::{BTreeSet, HashMap};
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::agent::AgentId;
use crate::error::{DialerError, Result};
use super::types::{Claim, ClaimTicket, Lead, LeadState, PhoneNumber, PoolStats};

/// # Shared Lead Pool
///
/// Holds every lead's state in registration order. Sessions share it through
/// an `Arc<LeadPool>`; all methods take `&self`.
///
/// ## Claim order
///
/// `Available` leads are claimed first-registered, first-claimed. A reseeded
/// lead re-enters at its original registration position, not at the back.
///
/// ## Examples
///
/// ```rust
/// use rvoip_dialer_engine::lead::{LeadPool, LeadState};
/// use rvoip_dialer_engine::agent::AgentId;
///
/// # fn example() -> rvoip_dialer_engine::Result<()> {
/// let pool = LeadPool::with_leads(["865-384-6115", "682-911-0414"])?;
/// let agent = AgentId::from("agent-1");
///
/// let claim = pool.claim_next(&agent).expect("a lead is available");
/// assert_eq!(claim.phone.as_str(), "865-384-6115");
/// assert_eq!(pool.get_state(&claim.phone)?, LeadState::Queued);
/// # Ok(())
/// # }
/// ```
pub struct LeadPool {
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    /// Leads in registration order
    leads: Vec<Lead>,
    /// Phone number to position in `leads`
    index: HashMap<PhoneNumber, usize>,
    /// Positions of `Available` leads
    available: BTreeSet<usize>,
    next_ticket: u64,
}

impl PoolInner {
    fn position(&self, phone: &PhoneNumber) -> Result<usize> {
        self.index
            .get(phone)
            .copied()
            .ok_or_else(|| DialerError::not_found(format!("Lead not found: {}", phone)))
    }

    /// Write a new state, keeping the available index in step. Returns the previous state.
    fn set_state(&mut self, pos: usize, state: LeadState) -> LeadState {
        let lead = &mut self.leads[pos];
        let previous = lead.state;
        lead.state = state;
        lead.updated_at = Utc::now();
        if state == LeadState::Available {
            lead.holder = None;
            lead.ticket = None;
            self.available.insert(pos);
        } else {
            self.available.remove(&pos);
        }
        previous
    }

    fn check_holder(&self, pos: usize, agent: &AgentId, claim: &Claim) -> Result<()> {
        let lead = &self.leads[pos];
        if lead.is_held_by(agent, claim) {
            return Ok(());
        }
        let msg = format!(
            "agent {} touched lead {} without holding it (holder: {:?}, ticket: {:?})",
            agent, claim, lead.holder, lead.ticket
        );
        error!("🚨 {}", msg);
        Err(DialerError::invariant(msg))
    }
}

impl LeadPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                leads: Vec::new(),
                index: HashMap::new(),
                available: BTreeSet::new(),
                next_ticket: 0,
            }),
        }
    }

    /// Create a pool with the given numbers registered as `Available`, in order
    pub fn with_leads<I, P>(phones: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PhoneNumber>,
    {
        let pool = Self::new();
        for phone in phones {
            pool.add_lead(phone)?;
        }
        Ok(pool)
    }

    /// Register a new `Available` lead at the end of the claim order
    pub fn add_lead(&self, phone: impl Into<PhoneNumber>) -> Result<()> {
        let phone = phone.into();
        let mut inner = self.inner.lock();
        if inner.index.contains_key(&phone) {
            return Err(DialerError::already_exists(format!("Lead already registered: {}", phone)));
        }
        let pos = inner.leads.len();
        inner.index.insert(phone.clone(), pos);
        inner.leads.push(Lead::new(phone));
        inner.available.insert(pos);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically claim the first `Available` lead for `agent`
    ///
    /// Transitions the lead to `Queued`, records `agent` as its holder and
    /// issues a fresh ticket. Returns `None` when no lead is available; that is
    /// the normal exhaustion signal, not an error.
    pub fn claim_next(&self, agent: &AgentId) -> Option<Claim> {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.available.pop_first() else {
            debug!("No more available leads for agent {}", agent);
            return None;
        };

        inner.next_ticket += 1;
        let ticket = ClaimTicket(inner.next_ticket);

        let lead = &mut inner.leads[pos];
        debug_assert_eq!(lead.state, LeadState::Available);
        debug_assert!(lead.holder.is_none());
        lead.state = LeadState::Queued;
        lead.holder = Some(agent.clone());
        lead.ticket = Some(ticket);
        lead.dial_attempts += 1;
        lead.updated_at = Utc::now();

        debug!("📤 Agent {} claimed lead {} (ticket {}, attempt {})",
               agent, lead.phone, ticket, lead.dial_attempts);
        Some(Claim { phone: lead.phone.clone(), ticket })
    }

    /// Current state of a lead
    pub fn get_state(&self, phone: &PhoneNumber) -> Result<LeadState> {
        let inner = self.inner.lock();
        let pos = inner.position(phone)?;
        Ok(inner.leads[pos].state)
    }

    /// Full record of a lead
    pub fn get(&self, phone: &PhoneNumber) -> Result<Lead> {
        let inner = self.inner.lock();
        let pos = inner.position(phone)?;
        Ok(inner.leads[pos].clone())
    }

    /// Unconditional operator write
    ///
    /// Unknown numbers are reported as `NotFound` rather than ignored. Writing
    /// `Available` puts the lead back in the claim order, and is refused with
    /// `InvalidTransition` while a session still holds the lead.
    /// Sessions never use this; they go through [`update_claimed`](Self::update_claimed).
    pub fn update_state(&self, phone: &PhoneNumber, state: LeadState) -> Result<()> {
        let mut inner = self.inner.lock();
        let pos = inner.position(phone)?;
        if state == LeadState::Available {
            if let Some(holder) = &inner.leads[pos].holder {
                return Err(DialerError::invalid_transition(format!(
                    "lead {} is held by agent {} and cannot be made available", phone, holder
                )));
            }
        }
        let previous = inner.set_state(pos, state);
        debug!("Lead {} {} -> {} (operator write)", phone, previous, state);
        Ok(())
    }

    /// Holder-checked write used by agent sessions
    ///
    /// Fails with `InvariantViolation` if `agent` does not hold `claim`, and
    /// with `InvalidTransition` for `Available` (use [`release`](Self::release)).
    /// Returns the previous state.
    pub fn update_claimed(&self, agent: &AgentId, claim: &Claim, state: LeadState) -> Result<LeadState> {
        if state == LeadState::Available {
            return Err(DialerError::invalid_transition(format!(
                "lead {} cannot be made available through a claim update", claim
            )));
        }
        let mut inner = self.inner.lock();
        let pos = inner.position(&claim.phone)?;
        inner.check_holder(pos, agent, claim)?;
        let previous = inner.set_state(pos, state);
        debug!("Lead {} {} -> {} (agent {})", claim, previous, state, agent);
        Ok(previous)
    }

    /// Drop `agent`'s hold on a lead, leaving its state untouched
    ///
    /// Returns the state the lead is left in.
    pub fn relinquish(&self, agent: &AgentId, claim: &Claim) -> Result<LeadState> {
        let mut inner = self.inner.lock();
        let pos = inner.position(&claim.phone)?;
        inner.check_holder(pos, agent, claim)?;
        let lead = &mut inner.leads[pos];
        lead.holder = None;
        lead.ticket = None;
        lead.updated_at = Utc::now();
        Ok(lead.state)
    }

    /// Return a `Queued` or `Failed` lead held by `agent` to `Available`
    pub fn release(&self, agent: &AgentId, claim: &Claim) -> Result<()> {
        let mut inner = self.inner.lock();
        let pos = inner.position(&claim.phone)?;
        inner.check_holder(pos, agent, claim)?;
        let state = inner.leads[pos].state;
        if !matches!(state, LeadState::Queued | LeadState::Failed) {
            return Err(DialerError::invalid_transition(format!(
                "cannot release lead {} in state {}", claim, state
            )));
        }
        inner.set_state(pos, LeadState::Available);
        info!("🔓 Agent {} released lead {} back to the pool", agent, claim.phone);
        Ok(())
    }

    /// Operator reseed of a finished lead back to `Available`
    ///
    /// Only unheld `Failed`, `Ended` or `Abandoned` leads may be reseeded;
    /// reseeding an `Available` lead is a no-op. Anything still held by a
    /// session is refused, since a reseed would let a second session claim it.
    pub fn reseed(&self, phone: &PhoneNumber) -> Result<()> {
        let mut inner = self.inner.lock();
        let pos = inner.position(phone)?;
        let lead = &inner.leads[pos];
        if lead.state == LeadState::Available {
            return Ok(());
        }
        if !lead.state.is_terminal() || lead.holder.is_some() {
            return Err(DialerError::invalid_transition(format!(
                "cannot reseed lead {} in state {} (holder: {:?})", phone, lead.state, lead.holder
            )));
        }
        let previous = inner.set_state(pos, LeadState::Available);
        info!("🌱 Reseeded lead {} ({} -> available)", phone, previous);
        Ok(())
    }

    /// Reset unheld `Failed` leads with fewer than `max_attempts` dials to `Available`
    ///
    /// Returns the reseeded numbers in registration order.
    pub fn requeue_failed(&self, max_attempts: u32) -> Vec<PhoneNumber> {
        let mut inner = self.inner.lock();
        let eligible: Vec<usize> = inner
            .leads
            .iter()
            .enumerate()
            .filter(|(_, lead)| {
                lead.state == LeadState::Failed
                    && lead.holder.is_none()
                    && lead.dial_attempts < max_attempts
            })
            .map(|(pos, _)| pos)
            .collect();

        let mut requeued = Vec::with_capacity(eligible.len());
        for pos in eligible {
            inner.set_state(pos, LeadState::Available);
            requeued.push(inner.leads[pos].phone.clone());
        }

        if !requeued.is_empty() {
            info!("🔁 Requeued {} failed leads (max attempts {})", requeued.len(), max_attempts);
        }
        requeued
    }

    /// Copy of every lead in registration order
    pub fn snapshot(&self) -> Vec<Lead> {
        self.inner.lock().leads.clone()
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        let mut stats = PoolStats::default();
        for lead in &inner.leads {
            stats.record(lead.state);
        }
        stats
    }

    pub fn available_count(&self) -> usize {
        self.inner.lock().available.len()
    }

    /// Claims currently held by `agent`, in registration order
    pub fn held_by(&self, agent: &AgentId) -> Vec<Claim> {
        self.inner
            .lock()
            .leads
            .iter()
            .filter(|lead| lead.holder.as_ref() == Some(agent))
            .filter_map(|lead| {
                lead.ticket.map(|ticket| Claim { phone: lead.phone.clone(), ticket })
            })
            .collect()
    }
}

impl Default for LeadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LeadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeadPool")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn agent(id: &str) -> AgentId {
        AgentId::from(id)
    }

    fn pool_of(n: usize) -> LeadPool {
        LeadPool::with_leads((1..=n).map(|i| format!("555-000-{:04}", i))).unwrap()
    }

    #[test]
    fn test_claims_follow_registration_order() {
        let pool = pool_of(3);
        let a = agent("a");

        let first = pool.claim_next(&a).unwrap();
        let second = pool.claim_next(&a).unwrap();
        assert_eq!(first.phone.as_str(), "555-000-0001");
        assert_eq!(second.phone.as_str(), "555-000-0002");
        assert!(second.ticket > first.ticket);

        let lead = pool.get(&first.phone).unwrap();
        assert_eq!(lead.state, LeadState::Queued);
        assert_eq!(lead.holder, Some(a.clone()));
        assert_eq!(lead.dial_attempts, 1);
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn test_exhausted_pool_returns_none_repeatedly() {
        let pool = pool_of(1);
        let a = agent("a");
        assert!(pool.claim_next(&a).is_some());
        assert!(pool.claim_next(&a).is_none());
        assert!(pool.claim_next(&a).is_none());

        let empty = LeadPool::new();
        assert!(empty.is_empty());
        assert!(empty.claim_next(&a).is_none());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let pool = pool_of(1);
        let err = pool.add_lead("555-000-0001").unwrap_err();
        assert!(matches!(err, DialerError::AlreadyExists(_)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_unknown_numbers_are_not_found() {
        let pool = pool_of(1);
        let unknown = PhoneNumber::from("000-000-0000");
        assert!(matches!(pool.get_state(&unknown), Err(DialerError::NotFound(_))));
        assert!(matches!(
            pool.update_state(&unknown, LeadState::Abandoned),
            Err(DialerError::NotFound(_))
        ));
    }

    #[test]
    fn test_operator_write_to_available_reenters_claim_order() {
        let pool = pool_of(3);
        let a = agent("a");
        let first = pool.claim_next(&a).unwrap();
        pool.update_state(&first.phone, LeadState::Abandoned).unwrap();
        pool.relinquish(&a, &first).unwrap();
        pool.update_state(&first.phone, LeadState::Available).unwrap();

        // original position wins over later registrations
        let again = pool.claim_next(&a).unwrap();
        assert_eq!(again.phone, first.phone);
        assert_ne!(again.ticket, first.ticket);
        assert_eq!(pool.get(&again.phone).unwrap().dial_attempts, 2);
    }

    #[test]
    fn test_operator_cannot_free_a_held_lead() {
        let pool = pool_of(2);
        let a = agent("a");
        let b = agent("b");
        let claim = pool.claim_next(&a).unwrap();

        assert!(matches!(
            pool.update_state(&claim.phone, LeadState::Available),
            Err(DialerError::InvalidTransition(_))
        ));
        let lead = pool.get(&claim.phone).unwrap();
        assert_eq!(lead.state, LeadState::Queued);
        assert!(lead.is_held_by(&a, &claim));

        // the next claimant skips the held lead
        let other = pool.claim_next(&b).unwrap();
        assert_ne!(other.phone, claim.phone);
        assert!(pool.claim_next(&b).is_none());

        // the holder's own write still goes through
        pool.update_claimed(&a, &claim, LeadState::Failed).unwrap();
    }

    #[test]
    fn test_update_claimed_checks_holder_and_ticket() {
        let pool = pool_of(2);
        let a = agent("a");
        let b = agent("b");
        let claim = pool.claim_next(&a).unwrap();

        let err = pool.update_claimed(&b, &claim, LeadState::Started).unwrap_err();
        assert!(err.is_invariant_violation());

        let forged = Claim { phone: claim.phone.clone(), ticket: ClaimTicket(999) };
        assert!(pool.update_claimed(&a, &forged, LeadState::Started).is_err());

        let previous = pool.update_claimed(&a, &claim, LeadState::Started).unwrap();
        assert_eq!(previous, LeadState::Queued);
        assert_eq!(pool.get_state(&claim.phone).unwrap(), LeadState::Started);

        assert!(matches!(
            pool.update_claimed(&a, &claim, LeadState::Available),
            Err(DialerError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_relinquish_keeps_state_and_clears_holder() {
        let pool = pool_of(1);
        let a = agent("a");
        let claim = pool.claim_next(&a).unwrap();
        pool.update_claimed(&a, &claim, LeadState::Failed).unwrap();

        assert_eq!(pool.relinquish(&a, &claim).unwrap(), LeadState::Failed);
        let lead = pool.get(&claim.phone).unwrap();
        assert_eq!(lead.holder, None);
        assert_eq!(lead.ticket, None);
        assert!(pool.held_by(&a).is_empty());

        // a second relinquish no longer matches the holder
        assert!(pool.relinquish(&a, &claim).is_err());
    }

    #[test]
    fn test_release_only_from_queued_or_failed() {
        let pool = pool_of(2);
        let a = agent("a");
        let queued = pool.claim_next(&a).unwrap();
        let started = pool.claim_next(&a).unwrap();
        pool.update_claimed(&a, &started, LeadState::Started).unwrap();

        pool.release(&a, &queued).unwrap();
        assert_eq!(pool.get_state(&queued.phone).unwrap(), LeadState::Available);
        assert_eq!(pool.get(&queued.phone).unwrap().holder, None);

        assert!(matches!(pool.release(&a, &started), Err(DialerError::InvalidTransition(_))));
    }

    #[test]
    fn test_reseed_refuses_claimed_leads() {
        let pool = pool_of(2);
        let a = agent("a");
        let claim = pool.claim_next(&a).unwrap();
        assert!(matches!(pool.reseed(&claim.phone), Err(DialerError::InvalidTransition(_))));

        pool.update_claimed(&a, &claim, LeadState::Abandoned).unwrap();
        // still held until the session lets go
        assert!(pool.reseed(&claim.phone).is_err());

        pool.relinquish(&a, &claim).unwrap();
        pool.reseed(&claim.phone).unwrap();
        assert_eq!(pool.get_state(&claim.phone).unwrap(), LeadState::Available);

        // reseeding an available lead is a no-op
        pool.reseed(&PhoneNumber::from("555-000-0002")).unwrap();
    }

    #[test]
    fn test_requeue_failed_respects_attempt_limit() {
        let pool = pool_of(3);
        let a = agent("a");
        let failed = pool.claim_next(&a).unwrap();
        let held = pool.claim_next(&a).unwrap();
        pool.update_claimed(&a, &failed, LeadState::Failed).unwrap();
        pool.update_claimed(&a, &held, LeadState::Failed).unwrap();
        pool.relinquish(&a, &failed).unwrap();

        // one attempt already used; a limit of 1 allows no retry
        assert!(pool.requeue_failed(1).is_empty());

        // still-held failed leads are never requeued
        let requeued = pool.requeue_failed(2);
        assert_eq!(requeued, vec![failed.phone.clone()]);
        assert_eq!(pool.get_state(&failed.phone).unwrap(), LeadState::Available);
        assert_eq!(pool.get_state(&held.phone).unwrap(), LeadState::Failed);
    }

    #[test]
    fn test_stats_and_held_by() {
        let pool = pool_of(4);
        let a = agent("a");
        let b = agent("b");
        let c1 = pool.claim_next(&a).unwrap();
        let c2 = pool.claim_next(&b).unwrap();
        pool.update_claimed(&b, &c2, LeadState::Started).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.available, 2);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.started, 1);
        assert_eq!(stats.in_progress(), 2);

        assert_eq!(pool.held_by(&a), vec![c1]);
        assert_eq!(pool.held_by(&b), vec![c2]);
    }

    #[test]
    fn test_concurrent_claims_are_exclusive() {
        let pool = Arc::new(pool_of(500));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    let me = AgentId(format!("agent-{}", i));
                    let mut mine = Vec::new();
                    while let Some(claim) = pool.claim_next(&me) {
                        mine.push(claim.phone);
                    }
                    mine
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for phone in handle.join().unwrap() {
                assert!(seen.insert(phone.clone()), "lead {} claimed twice", phone);
                total += 1;
            }
        }
        assert_eq!(total, 500);
        assert_eq!(pool.available_count(), 0);
    }
}
