//! Lead pool module for the dialer
//!
//! A lead is a call target identified by its phone number. The pool owns every
//! lead's state; agent sessions only ever hold [`Claim`]s and ask the pool to
//! change state on their behalf.
//!
//! # Lead Lifecycle
//!
//! 1. **Registration**: leads enter the pool as [`LeadState::Available`]
//! 2. **Claim**: [`LeadPool::claim_next`] atomically moves the first available
//!    lead to [`LeadState::Queued`] and records the claiming agent
//! 3. **Dial outcome**: `Started` when the dial connects, `Failed` otherwise
//! 4. **Resolution**: the winning call becomes `Ended`, calls that connected
//!    but lost the race become `Abandoned`
//!
//! Nothing is requeued automatically. `Failed` leads stay failed until an
//! operator calls [`LeadPool::reseed`] or [`LeadPool::requeue_failed`].

pub mod types;
pub mod pool;

pub use types::{Claim, ClaimTicket, Lead, LeadState, PhoneNumber, PoolStats};
pub use pool::LeadPool;
