use thiserror::Error;

/// Error types for dialer operations
///
/// Pool exhaustion is deliberately absent: running out of `Available` leads is
/// a normal signal (`claim_next` returns `None`) that stops a backfill, not a
/// failure.
///
/// # Examples
///
/// ```
/// use rvoip_dialer_engine::{DialerError, Result};
///
/// fn lookup(known: bool) -> Result<()> {
///     if known {
///         Ok(())
///     } else {
///         Err(DialerError::not_found("lead 555-0100"))
///     }
/// }
///
/// match lookup(false) {
///     Err(DialerError::NotFound(msg)) => println!("missing: {}", msg),
///     other => println!("{:?}", other),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DialerError {
    /// A lead or agent session referenced by an operation does not exist
    ///
    /// # Examples
    /// - `get_state` on a phone number that was never registered
    /// - a handler invoked with a number outside the session's in-flight set
    /// - a command sent to an agent that is not logged in
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempt to register something that is already registered
    ///
    /// # Examples
    /// - duplicate phone number added to the pool
    /// - agent logged in twice
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A lead is claimed by two sessions, or a session wrote a lead it does not hold
    ///
    /// Must never occur in a correct program. Drivers treat it as fatal in
    /// debug builds.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A lead transition that the pool refuses (e.g. reseeding a claimed lead)
    #[error("Invalid lead transition: {0}")]
    InvalidTransition(String),

    /// An agent session handler was invoked in the wrong agent state
    #[error("Invalid agent state: {0}")]
    InvalidAgentState(String),

    /// Configuration validation and parsing errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The dial transport failed to place a call
    ///
    /// Drivers log these and treat the dial as `NotConnected`.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unexpected internal errors (worker panics, stalled dispatch loops)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DialerError {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists<S: Into<String>>(msg: S) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_transition<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn invalid_agent_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidAgentState(msg.into())
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means the pool/session invariants are broken
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

/// Result type for dialer operations
pub type Result<T> = std::result::Result<T, DialerError>;
