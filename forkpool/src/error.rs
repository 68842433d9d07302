//! Errors reported while configuring and starting a pool.
//!
//! Once a pool is running there is nothing left to fail recoverably:
//! contention and empty deques are ordinary outcomes, and contract
//! violations abort (see the crate documentation).

use std::io;

/// Error returned by [`PoolBuilder::build`](crate::PoolBuilder::build)
/// and [`PoolBuilder::from_env`](crate::PoolBuilder::from_env).
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A configuration field holds a value the pool cannot use.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// An environment variable could not be parsed.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// The variable name.
        var: &'static str,
        /// What the variable should contain.
        expected: &'static str,
        /// The raw value found.
        value: String,
    },

    /// The operating system refused to start a worker thread.
    #[error("failed to spawn a worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Error returned when parsing an [`IdlePolicy`](crate::IdlePolicy)
/// from a string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown idle policy {0:?}, expected `spin` or `park`")]
pub struct ParseIdlePolicyError(pub(crate) String);
