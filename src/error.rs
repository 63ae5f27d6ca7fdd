//! Error types for the differential value iteration crate.

use rand::distributions::WeightedError;
use thiserror::Error;

/// Main error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid model: {0}")]
    InvalidModel(#[from] ModelError),

    #[error("value iteration diverged at sweep {sweep} (residual {residual})")]
    Divergence { sweep: usize, residual: f64 },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot sample successor: {0}")]
    Sampling(#[from] WeightedError),
}

/// Reasons a model is rejected at construction.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ModelError {
    #[error("model has no states")]
    Empty,

    #[error("state {state} has no actions")]
    NoActions { state: usize },

    #[error("state {state} is out of range (n_s = {n_s})")]
    StateOutOfRange { state: usize, n_s: usize },

    #[error("state {state}, action {action}: successor {next_state} is out of range (n_s = {n_s})")]
    SuccessorOutOfRange {
        state: usize,
        action: usize,
        next_state: usize,
        n_s: usize,
    },

    #[error("state {state}, action {action}: probability {probability} of successor {next_state} is negative or not finite")]
    InvalidProbability {
        state: usize,
        action: usize,
        next_state: usize,
        probability: f64,
    },

    #[error("state {state}, action {action}: transition probabilities sum to {sum}, not 1")]
    ProbabilitySum { state: usize, action: usize, sum: f64 },

    #[error("state {state}, action {action}: reward {reward} is not finite")]
    NonFiniteReward {
        state: usize,
        action: usize,
        reward: f64,
    },

    #[error("dense {what} has shape {got:?}, expected {expected:?}")]
    DenseShape {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("state {state} is missing action {action} (actions must be numbered without gaps)")]
    MissingAction { state: usize, action: usize },
}

/// Convenience type alias for Results using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn is_invalid_model(&self) -> bool {
        matches!(self, Error::InvalidModel(_))
    }

    pub fn is_divergence(&self) -> bool {
        matches!(self, Error::Divergence { .. })
    }
}
