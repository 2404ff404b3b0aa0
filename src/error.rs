//! Error types for topic model construction, training and inference.
//!
//! Errors carry enough context to act on: the offending parameter and its
//! constraint for configuration problems, the operation and reason for
//! lifecycle misuse, and the round index (plus document id and token
//! position when available) for failures inside a training round.

use std::fmt;

/// Result type for all fallible `temario` operations.
pub type Result<T> = std::result::Result<T, TemarioError>;

/// Errors produced by the topic model.
#[derive(Debug, Clone)]
pub enum TemarioError {
    /// A hyperparameter violates its constraint.
    InvalidParam {
        /// Parameter name
        param: &'static str,
        /// Value provided
        value: f64,
        /// Constraint violated
        constraint: &'static str,
    },

    /// A term-weighting scheme name could not be parsed.
    UnknownTermWeight {
        /// The unrecognized name
        name: String,
    },

    /// An operation was called in the wrong model lifecycle phase.
    InvalidState {
        /// Operation that was attempted
        operation: &'static str,
        /// Why it is not allowed right now
        reason: String,
    },

    /// A held-out document was built for a different weighting mode
    /// than the model it was handed to.
    DocumentMismatch {
        /// Weighting mode of the model
        expected: &'static str,
        /// Weighting mode of the document
        got: &'static str,
    },

    /// Non-finite value detected in counts or likelihoods.
    NumericalInstability {
        /// Training round in which the value was detected
        round: usize,
        /// Offending document id, when known
        doc: Option<usize>,
        /// Offending token position, when known
        position: Option<usize>,
        /// Detailed description of what was detected
        details: String,
    },

    /// A count went negative where the unweighted scheme guarantees
    /// non-negativity.
    NegativeCount {
        /// Training round in which the count was observed
        round: usize,
        /// Topic index of the count
        topic: usize,
        /// Vocabulary id of the count, if it came from the topic-word matrix
        word: Option<usize>,
    },

    /// A worker task failed or panicked during a round.
    WorkerFailure {
        /// Training round in which the worker failed
        round: usize,
        /// Error message
        message: String,
    },
}

impl fmt::Display for TemarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParam {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{param}' = {value}. Constraint: {constraint}"
                )
            }

            Self::UnknownTermWeight { name } => {
                write!(
                    f,
                    "Unknown term weighting scheme '{name}'. Expected one of: one, idf, pmi"
                )
            }

            Self::InvalidState { operation, reason } => {
                write!(f, "Cannot {operation}: {reason}")
            }

            Self::DocumentMismatch { expected, got } => {
                write!(
                    f,
                    "Document was built for '{got}' weighting but the model uses '{expected}'"
                )
            }

            Self::NumericalInstability {
                round,
                doc,
                position,
                details,
            } => {
                write!(f, "Numerical instability in round {round}")?;
                if let Some(d) = doc {
                    write!(f, ", document {d}")?;
                }
                if let Some(p) = position {
                    write!(f, ", token position {p}")?;
                }
                write!(f, ": {details}")
            }

            Self::NegativeCount { round, topic, word } => match word {
                Some(w) => write!(
                    f,
                    "Negative count in round {round} for topic {topic}, word {w}"
                ),
                None => write!(f, "Negative count in round {round} for topic {topic}"),
            },

            Self::WorkerFailure { round, message } => {
                write!(f, "Worker failed in round {round}: {message}")
            }
        }
    }
}

impl std::error::Error for TemarioError {}
