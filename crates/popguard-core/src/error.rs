use thiserror::Error;

use crate::ids::RequestId;
use crate::types::{DecisionKind, NavigationFailure};

#[derive(Debug, Error)]
pub enum PopGuardError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures inside the decision path.
///
/// None of these reach the engine: `Abandoned` collapses into the fail-safe
/// verdict of the pending operation, and `PolicyMisuse` is reported back to
/// whoever tried to publish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecisionError {
    #[error("{kind} request abandoned before a response arrived")]
    Abandoned { kind: DecisionKind },
    #[error("no outstanding {kind} request with id {request_id}")]
    PolicyMisuse {
        kind: DecisionKind,
        request_id: RequestId,
    },
    /// Reported by the engine, passed through for logging only.
    #[error("navigation failed: {0}")]
    NavigationFailed(NavigationFailure),
}
