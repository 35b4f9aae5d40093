//! Unified Error Model
use thiserror::Error;

use crate::context::DeliveryError;
use crate::stage::EvalState;

/// Failures that escape an evaluator. Compile and runtime failures of the
/// snippet are not errors here; they travel inside `StagedOutcome`.
#[derive(Error, Debug)]
pub enum AbyssError {
    #[error("DELIVERY/{0}")]
    Delivery(#[from] DeliveryError),

    #[error("STATE/cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: EvalState, to: EvalState },

    #[error("CONFIG/{0}")]
    Config(#[from] crate::config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_converts() {
        let err: AbyssError = DeliveryError::MissingPermission.into();
        assert_eq!(err.to_string(), "DELIVERY/missing permission to send messages");
    }
}
