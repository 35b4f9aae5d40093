//! Stage bookkeeping: names, the per-evaluation state machine, and timing.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::error::AbyssError;

/// A stage that can fail, named the way reports print it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalStage {
    Compilation,
    Execution,
}

impl fmt::Display for EvalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalStage::Compilation => write!(f, "Compilation"),
            EvalStage::Execution => write!(f, "Execution"),
        }
    }
}

/// Lifecycle of one evaluation.
///
/// ```text
/// Pending → Compiling → CompileFailed
///                     → Executing → RuntimeFailed | Succeeded
///                     → Rendered            (templates only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalState {
    Pending,
    Compiling,
    CompileFailed,
    Executing,
    RuntimeFailed,
    Succeeded,
    Rendered,
}

impl EvalState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EvalState::CompileFailed
                | EvalState::RuntimeFailed
                | EvalState::Succeeded
                | EvalState::Rendered
        )
    }

    fn allows(&self, next: EvalState) -> bool {
        use EvalState::*;
        matches!(
            (self, next),
            (Pending, Compiling)
                | (Compiling, CompileFailed)
                | (Compiling, Executing)
                | (Compiling, Rendered)
                | (Executing, RuntimeFailed)
                | (Executing, Succeeded)
        )
    }

    /// Move to `next`, rejecting transitions the lifecycle does not have
    pub fn advance(&mut self, next: EvalState) -> Result<(), AbyssError> {
        if !self.allows(next) {
            return Err(AbyssError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        tracing::debug!(from = ?self, to = ?next, "evaluation state");
        *self = next;
        Ok(())
    }
}

/// Millisecond stopwatch for a single stage
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Digest used to identify a snippet in logs without logging its text
pub fn digest(source: &str) -> String {
    format!("blake3:{}", blake3::hash(source.as_bytes()))
}
