//! Abyss Core: Execution Context, Staged Outcomes, and Configuration
//!
//! Shared model for the evaluation pipeline. Both evaluators consume the
//! same [`ExecutionContext`] and produce data described here; the renderer
//! turns those into [`RichDocument`]s or plain text.
//!
//! ```text
//! snippet → evaluator → StagedOutcome → classifier → renderer → OutboundMessage
//!                ↑                                        ↑
//!         ExecutionContext ───────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod memory;
pub mod message;
pub mod outcome;
pub mod stage;

pub use config::{ConfigError, EvalConfig};
pub use context::{
    BrandingProvider, Capabilities, Color, ContextSnapshot, DeliveryError, ExecutionContext,
    Identity, IdentityProvider, ReplyChannel,
};
pub use error::AbyssError;
pub use memory::MemoryCollaborator;
pub use message::{ActionResult, EmbedField, EmbedFooter, OutboundMessage, RichDocument};
pub use outcome::{Diagnostic, ExceptionInfo, Severity, SourceSpan, StagedOutcome, NOT_MEASURED};
pub use stage::{digest, EvalStage, EvalState, Stopwatch};

/// Engine version reported by the API health endpoint
pub const ABYSS_VERSION: &str = "1.0.0";
