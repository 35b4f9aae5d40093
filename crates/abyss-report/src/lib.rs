//! Abyss report: classify an evaluation's value and render the reply.
//!
//! ```text
//! StagedOutcome ──classify──▶ ClassifiedResult ──▶ Report ──▶ rich | plain
//! ```
//!
//! Rendering is a pure function of the outcome, the snippet and the
//! execution context, so rendering the same outcome twice yields the same
//! message.
pub mod classify;
pub mod renderer;
pub mod report;

pub use classify::{classify, ClassifiedResult};
pub use renderer::{ReportRenderer, NO_RESULTS};
pub use report::{Delivery, Report, ReportLimits};
