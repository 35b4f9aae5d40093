//! Staged Outcome: what one evaluator run produced
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stage::EvalStage;

/// Sentinel reported for a stage that did not run or was not measured
pub const NOT_MEASURED: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Character offsets into the snippet, or no location at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpan {
    InSource { start: usize, end: usize },
    Metadata,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        SourceSpan::InSource {
            start,
            end: end.max(start),
        }
    }

    /// Key used to order diagnostics; metadata sorts first
    pub fn start(&self) -> usize {
        match self {
            SourceSpan::InSource { start, .. } => *start,
            SourceSpan::Metadata => 0,
        }
    }

    /// The offending text, when there is any
    pub fn excerpt<'a>(&self, source: &'a str) -> Option<&'a str> {
        let SourceSpan::InSource { start, end } = *self else {
            return None;
        };
        if start == end {
            return None;
        }
        let begin = source.char_indices().nth(start).map(|(i, _)| i)?;
        let finish = source
            .char_indices()
            .nth(end)
            .map(|(i, _)| i)
            .unwrap_or(source.len());
        Some(&source[begin..finish])
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpan::Metadata => write!(f, "Metadata"),
            SourceSpan::InSource { start, end } if start == end => write!(f, "Ch {}", start),
            SourceSpan::InSource { start, end } => write!(f, "Ch {}-{}", start, end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    pub span: SourceSpan,
}

impl Diagnostic {
    pub fn error(id: &str, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            id: id.to_string(),
            severity: Severity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(id: &str, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            id: id.to_string(),
            severity: Severity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Stable sort by span start, keeping discovery order for ties
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| d.span.start());
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub type_name: String,
    pub message: String,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

/// Result of one evaluation. `V` is the evaluator's value type.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedOutcome<V> {
    CompileFailure {
        diagnostics: Vec<Diagnostic>,
        compile_time_ms: Option<u64>,
    },
    RuntimeFailure {
        exception: ExceptionInfo,
        compile_time_ms: Option<u64>,
    },
    Success {
        value: Option<V>,
        compile_time_ms: Option<u64>,
        exec_time_ms: Option<u64>,
    },
}

impl<V> StagedOutcome<V> {
    pub fn compile_failure(mut diagnostics: Vec<Diagnostic>, compile_time_ms: Option<u64>) -> Self {
        sort_diagnostics(&mut diagnostics);
        StagedOutcome::CompileFailure {
            diagnostics,
            compile_time_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StagedOutcome::Success { .. })
    }

    /// Stage at which the evaluation stopped, if it failed
    pub fn failed_stage(&self) -> Option<EvalStage> {
        match self {
            StagedOutcome::CompileFailure { .. } => Some(EvalStage::Compilation),
            StagedOutcome::RuntimeFailure { .. } => Some(EvalStage::Execution),
            StagedOutcome::Success { .. } => None,
        }
    }

    pub fn compile_time_ms(&self) -> i64 {
        let t = match self {
            StagedOutcome::CompileFailure { compile_time_ms, .. }
            | StagedOutcome::RuntimeFailure { compile_time_ms, .. }
            | StagedOutcome::Success { compile_time_ms, .. } => *compile_time_ms,
        };
        t.map(|ms| ms as i64).unwrap_or(NOT_MEASURED)
    }

    pub fn exec_time_ms(&self) -> i64 {
        match self {
            StagedOutcome::Success {
                exec_time_ms: Some(ms),
                ..
            } => *ms as i64,
            _ => NOT_MEASURED,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            StagedOutcome::CompileFailure { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    pub fn exception(&self) -> Option<&ExceptionInfo> {
        match self {
            StagedOutcome::RuntimeFailure { exception, .. } => Some(exception),
            _ => None,
        }
    }

    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            StagedOutcome::CompileFailure { .. } => "compile_failure",
            StagedOutcome::RuntimeFailure { .. } => "runtime_failure",
            StagedOutcome::Success { .. } => "success",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_display() {
        assert_eq!(SourceSpan::Metadata.to_string(), "Metadata");
        assert_eq!(SourceSpan::new(4, 4).to_string(), "Ch 4");
        assert_eq!(SourceSpan::new(2, 9).to_string(), "Ch 2-9");
    }

    #[test]
    fn test_excerpt_counts_characters() {
        let src = "é = foo;";
        assert_eq!(SourceSpan::new(4, 7).excerpt(src), Some("foo"));
        assert_eq!(SourceSpan::new(3, 3).excerpt(src), None);
        assert_eq!(SourceSpan::Metadata.excerpt(src), None);
    }

    #[test]
    fn test_compile_failure_sorts_stably() {
        let outcome: StagedOutcome<()> = StagedOutcome::compile_failure(
            vec![
                Diagnostic::error("SC0103", "late", SourceSpan::new(9, 12)),
                Diagnostic::warning("SC0168", "first", SourceSpan::new(1, 2)),
                Diagnostic::error("SC0128", "tie", SourceSpan::new(9, 10)),
                Diagnostic::warning("SC0000", "meta", SourceSpan::Metadata),
            ],
            Some(3),
        );
        let ids: Vec<_> = outcome.diagnostics().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["SC0000", "SC0168", "SC0103", "SC0128"]);
        assert_eq!(outcome.exec_time_ms(), NOT_MEASURED);
        assert_eq!(outcome.compile_time_ms(), 3);
    }

    #[test]
    fn test_runtime_failure_timings() {
        let outcome: StagedOutcome<()> = StagedOutcome::RuntimeFailure {
            exception: ExceptionInfo::new("ScriptError", "boom"),
            compile_time_ms: Some(0),
        };
        assert_eq!(outcome.failed_stage(), Some(EvalStage::Execution));
        assert_eq!(outcome.exec_time_ms(), -1);
        assert!(outcome.compile_time_ms() >= 0);
    }
}
