//! Report Renderer: staged outcome → sendable reply.
use abyss_core::{
    ActionResult, Diagnostic, EvalConfig, ExecutionContext, StagedOutcome, NOT_MEASURED,
};
use abyss_script::Value;
use tracing::{debug, warn};

use crate::classify::{classify, ClassifiedResult};
use crate::report::{char_len, shorten_plain, Report, ReportLimits};

pub const NO_RESULTS: &str = "No results returned.";

pub struct ReportRenderer {
    config: EvalConfig,
}

impl ReportRenderer {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn limits(&self) -> ReportLimits {
        ReportLimits::from(&self.config)
    }

    /// Render an evaluation. A response built by the script is passed
    /// through untouched; everything else becomes one report message.
    pub fn render(
        &self,
        outcome: &StagedOutcome<Value>,
        source: &str,
        ctx: &ExecutionContext,
    ) -> ActionResult {
        let classified = match outcome {
            StagedOutcome::Success { value, .. } => classify(value.as_ref(), self.config.message_max_chars),
            _ => ClassifiedResult::None,
        };
        if let ClassifiedResult::PreformattedResponse { response } = &classified {
            debug!(trace_id = %ctx.trace_id, "script returned its own response");
            return response.clone();
        }

        let report = self.report(outcome, &classified, source, ctx);
        let delivery = report.into_delivery(&self.limits());
        if delivery.hard_cut {
            warn!(
                trace_id = %ctx.trace_id,
                limit = self.config.message_max_chars,
                "report does not fit; sent hard-cut"
            );
        }
        ActionResult::Ok(delivery.message)
    }

    /// Build the report document for an outcome
    pub fn report(
        &self,
        outcome: &StagedOutcome<Value>,
        classified: &ClassifiedResult,
        source: &str,
        ctx: &ExecutionContext,
    ) -> Report {
        let mut report = Report {
            title: self.config.title.clone(),
            description: String::new(),
            input: self.fence(source),
            output: None,
            diagnostics: None,
            exception: None,
            footer: footer(outcome),
            footer_icon: ctx.branding_avatar(),
            color: ctx.branding_accent(),
            timestamp: ctx.invoked_at,
            use_rich_format: true,
        };

        if let Some(stage) = outcome.failed_stage() {
            report.description = format!("Scripting failed during stage **{}**", stage);
        }

        match outcome {
            StagedOutcome::CompileFailure { diagnostics, .. } => {
                report.diagnostics = Some(diagnostics_block(diagnostics, source));
            }
            StagedOutcome::RuntimeFailure { exception, .. } => {
                report.exception = Some(format!(
                    "``{}``: ``{}``",
                    exception.type_name, exception.message
                ));
            }
            StagedOutcome::Success { value, .. } => {
                if let Some(value) = value.as_ref().filter(|v| !v.is_null()) {
                    report.description = format!("Type: `{}`", value.type_name());
                }
                let (output, embed_safe) = self.output_block(classified);
                report.output = Some(output);
                report.use_rich_format = embed_safe;
            }
        }
        report
    }

    /// Template output is sent as-is, bounded to one message
    pub fn render_text(&self, text: &str) -> ActionResult {
        if text.is_empty() {
            return ActionResult::Empty;
        }
        let limit = self.config.message_max_chars;
        if char_len(text) > limit {
            warn!(limit, "template output does not fit; sent hard-cut");
            return ActionResult::ok_text(shorten_plain(text, limit));
        }
        ActionResult::ok_text(text)
    }

    fn output_block(&self, classified: &ClassifiedResult) -> (String, bool) {
        match classified {
            ClassifiedResult::Scalar { text } if is_fenced(text) => (text.clone(), false),
            ClassifiedResult::Scalar { text } => (self.fence(text), true),
            other => match other.display_text() {
                Some(text) => (text, false),
                None => (NO_RESULTS.to_string(), true),
            },
        }
    }

    fn fence(&self, text: &str) -> String {
        format!("```{}\n{}```", self.config.code_language, text)
    }
}

fn is_fenced(text: &str) -> bool {
    text.starts_with("```") && text.ends_with("```")
}

/// `Compilation time: Nms | Execution time: Mms`, skipping unmeasured stages
fn footer(outcome: &StagedOutcome<Value>) -> Option<String> {
    let mut segments = Vec::new();
    if outcome.compile_time_ms() != NOT_MEASURED {
        segments.push(format!("Compilation time: {}ms", outcome.compile_time_ms()));
    }
    if outcome.exec_time_ms() != NOT_MEASURED {
        segments.push(format!("Execution time: {}ms", outcome.exec_time_ms()));
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join(" | "))
    }
}

fn diagnostics_block(diagnostics: &[Diagnostic], source: &str) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        if let Some(excerpt) = diagnostic.span.excerpt(source) {
            out.push_str(&format!("`{}`\n", excerpt));
        }
        out.push_str(&format!(
            " - ``{}`` ({}): **{}**\n\n",
            diagnostic.id, diagnostic.span, diagnostic.message
        ));
    }
    out
}
