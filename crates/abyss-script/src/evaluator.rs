//! Compiled-Script Evaluator: compile, then execute under a time limit.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use abyss_core::{
    digest, AbyssError, Diagnostic, EvalConfig, EvalState, ExceptionInfo, ExecutionContext,
    StagedOutcome, Stopwatch,
};
use tracing::{debug, error, info, warn};

use crate::ast::Program;
use crate::checker::check;
use crate::fault::{Fault, FaultResult};
use crate::interpreter::{Interpreter, Limits};
use crate::parser::parse_script;
use crate::value::Value;

/// Exception type reported when the execute task dies without a fault
pub const INTERNAL_ERROR: &str = "InternalError";

/// A snippet that passed the compile stage
#[derive(Debug, Clone)]
pub struct CompiledScript {
    program: Program,
    warnings: Vec<Diagnostic>,
}

impl CompiledScript {
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Warnings from the compile stage; they never block execution
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// The single entry point of a compiled unit: the context plus the
    /// fixed helper library, nothing ambient.
    pub fn run(
        &self,
        ctx: &ExecutionContext,
        limits: &Limits,
        cancel: &AtomicBool,
    ) -> FaultResult<Option<Value>> {
        Interpreter::new(ctx, limits, cancel).run(&self.program)
    }
}

pub struct ScriptEvaluator {
    config: EvalConfig,
}

impl ScriptEvaluator {
    pub fn new(config: EvalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Parse and check. On failure the result carries every diagnostic,
    /// warnings included.
    pub fn compile(&self, source: &str) -> Result<CompiledScript, Vec<Diagnostic>> {
        let program = parse_script(source).map_err(|d| vec![d])?;
        let diagnostics = check(&program);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Err(diagnostics);
        }
        Ok(CompiledScript {
            program,
            warnings: diagnostics,
        })
    }

    /// Evaluate a snippet against `ctx`. Compile and runtime failures come
    /// back inside the outcome; `Err` means the pipeline itself broke.
    pub async fn evaluate(
        &self,
        source: &str,
        ctx: Arc<ExecutionContext>,
    ) -> Result<StagedOutcome<Value>, AbyssError> {
        let trace_id = ctx.trace_id.clone();
        let snippet = digest(source);
        let mut state = EvalState::Pending;

        state.advance(EvalState::Compiling)?;
        let clock = Stopwatch::start();
        let compiled = self.compile(source);
        let compile_ms = clock.elapsed_ms();

        let compiled = match compiled {
            Ok(compiled) => compiled,
            Err(diagnostics) => {
                state.advance(EvalState::CompileFailed)?;
                info!(
                    %trace_id,
                    %snippet,
                    diagnostics = diagnostics.len(),
                    compile_ms,
                    "script failed to compile"
                );
                return Ok(StagedOutcome::compile_failure(diagnostics, Some(compile_ms)));
            }
        };
        if !compiled.warnings().is_empty() {
            debug!(%trace_id, warnings = compiled.warnings().len(), "compiled with warnings");
        }

        state.advance(EvalState::Executing)?;
        let limits = Limits::from_config(&self.config);
        let cancel = Arc::new(AtomicBool::new(false));
        let clock = Stopwatch::start();

        let task = {
            let ctx = Arc::clone(&ctx);
            let cancel = Arc::clone(&cancel);
            tokio::task::spawn_blocking(move || compiled.run(&ctx, &limits, &cancel))
        };

        let result: Result<Option<Value>, ExceptionInfo> =
            match tokio::time::timeout(self.config.exec_timeout(), task).await {
                Ok(Ok(run)) => run.map_err(ExceptionInfo::from),
                Ok(Err(join_error)) => {
                    error!(%trace_id, error = %join_error, "script task died");
                    Err(ExceptionInfo::new(
                        INTERNAL_ERROR,
                        format!("Script execution aborted: {}", join_error),
                    ))
                }
                Err(_) => {
                    cancel.store(true, Ordering::Relaxed);
                    warn!(%trace_id, timeout_ms = self.config.exec_timeout_ms, "script timed out");
                    Err(Fault::timeout(format!(
                        "Script exceeded the time limit of {} ms.",
                        self.config.exec_timeout_ms
                    ))
                    .into())
                }
            };
        let exec_ms = clock.elapsed_ms();

        match result {
            Ok(value) => {
                state.advance(EvalState::Succeeded)?;
                info!(
                    %trace_id,
                    %snippet,
                    compile_ms,
                    exec_ms,
                    value_type = value.as_ref().map(|v| v.type_name()).unwrap_or("none"),
                    "script evaluated"
                );
                Ok(StagedOutcome::Success {
                    value,
                    compile_time_ms: Some(compile_ms),
                    exec_time_ms: Some(exec_ms),
                })
            }
            Err(exception) => {
                state.advance(EvalState::RuntimeFailed)?;
                info!(
                    %trace_id,
                    %snippet,
                    compile_ms,
                    exception = %exception.type_name,
                    "script failed at runtime"
                );
                Ok(StagedOutcome::RuntimeFailure {
                    exception,
                    compile_time_ms: Some(compile_ms),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes;
    use abyss_core::{Identity, MemoryCollaborator, SourceSpan};

    fn context() -> (Arc<MemoryCollaborator>, Arc<ExecutionContext>) {
        let collaborator = Arc::new(MemoryCollaborator::new(Identity::new(1, "abyss")));
        let ctx = Arc::new(collaborator.context_for(Identity::new(7, "ada")));
        (collaborator, ctx)
    }

    #[test]
    fn test_compile_collects_all_errors() {
        let evaluator = ScriptEvaluator::new(EvalConfig::default());
        let diagnostics = evaluator.compile("var a = b; a + c").unwrap_err();
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.id == codes::UNKNOWN_NAME));
    }

    #[test]
    fn test_warnings_do_not_block() {
        let evaluator = ScriptEvaluator::new(EvalConfig::default());
        let compiled = evaluator.compile("var unused = 1; 2").unwrap();
        assert_eq!(compiled.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_success_has_both_timings() {
        let (_, ctx) = context();
        let evaluator = ScriptEvaluator::new(EvalConfig::default());
        let outcome = evaluator.evaluate("1 + 1", ctx).await.unwrap();
        match &outcome {
            StagedOutcome::Success { value, .. } => assert_eq!(value, &Some(Value::Int(2))),
            other => panic!("expected success, got {:?}", other),
        }
        assert!(outcome.compile_time_ms() >= 0);
        assert!(outcome.exec_time_ms() >= 0);
    }

    #[tokio::test]
    async fn test_compile_failure_is_sorted() {
        let (_, ctx) = context();
        let evaluator = ScriptEvaluator::new(EvalConfig::default());
        let outcome = evaluator.evaluate("zz; var q = 1; yy", ctx).await.unwrap();
        let starts: Vec<usize> = outcome.diagnostics().iter().map(|d| d.span.start()).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(outcome.exec_time_ms(), -1);
    }

    #[tokio::test]
    async fn test_missing_expression() {
        let (_, ctx) = context();
        let evaluator = ScriptEvaluator::new(EvalConfig::default());
        let outcome = evaluator.evaluate("int x = ;", ctx).await.unwrap();
        let diagnostics = outcome.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].span, SourceSpan::new(8, 8));
        assert!(diagnostics[0].message.contains("expression"));
    }

    #[tokio::test]
    async fn test_runtime_failure_keeps_compile_time() {
        let (_, ctx) = context();
        let evaluator = ScriptEvaluator::new(EvalConfig::default());
        let outcome = evaluator.evaluate("var z = 0; 10 / z", ctx).await.unwrap();
        assert_eq!(outcome.exception().unwrap().type_name, "DivideByZeroError");
        assert!(outcome.compile_time_ms() >= 0);
        assert_eq!(outcome.exec_time_ms(), -1);
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        let (_, ctx) = context();
        let config = EvalConfig {
            exec_timeout_ms: 50,
            max_steps: u64::MAX,
            ..EvalConfig::default()
        };
        let evaluator = ScriptEvaluator::new(config);
        let outcome = evaluator.evaluate("while (true) { }", ctx).await.unwrap();
        assert_eq!(outcome.exception().unwrap().type_name, "TimeoutError");
    }

    #[tokio::test]
    async fn test_replies_are_sent_during_execution() {
        let (collaborator, ctx) = context();
        let evaluator = ScriptEvaluator::new(EvalConfig::default());
        let outcome = evaluator
            .evaluate(r#"emitReply("first"); emitReply("second");"#, ctx)
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(collaborator.sent_texts(), vec!["first", "second"]);
    }
}
