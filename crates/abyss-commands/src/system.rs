//! Handlers for the `sys` commands.
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use abyss_core::{ActionResult, EvalConfig, ExecutionContext};
use abyss_report::ReportRenderer;
use abyss_script::{ScriptEvaluator, INTERNAL_ERROR};
use abyss_template::TemplateEvaluator;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::{CommandError, SystemCommand, DEFAULT_THROWEX_MESSAGE};

pub struct SystemCommands {
    scripts: ScriptEvaluator,
    templates: TemplateEvaluator,
    renderer: ReportRenderer,
}

impl SystemCommands {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            scripts: ScriptEvaluator::new(config.clone()),
            templates: TemplateEvaluator::new(),
            renderer: ReportRenderer::new(config),
        }
    }

    pub fn config(&self) -> &EvalConfig {
        self.scripts.config()
    }

    /// Run `command` with its remainder argument. Errors and panics never
    /// escape: they become a "Generic error" reply.
    pub async fn run(&self, command: &str, args: &str, ctx: Arc<ExecutionContext>) -> ActionResult {
        let trace_id = ctx.trace_id.clone();
        let dispatched = AssertUnwindSafe(self.dispatch(command, args, ctx))
            .catch_unwind()
            .await;
        match dispatched {
            Ok(Ok(result)) => {
                info!(%trace_id, command, ok = result.is_ok(), "command finished");
                result
            }
            Ok(Err(err)) => {
                error!(%trace_id, command, error = %format!("{:#}", err), "command failed");
                ActionResult::BadRequest(format!("Generic error: {:#}", err))
            }
            Err(panic) => {
                let message = panic_message(&panic);
                error!(%trace_id, command, panic = %message, "command panicked");
                ActionResult::BadRequest(format!("Generic error: {}: {}", INTERNAL_ERROR, message))
            }
        }
    }

    async fn dispatch(
        &self,
        command: &str,
        args: &str,
        ctx: Arc<ExecutionContext>,
    ) -> anyhow::Result<ActionResult> {
        let result = match command.parse::<SystemCommand>()? {
            SystemCommand::Eval => self.eval(args, ctx).await?,
            SystemCommand::Inspect => self.inspect(args, ctx).await?,
            SystemCommand::Hb => self.hb(args, ctx).await?,
            SystemCommand::Throwex => self.throwex(args)?,
        };
        Ok(result)
    }

    /// Compile, execute, classify and render a script
    pub async fn eval(
        &self,
        source: &str,
        ctx: Arc<ExecutionContext>,
    ) -> Result<ActionResult, CommandError> {
        let outcome = self.scripts.evaluate(source, Arc::clone(&ctx)).await?;
        Ok(self.renderer.render(&outcome, source, &ctx))
    }

    /// `eval` of `inspect(<snippet>)`
    pub async fn inspect(
        &self,
        source: &str,
        ctx: Arc<ExecutionContext>,
    ) -> Result<ActionResult, CommandError> {
        let wrapped = format!("inspect({})", source);
        self.eval(&wrapped, ctx).await
    }

    /// Render a Handlebars template off the async workers, under the
    /// script time limit; template failures are user errors
    pub async fn hb(
        &self,
        source: &str,
        ctx: Arc<ExecutionContext>,
    ) -> Result<ActionResult, CommandError> {
        let trace_id = ctx.trace_id.clone();
        let templates = self.templates;
        let source = source.to_string();
        let task = tokio::task::spawn_blocking(move || templates.evaluate(&source, ctx));

        let timeout = self.config().exec_timeout();
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(rendered))) => Ok(self.renderer.render_text(&rendered.text)),
            Ok(Ok(Err(err))) => Ok(ActionResult::BadRequest(err.to_string())),
            Ok(Err(join_error)) => {
                error!(%trace_id, error = %join_error, "template task died");
                Err(CommandError::Internal(format!(
                    "Template rendering aborted: {}",
                    join_error
                )))
            }
            Err(_) => {
                warn!(%trace_id, timeout_ms = timeout.as_millis() as u64, "template timed out");
                Ok(ActionResult::BadRequest(format!(
                    "Template failed: rendering exceeded the time limit of {} ms.",
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Always fails, so the outer boundary can be exercised
    pub fn throwex(&self, message: &str) -> Result<ActionResult, CommandError> {
        let message = message.trim();
        let message = if message.is_empty() {
            DEFAULT_THROWEX_MESSAGE
        } else {
            message
        };
        Err(CommandError::InvalidOperation(message.to_string()))
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}
