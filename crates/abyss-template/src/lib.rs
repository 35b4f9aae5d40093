//! Abyss template: Handlebars evaluation against the execution context.
//!
//! The template text is compiled first; a syntax error fails the whole
//! command with "Template failed: …" and no staged diagnostics. Before each
//! render a fresh registry gets the `create_message` reply helper bound to
//! the invocation's context, so a template can send messages while it
//! renders.
//!
//! # Example
//!
//! ```ignore
//! use abyss_template::TemplateEvaluator;
//!
//! let rendered = TemplateEvaluator::new().evaluate(
//!     r#"{{create_message "hi" invoker.name}}Rendered for {{invoker.name}}"#,
//!     ctx,
//! )?;
//! assert_eq!(rendered.text, "Rendered for ada");
//! ```

pub mod helpers;

use std::sync::Arc;

use abyss_core::{digest, AbyssError, EvalState, ExecutionContext, Stopwatch};
use handlebars::template::TemplateElement;
use handlebars::{no_escape, Handlebars, Template};
use thiserror::Error;
use tracing::{debug, info};

use helpers::{CreateMessageHelper, JoinHelper, TruncateHelper};

/// Name the compiled snippet is registered under
const SNIPPET: &str = "snippet";

/// Errors surfaced to the user by the `hb` command
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template failed: {0}")]
    Syntax(String),
    #[error("Template failed: {0}")]
    Render(String),
    #[error("Generic error: {0}")]
    Internal(#[from] AbyssError),
}

/// Output of a successful render. The text is always a plain scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub text: String,
    pub compile_time_ms: u64,
    pub render_time_ms: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateEvaluator;

impl TemplateEvaluator {
    pub fn new() -> Self {
        TemplateEvaluator
    }

    /// Compile template text into a template function. Partials are
    /// refused: a snippet could include itself and never finish.
    pub fn compile(&self, source: &str) -> Result<Template, TemplateError> {
        let template = Template::compile(source).map_err(|e| TemplateError::Syntax(e.to_string()))?;
        if uses_partials(&template) {
            return Err(TemplateError::Syntax("partials are not supported".to_string()));
        }
        Ok(template)
    }

    /// Registry for one render, with helpers bound to `ctx`
    pub fn registry(&self, ctx: Arc<ExecutionContext>) -> Handlebars<'static> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(no_escape);

        handlebars.register_helper("create_message", Box::new(CreateMessageHelper::new(ctx)));
        handlebars.register_helper("join", Box::new(JoinHelper));
        handlebars.register_helper("truncate", Box::new(TruncateHelper));
        handlebars
    }

    /// Compile and render `source` with the context snapshot as root data
    pub fn evaluate(
        &self,
        source: &str,
        ctx: Arc<ExecutionContext>,
    ) -> Result<RenderedTemplate, TemplateError> {
        let trace_id = ctx.trace_id.clone();
        let mut state = EvalState::Pending;
        state.advance(EvalState::Compiling)?;

        let clock = Stopwatch::start();
        let template = match self.compile(source) {
            Ok(template) => template,
            Err(e) => {
                state.advance(EvalState::CompileFailed)?;
                info!(%trace_id, snippet = %digest(source), "template failed to compile");
                return Err(e);
            }
        };
        let compile_time_ms = clock.elapsed_ms();

        let clock = Stopwatch::start();
        let data = ctx.snapshot();
        let mut handlebars = self.registry(ctx);
        handlebars.register_template(SNIPPET, template);
        let text = handlebars
            .render(SNIPPET, &data)
            .map_err(|e| TemplateError::Render(e.to_string()))?;
        let render_time_ms = clock.elapsed_ms();

        state.advance(EvalState::Rendered)?;
        debug!(%trace_id, chars = text.chars().count(), "template rendered");
        Ok(RenderedTemplate {
            text,
            compile_time_ms,
            render_time_ms,
        })
    }
}

fn uses_partials(template: &Template) -> bool {
    let nested = |inner: Option<&Template>| inner.is_some_and(uses_partials);
    template.elements.iter().any(|element| match element {
        TemplateElement::PartialExpression(_) | TemplateElement::PartialBlock(_) => true,
        TemplateElement::HtmlExpression(helper)
        | TemplateElement::Expression(helper)
        | TemplateElement::HelperBlock(helper) => {
            nested(helper.template.as_ref()) || nested(helper.inverse.as_ref())
        }
        TemplateElement::DecoratorExpression(decorator) | TemplateElement::DecoratorBlock(decorator) => {
            nested(decorator.template.as_ref())
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use abyss_core::{Identity, MemoryCollaborator};

    fn setup() -> (Arc<MemoryCollaborator>, Arc<ExecutionContext>) {
        let collaborator = Arc::new(MemoryCollaborator::new(Identity::new(1, "abyss")));
        let ctx = Arc::new(collaborator.context_for(Identity::new(7, "ada")));
        (collaborator, ctx)
    }

    #[test]
    fn test_root_is_context() {
        let (_, ctx) = setup();
        let out = TemplateEvaluator::new()
            .evaluate("Hello, {{invoker.name}} from {{bot.name}}!", ctx)
            .unwrap();
        assert_eq!(out.text, "Hello, ada from abyss!");
    }

    #[test]
    fn test_reply_helper_writes_nothing() {
        let (collaborator, ctx) = setup();
        let out = TemplateEvaluator::new()
            .evaluate(r#"[{{create_message "x" 1}}]"#, ctx)
            .unwrap();
        assert_eq!(out.text, "[]");
        assert_eq!(collaborator.sent_texts(), vec!["x 1"]);
    }

    #[test]
    fn test_syntax_error() {
        let (collaborator, ctx) = setup();
        let err = TemplateEvaluator::new()
            .evaluate("Hello {{invoker.name", ctx)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Syntax(_)));
        assert!(err.to_string().starts_with("Template failed: "));
        assert!(collaborator.sent().is_empty());
    }

    #[test]
    fn test_partials_are_refused() {
        let (collaborator, ctx) = setup();
        let evaluator = TemplateEvaluator::new();
        for source in [
            "{{> snippet}}",
            r#"{{#*inline "x"}}{{> x}}{{/inline}}{{> x}}"#,
            "{{#if invoker}}{{#> layout}}body{{/layout}}{{/if}}",
        ] {
            let err = evaluator.evaluate(source, Arc::clone(&ctx)).unwrap_err();
            assert_eq!(err.to_string(), "Template failed: partials are not supported");
        }
        assert!(collaborator.sent().is_empty());
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let (_, ctx) = setup();
        let out = TemplateEvaluator::new()
            .evaluate("<{{nothing.here}}>", ctx)
            .unwrap();
        assert_eq!(out.text, "<>");
    }

    #[test]
    fn test_output_is_not_html_escaped() {
        let (_, ctx) = setup();
        let out = TemplateEvaluator::new()
            .evaluate(r#"{{truncate "<b>&</b>" 3}}"#, ctx)
            .unwrap();
        assert_eq!(out.text, "<b>...");
    }
}
