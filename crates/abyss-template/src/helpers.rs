//! Handlebars helpers registered before every render.
//!
//! - create_message: send a reply through the execution context
//! - join: join an array with a separator
//! - truncate: cut a string to a number of characters

use std::sync::Arc;

use abyss_core::ExecutionContext;
use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext};
use serde_json::Value;

/// Display text of a helper parameter: strings bare, everything else as JSON
fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Sends its space-joined arguments as a reply. Writes nothing into the
/// template output.
pub struct CreateMessageHelper {
    ctx: Arc<ExecutionContext>,
}

impl CreateMessageHelper {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}

impl HelperDef for CreateMessageHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        _out: &mut dyn Output,
    ) -> HelperResult {
        let text = h
            .params()
            .iter()
            .map(|p| param_text(p.value()))
            .collect::<Vec<_>>()
            .join(" ");
        self.ctx.emit_reply(text);
        Ok(())
    }
}

/// Join an array with a separator (default ", ")
pub struct JoinHelper;

impl HelperDef for JoinHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let separator = h
            .param(1)
            .and_then(|v| v.value().as_str())
            .unwrap_or(", ");

        if let Some(items) = h.param(0).and_then(|v| v.value().as_array()) {
            let parts: Vec<String> = items.iter().map(param_text).collect();
            out.write(&parts.join(separator))?;
        }
        Ok(())
    }
}

/// Truncate to a character count (default 100), appending "..."
pub struct TruncateHelper;

impl HelperDef for TruncateHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = h.param(0).map(|v| param_text(v.value())).unwrap_or_default();
        let max_chars = h
            .param(1)
            .and_then(|v| v.value().as_u64())
            .unwrap_or(100) as usize;

        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => {
                out.write(&text[..cut])?;
                out.write("...")?;
            }
            None => out.write(&text)?,
        }
        Ok(())
    }
}
