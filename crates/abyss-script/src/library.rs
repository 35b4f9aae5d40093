//! Names in scope for every snippet: the context members and the helper
//! library.
//!
//! Context members reach the [`ExecutionContext`]; helpers are pure. Both
//! are only callable, never first-class values.
use std::collections::HashMap;

use abyss_core::{ActionResult, ExecutionContext};
use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::fault::{Fault, FaultResult};
use crate::value::{HostObject, Value};

/// Where a builtin comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Member of the execution context
    Context,
    /// Pure helper function
    Helper,
}

/// What a builtin may touch while it runs
pub struct CallEnv<'a> {
    pub ctx: &'a ExecutionContext,
    pub max_collection_len: usize,
}

pub type BuiltinFn = fn(&CallEnv<'_>, Vec<Value>) -> FaultResult<Value>;

pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` means variadic
    pub max_args: Option<usize>,
    pub origin: Origin,
    pub summary: &'static str,
    pub func: BuiltinFn,
}

impl Builtin {
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

pub static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "emitReply",
        min_args: 1,
        max_args: None,
        origin: Origin::Context,
        summary: "Send a reply now; arguments are joined with spaces",
        func: emit_reply,
    },
    Builtin {
        name: "invokerIdentity",
        min_args: 0,
        max_args: Some(0),
        origin: Origin::Context,
        summary: "The user who invoked the command",
        func: invoker_identity,
    },
    Builtin {
        name: "brandingAccent",
        min_args: 0,
        max_args: Some(0),
        origin: Origin::Context,
        summary: "The bot's accent colour, or null",
        func: branding_accent,
    },
    Builtin {
        name: "inspect",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Structural dump of a value",
        func: inspect,
    },
    Builtin {
        name: "len",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Length of a string, list or map",
        func: len,
    },
    Builtin {
        name: "str",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "String conversion",
        func: to_str,
    },
    Builtin {
        name: "typeOf",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Runtime type name",
        func: type_of,
    },
    Builtin {
        name: "keys",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Keys of a map or object",
        func: keys,
    },
    Builtin {
        name: "values",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Values of a map or object",
        func: values,
    },
    Builtin {
        name: "range",
        min_args: 1,
        max_args: Some(2),
        origin: Origin::Helper,
        summary: "range(end) or range(start, end), end exclusive",
        func: range,
    },
    Builtin {
        name: "join",
        min_args: 2,
        max_args: Some(2),
        origin: Origin::Helper,
        summary: "join(list, separator)",
        func: join,
    },
    Builtin {
        name: "upper",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Uppercase a string",
        func: upper,
    },
    Builtin {
        name: "lower",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Lowercase a string",
        func: lower,
    },
    Builtin {
        name: "abs",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Absolute value",
        func: abs,
    },
    Builtin {
        name: "min",
        min_args: 2,
        max_args: Some(2),
        origin: Origin::Helper,
        summary: "Smaller of two numbers",
        func: min,
    },
    Builtin {
        name: "max",
        min_args: 2,
        max_args: Some(2),
        origin: Origin::Helper,
        summary: "Larger of two numbers",
        func: max,
    },
    Builtin {
        name: "contains",
        min_args: 2,
        max_args: Some(2),
        origin: Origin::Helper,
        summary: "Membership in a list, map keys, or substring",
        func: contains,
    },
    Builtin {
        name: "respond",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Build a command response that is sent as-is",
        func: respond,
    },
    Builtin {
        name: "reject",
        min_args: 1,
        max_args: Some(1),
        origin: Origin::Helper,
        summary: "Build a bad-request command response",
        func: reject,
    },
];

static INDEX: Lazy<HashMap<&'static str, &'static Builtin>> =
    Lazy::new(|| BUILTINS.iter().map(|b| (b.name, b)).collect());

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    INDEX.get(name).copied()
}

/// Take exactly `N` arguments, padding with null
fn take<const N: usize>(args: Vec<Value>) -> [Value; N] {
    let mut it = args.into_iter();
    std::array::from_fn(|_| it.next().unwrap_or(Value::Null))
}

fn expect_str(helper: &str, value: Value) -> FaultResult<String> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Fault::type_error(format!(
            "Helper '{}' expects a string, got '{}'",
            helper,
            other.type_name()
        ))),
    }
}

fn check_len(env: &CallEnv<'_>, len: usize) -> FaultResult<()> {
    if len > env.max_collection_len {
        return Err(Fault::capacity(env.max_collection_len));
    }
    Ok(())
}

/// Display text of a value, cut at the collection limit
fn text(env: &CallEnv<'_>, value: &Value) -> String {
    value.to_text(env.max_collection_len)
}

// ============================================================================
// Context members
// ============================================================================

fn emit_reply(env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let line = args
        .iter()
        .map(|v| text(env, v))
        .collect::<Vec<_>>()
        .join(" ");
    env.ctx.emit_reply(line);
    Ok(Value::Null)
}

fn invoker_identity(env: &CallEnv<'_>, _args: Vec<Value>) -> FaultResult<Value> {
    Ok(Value::object(HostObject::user(env.ctx.invoker_identity())))
}

fn branding_accent(env: &CallEnv<'_>, _args: Vec<Value>) -> FaultResult<Value> {
    Ok(env
        .ctx
        .branding_accent()
        .map(|c| Value::object(HostObject::color(c)))
        .unwrap_or(Value::Null))
}

// ============================================================================
// Helpers
// ============================================================================

fn inspect(env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    let mut lines = Vec::new();
    let mut entry = |label: &str, v: &Value| {
        lines.push(format!("- {} ({}): {}", label, v.type_name(), text(env, v)))
    };
    let header = match &value {
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                entry(&format!("[{}]", i), item);
            }
            format!("Inspection of `list` ({} items)", items.len())
        }
        Value::Map(entries) => {
            for (k, v) in entries.iter() {
                entry(k, v);
            }
            format!("Inspection of `map` ({} entries)", entries.len())
        }
        Value::Object(object) => {
            for (k, v) in object.fields.iter() {
                entry(k, v);
            }
            format!("Inspection of `{}`", object.type_name)
        }
        other => format!("Inspection of `{}`: {}", other.type_name(), text(env, other)),
    };
    let mut out = header;
    let mut chars = out.chars().count();
    for line in lines {
        chars += line.chars().count() + 1;
        if chars > env.max_collection_len {
            out.push_str("\n…");
            break;
        }
        out.push('\n');
        out.push_str(&line);
    }
    Ok(Value::Str(out))
}

fn len(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    let n = match &value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        Value::Null => return Err(Fault::null_reference()),
        other => {
            return Err(Fault::type_error(format!(
                "'{}' has no length",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(n as i64))
}

fn to_str(env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    Ok(Value::Str(text(env, &value)))
}

fn type_of(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    Ok(Value::Str(value.type_name().to_string()))
}

fn fields_of(helper: &str, value: Value) -> FaultResult<IndexMap<String, Value>> {
    match value {
        Value::Map(entries) => Ok(entries.as_ref().clone()),
        Value::Object(object) => Ok(object.fields.clone()),
        Value::Null => Err(Fault::null_reference()),
        other => Err(Fault::type_error(format!(
            "Helper '{}' expects a map, got '{}'",
            helper,
            other.type_name()
        ))),
    }
}

fn keys(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    let fields = fields_of("keys", value)?;
    Ok(Value::list(fields.into_keys().map(Value::Str).collect()))
}

fn values(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    let fields = fields_of("values", value)?;
    Ok(Value::list(fields.into_values().collect()))
}

fn range(env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let bounds = args
        .into_iter()
        .map(|v| match v {
            Value::Int(i) => Ok(i),
            other => Err(Fault::type_error(format!(
                "Helper 'range' expects int bounds, got '{}'",
                other.type_name()
            ))),
        })
        .collect::<FaultResult<Vec<i64>>>()?;
    let (start, end) = match bounds.as_slice() {
        [end] => (0, *end),
        [start, end] => (*start, *end),
        _ => return Err(Fault::argument("Helper 'range' takes one or two bounds")),
    };
    let count = end.saturating_sub(start).max(0) as u64;
    if count > env.max_collection_len as u64 {
        return Err(Fault::capacity(env.max_collection_len));
    }
    Ok(Value::list((start..end).map(Value::Int).collect()))
}

fn join(env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [list, separator] = take(args);
    let items = match list {
        Value::List(items) => items,
        Value::Null => return Err(Fault::null_reference()),
        other => {
            return Err(Fault::type_error(format!(
                "Helper 'join' expects a list, got '{}'",
                other.type_name()
            )))
        }
    };
    let separator = text(env, &separator);
    let mut joined = String::new();
    let mut chars = 0;
    for (i, item) in items.iter().enumerate() {
        let piece = text(env, item);
        chars += piece.chars().count();
        if i > 0 {
            chars += separator.chars().count();
        }
        check_len(env, chars)?;
        if i > 0 {
            joined.push_str(&separator);
        }
        joined.push_str(&piece);
    }
    Ok(Value::Str(joined))
}

fn upper(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    Ok(Value::Str(expect_str("upper", value)?.to_uppercase()))
}

fn lower(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    Ok(Value::Str(expect_str("lower", value)?.to_lowercase()))
}

fn abs(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    match value {
        Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(Fault::overflow),
        Value::Float(x) => Ok(Value::Float(x.abs())),
        other => Err(Fault::type_error(format!(
            "Helper 'abs' expects a number, got '{}'",
            other.type_name()
        ))),
    }
}

fn pick(helper: &str, args: Vec<Value>, want_larger: bool) -> FaultResult<Value> {
    let [a, b] = take(args);
    let a_wins = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => (x >= y) == want_larger,
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            (as_f64(&a) >= as_f64(&b)) == want_larger
        }
        _ => {
            return Err(Fault::type_error(format!(
                "Helper '{}' expects numbers, got '{}' and '{}'",
                helper,
                a.type_name(),
                b.type_name()
            )))
        }
    };
    Ok(if a_wins { a } else { b })
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

fn min(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    pick("min", args, false)
}

fn max(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    pick("max", args, true)
}

fn contains(_env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [haystack, needle] = take(args);
    let found = match (&haystack, &needle) {
        (Value::List(items), _) => items.iter().any(|v| v.loose_eq(&needle)),
        (Value::Map(entries), key) => key.as_key().is_some_and(|k| entries.contains_key(&k)),
        (Value::Str(s), Value::Str(sub)) => s.contains(sub.as_str()),
        (Value::Null, _) => return Err(Fault::null_reference()),
        _ => {
            return Err(Fault::type_error(format!(
                "Helper 'contains' cannot search '{}' for '{}'",
                haystack.type_name(),
                needle.type_name()
            )))
        }
    };
    Ok(Value::Bool(found))
}

fn respond(env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [value] = take(args);
    Ok(match value {
        Value::Response(response) => Value::Response(response),
        other => Value::Response(ActionResult::ok_text(text(env, &other))),
    })
}

fn reject(env: &CallEnv<'_>, args: Vec<Value>) -> FaultResult<Value> {
    let [reason] = take(args);
    Ok(Value::Response(ActionResult::BadRequest(text(env, &reason))))
}
