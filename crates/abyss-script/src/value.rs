//! Runtime values of abyss script.
use std::fmt::{self, Write};
use std::sync::Arc;

use abyss_core::{ActionResult, Color, Identity};
use indexmap::IndexMap;

/// A script value. Collections are shared and copied on write, so passing
/// a list into a helper is cheap and assignment has value semantics.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Arc<Vec<Value>>),
    Map(Arc<IndexMap<String, Value>>),
    Object(Arc<HostObject>),
    Response(ActionResult),
}

/// Read-only object handed out by the host (identities, colours, entries)
#[derive(Debug, Clone, PartialEq)]
pub struct HostObject {
    pub type_name: &'static str,
    pub fields: IndexMap<String, Value>,
    pub display: String,
}

impl HostObject {
    pub fn user(identity: &Identity) -> Self {
        let mut fields = IndexMap::new();
        let id = i64::try_from(identity.id)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Str(identity.id.to_string()));
        fields.insert("id".to_string(), id);
        fields.insert("name".to_string(), Value::Str(identity.name.clone()));
        fields.insert(
            "avatarUrl".to_string(),
            identity.avatar_url.clone().map(Value::Str).unwrap_or(Value::Null),
        );
        Self {
            type_name: "User",
            fields,
            display: identity.to_string(),
        }
    }

    pub fn color(color: Color) -> Self {
        let mut fields = IndexMap::new();
        let [_, r, g, b] = color.0.to_be_bytes();
        fields.insert("r".to_string(), Value::Int(r as i64));
        fields.insert("g".to_string(), Value::Int(g as i64));
        fields.insert("b".to_string(), Value::Int(b as i64));
        fields.insert("value".to_string(), Value::Int(color.0 as i64));
        Self {
            type_name: "Color",
            fields,
            display: color.to_string(),
        }
    }

    /// Key/value pair produced when iterating a map. The display text
    /// holds at most `max_chars` characters of the value.
    pub fn entry(key: &str, value: &Value, max_chars: usize) -> Self {
        let mut fields = IndexMap::new();
        fields.insert("key".to_string(), Value::Str(key.to_string()));
        fields.insert("value".to_string(), value.clone());
        Self {
            type_name: "Entry",
            fields,
            display: format!("[{}, {}]", key, value.to_text(max_chars)),
        }
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Value::Map(Arc::new(entries))
    }

    pub fn object(object: HostObject) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Runtime type name shown in reports and by `typeOf`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(o) => o.type_name,
            Value::Response(_) => "ActionResult",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Key form used when this value indexes or builds a map
    pub fn as_key(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Equality used by `==`: numbers compare across int/double
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).map(|w| v.loose_eq(w)).unwrap_or(false))
            }
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Response(a), Value::Response(b)) => a == b,
            _ => false,
        }
    }

    /// Display text cut to `max_chars` characters, ending in `…` when cut.
    /// Shared elements are printed once per reference, so the plain
    /// `Display` of a value can be far larger than its memory.
    pub fn to_text(&self, max_chars: usize) -> String {
        let mut out = Bounded {
            text: String::new(),
            left: max_chars,
        };
        if write!(out, "{}", self).is_err() {
            out.text.push('…');
        }
        out.text
    }

    /// Check the logical shape of a value: every element of every nested
    /// collection counts against `max_elements`, once per reference.
    pub fn check_shape(&self, max_elements: usize, max_depth: usize) -> Result<(), Oversize> {
        let mut seen = 0;
        self.walk(0, &mut seen, max_elements, max_depth)
    }

    fn walk(&self, depth: usize, seen: &mut usize, max_elements: usize, max_depth: usize) -> Result<(), Oversize> {
        let children: Box<dyn Iterator<Item = &Value> + '_> = match self {
            Value::List(items) => Box::new(items.iter()),
            Value::Map(entries) => Box::new(entries.values()),
            Value::Object(object) => Box::new(object.fields.values()),
            _ => return Ok(()),
        };
        if depth >= max_depth {
            return Err(Oversize::Depth);
        }
        for child in children {
            *seen += 1;
            if *seen > max_elements {
                return Err(Oversize::Elements);
            }
            child.walk(depth + 1, seen, max_elements, max_depth)?;
        }
        Ok(())
    }

    /// Form used inside collection displays: strings are quoted
    fn write_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Why a value failed [`Value::check_shape`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oversize {
    Elements,
    Depth,
}

/// Writer that refuses output past its character budget
struct Bounded {
    text: String,
    left: usize,
}

impl Write for Bounded {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.left == 0 {
                return Err(fmt::Error);
            }
            self.text.push(c);
            self.left -= 1;
        }
        Ok(())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.loose_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.write_nested(f)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: ", k)?;
                    v.write_nested(f)?;
                }
                write!(f, "}}")
            }
            Value::Object(o) => write!(f, "{}", o.display),
            Value::Response(ActionResult::Ok(msg)) => {
                write!(f, "{}", msg.content.as_deref().unwrap_or_default())
            }
            Value::Response(ActionResult::BadRequest(reason)) => write!(f, "{}", reason),
            Value::Response(ActionResult::Empty) => Ok(()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
