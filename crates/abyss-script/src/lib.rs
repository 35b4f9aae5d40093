//! Abyss script: a small C#-flavoured language for `sys eval`.
//!
//! A snippet goes through [`parser`] and [`checker`] (the compile stage,
//! producing diagnostics) and then [`interpreter`] (the execute stage,
//! producing a value or a fault). [`ScriptEvaluator`] drives both and
//! returns a [`StagedOutcome`](abyss_core::StagedOutcome).
pub mod ast;
pub mod checker;
pub mod codes;
pub mod evaluator;
pub mod fault;
pub mod interpreter;
pub mod library;
pub mod parser;
pub mod value;

pub use evaluator::{CompiledScript, ScriptEvaluator, INTERNAL_ERROR};
pub use fault::{Fault, FaultKind};
pub use interpreter::Limits;
pub use parser::parse_script;
pub use value::{HostObject, Value};
