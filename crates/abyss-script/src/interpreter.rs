//! Tree-walking interpreter for checked programs.
//!
//! Every statement and expression costs one step. The step budget, the
//! wall-clock deadline and the host's cancel flag are all checked from
//! [`Interpreter::tick`], so a runaway loop ends with a `TimeoutError`
//! instead of holding its blocking thread forever.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use abyss_core::{EvalConfig, ExecutionContext};
use indexmap::IndexMap;

use crate::ast::*;
use crate::fault::{Fault, FaultKind, FaultResult};
use crate::library::{self, CallEnv};
use crate::parser::MAX_DEPTH;
use crate::value::{HostObject, Oversize, Value};

/// Steps between clock and cancel-flag checks
const CLOCK_INTERVAL: u64 = 1024;

/// Execution budget for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_steps: u64,
    pub timeout: Duration,
    pub max_collection_len: usize,
}

impl Limits {
    pub fn from_config(config: &EvalConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            timeout: config.exec_timeout(),
            max_collection_len: config.max_collection_len,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits::from_config(&EvalConfig::default())
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

struct Slot {
    name: String,
    ty: DeclType,
    value: Value,
}

/// One step of an assignment path, with index expressions already evaluated
enum PathKey {
    Index(Value),
    Member(String),
}

pub struct Interpreter<'a> {
    env: CallEnv<'a>,
    limits: &'a Limits,
    cancel: &'a AtomicBool,
    deadline: Option<Instant>,
    steps: u64,
    scopes: Vec<Vec<Slot>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a ExecutionContext, limits: &'a Limits, cancel: &'a AtomicBool) -> Self {
        Self {
            env: CallEnv {
                ctx,
                max_collection_len: limits.max_collection_len,
            },
            limits,
            cancel,
            deadline: Instant::now().checked_add(limits.timeout),
            steps: 0,
            scopes: Vec::new(),
        }
    }

    /// Run a program. `None` means the script produced no value.
    pub fn run(mut self, program: &Program) -> FaultResult<Option<Value>> {
        self.scopes.push(Vec::new());
        for stmt in &program.statements {
            match self.exec(stmt)? {
                Flow::Return(value) => return Ok(non_null(value)),
                Flow::Normal | Flow::Break | Flow::Continue => {}
            }
        }
        let value = match &program.tail {
            Some(expr) => self.eval(expr)?,
            None => Value::Null,
        };
        Ok(non_null(value))
    }

    fn tick(&mut self) -> FaultResult<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Fault::timeout(format!(
                "Script exceeded the budget of {} steps.",
                self.limits.max_steps
            )));
        }
        if self.steps % CLOCK_INTERVAL == 0 {
            let late = self.deadline.is_some_and(|d| Instant::now() >= d);
            if late || self.cancel.load(Ordering::Relaxed) {
                return Err(Fault::timeout(format!(
                    "Script exceeded the time limit of {} ms.",
                    self.limits.timeout.as_millis()
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    fn slot(&self, name: &str) -> FaultResult<&Slot> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|slot| slot.name == name)
            .ok_or_else(|| unbound(name))
    }

    fn slot_mut(&mut self, name: &str) -> FaultResult<&mut Slot> {
        self.scopes
            .iter_mut()
            .rev()
            .flat_map(|scope| scope.iter_mut().rev())
            .find(|slot| slot.name == name)
            .ok_or_else(|| unbound(name))
    }

    fn declare(&mut self, name: &str, ty: DeclType, value: Value) -> FaultResult<()> {
        let value = coerce(ty, value)?;
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Slot {
                name: name.to_string(),
                ty,
                value,
            });
        }
        Ok(())
    }

    fn exec_scoped(&mut self, stmt: &Stmt) -> FaultResult<Flow> {
        self.scopes.push(Vec::new());
        let flow = self.exec(stmt);
        self.scopes.pop();
        flow
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec(&mut self, stmt: &Stmt) -> FaultResult<Flow> {
        self.tick()?;
        match &stmt.kind {
            StmtKind::Declare { ty, name, init } => {
                let value = match init {
                    Some(init) => self.eval(init)?,
                    None => default_for(*ty),
                };
                self.declare(&name.name, *ty, value)?;
            }
            StmtKind::Assign { target, op, value } => self.assign(target, *op, value)?,
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Block(stmts) => {
                self.scopes.push(Vec::new());
                let flow = self.block(stmts);
                self.scopes.pop();
                return flow;
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond)?;
                if truth(&cond, "if")? {
                    return self.exec_scoped(then);
                } else if let Some(otherwise) = otherwise {
                    return self.exec_scoped(otherwise);
                }
            }
            StmtKind::While { cond, body } => loop {
                let c = self.eval(cond)?;
                if !truth(&c, "while")? {
                    break;
                }
                match self.exec_scoped(body)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            StmtKind::Foreach {
                ty,
                binding,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable)?;
                return self.foreach(*ty, &binding.name, iterable, body);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Throw(value) => {
                return Err(match self.eval(value)? {
                    Value::Null => Fault::null_reference(),
                    other => Fault::new(FaultKind::Script, other.to_text(self.limits.max_collection_len)),
                });
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Empty => {}
        }
        Ok(Flow::Normal)
    }

    fn block(&mut self, stmts: &[Stmt]) -> FaultResult<Flow> {
        for stmt in stmts {
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn foreach(&mut self, ty: DeclType, binding: &str, iterable: Value, body: &Stmt) -> FaultResult<Flow> {
        let items: Vec<Value> = match iterable {
            Value::List(items) => Arc::try_unwrap(items).unwrap_or_else(|shared| shared.as_ref().clone()),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Value::object(HostObject::entry(k, v, self.limits.max_collection_len)))
                .collect(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            Value::Null => return Err(Fault::null_reference()),
            other => {
                return Err(Fault::type_error(format!(
                    "foreach cannot iterate over a value of type '{}'",
                    other.type_name()
                )))
            }
        };
        for item in items {
            self.tick()?;
            self.scopes.push(Vec::new());
            let flow = match self.declare(binding, ty, item) {
                Ok(()) => self.exec(body),
                Err(fault) => Err(fault),
            };
            self.scopes.pop();
            match flow? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &AssignTarget, op: AssignOp, value: &Expr) -> FaultResult<()> {
        let mut keys = Vec::with_capacity(target.path.len());
        for accessor in &target.path {
            keys.push(match accessor {
                Accessor::Index(index) => PathKey::Index(self.eval(index)?),
                Accessor::Member(name) => PathKey::Member(name.name.clone()),
            });
        }
        let rhs = self.eval(value)?;
        let max_len = self.limits.max_collection_len;

        let new_value = match op.binary() {
            None => rhs,
            Some(binary) => {
                let mut current = self.slot(&target.root.name)?.value.clone();
                for key in &keys {
                    current = read_key(&current, key)?;
                }
                apply(binary, current, rhs, max_len)?
            }
        };

        let nests = matches!(new_value, Value::List(_) | Value::Map(_) | Value::Object(_));
        let slot = self.slot_mut(&target.root.name)?;
        if keys.is_empty() {
            slot.value = coerce(slot.ty, new_value)?;
            return Ok(());
        }
        write_path(&mut slot.value, &keys, new_value, max_len)?;
        if nests {
            check_shape(&slot.value, max_len)?;
        }
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval(&mut self, expr: &Expr) -> FaultResult<Value> {
        self.tick()?;
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(x) => Value::Float(*x),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            }),
            ExprKind::Name(name) => Ok(self.slot(name)?.value.clone()),
            ExprKind::List(items) => {
                self.check_len(items.len())?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                shaped(Value::list(values), self.limits.max_collection_len)
            }
            ExprKind::Map(entries) => {
                self.check_len(entries.len())?;
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key)?;
                    let key = key.as_key().ok_or_else(|| {
                        Fault::type_error(format!(
                            "A map key must be a string, int or bool, not '{}'",
                            key.type_name()
                        ))
                    })?;
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                shaped(Value::map(map), self.limits.max_collection_len)
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                unary(*op, operand)
            }
            ExprKind::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                lhs,
                rhs,
            } => {
                let symbol = op.symbol();
                let left = truth(&self.eval(lhs)?, symbol)?;
                let short_circuit = match op {
                    BinaryOp::And => !left,
                    _ => left,
                };
                if short_circuit {
                    return Ok(Value::Bool(left));
                }
                Ok(Value::Bool(truth(&self.eval(rhs)?, symbol)?))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                apply(*op, left, right, self.limits.max_collection_len)
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond)?;
                if truth(&cond, "?:")? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            ExprKind::Call { callee, args } => self.call(callee, args),
            ExprKind::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                read_key(&target, &PathKey::Index(index))
            }
            ExprKind::Member { target, name } => {
                let target = self.eval(target)?;
                read_key(&target, &PathKey::Member(name.name.clone()))
            }
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> FaultResult<Value> {
        let (name, mut values) = match &callee.kind {
            ExprKind::Name(name) => (name, Vec::with_capacity(args.len())),
            ExprKind::Member { target, name } => {
                let receiver = self.eval(target)?;
                let mut values = Vec::with_capacity(args.len() + 1);
                values.push(receiver);
                (&name.name, values)
            }
            _ => return Err(Fault::type_error("Expression is not invocable")),
        };
        let builtin = library::lookup(name)
            .ok_or_else(|| Fault::type_error(format!("'{}' is not a helper", name)))?;
        for arg in args {
            values.push(self.eval(arg)?);
        }
        if !builtin.accepts(values.len()) {
            return Err(Fault::argument(format!(
                "Helper '{}' does not take {} arguments",
                name,
                values.len()
            )));
        }
        (builtin.func)(&self.env, values)
    }

    fn check_len(&self, len: usize) -> FaultResult<()> {
        if len > self.limits.max_collection_len {
            return Err(Fault::capacity(self.limits.max_collection_len));
        }
        Ok(())
    }
}

fn unbound(name: &str) -> Fault {
    Fault::type_error(format!("The name '{}' is not bound", name))
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}

fn truth(value: &Value, context: &str) -> FaultResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(Fault::type_error(format!(
            "Operator '{}' needs a bool condition, got '{}'",
            context,
            other.type_name()
        ))),
    }
}

fn default_for(ty: DeclType) -> Value {
    match ty {
        DeclType::Int | DeclType::Long => Value::Int(0),
        DeclType::Double => Value::Float(0.0),
        DeclType::Bool => Value::Bool(false),
        _ => Value::Null,
    }
}

/// Admit a value into a typed local, widening int to double
fn coerce(ty: DeclType, value: Value) -> FaultResult<Value> {
    let ok = match (&ty, &value) {
        (DeclType::Var | DeclType::Let | DeclType::Object, _) => true,
        (DeclType::Int | DeclType::Long, Value::Int(_)) => true,
        (DeclType::Double, Value::Float(_)) => true,
        (DeclType::Double, Value::Int(i)) => return Ok(Value::Float(*i as f64)),
        (DeclType::Bool, Value::Bool(_)) => true,
        (DeclType::String, Value::Str(_) | Value::Null) => true,
        (DeclType::List, Value::List(_) | Value::Null) => true,
        (DeclType::Map, Value::Map(_) | Value::Null) => true,
        _ => false,
    };
    if ok {
        Ok(value)
    } else {
        Err(Fault::type_error(format!(
            "Cannot implicitly convert type '{}' to '{}'",
            value.type_name(),
            ty
        )))
    }
}

fn unary(op: UnaryOp, operand: Value) -> FaultResult<Value> {
    match (op, &operand) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(Fault::overflow),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        _ => Err(Fault::type_error(format!(
            "Operator '{}' cannot be applied to operand of type '{}'",
            if op == UnaryOp::Not { "!" } else { "-" },
            operand.type_name()
        ))),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

/// Text of a value inside string concatenation, where null is empty
fn concat_text(value: &Value, max_len: usize) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_text(max_len),
    }
}

/// Every element of every nested collection counts, shared or not, so a
/// few doublings cannot build a value too large to print or compare.
fn check_shape(value: &Value, max_len: usize) -> FaultResult<()> {
    value.check_shape(max_len, MAX_DEPTH).map_err(|oversize| match oversize {
        Oversize::Elements => Fault::capacity(max_len),
        Oversize::Depth => Fault::nesting(MAX_DEPTH),
    })
}

fn shaped(value: Value, max_len: usize) -> FaultResult<Value> {
    check_shape(&value, max_len)?;
    Ok(value)
}

fn apply(op: BinaryOp, left: Value, right: Value, max_len: usize) -> FaultResult<Value> {
    let mismatch = |left: &Value, right: &Value| {
        Fault::type_error(format!(
            "Operator '{}' cannot be applied to operands of type '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left.loose_eq(&right))),
        BinaryOp::Ne => return Ok(Value::Bool(!left.loose_eq(&right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (as_f64(&left), as_f64(&right)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(mismatch(&left, &right)),
                },
            };
            let result = ordering.is_some_and(|o| match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            });
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    match (op, &left, &right) {
        (BinaryOp::Add, Value::Str(_), _) | (BinaryOp::Add, _, Value::Str(_)) => {
            let joined = concat_text(&left, max_len) + &concat_text(&right, max_len);
            if joined.len() > max_len && joined.chars().count() > max_len {
                return Err(Fault::capacity(max_len));
            }
            Ok(Value::Str(joined))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            if a.len() + b.len() > max_len {
                return Err(Fault::capacity(max_len));
            }
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            shaped(Value::list(items), max_len)
        }
        (_, Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(Fault::divide_by_zero()),
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Rem => a.checked_rem(b),
                _ => return Err(mismatch(&left, &right)),
            };
            result.map(Value::Int).ok_or_else(Fault::overflow)
        }
        _ => match (as_f64(&left), as_f64(&right)) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => return Err(mismatch(&left, &right)),
            })),
            _ => Err(mismatch(&left, &right)),
        },
    }
}

fn list_index(len: usize, index: &Value) -> FaultResult<usize> {
    match index {
        Value::Int(i) if *i >= 0 && (*i as u64) < len as u64 => Ok(*i as usize),
        Value::Int(_) => Err(Fault::index_out_of_range()),
        other => Err(Fault::type_error(format!(
            "Cannot index a list with a value of type '{}'",
            other.type_name()
        ))),
    }
}

fn map_key(key: &PathKey) -> FaultResult<String> {
    match key {
        PathKey::Member(name) => Ok(name.clone()),
        PathKey::Index(value) => value.as_key().ok_or_else(|| {
            Fault::type_error(format!(
                "A map key must be a string, int or bool, not '{}'",
                value.type_name()
            ))
        }),
    }
}

fn read_key(target: &Value, key: &PathKey) -> FaultResult<Value> {
    match (target, key) {
        (Value::Null, _) => Err(Fault::null_reference()),
        (Value::Str(s), PathKey::Member(name)) if name == "length" => {
            Ok(Value::Int(s.chars().count() as i64))
        }
        (Value::List(items), PathKey::Member(name)) if name == "length" => {
            Ok(Value::Int(items.len() as i64))
        }
        (Value::Map(entries), PathKey::Member(name)) if name == "length" => {
            Ok(Value::Int(entries.len() as i64))
        }
        (Value::List(items), PathKey::Index(index)) => {
            let i = list_index(items.len(), index)?;
            Ok(items[i].clone())
        }
        (Value::Str(s), PathKey::Index(index)) => {
            let i = list_index(s.chars().count(), index)?;
            Ok(s.chars().nth(i).map(|c| Value::Str(c.to_string())).unwrap_or(Value::Null))
        }
        (Value::Map(entries), key) => {
            let k = map_key(key)?;
            entries.get(&k).cloned().ok_or_else(|| Fault::key_not_found(&k))
        }
        (Value::Object(object), PathKey::Member(name)) => object.fields.get(name).cloned().ok_or_else(|| {
            Fault::type_error(format!(
                "'{}' does not contain a definition for '{}'",
                object.type_name, name
            ))
        }),
        (other, PathKey::Member(name)) => Err(Fault::type_error(format!(
            "'{}' does not contain a definition for '{}'",
            other.type_name(),
            name
        ))),
        (other, PathKey::Index(_)) => Err(Fault::type_error(format!(
            "Cannot apply indexing to an expression of type '{}'",
            other.type_name()
        ))),
    }
}

fn write_path(target: &mut Value, keys: &[PathKey], new_value: Value, max_len: usize) -> FaultResult<()> {
    let Some((key, rest)) = keys.split_first() else {
        *target = new_value;
        return Ok(());
    };
    match target {
        Value::Null => Err(Fault::null_reference()),
        Value::List(items) => {
            let PathKey::Index(index) = key else {
                return Err(Fault::type_error("Property 'length' is read only"));
            };
            let i = list_index(items.len(), index)?;
            write_path(&mut Arc::make_mut(items)[i], rest, new_value, max_len)
        }
        Value::Map(entries) => {
            let k = map_key(key)?;
            let entries = Arc::make_mut(entries);
            if rest.is_empty() {
                if !entries.contains_key(&k) && entries.len() >= max_len {
                    return Err(Fault::capacity(max_len));
                }
                entries.insert(k, new_value);
                Ok(())
            } else {
                let slot = entries.get_mut(&k).ok_or_else(|| Fault::key_not_found(&k))?;
                write_path(slot, rest, new_value, max_len)
            }
        }
        Value::Str(_) => Err(Fault::type_error("Strings are immutable")),
        other => Err(Fault::type_error(format!(
            "Members of '{}' are read only",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::check;
    use crate::parser::parse_script;
    use abyss_core::{Identity, MemoryCollaborator};

    fn run_with(src: &str, limits: Limits) -> (FaultResult<Option<Value>>, Vec<String>) {
        let program = parse_script(src).unwrap();
        let errors: Vec<_> = check(&program).into_iter().filter(|d| d.is_error()).collect();
        assert!(errors.is_empty(), "{:?}", errors);
        let collaborator = Arc::new(MemoryCollaborator::new(Identity::new(1, "abyss")));
        let ctx = collaborator.context_for(Identity::new(7, "ada"));
        let cancel = AtomicBool::new(false);
        let result = Interpreter::new(&ctx, &limits, &cancel).run(&program);
        (result, collaborator.sent_texts())
    }

    fn run(src: &str) -> FaultResult<Option<Value>> {
        run_with(src, Limits::default()).0
    }

    fn value(src: &str) -> Value {
        run(src).unwrap().unwrap()
    }

    fn fault(src: &str) -> &'static str {
        run(src).unwrap_err().kind.type_name()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(value("1 + 1"), Value::Int(2));
        assert_eq!(value("7 / 2"), Value::Int(3));
        assert_eq!(value("7 % 4 * 2"), Value::Int(6));
        assert_eq!(value("1 + 0.5"), Value::Float(1.5));
        assert_eq!(value("-(2 - 5)"), Value::Int(3));
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(value(r#""n=" + 3"#).to_string(), "n=3");
        assert_eq!(value(r#""a" + null"#).to_string(), "a");
    }

    #[test]
    fn test_no_value() {
        assert!(run("var x = 1; x += 1;").unwrap().is_none());
        assert!(run("null").unwrap().is_none());
        assert!(run("return;").unwrap().is_none());
    }

    #[test]
    fn test_control_flow() {
        let src = r#"
            var total = 0;
            var i = 0;
            while (true) {
                i += 1;
                if (i > 10) { break; }
                if (i % 2 == 0) { continue; }
                total += i;
            }
            total
        "#;
        assert_eq!(value(src), Value::Int(25));
    }

    #[test]
    fn test_foreach_over_map() {
        let src = r#"
            var parts = [];
            foreach (var e in {"a": 1, "b": 2}) { parts += [e.key + "=" + e.value]; }
            join(parts, ",")
        "#;
        assert_eq!(value(src).to_string(), "a=1,b=2");
    }

    #[test]
    fn test_return_exits_loops() {
        assert_eq!(
            value("foreach (var n in range(10)) { if (n == 3) { return n * 10; } } 0"),
            Value::Int(30)
        );
    }

    #[test]
    fn test_path_assignment() {
        let src = r#"
            var m = {"inner": {"xs": [1, 2, 3]}};
            m["inner"].xs[1] = 20;
            m.added = true;
            m
        "#;
        assert_eq!(
            value(src).to_string(),
            r#"{"inner": {"xs": [1, 20, 3]}, "added": true}"#
        );
    }

    #[test]
    fn test_value_semantics() {
        assert_eq!(value("var a = [1]; var b = a; b[0] = 9; a[0]"), Value::Int(1));
    }

    #[test]
    fn test_runtime_faults() {
        assert_eq!(fault("var z = 0; 1 / z"), "DivideByZeroError");
        assert_eq!(fault("[1, 2][5]"), "IndexOutOfRangeError");
        assert_eq!(fault(r#"{"a": 1}["b"]"#), "KeyNotFoundError");
        assert_eq!(fault("var s = null; s.length"), "NullReferenceError");
        assert_eq!(fault("9223372036854775807 + 1"), "OverflowError");
        assert_eq!(fault(r#"if (1) { 2; } 3"#), "TypeError");
        assert_eq!(fault(r#"throw "boom";"#), "ScriptError");
    }

    #[test]
    fn test_most_negative_integer() {
        assert_eq!(value("-9223372036854775808"), Value::Int(i64::MIN));
        assert_eq!(value("-9223372036854775808 + 1"), Value::Int(i64::MIN + 1));
        assert_eq!(fault("-(-9223372036854775808)"), "OverflowError");
    }

    #[test]
    fn test_throw_message() {
        let err = run(r#"throw "it broke";"#).unwrap_err();
        assert_eq!(err.message, "it broke");
    }

    #[test]
    fn test_typed_local_rejects_runtime_mismatch() {
        assert_eq!(fault(r#"var s = "x"; int n = s; n"#), "TypeError");
        assert_eq!(value("double d = 2; d"), Value::Float(2.0));
    }

    #[test]
    fn test_step_budget() {
        let limits = Limits {
            max_steps: 500,
            ..Limits::default()
        };
        let (result, _) = run_with("while (true) { }", limits);
        assert_eq!(result.unwrap_err().kind, FaultKind::Timeout);
    }

    #[test]
    fn test_cancel_flag_stops_run() {
        let program = parse_script("while (true) { }").unwrap();
        let collaborator = Arc::new(MemoryCollaborator::new(Identity::new(1, "abyss")));
        let ctx = collaborator.context_for(Identity::new(7, "ada"));
        let limits = Limits {
            max_steps: u64::MAX,
            ..Limits::default()
        };
        let cancel = AtomicBool::new(true);
        let err = Interpreter::new(&ctx, &limits, &cancel).run(&program).unwrap_err();
        assert_eq!(err.kind, FaultKind::Timeout);
    }

    #[test]
    fn test_collection_limit() {
        let limits = Limits {
            max_collection_len: 3,
            ..Limits::default()
        };
        let (result, _) = run_with("var xs = [1, 2]; xs + [3, 4]", limits);
        assert_eq!(result.unwrap_err().kind, FaultKind::CapacityExceeded);
    }

    #[test]
    fn test_shared_doubling_hits_capacity() {
        let src = "var a = [1]; var i = 0; while (i < 40) { a = [a, a]; i += 1; } a";
        let err = run(src).unwrap_err();
        assert_eq!(err.kind, FaultKind::CapacityExceeded);

        let src = r#"var m = {"k": 1}; var i = 0; while (i < 40) { m.next = m; m.again = m; i += 1; } m"#;
        assert_eq!(fault(src), "CapacityExceededError");
    }

    #[test]
    fn test_deep_nesting_hits_capacity() {
        let src = "var a = []; var i = 0; while (i < 60000) { a = [a]; i += 1; } len(a)";
        let err = run(src).unwrap_err();
        assert_eq!(err.kind, FaultKind::CapacityExceeded);
        assert!(err.message.contains("nesting"));

        assert_eq!(value("var a = []; var i = 0; while (i < 200) { a = [a]; i += 1; } len(a)"), Value::Int(1));
    }

    #[test]
    fn test_emit_reply_from_script() {
        let (result, sent) = run_with(
            r#"emitReply("hello", invokerIdentity().name); emitReply(1 + 1); "done""#,
            Limits::default(),
        );
        assert_eq!(result.unwrap().unwrap().to_string(), "done");
        assert_eq!(sent, vec!["hello ada".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_member_helpers() {
        assert_eq!(value(r#"["a", "b"].join("-")"#).to_string(), "a-b");
        assert_eq!(value(r#""abc".length"#), Value::Int(3));
        assert_eq!(value(r#"typeOf(brandingAccent())"#).to_string(), "Color");
    }
}
