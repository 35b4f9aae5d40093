//! Static checks run after parsing: name resolution, arity, literal type
//! compatibility, loop placement, and the usual warnings.
use abyss_core::Diagnostic;

use crate::ast::*;
use crate::codes;
use crate::library::{self, Origin};

struct Local {
    name: String,
    ty: DeclType,
    span: Span,
    used: bool,
    warn_unused: bool,
}

#[derive(Default)]
struct Checker {
    scopes: Vec<Vec<Local>>,
    loop_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

/// Check a parsed program. The result holds errors and warnings in
/// discovery order; callers sort them.
pub fn check(program: &Program) -> Vec<Diagnostic> {
    let mut checker = Checker::default();
    checker.push_scope();
    checker.sequence(&program.statements, program.tail.as_ref());
    checker.pop_scope();
    checker.diagnostics
}

fn diverges(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Throw(_) | StmtKind::Break | StmtKind::Continue => true,
        StmtKind::Block(stmts) => stmts.iter().any(diverges),
        StmtKind::If {
            then,
            otherwise: Some(otherwise),
            ..
        } => diverges(then) && diverges(otherwise),
        _ => false,
    }
}

/// Static type of an expression when it is obvious without running it
fn literal_type(expr: &Expr) -> Option<&'static str> {
    match &expr.kind {
        ExprKind::Literal(Literal::Int(_)) => Some("int"),
        ExprKind::Literal(Literal::Float(_)) => Some("double"),
        ExprKind::Literal(Literal::Str(_)) => Some("string"),
        ExprKind::Literal(Literal::Bool(_)) => Some("bool"),
        ExprKind::Literal(Literal::Null) => Some("null"),
        ExprKind::List(_) => Some("list"),
        ExprKind::Map(_) => Some("map"),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => match literal_type(operand) {
            Some(t @ ("int" | "double")) => Some(t),
            _ => None,
        },
        ExprKind::Unary { op: UnaryOp::Not, .. } => Some("bool"),
        ExprKind::Binary { op, .. } if matches!(
            op,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::And
                | BinaryOp::Or
        ) =>
        {
            Some("bool")
        }
        _ => None,
    }
}

fn compatible(target: DeclType, found: &str) -> bool {
    match target {
        DeclType::Var | DeclType::Let | DeclType::Object => true,
        DeclType::Int | DeclType::Long => found == "int",
        DeclType::Double => matches!(found, "int" | "double"),
        DeclType::String => matches!(found, "string" | "null"),
        DeclType::Bool => found == "bool",
        DeclType::List => matches!(found, "list" | "null"),
        DeclType::Map => matches!(found, "map" | "null"),
    }
}

impl Checker {
    fn error(&mut self, id: &str, message: String, span: Span) {
        self.diagnostics.push(Diagnostic::error(id, message, span.into()));
    }

    fn warning(&mut self, id: &str, message: String, span: Span) {
        self.diagnostics.push(Diagnostic::warning(id, message, span.into()));
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        for local in scope {
            if local.warn_unused && !local.used {
                self.warning(
                    codes::UNUSED_LOCAL,
                    format!("The variable '{}' is declared but never used", local.name),
                    local.span,
                );
            }
        }
    }

    fn find_local(&mut self, name: &str) -> Option<&mut Local> {
        self.scopes
            .iter_mut()
            .rev()
            .flat_map(|scope| scope.iter_mut())
            .find(|local| local.name == name)
    }

    fn declare(&mut self, ty: DeclType, name: &Ident, warn_unused: bool) {
        let in_current = self
            .scopes
            .last()
            .is_some_and(|scope| scope.iter().any(|l| l.name == name.name));
        if in_current {
            self.error(
                codes::DUPLICATE_LOCAL,
                format!("A local variable named '{}' is already defined in this scope", name.name),
                name.span,
            );
            return;
        }
        if self.find_local(&name.name).is_some() {
            self.error(
                codes::DUPLICATE_LOCAL,
                format!(
                    "A local named '{}' cannot be declared in this scope because that name is used in an enclosing scope",
                    name.name
                ),
                name.span,
            );
            return;
        }
        if let Some(builtin) = library::lookup(&name.name) {
            let what = match builtin.origin {
                Origin::Context => "context member",
                Origin::Helper => "helper",
            };
            self.warning(
                codes::HIDES_HELPER,
                format!("Local '{}' hides the {} of the same name", name.name, what),
                name.span,
            );
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(Local {
                name: name.name.clone(),
                ty,
                span: name.span,
                used: false,
                warn_unused,
            });
        }
    }

    fn check_assignable(&mut self, ty: DeclType, value: &Expr) {
        let Some(found) = literal_type(value) else {
            return;
        };
        if compatible(ty, found) {
            return;
        }
        if found == "null" {
            self.error(
                codes::NULL_TO_VALUE_TYPE,
                format!("Cannot convert null to '{}' because it is a non-nullable value type", ty),
                value.span,
            );
        } else {
            self.error(
                codes::TYPE_MISMATCH,
                format!("Cannot implicitly convert type '{}' to '{}'", found, ty),
                value.span,
            );
        }
    }

    /// Statements of one block, reporting the first unreachable one
    fn sequence(&mut self, stmts: &[Stmt], tail: Option<&Expr>) {
        let mut diverged = false;
        let mut reported = false;
        for stmt in stmts {
            if diverged && !reported && stmt.kind != StmtKind::Empty {
                self.warning(codes::UNREACHABLE, "Unreachable code detected".into(), stmt.span);
                reported = true;
            }
            self.statement(stmt);
            diverged |= diverges(stmt);
        }
        if let Some(tail) = tail {
            if diverged && !reported {
                self.warning(codes::UNREACHABLE, "Unreachable code detected".into(), tail.span);
            }
            self.expr(tail);
        }
    }

    fn scoped(&mut self, stmt: &Stmt) {
        self.push_scope();
        self.statement(stmt);
        self.pop_scope();
    }

    fn statement(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Declare { ty, name, init } => {
                if let Some(init) = init {
                    self.expr(init);
                    self.check_assignable(*ty, init);
                }
                self.declare(*ty, name, true);
            }
            StmtKind::Assign { target, op, value } => self.assignment(target, *op, value),
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Block(stmts) => {
                self.push_scope();
                self.sequence(stmts, None);
                self.pop_scope();
            }
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.scoped(then);
                if let Some(otherwise) = otherwise {
                    self.scoped(otherwise);
                }
            }
            StmtKind::While { cond, body } => {
                self.expr(cond);
                self.loop_depth += 1;
                self.scoped(body);
                self.loop_depth -= 1;
            }
            StmtKind::Foreach {
                ty,
                binding,
                iterable,
                body,
            } => {
                self.expr(iterable);
                self.push_scope();
                self.declare(*ty, binding, false);
                self.loop_depth += 1;
                self.scoped(body);
                self.loop_depth -= 1;
                self.pop_scope();
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            StmtKind::Throw(value) => self.expr(value),
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.error(
                        codes::NO_ENCLOSING_LOOP,
                        "No enclosing loop out of which to break or continue".into(),
                        stmt.span,
                    );
                }
            }
            StmtKind::Empty => {}
        }
    }

    fn assignment(&mut self, target: &AssignTarget, op: AssignOp, value: &Expr) {
        self.expr(value);
        for accessor in &target.path {
            if let Accessor::Index(index) = accessor {
                self.expr(index);
            }
        }
        let reads = op != AssignOp::Set || !target.path.is_empty();
        let root = &target.root;
        if let Some(local) = self.find_local(&root.name) {
            if reads {
                local.used = true;
            }
            let ty = local.ty;
            if target.path.is_empty() && op == AssignOp::Set {
                self.check_assignable(ty, value);
            }
        } else if library::lookup(&root.name).is_some() {
            self.error(
                codes::ASSIGN_TO_HELPER,
                format!("Cannot assign to '{}' because it is a helper", root.name),
                root.span,
            );
        } else {
            self.unknown_name(&root.name, root.span);
        }
    }

    fn unknown_name(&mut self, name: &str, span: Span) {
        self.error(
            codes::UNKNOWN_NAME,
            format!("The name '{}' does not exist in the current context", name),
            span,
        );
    }

    fn check_arity(&mut self, name: &str, count: usize, span: Span) {
        if let Some(builtin) = library::lookup(name) {
            if !builtin.accepts(count) {
                self.error(
                    codes::WRONG_ARITY,
                    format!("No overload for method '{}' takes {} arguments", name, count),
                    span,
                );
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Name(name) => {
                if let Some(local) = self.find_local(name) {
                    local.used = true;
                } else if library::lookup(name).is_some() {
                    self.error(
                        codes::HELPER_AS_VALUE,
                        format!("Cannot use helper '{}' as a value; call it with ()", name),
                        expr.span,
                    );
                } else {
                    self.unknown_name(name, expr.span);
                }
            }
            ExprKind::List(items) => items.iter().for_each(|item| self.expr(item)),
            ExprKind::Map(entries) => {
                for (key, value) in entries {
                    self.expr(key);
                    self.expr(value);
                }
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond);
                self.expr(then);
                self.expr(otherwise);
            }
            ExprKind::Call { callee, args } => {
                args.iter().for_each(|arg| self.expr(arg));
                self.call(callee, args.len(), expr.span);
            }
            ExprKind::Index { target, index } => {
                self.expr(target);
                self.expr(index);
            }
            ExprKind::Member { target, .. } => self.expr(target),
        }
    }

    fn call(&mut self, callee: &Expr, count: usize, span: Span) {
        match &callee.kind {
            ExprKind::Name(name) => {
                if let Some(local) = self.find_local(name) {
                    local.used = true;
                    self.error(
                        codes::NOT_INVOCABLE,
                        format!("'{}' is a variable but is used like a method", name),
                        callee.span,
                    );
                } else if library::lookup(name).is_some() {
                    self.check_arity(name, count, span);
                } else {
                    self.unknown_name(name, callee.span);
                }
            }
            ExprKind::Member { target, name } => {
                self.expr(target);
                match library::lookup(&name.name) {
                    Some(builtin) if builtin.origin == Origin::Helper => {
                        self.check_arity(&name.name, count + 1, span)
                    }
                    _ => self.error(
                        codes::NOT_INVOCABLE,
                        format!("There is no helper method named '{}'", name.name),
                        name.span,
                    ),
                }
            }
            _ => {
                self.expr(callee);
                self.error(
                    codes::NOT_INVOCABLE,
                    "Expression is not invocable".into(),
                    callee.span,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_script;
    use abyss_core::Severity;

    fn ids(src: &str) -> Vec<(String, Severity)> {
        let program = parse_script(src).unwrap();
        check(&program)
            .into_iter()
            .map(|d| (d.id, d.severity))
            .collect()
    }

    #[test]
    fn test_clean_program() {
        assert!(ids("var x = 1; x + 1").is_empty());
        assert!(ids("1 + 1").is_empty());
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(ids("y + 1"), vec![(codes::UNKNOWN_NAME.into(), Severity::Error)]);
    }

    #[test]
    fn test_literal_type_mismatch() {
        assert_eq!(
            ids(r#"int x = "a"; x"#),
            vec![(codes::TYPE_MISMATCH.into(), Severity::Error)]
        );
        assert_eq!(
            ids("int x = null; x"),
            vec![(codes::NULL_TO_VALUE_TYPE.into(), Severity::Error)]
        );
        assert!(ids("double d = 1; long l = -2; d + l").is_empty());
    }

    #[test]
    fn test_duplicate_local() {
        let found = ids("var x = 1; var x = 2; x");
        assert_eq!(found, vec![(codes::DUPLICATE_LOCAL.into(), Severity::Error)]);
    }

    #[test]
    fn test_arity() {
        assert_eq!(
            ids("inspect(1, 2)"),
            vec![(codes::WRONG_ARITY.into(), Severity::Error)]
        );
        assert!(ids(r#"emitReply("a", "b", 3);"#).is_empty());
        assert!(ids(r#"[1, 2].join(", ")"#).is_empty());
    }

    #[test]
    fn test_helper_misuse() {
        assert_eq!(ids("inspect"), vec![(codes::HELPER_AS_VALUE.into(), Severity::Error)]);
        assert_eq!(
            ids("len = 2;"),
            vec![(codes::ASSIGN_TO_HELPER.into(), Severity::Error)]
        );
        assert_eq!(
            ids("var f = 1; f()"),
            vec![(codes::NOT_INVOCABLE.into(), Severity::Error)]
        );
    }

    #[test]
    fn test_break_outside_loop() {
        assert_eq!(ids("break;"), vec![(codes::NO_ENCLOSING_LOOP.into(), Severity::Error)]);
        assert!(ids("while (true) { break; }").is_empty());
    }

    #[test]
    fn test_warnings() {
        assert_eq!(ids("var x = 1;"), vec![(codes::UNUSED_LOCAL.into(), Severity::Warning)]);
        assert_eq!(
            ids("return 1; 2"),
            vec![(codes::UNREACHABLE.into(), Severity::Warning)]
        );
        assert_eq!(
            ids("var len = 3; len"),
            vec![(codes::HIDES_HELPER.into(), Severity::Warning)]
        );
    }

    #[test]
    fn test_foreach_binding_in_scope() {
        assert!(ids("var t = 0; foreach (var n in [1, 2]) { t += n; } t").is_empty());
        assert_eq!(
            ids("foreach (var n in [1]) { } n"),
            vec![(codes::UNKNOWN_NAME.into(), Severity::Error)]
        );
    }
}
