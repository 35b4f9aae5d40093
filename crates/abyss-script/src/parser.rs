//! Snippet parser: pest grammar → AST, with failures reported as diagnostics.
use abyss_core::{Diagnostic, SourceSpan};
use pest::error::{ErrorVariant, InputLocation};
use pest::iterators::Pair;
use pest::Parser;

use crate::ast::*;
use crate::codes;

#[derive(pest_derive::Parser)]
#[grammar = "grammar.pest"] // Path relative to src/
struct ScriptParser;

/// Deepest bracket nesting accepted before parsing
pub const MAX_NESTING: usize = 64;

/// Deepest expression/statement tree the builder accepts
pub const MAX_DEPTH: usize = 256;

/// Parse a snippet into a [`Program`]. Syntax errors come back as one
/// error-severity diagnostic positioned where parsing stopped.
pub fn parse_script(source: &str) -> Result<Program, Diagnostic> {
    check_nesting(source)?;
    let offsets = Offsets::new(source);
    let mut pairs = ScriptParser::parse(Rule::program, source)
        .map_err(|e| syntax_diagnostic(&e, source, &offsets))?;
    let program = pairs
        .next()
        .ok_or_else(|| Diagnostic::error(codes::SYNTAX_ERROR, "Empty parse tree", SourceSpan::Metadata))?;
    Builder { offsets }.program(program)
}

fn check_nesting(source: &str) -> Result<(), Diagnostic> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in source.chars().enumerate() {
        if in_string {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(too_deep(Span::new(i, i + 1)));
                }
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

fn too_deep(span: Span) -> Diagnostic {
    Diagnostic::error(
        codes::TOO_DEEPLY_NESTED,
        "Expression is too deeply nested",
        span.into(),
    )
}

// ============================================================================
// Syntax errors
// ============================================================================

fn syntax_diagnostic(error: &pest::error::Error<Rule>, source: &str, offsets: &Offsets) -> Diagnostic {
    let byte_pos = match error.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    let at = offsets.char_at(byte_pos);
    let found = found_token(&source[byte_pos.min(source.len())..]);

    let message = match &error.variant {
        ErrorVariant::ParsingError { positives, .. } => {
            if positives.iter().any(|r| describe(*r) == Some("expression")) {
                format!("Invalid expression term {}: expected expression", found)
            } else {
                let mut expected: Vec<&str> = Vec::new();
                for name in positives.iter().filter_map(|r| describe(*r)) {
                    if !expected.contains(&name) {
                        expected.push(name);
                    }
                }
                if expected.is_empty() {
                    format!("Syntax error, unexpected {}", found)
                } else {
                    format!("Syntax error, expected {}, found {}", expected.join(" or "), found)
                }
            }
        }
        ErrorVariant::CustomError { message } => message.clone(),
    };

    Diagnostic::error(codes::SYNTAX_ERROR, message, SourceSpan::new(at, at))
}

fn found_token(rest: &str) -> String {
    let rest = rest.trim_start();
    let Some(first) = rest.chars().next() else {
        return "end of input".to_string();
    };
    let token: String = if first.is_alphanumeric() || first == '_' {
        rest.chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect()
    } else {
        first.to_string()
    };
    format!("'{}'", token)
}

/// Human name of a grammar rule as it appears in "expected …" messages
fn describe(rule: Rule) -> Option<&'static str> {
    Some(match rule {
        Rule::expr
        | Rule::tail_expr
        | Rule::or_expr
        | Rule::and_expr
        | Rule::eq_expr
        | Rule::cmp_expr
        | Rule::add_expr
        | Rule::mul_expr
        | Rule::unary
        | Rule::postfix
        | Rule::float_lit
        | Rule::int_lit
        | Rule::string_lit
        | Rule::bool_lit
        | Rule::null_lit
        | Rule::list_lit
        | Rule::map_lit => "expression",
        Rule::ident | Rule::assign_target => "identifier",
        Rule::decl_type => "type",
        Rule::semi => "';'",
        Rule::assign_op => "assignment operator",
        Rule::or_op
        | Rule::and_op
        | Rule::eq_op
        | Rule::cmp_op
        | Rule::add_op
        | Rule::mul_op
        | Rule::unary_op => "operator",
        Rule::call_args => "argument list",
        Rule::index => "index",
        Rule::member => "member access",
        Rule::map_entry => "map entry",
        Rule::block
        | Rule::if_stmt
        | Rule::while_stmt
        | Rule::foreach_stmt
        | Rule::return_stmt
        | Rule::throw_stmt
        | Rule::break_stmt
        | Rule::continue_stmt
        | Rule::declaration
        | Rule::assignment
        | Rule::expr_stmt
        | Rule::empty_stmt => "statement",
        Rule::kw_in => "'in'",
        Rule::kw_else => "'else'",
        Rule::EOI => "end of input",
        _ => return None,
    })
}

// ============================================================================
// Offsets
// ============================================================================

/// Maps byte offsets (what pest reports) to character offsets
struct Offsets {
    chars: Vec<usize>,
}

impl Offsets {
    fn new(source: &str) -> Self {
        let mut chars = vec![0; source.len() + 1];
        let mut count = 0;
        for (byte, c) in source.char_indices() {
            for slot in &mut chars[byte..byte + c.len_utf8()] {
                *slot = count;
            }
            count += 1;
        }
        chars[source.len()] = count;
        Self { chars }
    }

    fn char_at(&self, byte: usize) -> usize {
        self.chars[byte.min(self.chars.len() - 1)]
    }
}

// ============================================================================
// AST builder
// ============================================================================

struct Builder {
    offsets: Offsets,
}

fn is_punctuation(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::semi
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_while
            | Rule::kw_foreach
            | Rule::kw_in
            | Rule::kw_return
            | Rule::kw_throw
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::EOI
    )
}

/// Children of a pair without keywords and terminators
fn children<'i>(pair: Pair<'i, Rule>) -> impl Iterator<Item = Pair<'i, Rule>> {
    pair.into_inner().filter(|p| !is_punctuation(p.as_rule()))
}

impl Builder {
    fn span(&self, pair: &Pair<Rule>) -> Span {
        let s = pair.as_span();
        Span::new(self.offsets.char_at(s.start()), self.offsets.char_at(s.end()))
    }

    fn malformed(&self, pair: &Pair<Rule>) -> Diagnostic {
        Diagnostic::error(
            codes::SYNTAX_ERROR,
            format!("Unexpected {:?}", pair.as_rule()),
            self.span(pair).into(),
        )
    }

    fn next<'i>(
        &self,
        parent: Span,
        it: &mut impl Iterator<Item = Pair<'i, Rule>>,
    ) -> Result<Pair<'i, Rule>, Diagnostic> {
        it.next().ok_or_else(|| {
            Diagnostic::error(codes::SYNTAX_ERROR, "Incomplete construct", parent.into())
        })
    }

    fn program(&self, pair: Pair<Rule>) -> Result<Program, Diagnostic> {
        let mut statements = Vec::new();
        let mut tail = None;
        for p in children(pair) {
            if p.as_rule() == Rule::tail_expr {
                let span = self.span(&p);
                let inner = self.next(span, &mut p.into_inner())?;
                tail = Some(self.expr(inner, 0)?);
            } else {
                statements.push(self.statement(p, 0)?);
            }
        }
        Ok(Program { statements, tail })
    }

    fn statement(&self, pair: Pair<Rule>, depth: usize) -> Result<Stmt, Diagnostic> {
        let span = self.span(&pair);
        if depth > MAX_DEPTH {
            return Err(too_deep(span));
        }
        let rule = pair.as_rule();
        let mut it = children(pair.clone());
        let kind = match rule {
            Rule::block => StmtKind::Block(
                it.map(|s| self.statement(s, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Rule::if_stmt => {
                let cond = self.expr(self.next(span, &mut it)?, depth + 1)?;
                let then = Box::new(self.statement(self.next(span, &mut it)?, depth + 1)?);
                let otherwise = match it.next() {
                    Some(p) => Some(Box::new(self.statement(p, depth + 1)?)),
                    None => None,
                };
                StmtKind::If {
                    cond,
                    then,
                    otherwise,
                }
            }
            Rule::while_stmt => {
                let cond = self.expr(self.next(span, &mut it)?, depth + 1)?;
                let body = Box::new(self.statement(self.next(span, &mut it)?, depth + 1)?);
                StmtKind::While { cond, body }
            }
            Rule::foreach_stmt => {
                let ty = self.decl_type(self.next(span, &mut it)?)?;
                let binding = self.ident(self.next(span, &mut it)?);
                let iterable = self.expr(self.next(span, &mut it)?, depth + 1)?;
                let body = Box::new(self.statement(self.next(span, &mut it)?, depth + 1)?);
                StmtKind::Foreach {
                    ty,
                    binding,
                    iterable,
                    body,
                }
            }
            Rule::return_stmt => match it.next() {
                Some(p) => StmtKind::Return(Some(self.expr(p, depth + 1)?)),
                None => StmtKind::Return(None),
            },
            Rule::throw_stmt => StmtKind::Throw(self.expr(self.next(span, &mut it)?, depth + 1)?),
            Rule::break_stmt => StmtKind::Break,
            Rule::continue_stmt => StmtKind::Continue,
            Rule::empty_stmt => StmtKind::Empty,
            Rule::declaration => {
                let ty = self.decl_type(self.next(span, &mut it)?)?;
                let name = self.ident(self.next(span, &mut it)?);
                let init = match it.next() {
                    Some(p) => Some(self.expr(p, depth + 1)?),
                    None => None,
                };
                StmtKind::Declare { ty, name, init }
            }
            Rule::assignment => {
                let target = self.assign_target(self.next(span, &mut it)?, depth + 1)?;
                let op_pair = self.next(span, &mut it)?;
                let op = AssignOp::parse(op_pair.as_str()).ok_or_else(|| self.malformed(&op_pair))?;
                let value = self.expr(self.next(span, &mut it)?, depth + 1)?;
                StmtKind::Assign { target, op, value }
            }
            Rule::expr_stmt => StmtKind::Expr(self.expr(self.next(span, &mut it)?, depth + 1)?),
            _ => return Err(self.malformed(&pair)),
        };
        Ok(Stmt { kind, span })
    }

    fn decl_type(&self, pair: Pair<Rule>) -> Result<DeclType, Diagnostic> {
        DeclType::parse(pair.as_str()).ok_or_else(|| self.malformed(&pair))
    }

    fn ident(&self, pair: Pair<Rule>) -> Ident {
        Ident {
            name: pair.as_str().to_string(),
            span: self.span(&pair),
        }
    }

    fn assign_target(&self, pair: Pair<Rule>, depth: usize) -> Result<AssignTarget, Diagnostic> {
        let span = self.span(&pair);
        let mut it = pair.into_inner();
        let root = self.ident(self.next(span, &mut it)?);
        let mut path = Vec::new();
        for accessor in it {
            path.push(match accessor.as_rule() {
                Rule::index => {
                    let inner = self.next(span, &mut accessor.into_inner())?;
                    Accessor::Index(self.expr(inner, depth + 1)?)
                }
                Rule::member => {
                    let inner = self.next(span, &mut accessor.into_inner())?;
                    Accessor::Member(self.ident(inner))
                }
                _ => return Err(self.malformed(&accessor)),
            });
        }
        Ok(AssignTarget { root, path })
    }

    fn expr(&self, pair: Pair<Rule>, depth: usize) -> Result<Expr, Diagnostic> {
        let span = self.span(&pair);
        if depth > MAX_DEPTH {
            return Err(too_deep(span));
        }
        match pair.as_rule() {
            Rule::expr => {
                let mut it = pair.into_inner();
                let head = self.expr(self.next(span, &mut it)?, depth + 1)?;
                match (it.next(), it.next()) {
                    (Some(then), Some(otherwise)) => Ok(Expr {
                        kind: ExprKind::Ternary {
                            cond: Box::new(head),
                            then: Box::new(self.expr(then, depth + 1)?),
                            otherwise: Box::new(self.expr(otherwise, depth + 1)?),
                        },
                        span,
                    }),
                    _ => Ok(head),
                }
            }
            Rule::or_expr
            | Rule::and_expr
            | Rule::eq_expr
            | Rule::cmp_expr
            | Rule::add_expr
            | Rule::mul_expr => self.binary_chain(pair, depth),
            Rule::unary => self.unary(pair, depth),
            Rule::postfix => self.postfix(pair, depth),
            Rule::int_lit => {
                let value = pair.as_str().parse::<i64>().map_err(|_| {
                    Diagnostic::error(
                        codes::CONSTANT_TOO_LARGE,
                        "Integral constant is too large",
                        span.into(),
                    )
                })?;
                Ok(literal(Literal::Int(value), span))
            }
            Rule::float_lit => {
                let value = pair.as_str().parse::<f64>().map_err(|_| self.malformed(&pair))?;
                Ok(literal(Literal::Float(value), span))
            }
            Rule::string_lit => {
                let body = self.next(span, &mut pair.into_inner())?;
                let text = self.unescape(&body)?;
                Ok(literal(Literal::Str(text), span))
            }
            Rule::bool_lit => Ok(literal(Literal::Bool(pair.as_str() == "true"), span)),
            Rule::null_lit => Ok(literal(Literal::Null, span)),
            Rule::ident => Ok(Expr {
                kind: ExprKind::Name(pair.as_str().to_string()),
                span,
            }),
            Rule::list_lit => {
                let items = pair
                    .into_inner()
                    .map(|p| self.expr(p, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr {
                    kind: ExprKind::List(items),
                    span,
                })
            }
            Rule::map_lit => {
                let mut entries = Vec::new();
                for entry in pair.into_inner() {
                    let entry_span = self.span(&entry);
                    let mut it = entry.into_inner();
                    let key = self.expr(self.next(entry_span, &mut it)?, depth + 1)?;
                    let value = self.expr(self.next(entry_span, &mut it)?, depth + 1)?;
                    entries.push((key, value));
                }
                Ok(Expr {
                    kind: ExprKind::Map(entries),
                    span,
                })
            }
            _ => Err(self.malformed(&pair)),
        }
    }

    /// Left-associative fold of `operand (op operand)*`
    fn binary_chain(&self, pair: Pair<Rule>, depth: usize) -> Result<Expr, Diagnostic> {
        let span = self.span(&pair);
        let mut it = pair.into_inner();
        let mut lhs = self.expr(self.next(span, &mut it)?, depth + 1)?;
        let mut chain = depth;
        while let Some(op_pair) = it.next() {
            chain += 1;
            if chain > MAX_DEPTH {
                return Err(too_deep(span));
            }
            let op = BinaryOp::parse(op_pair.as_str()).ok_or_else(|| self.malformed(&op_pair))?;
            let rhs = self.expr(self.next(span, &mut it)?, chain + 1)?;
            let joined = lhs.span.to(rhs.span);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span: joined,
            };
        }
        Ok(lhs)
    }

    fn unary(&self, pair: Pair<Rule>, depth: usize) -> Result<Expr, Diagnostic> {
        let span = self.span(&pair);
        let mut ops = Vec::new();
        let mut operand = None;
        for p in pair.into_inner() {
            if p.as_rule() == Rule::unary_op {
                let op = if p.as_str() == "!" { UnaryOp::Not } else { UnaryOp::Neg };
                ops.push((op, self.span(&p)));
            } else if let Some(value) = self.negative_min(&ops, &p) {
                // only -9223372036854775808 gets here: its digits alone overflow
                if let Some((_, op_span)) = ops.pop() {
                    operand = Some(literal(Literal::Int(value), op_span.to(self.span(&p))));
                }
            } else {
                operand = Some(self.expr(p, depth + ops.len() + 1)?);
            }
        }
        let mut expr = operand.ok_or_else(|| {
            Diagnostic::error(codes::SYNTAX_ERROR, "Incomplete construct", span.into())
        })?;
        if depth + ops.len() > MAX_DEPTH {
            return Err(too_deep(span));
        }
        for (op, op_span) in ops.into_iter().rev() {
            let joined = op_span.to(expr.span);
            expr = Expr {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(expr),
                },
                span: joined,
            };
        }
        Ok(expr)
    }

    /// Value of `-<digits>` when the innermost operator is a minus, the
    /// operand is a bare integer literal, and only the negated form fits
    fn negative_min(&self, ops: &[(UnaryOp, Span)], operand: &Pair<Rule>) -> Option<i64> {
        if !matches!(ops.last(), Some((UnaryOp::Neg, _))) {
            return None;
        }
        let digits = match operand.as_rule() {
            Rule::int_lit => operand.clone(),
            Rule::postfix => {
                let mut inner = operand.clone().into_inner();
                let first = inner.next()?;
                if first.as_rule() != Rule::int_lit || inner.next().is_some() {
                    return None;
                }
                first
            }
            _ => return None,
        };
        if digits.as_str().parse::<i64>().is_ok() {
            return None;
        }
        format!("-{}", digits.as_str()).parse::<i64>().ok()
    }

    fn postfix(&self, pair: Pair<Rule>, depth: usize) -> Result<Expr, Diagnostic> {
        let span = self.span(&pair);
        let mut it = pair.into_inner();
        let mut expr = self.expr(self.next(span, &mut it)?, depth + 1)?;
        let mut chain = depth;
        for suffix in it {
            chain += 1;
            if chain > MAX_DEPTH {
                return Err(too_deep(span));
            }
            let suffix_span = self.span(&suffix);
            let joined = expr.span.to(suffix_span);
            let kind = match suffix.as_rule() {
                Rule::call_args => {
                    let args = suffix
                        .into_inner()
                        .map(|p| self.expr(p, chain + 1))
                        .collect::<Result<Vec<_>, _>>()?;
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    }
                }
                Rule::index => {
                    let inner = self.next(suffix_span, &mut suffix.into_inner())?;
                    ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(self.expr(inner, chain + 1)?),
                    }
                }
                Rule::member => {
                    let inner = self.next(suffix_span, &mut suffix.into_inner())?;
                    ExprKind::Member {
                        target: Box::new(expr),
                        name: self.ident(inner),
                    }
                }
                _ => return Err(self.malformed(&suffix)),
            };
            expr = Expr { kind, span: joined };
        }
        Ok(expr)
    }

    fn unescape(&self, body: &Pair<Rule>) -> Result<String, Diagnostic> {
        let raw = body.as_str();
        let base = self.span(body).start;
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw.chars().enumerate();
        while let Some((i, c)) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            let Some((_, escaped)) = chars.next() else {
                break;
            };
            out.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                '\\' => '\\',
                '"' => '"',
                '\'' => '\'',
                other => {
                    return Err(Diagnostic::error(
                        codes::BAD_ESCAPE,
                        format!("Unrecognized escape sequence '\\{}'", other),
                        SourceSpan::new(base + i, base + i + 2),
                    ))
                }
            });
        }
        Ok(out)
    }
}

fn literal(lit: Literal, span: Span) -> Expr {
    Expr {
        kind: ExprKind::Literal(lit),
        span,
    }
}
