//! Restricted condition language for alert rules
//!
//! Rule conditions are small boolean expressions such as
//! `successRate < 0.8 && status == "running"`. They are parsed into an
//! expression tree and interpreted against an [`EvalContext`]; only the
//! whitelisted metric fields in [`Field`] can be referenced.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::models::MetricsSnapshot;

/// Nesting limit for parentheses and `!`
const MAX_DEPTH: usize = 32;

/// Limit on comparisons and values in one condition
const MAX_TERMS: usize = 256;

/// Metric fields a condition may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// `status`, one of `running`, `stopped`, `failed`
    Status,
    /// `successRate`
    SuccessRate,
    /// `executionTime`, in milliseconds
    ExecutionTime,
    /// `totalTokens`
    TotalTokens,
    /// `errorCount`, optional
    ErrorCount,
    /// `cpuUsage`, optional
    CpuUsage,
    /// `memoryUsage`, optional
    MemoryUsage,
}

impl Field {
    /// Every referenceable field
    pub const ALL: [Field; 7] = [
        Field::Status,
        Field::SuccessRate,
        Field::ExecutionTime,
        Field::TotalTokens,
        Field::ErrorCount,
        Field::CpuUsage,
        Field::MemoryUsage,
    ];

    /// Identifier used in condition text
    pub fn name(&self) -> &'static str {
        match self {
            Field::Status => "status",
            Field::SuccessRate => "successRate",
            Field::ExecutionTime => "executionTime",
            Field::TotalTokens => "totalTokens",
            Field::ErrorCount => "errorCount",
            Field::CpuUsage => "cpuUsage",
            Field::MemoryUsage => "memoryUsage",
        }
    }

    /// Resolve an identifier against the whitelist
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// A runtime value inside a condition
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numeric metric or literal
    Number(f64),
    /// String literal or `status`
    Str(String),
    /// `true` / `false`
    Bool(bool),
    /// The `null` literal
    Null,
    /// Optional metric that was not sampled, or the `undefined` literal
    Missing,
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Null | Value::Missing => false,
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Missing)
    }

    /// `==`: `null` and a missing value are equal to each other
    fn loosely_equals(&self, other: &Value) -> bool {
        (self.is_nullish() && other.is_nullish()) || self.strictly_equals(other)
    }

    /// `===`: same kind and same value
    fn strictly_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) | (Value::Missing, Value::Missing) => true,
            _ => false,
        }
    }

    fn partial_cmp_same_kind(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Missing, Into::into)
    }
}

/// Field bindings a condition is evaluated against
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    values: BTreeMap<Field, Value>,
}

impl EvalContext {
    /// Bind `field` to `value`
    pub fn with(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    /// Value bound to `field`, `Missing` when unbound
    pub fn get(&self, field: Field) -> Value {
        self.values.get(&field).cloned().unwrap_or(Value::Missing)
    }
}

impl From<&MetricsSnapshot> for EvalContext {
    fn from(s: &MetricsSnapshot) -> Self {
        EvalContext::default()
            .with(Field::Status, s.status.as_str())
            .with(Field::SuccessRate, s.success_rate)
            .with(Field::ExecutionTime, s.execution_time)
            .with(Field::TotalTokens, s.total_tokens as f64)
            .with(Field::ErrorCount, s.error_count.map(|c| c as f64))
            .with(Field::CpuUsage, s.cpu_usage)
            .with(Field::MemoryUsage, s.memory_usage)
    }
}

/// Condition parse failures.
///
/// Every `pos` is a byte offset into the condition text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[allow(missing_docs)]
pub enum ConditionError {
    /// Nothing but whitespace
    #[error("empty condition")]
    Empty,

    /// Character outside the language
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    /// String literal without a closing quote
    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },

    /// Digits that do not form a number
    #[error("invalid number '{text}' at {pos}")]
    InvalidNumber { text: String, pos: usize },

    /// Identifier that is not a metric field
    #[error("unknown identifier '{name}' at {pos}")]
    UnknownIdentifier { name: String, pos: usize },

    /// Token out of place
    #[error("unexpected {found} at {pos}, expected {expected}")]
    Unexpected {
        found: String,
        expected: &'static str,
        pos: usize,
    },

    /// More than 32 nested parentheses or `!`
    #[error("condition nested too deeply")]
    TooDeep,

    /// More comparisons and values than the parser accepts
    #[error("condition has more than {max} terms")]
    TooLong { max: usize },
}

/// Comparison operators. Equality never coerces between kinds; the loose
/// forms only treat `null` and a missing value as equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `===`
    StrictEq,
    /// `!==`
    StrictNe,
}

impl CmpOp {
    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};

        match self {
            CmpOp::Eq => lhs.loosely_equals(rhs),
            CmpOp::Ne => !lhs.loosely_equals(rhs),
            CmpOp::StrictEq => lhs.strictly_equals(rhs),
            CmpOp::StrictNe => !lhs.strictly_equals(rhs),
            CmpOp::Lt => matches!(lhs.partial_cmp_same_kind(rhs), Some(Less)),
            CmpOp::Gt => matches!(lhs.partial_cmp_same_kind(rhs), Some(Greater)),
            CmpOp::Le => matches!(lhs.partial_cmp_same_kind(rhs), Some(Less | Equal)),
            CmpOp::Ge => matches!(lhs.partial_cmp_same_kind(rhs), Some(Greater | Equal)),
        }
    }
}

/// Parsed condition tree. `&&` and `||` chains are flattened into one
/// node, so tree depth only grows with parentheses and `!`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant value
    Literal(Value),
    /// Metric field reference
    Field(Field),
    /// Binary comparison
    Compare {
        /// Operator
        op: CmpOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// `!`
    Not(Box<Expr>),
    /// Every operand is truthy
    And(Vec<Expr>),
    /// Some operand is truthy
    Or(Vec<Expr>),
}

impl Expr {
    fn value(&self, ctx: &EvalContext) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Field(f) => ctx.get(*f),
            _ => Value::Bool(self.test(ctx)),
        }
    }

    fn test(&self, ctx: &EvalContext) -> bool {
        match self {
            Expr::Literal(v) => v.truthy(),
            Expr::Field(f) => ctx.get(*f).truthy(),
            Expr::Compare { op, lhs, rhs } => op.apply(&lhs.value(ctx), &rhs.value(ctx)),
            Expr::Not(inner) => !inner.test(ctx),
            Expr::And(terms) => terms.iter().all(|t| t.test(ctx)),
            Expr::Or(terms) => terms.iter().any(|t| t.test(ctx)),
        }
    }
}

/// A parsed rule condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parse condition text
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = lex(source)?;
        if tokens.is_empty() {
            return Err(ConditionError::Empty);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            terms: 0,
            end: source.len(),
        };
        let expr = parser.or_expr()?;

        if let Some((tok, pos)) = parser.peek_with_pos() {
            return Err(ConditionError::Unexpected {
                found: tok.to_string(),
                expected: "end of condition",
                pos,
            });
        }

        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Condition text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `ctx`
    pub fn matches(&self, ctx: &EvalContext) -> bool {
        self.expr.test(ctx)
    }
}

/// Evaluate condition text against `ctx`.
///
/// Conditions that fail to parse are logged and evaluate to `false`.
pub fn evaluate(condition: &str, ctx: &EvalContext) -> bool {
    match Condition::parse(condition) {
        Ok(parsed) => parsed.matches(ctx),
        Err(e) => {
            warn!(condition = %condition, error = %e, "Error evaluating condition");
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    Null,
    Undefined,
    LParen,
    RParen,
    Not,
    Minus,
    And,
    Or,
    Cmp(CmpOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Number(n) => write!(f, "number {n}"),
            Token::Str(s) => write!(f, "string \"{s}\""),
            Token::True => f.write_str("'true'"),
            Token::False => f.write_str("'false'"),
            Token::Null => f.write_str("'null'"),
            Token::Undefined => f.write_str("'undefined'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Not => f.write_str("'!'"),
            Token::Minus => f.write_str("'-'"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Cmp(op) => write!(f, "operator {op:?}"),
        }
    }
}

fn lex(src: &str) -> Result<Vec<(Token, usize)>, ConditionError> {
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    // true when the character at index `i` is `c`
    let at = |i: usize, c: char| chars.get(i).is_some_and(|&(_, ch)| ch == c);

    while i < chars.len() {
        let (pos, ch) = chars[i];

        match ch {
            c if c.is_whitespace() => {
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, pos));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, pos));
                i += 1;
            }
            '&' if at(i + 1, '&') => {
                tokens.push((Token::And, pos));
                i += 2;
            }
            '|' if at(i + 1, '|') => {
                tokens.push((Token::Or, pos));
                i += 2;
            }
            '=' if at(i + 1, '=') => {
                let strict = at(i + 2, '=');
                let op = if strict { CmpOp::StrictEq } else { CmpOp::Eq };
                tokens.push((Token::Cmp(op), pos));
                i += if strict { 3 } else { 2 };
            }
            '!' if at(i + 1, '=') => {
                let strict = at(i + 2, '=');
                let op = if strict { CmpOp::StrictNe } else { CmpOp::Ne };
                tokens.push((Token::Cmp(op), pos));
                i += if strict { 3 } else { 2 };
            }
            '!' => {
                tokens.push((Token::Not, pos));
                i += 1;
            }
            '<' | '>' => {
                let or_equal = at(i + 1, '=');
                let op = match (ch, or_equal) {
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    ('>', false) => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                tokens.push((Token::Cmp(op), pos));
                i += if or_equal { 2 } else { 1 };
            }
            '"' | '\'' => {
                let quote = ch;
                let mut value = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => return Err(ConditionError::UnterminatedString { pos }),
                        Some(&(_, c)) if c == quote => break,
                        Some(&(_, '\\')) => {
                            let Some(&(_, escaped)) = chars.get(j + 1) else {
                                return Err(ConditionError::UnterminatedString { pos });
                            };
                            value.push(escaped);
                            j += 2;
                        }
                        Some(&(_, c)) => {
                            value.push(c);
                            j += 1;
                        }
                    }
                }
                tokens.push((Token::Str(value), pos));
                i = j + 1;
            }
            c if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|&(_, d)| d.is_ascii_digit())) => {
                let mut j = i;
                while chars
                    .get(j)
                    .is_some_and(|&(_, d)| d.is_ascii_alphanumeric() || d == '.' || d == '_')
                {
                    // exponent sign, as in 1e-3
                    if matches!(chars[j].1, 'e' | 'E') && (at(j + 1, '-') || at(j + 1, '+')) {
                        j += 1;
                    }
                    j += 1;
                }
                let end = chars.get(j).map_or(src.len(), |&(p, _)| p);
                let text = &src[pos..end];
                let number = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError::InvalidNumber {
                        text: text.to_string(),
                        pos,
                    })?;
                tokens.push((Token::Number(number), pos));
                i = j;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let mut j = i;
                while chars
                    .get(j)
                    .is_some_and(|&(_, d)| d.is_ascii_alphanumeric() || d == '_' || d == '$')
                {
                    j += 1;
                }
                let end = chars.get(j).map_or(src.len(), |&(p, _)| p);
                let word = &src[pos..end];
                let token = match word {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "undefined" => Token::Undefined,
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push((token, pos));
                i = j;
            }
            other => return Err(ConditionError::UnexpectedChar { ch: other, pos }),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    terms: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_with_pos(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, p)| (t, *p))
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn unexpected(&self, expected: &'static str) -> ConditionError {
        match self.peek_with_pos() {
            Some((tok, pos)) => ConditionError::Unexpected {
                found: tok.to_string(),
                expected,
                pos,
            },
            None => ConditionError::Unexpected {
                found: "end of condition".to_string(),
                expected,
                pos: self.end,
            },
        }
    }

    fn enter(&mut self) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionError::TooDeep);
        }
        Ok(())
    }

    fn or_expr(&mut self) -> Result<Expr, ConditionError> {
        let mut terms = vec![self.and_expr()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            terms.push(self.and_expr()?);
        }
        Ok(if terms.len() == 1 {
            terms.swap_remove(0)
        } else {
            Expr::Or(terms)
        })
    }

    fn and_expr(&mut self) -> Result<Expr, ConditionError> {
        let mut terms = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            terms.push(self.unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.swap_remove(0)
        } else {
            Expr::And(terms)
        })
    }

    fn unary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            self.enter()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ConditionError> {
        let lhs = self.operand()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.operand()?;
            return Ok(Expr::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            });
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<Expr, ConditionError> {
        self.terms += 1;
        if self.terms > MAX_TERMS {
            return Err(ConditionError::TooLong { max: MAX_TERMS });
        }

        let Some((token, pos)) = self.next() else {
            return Err(self.unexpected("a value"));
        };

        match token {
            Token::LParen => {
                self.enter()?;
                let inner = self.or_expr()?;
                self.depth -= 1;
                if self.peek() == Some(&Token::RParen) {
                    self.pos += 1;
                    Ok(inner)
                } else {
                    Err(self.unexpected("')'"))
                }
            }
            Token::Ident(name) => Field::from_name(&name)
                .map(Expr::Field)
                .ok_or(ConditionError::UnknownIdentifier { name, pos }),
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Minus => match self.peek() {
                Some(&Token::Number(n)) => {
                    self.pos += 1;
                    Ok(Expr::Literal(Value::Number(-n)))
                }
                _ => Err(self.unexpected("a number after '-'")),
            },
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Undefined => Ok(Expr::Literal(Value::Missing)),
            other => Err(ConditionError::Unexpected {
                found: other.to_string(),
                expected: "a value",
                pos,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentStatus;

    fn ctx() -> EvalContext {
        let snapshot = MetricsSnapshot::new("a1", "Agent", AgentStatus::Running, 0.75, 1000.0, 5000);
        EvalContext::from(&snapshot)
    }

    #[test]
    fn test_default_rule_conditions() {
        let ctx = ctx();
        assert!(!evaluate(r#"status === "failed""#, &ctx));
        assert!(evaluate("successRate < 0.8", &ctx));
        assert!(!evaluate("executionTime > 30000", &ctx));
        assert!(!evaluate("totalTokens > 50000", &ctx));
    }

    #[test]
    fn test_operators() {
        let ctx = ctx();
        assert!(evaluate("executionTime >= 1000", &ctx));
        assert!(evaluate("executionTime <= 1000", &ctx));
        assert!(evaluate("executionTime == 1000", &ctx));
        assert!(!evaluate("executionTime != 1000", &ctx));
        assert!(evaluate("status !== 'failed'", &ctx));
        assert!(evaluate("status == 'running'", &ctx));
    }

    #[test]
    fn test_logical_composition() {
        let ctx = ctx();
        assert!(evaluate("successRate < 0.8 && status == 'running'", &ctx));
        assert!(!evaluate("successRate < 0.8 && status == 'failed'", &ctx));
        assert!(evaluate("status == 'failed' || totalTokens < 10000", &ctx));
        assert!(evaluate("!(status == 'failed')", &ctx));
        // && binds tighter than ||
        assert!(evaluate("true || false && false", &ctx));
        assert!(!evaluate("(true || false) && false", &ctx));
    }

    #[test]
    fn test_missing_optional_fields_never_order() {
        let ctx = ctx();
        assert!(!evaluate("errorCount > 5", &ctx));
        assert!(!evaluate("errorCount < 5", &ctx));
        assert!(evaluate("errorCount != 5", &ctx));
        assert!(evaluate("cpuUsage == null", &ctx));

        let with_errors = ctx.with(Field::ErrorCount, 7.0);
        assert!(evaluate("errorCount > 5", &with_errors));
    }

    #[test]
    fn test_mixed_kinds_do_not_coerce() {
        let ctx = ctx();
        assert!(!evaluate("status > 3", &ctx));
        assert!(!evaluate("executionTime == '1000'", &ctx));
    }

    #[test]
    fn test_numbers() {
        let ctx = EvalContext::default().with(Field::CpuUsage, -2.5);
        assert!(evaluate("cpuUsage < -1", &ctx));
        assert!(evaluate("cpuUsage > -2.6e0", &ctx));
        assert!(evaluate("cpuUsage < .5", &ctx));
        assert!(evaluate("cpuUsage > -3E+0", &ctx));
    }

    #[test]
    fn test_malformed_conditions_evaluate_false() {
        let ctx = ctx();
        for bad in [
            "",
            "   ",
            "successRate <",
            "successRate < 0.8 &&",
            "(successRate < 0.8",
            "successRate < 0.8)",
            "status = 'failed'",
            "status === \"failed",
            "1 < 2 < 3",
            "successRate & 1",
            "12abc > 1",
            "#",
        ] {
            assert!(!evaluate(bad, &ctx), "expected false for {bad:?}");
            assert!(Condition::parse(bad).is_err(), "expected parse error for {bad:?}");
        }
    }

    #[test]
    fn test_identifiers_outside_whitelist_are_rejected() {
        let err = Condition::parse("require('fs') || true").unwrap_err();
        assert!(matches!(
            err,
            ConditionError::UnknownIdentifier { ref name, pos: 0 } if name == "require"
        ));
        assert!(Condition::parse("process.exit(1)").is_err());

        assert!(matches!(
            Condition::parse("agentId == 'a1'"),
            Err(ConditionError::UnknownIdentifier { .. })
        ));
        assert!(!evaluate("constructor", &ctx()));
    }

    #[test]
    fn test_nesting_is_bounded() {
        let deep = format!("{}true{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(Condition::parse(&deep), Err(ConditionError::TooDeep));

        let fine = format!("{}true{}", "(".repeat(10), ")".repeat(10));
        assert!(Condition::parse(&fine).unwrap().matches(&EvalContext::default()));
    }

    #[test]
    fn test_long_chains_are_rejected() {
        let ctx = ctx();
        let chain = vec!["successRate < 0.8"; 50_000].join(" && ");

        assert_eq!(
            Condition::parse(&chain),
            Err(ConditionError::TooLong { max: MAX_TERMS })
        );
        assert!(!evaluate(&chain, &ctx));
    }

    #[test]
    fn test_chains_are_flat() {
        let ctx = ctx();
        let chain = vec!["successRate < 0.8"; 100].join(" && ");
        let parsed = Condition::parse(&chain).unwrap();

        assert!(matches!(&parsed.expr, Expr::And(terms) if terms.len() == 100));
        assert!(parsed.matches(&ctx));

        let mixed = format!("{} || status == 'failed'", vec!["totalTokens > 1"; 50].join(" && "));
        assert!(matches!(
            &Condition::parse(&mixed).unwrap().expr,
            Expr::Or(terms) if terms.len() == 2
        ));
        assert!(evaluate(&mixed, &ctx));
    }

    #[test]
    fn test_strict_equality_separates_null_and_undefined() {
        let ctx = ctx();
        assert!(!evaluate("cpuUsage === null", &ctx));
        assert!(evaluate("cpuUsage !== null", &ctx));
        assert!(evaluate("cpuUsage === undefined", &ctx));
        assert!(evaluate("cpuUsage == null", &ctx));
        assert!(evaluate("cpuUsage == undefined", &ctx));
        assert!(evaluate("null === null", &ctx));
        assert!(!evaluate("null === undefined", &ctx));
        assert!(evaluate("null == undefined", &ctx));

        let sampled = ctx.with(Field::CpuUsage, 0.5);
        assert!(!evaluate("cpuUsage == null", &sampled));
        assert!(evaluate("cpuUsage === 0.5", &sampled));
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_name(field.name()), Some(field));
        }
        assert_eq!(Field::from_name("agentName"), None);
    }
}
