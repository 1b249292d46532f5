//! Guard, cache, assumption and limit expressions.
//!
//! A front end hands expressions over already parsed. This module only
//! evaluates them against an [`Env`] of bound names and a
//! [`FunctionTable`] of host functions.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tessel_ir::{Name, StringInterner};
use tessel_types::Value;

/// Binary operators.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    pub fn as_symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
        }
    }
}

/// A parsed expression.
///
/// Equality is structural; two guards are "the same guard" exactly when
/// their expressions compare equal.
#[derive(Clone, PartialEq, Debug)]
pub enum Expr {
    Const(Value),
    Var(Name),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Name,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn var(name: Name) -> Expr {
        Expr::Var(name)
    }

    pub fn int(value: i32) -> Expr {
        Expr::Const(Value::Int(value))
    }

    pub fn bool(value: bool) -> Expr {
        Expr::Const(Value::Bool(value))
    }

    pub fn negated(inner: Expr) -> Expr {
        Expr::Not(Box::new(inner))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(func: Name, args: Vec<Expr>) -> Expr {
        Expr::Call { func, args }
    }

    /// Free variables in order of first occurrence.
    pub fn free_vars(&self) -> SmallVec<[Name; 4]> {
        let mut out = SmallVec::new();
        self.walk(&mut |e| {
            if let Expr::Var(name) = e {
                if !out.contains(name) {
                    out.push(*name);
                }
            }
        });
        out
    }

    /// Host functions called anywhere in the expression.
    pub fn called_functions(&self) -> SmallVec<[Name; 2]> {
        let mut out = SmallVec::new();
        self.walk(&mut |e| {
            if let Expr::Call { func, .. } = e {
                if !out.contains(func) {
                    out.push(*func);
                }
            }
        });
        out
    }

    /// True if the expression reads no names and calls only pure functions.
    pub fn is_constant(&self, functions: &FunctionTable) -> bool {
        self.free_vars().is_empty()
            && self
                .called_functions()
                .iter()
                .all(|f| functions.purity(*f) == Some(Purity::Pure))
    }

    /// True if every call is to a pure function.
    pub fn is_pure(&self, functions: &FunctionTable) -> bool {
        self.called_functions()
            .iter()
            .all(|f| functions.purity(*f) == Some(Purity::Pure))
    }

    fn walk(&self, visit: &mut impl FnMut(&Expr)) {
        visit(self);
        match self {
            Expr::Const(_) | Expr::Var(_) => {}
            Expr::Not(inner) => inner.walk(visit),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
        }
    }

    /// Evaluate against bound names and host functions.
    pub fn eval(&self, env: &Env, functions: &FunctionTable) -> Result<Value, EvalError> {
        match self {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Var(name) => env.get(*name).cloned().ok_or(EvalError::UnboundName(*name)),
            Expr::Not(inner) => {
                let value = inner.eval(env, functions)?;
                expect_bool("!", &value).map(|b| Value::Bool(!b))
            }
            Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, env, functions),
            Expr::Call { func, args } => {
                let host = functions
                    .get(*func)
                    .ok_or(EvalError::UnknownFunction(*func))?;
                let values = args
                    .iter()
                    .map(|arg| arg.eval(env, functions))
                    .collect::<Result<SmallVec<[Value; 4]>, _>>()?;
                (host.func)(&values).map_err(|message| EvalError::Host {
                    func: *func,
                    message,
                })
            }
        }
    }

    /// Evaluate and require a boolean result.
    pub fn eval_bool(&self, env: &Env, functions: &FunctionTable) -> Result<bool, EvalError> {
        let value = self.eval(env, functions)?;
        expect_bool("guard", &value)
    }

    /// Render with names resolved through an interner.
    pub fn display<'a>(&'a self, interner: &'a StringInterner) -> ExprDisplay<'a> {
        ExprDisplay {
            expr: self,
            interner,
        }
    }
}

fn expect_bool(op: &'static str, value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or(EvalError::TypeMismatch {
        op,
        expected: "boolean",
        found: value.kind_name(),
    })
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    env: &Env,
    functions: &FunctionTable,
) -> Result<Value, EvalError> {
    // Short-circuit first: the right operand may not even be well typed.
    match op {
        BinaryOp::And => {
            let l = expect_bool("&&", &lhs.eval(env, functions)?)?;
            if !l {
                return Ok(Value::Bool(false));
            }
            return expect_bool("&&", &rhs.eval(env, functions)?).map(Value::Bool);
        }
        BinaryOp::Or => {
            let l = expect_bool("||", &lhs.eval(env, functions)?)?;
            if l {
                return Ok(Value::Bool(true));
            }
            return expect_bool("||", &rhs.eval(env, functions)?).map(Value::Bool);
        }
        _ => {}
    }

    let l = lhs.eval(env, functions)?;
    let r = rhs.eval(env, functions)?;
    let symbol = op.as_symbol();
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(&l, &r).ok_or(EvalError::TypeMismatch {
                op: symbol,
                expected: "comparable operands",
                found: r.kind_name(),
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => arithmetic(op, &l, &r),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// Numeric values compare across widths; everything else by identity of kind.
#[allow(clippy::float_cmp, reason = "guards compare exact values")]
fn values_equal(l: &Value, r: &Value) -> bool {
    match (l.as_i64(), r.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => match (l, r) {
            (Value::Double(_), _) | (_, Value::Double(_)) => {
                matches!((l.as_f64_exact(), r.as_f64_exact()), (Some(a), Some(b)) if a == b)
            }
            _ => l == r,
        },
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        return Some(a.cmp(b));
    }
    l.as_f64_exact()?.partial_cmp(&r.as_f64_exact()?)
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    let symbol = op.as_symbol();
    let overflow = || EvalError::Overflow { op: symbol };
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let out = match op {
                BinaryOp::Add => a.checked_add(*b),
                BinaryOp::Sub => a.checked_sub(*b),
                _ => a.checked_mul(*b),
            };
            out.map(Value::Int).ok_or_else(overflow)
        }
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
            Ok(Value::string(format!("{a}{b}")))
        }
        _ => {
            if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
                let out = match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    _ => a.checked_mul(b),
                };
                return out.map(Value::Long).ok_or_else(overflow);
            }
            let mismatch = |v: &Value| EvalError::TypeMismatch {
                op: symbol,
                expected: "numeric operands",
                found: v.kind_name(),
            };
            let a = l.as_f64_exact().ok_or_else(|| mismatch(l))?;
            let b = r.as_f64_exact().ok_or_else(|| mismatch(r))?;
            Ok(Value::Double(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                _ => a * b,
            }))
        }
    }
}

/// Expression evaluation failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("unbound name {0:?}")]
    UnboundName(Name),
    #[error("unknown host function {0:?}")]
    UnknownFunction(Name),
    #[error("`{op}` expected {expected}, found {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("arithmetic overflow in `{op}`")]
    Overflow { op: &'static str },
    #[error("host function {func:?} failed: {message}")]
    Host { func: Name, message: String },
}

// ── Environment ─────────────────────────────────────────────────────

/// Names bound while evaluating one specialization attempt.
///
/// Later bindings shadow earlier ones. [`truncate`](Self::truncate) rolls
/// back to a previous [`len`](Self::len), so a failed attempt can discard
/// what it bound.
#[derive(Clone, Default, Debug)]
pub struct Env {
    slots: SmallVec<[(Name, Value); 8]>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: Name, value: Value) {
        self.slots.push((name, value));
    }

    pub fn get(&self, name: Name) -> Option<&Value> {
        self.slots
            .iter()
            .rev()
            .find_map(|(n, v)| (*n == name).then_some(v))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
    }
}

// ── Host functions ──────────────────────────────────────────────────

/// Whether a host function may be hoisted out of the per-call path.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Purity {
    /// Result depends only on the arguments.
    Pure,
    /// Reads runtime state; must be re-evaluated on every call.
    Dynamic,
}

/// Host function signature.
pub type HostFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// A registered host function.
#[derive(Clone)]
pub struct HostFunction {
    pub name: Name,
    pub purity: Purity,
    pub func: Arc<HostFn>,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("name", &self.name)
            .field("purity", &self.purity)
            .finish_non_exhaustive()
    }
}

/// Host functions callable from expressions.
#[derive(Clone, Default, Debug)]
pub struct FunctionTable {
    functions: FxHashMap<Name, HostFunction>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a host function.
    pub fn register(
        &mut self,
        name: Name,
        purity: Purity,
        func: impl Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.functions.insert(
            name,
            HostFunction {
                name,
                purity,
                func: Arc::new(func),
            },
        );
        self
    }

    pub fn get(&self, name: Name) -> Option<&HostFunction> {
        self.functions.get(&name)
    }

    pub fn purity(&self, name: Name) -> Option<Purity> {
        self.get(name).map(|f| f.purity)
    }

    pub fn contains(&self, name: Name) -> bool {
        self.functions.contains_key(&name)
    }
}

// ── Display ─────────────────────────────────────────────────────────

/// An [`Expr`] paired with the interner needed to print its names.
pub struct ExprDisplay<'a> {
    expr: &'a Expr,
    interner: &'a StringInterner,
}

impl<'a> ExprDisplay<'a> {
    fn nested(&self, expr: &'a Expr) -> ExprDisplay<'a> {
        ExprDisplay {
            expr,
            interner: self.interner,
        }
    }
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr {
            Expr::Const(value) => write!(f, "{value:?}"),
            Expr::Var(name) => f.write_str(self.interner.lookup(*name)),
            Expr::Not(inner) => match **inner {
                Expr::Binary { .. } => write!(f, "!({})", self.nested(inner)),
                _ => write!(f, "!{}", self.nested(inner)),
            },
            Expr::Binary { op, lhs, rhs } => {
                let (lhs, rhs) = (operand(self.nested(lhs)), operand(self.nested(rhs)));
                write!(f, "{lhs} {} {rhs}", op.as_symbol())
            }
            Expr::Call { func, args } => {
                write!(f, "{}(", self.interner.lookup(*func))?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", self.nested(arg))?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Parenthesize nested binary operands.
fn operand(inner: ExprDisplay<'_>) -> String {
    if matches!(inner.expr, Expr::Binary { .. }) {
        format!("({inner})")
    } else {
        inner.to_string()
    }
}
