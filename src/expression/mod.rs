//! FILTER and BIND expressions
//!
//! One expression tree serves every stage a condition passes through:
//! parsed text (`ParsedTerm` leaves), caller-built rules and queries
//! (`RuleTerm` / `QueryTerm` leaves) and compiled plans ([`Operand`] leaves
//! over variable slots and resources). Values are RDF terms throughout;
//! numeric, boolean and string views are taken on demand.

mod eval;
mod functions;
mod value;

pub(crate) use eval::Evaluator;
pub use functions::Function;
pub use value::Number;

use crate::dictionary::DictionaryError;
use crate::rdf::{ResourceId, Term};
use std::convert::Infallible;
use std::fmt;
use thiserror::Error;

/// Expression evaluation errors. A FILTER whose expression fails is false;
/// a BIND whose expression fails produces no binding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("type error: {0}")]
    Type(String),

    #[error("unknown function {0}")]
    UnknownFunction(String),

    #[error("{function} takes {expected} arguments, got {found}")]
    Arity {
        function: Function,
        expected: String,
        found: usize,
    },

    #[error("invalid regular expression: {0}")]
    Regex(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    #[error("variable in slot {0} is unbound")]
    Unbound(usize),

    #[error("dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),
}

pub type ExpressionResult<T> = Result<T, ExpressionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical negation (!)
    Not,
    /// Numeric negation (-)
    Minus,
    /// Numeric identity (+)
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "=" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            _ => return None,
        };
        Some(op)
    }
}

/// Expression tree over leaves of type `L`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression<L> {
    /// Variable or constant
    Leaf(L),
    Unary {
        op: UnaryOp,
        expr: Box<Expression<L>>,
    },
    Binary {
        left: Box<Expression<L>>,
        op: BinaryOp,
        right: Box<Expression<L>>,
    },
    Call {
        function: Function,
        args: Vec<Expression<L>>,
    },
}

impl<L> Expression<L> {
    pub fn leaf(leaf: impl Into<L>) -> Self {
        Expression::Leaf(leaf.into())
    }

    pub fn unary(op: UnaryOp, expr: Expression<L>) -> Self {
        Expression::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn binary(left: Expression<L>, op: BinaryOp, right: Expression<L>) -> Self {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Function call, checking the argument count
    pub fn call(function: Function, args: Vec<Expression<L>>) -> ExpressionResult<Self> {
        function.check_arity(args.len())?;
        Ok(Expression::Call { function, args })
    }

    /// Leaves in left-to-right order
    pub fn leaves(&self) -> Vec<&L> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a L>) {
        match self {
            Expression::Leaf(leaf) => out.push(leaf),
            Expression::Unary { expr, .. } => expr.collect_leaves(out),
            Expression::Binary { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
            Expression::Call { args, .. } => args.iter().for_each(|arg| arg.collect_leaves(out)),
        }
    }

    /// Rebuild the tree with every leaf converted by `f`
    pub fn try_map<M, E>(&self, f: &mut impl FnMut(&L) -> Result<M, E>) -> Result<Expression<M>, E> {
        Ok(match self {
            Expression::Leaf(leaf) => Expression::Leaf(f(leaf)?),
            Expression::Unary { op, expr } => Expression::Unary {
                op: *op,
                expr: Box::new(expr.try_map(f)?),
            },
            Expression::Binary { left, op, right } => Expression::Binary {
                left: Box::new(left.try_map(f)?),
                op: *op,
                right: Box::new(right.try_map(f)?),
            },
            Expression::Call { function, args } => Expression::Call {
                function: *function,
                args: args.iter().map(|arg| arg.try_map(f)).collect::<Result<_, E>>()?,
            },
        })
    }

    /// Render in the text syntax; binary operations are fully parenthesized
    pub fn render<E>(&self, leaf: &mut impl FnMut(&L) -> Result<String, E>) -> Result<String, E> {
        Ok(match self {
            Expression::Leaf(l) => leaf(l)?,
            Expression::Unary { op, expr } => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Minus => "-",
                    UnaryOp::Plus => "+",
                };
                format!("{}{}", symbol, expr.render(leaf)?)
            }
            Expression::Binary { left, op, right } => {
                format!("({} {} {})", left.render(leaf)?, op.symbol(), right.render(leaf)?)
            }
            Expression::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.render(leaf))
                    .collect::<Result<Vec<_>, E>>()?;
                format!("{}({})", function.name(), args.join(", "))
            }
        })
    }
}

impl<L: fmt::Display> fmt::Display for Expression<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.render(&mut |leaf: &L| Ok::<_, Infallible>(leaf.to_string()));
        match text {
            Ok(text) => f.write_str(&text),
            Err(never) => match never {},
        }
    }
}

/// A FILTER or BIND in a rule body, over leaves of type `L`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition<L> {
    /// Keep bindings for which the expression is true
    Filter(Expression<L>),
    /// Bind `variable` to the expression's value; acts as an equality test
    /// when `variable` is already bound
    Bind {
        expression: Expression<L>,
        variable: String,
    },
}

/// Compiled leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Slot in the binding vector
    Variable(usize),
    Resource(ResourceId),
    /// Constant the dictionary has never seen
    Term(Term),
}

impl Operand {
    pub fn variable(&self) -> Option<usize> {
        match self {
            Operand::Variable(v) => Some(*v),
            _ => None,
        }
    }
}

/// Compiled condition of a rule body or query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Builtin {
    Filter(Expression<Operand>),
    Bind {
        expression: Expression<Operand>,
        variable: usize,
    },
}

impl Builtin {
    pub fn expression(&self) -> &Expression<Operand> {
        match self {
            Builtin::Filter(expression) | Builtin::Bind { expression, .. } => expression,
        }
    }

    /// Variables that must be bound before evaluation
    pub fn inputs(&self) -> impl Iterator<Item = usize> + '_ {
        self.expression().leaves().into_iter().filter_map(Operand::variable)
    }

    pub fn output(&self) -> Option<usize> {
        match self {
            Builtin::Filter(_) => None,
            Builtin::Bind { variable, .. } => Some(*variable),
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.expression().leaves().into_iter().filter_map(|leaf| match leaf {
            Operand::Resource(id) => Some(*id),
            _ => None,
        })
    }

    /// Rewrite resource constants through `f`
    pub fn map_resources(&self, f: impl Fn(ResourceId) -> ResourceId) -> Self {
        let mut map = |leaf: &Operand| {
            Ok::<_, Infallible>(match leaf {
                Operand::Resource(id) => Operand::Resource(f(*id)),
                other => other.clone(),
            })
        };
        let expression = match self.expression().try_map(&mut map) {
            Ok(expression) => expression,
            Err(never) => match never {},
        };
        match self {
            Builtin::Filter(_) => Builtin::Filter(expression),
            Builtin::Bind { variable, .. } => Builtin::Bind {
                expression,
                variable: *variable,
            },
        }
    }
}

/// Assign each builtin to the earliest join depth at which its inputs are
/// bound.
///
/// `order` lists the patterns in join order and `bound` the variables bound
/// before the first of them; it is updated as patterns and binds bind more.
/// Stage `d` runs after the first `d` patterns of `order` have matched.
/// Builtins keep their relative order within a stage, so a BIND feeding a
/// later builtin runs first.
pub(crate) fn schedule(
    builtins: &[Builtin],
    pattern_variables: impl Fn(usize) -> Vec<usize>,
    order: &[usize],
    bound: &mut [bool],
) -> Vec<Vec<usize>> {
    let mut pending: Vec<usize> = (0..builtins.len()).collect();
    let mut stages = Vec::with_capacity(order.len() + 1);
    for depth in 0..=order.len() {
        if depth > 0 {
            for v in pattern_variables(order[depth - 1]) {
                bound[v] = true;
            }
        }
        let mut stage = Vec::new();
        while let Some(slot) = pending
            .iter()
            .position(|&b| builtins[b].inputs().all(|v| bound[v]))
        {
            let b = pending.remove(slot);
            if let Some(v) = builtins[b].output() {
                bound[v] = true;
            }
            stage.push(b);
        }
        stages.push(stage);
    }
    // Unreachable for compiled rules and queries, which reject unbound inputs
    if let Some(last) = stages.last_mut() {
        last.extend(pending);
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(v: usize) -> Expression<Operand> {
        Expression::Leaf(Operand::Variable(v))
    }

    #[test]
    fn test_render_parenthesizes_binary_operations() {
        let expr: Expression<String> = Expression::binary(
            Expression::leaf("?x".to_string()),
            BinaryOp::Lt,
            Expression::binary(
                Expression::leaf("1".to_string()),
                BinaryOp::Add,
                Expression::leaf("?y".to_string()),
            ),
        );
        assert_eq!(expr.to_string(), "(?x < (1 + ?y))");

        let call: Expression<String> = Expression::call(Function::StrLen, vec![Expression::leaf("?s".to_string())]).unwrap();
        assert_eq!(call.to_string(), "STRLEN(?s)");
        assert!(Expression::<String>::call(Function::StrLen, vec![]).is_err());
    }

    #[test]
    fn test_schedule_runs_builtins_once_inputs_are_bound() {
        // patterns: 0 binds {0}, 1 binds {1}
        let builtins = vec![
            Builtin::Filter(Expression::binary(var(0), BinaryOp::Lt, var(1))),
            Builtin::Bind {
                expression: var(0),
                variable: 2,
            },
            Builtin::Filter(var(2)),
        ];
        let variables = |p: usize| vec![p];
        let mut bound = vec![false; 3];
        let stages = schedule(&builtins, variables, &[0, 1], &mut bound);
        assert_eq!(stages, vec![vec![], vec![1, 2], vec![0]]);
        assert!(bound.iter().all(|b| *b));
    }

    #[test]
    fn test_map_resources() {
        let builtin = Builtin::Filter(Expression::binary(
            var(0),
            BinaryOp::Eq,
            Expression::Leaf(Operand::Resource(ResourceId(7))),
        ));
        let mapped = builtin.map_resources(|id| if id == ResourceId(7) { ResourceId(3) } else { id });
        assert_eq!(mapped.resources().collect::<Vec<_>>(), vec![ResourceId(3)]);
        assert_eq!(mapped.inputs().collect::<Vec<_>>(), vec![0]);
    }
}
