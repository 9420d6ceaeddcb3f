//! Expression evaluation over a binding vector

use super::value::{self, boolean_term, effective_boolean};
use super::{BinaryOp, ExpressionError, ExpressionResult, Expression, Operand, UnaryOp};
use crate::dictionary::Dictionary;
use crate::rdf::{ResourceId, Term};
use std::cmp::Ordering;

/// Evaluates compiled expressions, reading resources from a dictionary
#[derive(Clone, Copy)]
pub(crate) struct Evaluator<'a> {
    dictionary: &'a Dictionary,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(dictionary: &'a Dictionary) -> Self {
        Self { dictionary }
    }

    pub(crate) fn evaluate(
        &self,
        expr: &Expression<Operand>,
        bindings: &[Option<ResourceId>],
    ) -> ExpressionResult<Term> {
        match expr {
            Expression::Leaf(Operand::Variable(v)) => {
                let id = bindings
                    .get(*v)
                    .copied()
                    .flatten()
                    .ok_or(ExpressionError::Unbound(*v))?;
                Ok(self.dictionary.term_of(id)?)
            }
            Expression::Leaf(Operand::Resource(id)) => Ok(self.dictionary.term_of(*id)?),
            Expression::Leaf(Operand::Term(term)) => Ok(term.clone()),
            Expression::Unary { op, expr } => {
                let operand = self.evaluate(expr, bindings)?;
                match op {
                    UnaryOp::Not => Ok(boolean_term(!effective_boolean(&operand)?)),
                    UnaryOp::Minus => value::arithmetic(&Term::integer(0), BinaryOp::Sub, &operand),
                    UnaryOp::Plus => match value::number(&operand) {
                        Some(_) => Ok(operand),
                        None => Err(ExpressionError::Type(format!("+{} is not numeric", operand))),
                    },
                }
            }
            Expression::Binary { left, op, right } => match op {
                BinaryOp::Or | BinaryOp::And => {
                    let l = self.evaluate(left, bindings).and_then(|t| effective_boolean(&t));
                    let r = self.evaluate(right, bindings).and_then(|t| effective_boolean(&t));
                    // An error is absorbed by a deciding operand on the other side
                    let decisive = *op == BinaryOp::Or;
                    match (l, r) {
                        (Ok(a), _) if a == decisive => Ok(boolean_term(decisive)),
                        (_, Ok(b)) if b == decisive => Ok(boolean_term(decisive)),
                        (Ok(_), Ok(_)) => Ok(boolean_term(!decisive)),
                        (Err(e), _) | (_, Err(e)) => Err(e),
                    }
                }
                _ => {
                    let l = self.evaluate(left, bindings)?;
                    let r = self.evaluate(right, bindings)?;
                    match op {
                        BinaryOp::Eq => Ok(boolean_term(value::equals(&l, &r)?)),
                        BinaryOp::Ne => Ok(boolean_term(!value::equals(&l, &r)?)),
                        BinaryOp::Lt => Ok(boolean_term(value::compare(&l, &r)? == Ordering::Less)),
                        BinaryOp::Le => Ok(boolean_term(value::compare(&l, &r)? != Ordering::Greater)),
                        BinaryOp::Gt => Ok(boolean_term(value::compare(&l, &r)? == Ordering::Greater)),
                        BinaryOp::Ge => Ok(boolean_term(value::compare(&l, &r)? != Ordering::Less)),
                        arithmetic => value::arithmetic(&l, *arithmetic, &r),
                    }
                }
            },
            Expression::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg, bindings))
                    .collect::<ExpressionResult<Vec<_>>>()?;
                function.apply(&args)
            }
        }
    }

    /// FILTER semantics: errors count as false
    pub(crate) fn holds(&self, expr: &Expression<Operand>, bindings: &[Option<ResourceId>]) -> bool {
        self.evaluate(expr, bindings)
            .and_then(|t| effective_boolean(&t))
            .unwrap_or(false)
    }

    /// BIND semantics: the value interned, or `None` when evaluation fails
    pub(crate) fn bind(
        &self,
        expr: &Expression<Operand>,
        bindings: &[Option<ResourceId>],
    ) -> Option<ResourceId> {
        let term = self.evaluate(expr, bindings).ok()?;
        match self.dictionary.resolve_one(&term) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!("BIND value {} not interned: {}", term, e);
                None
            }
        }
    }
}
