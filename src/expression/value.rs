//! Typed views of literal terms and the operations built on them

use super::{ExpressionError, ExpressionResult};
use crate::rdf::{vocab, Term};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::cmp::Ordering;

/// Numeric value, ordered by type promotion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Decimal(f64),
    Double(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Decimal(d) | Number::Double(d) => d,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Number::Integer(_) => 0,
            Number::Decimal(_) => 1,
            Number::Double(_) => 2,
        }
    }

    /// Promote both operands to the wider of their types
    fn promote(a: Number, b: Number) -> (Number, Number) {
        let widen = |n: Number, rank: u8| match (n, rank) {
            (Number::Integer(i), 1) => Number::Decimal(i as f64),
            (n, 2) => Number::Double(n.as_f64()),
            (n, _) => n,
        };
        let rank = a.rank().max(b.rank());
        (widen(a, rank), widen(b, rank))
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    pub fn to_term(self) -> ExpressionResult<Term> {
        Ok(match self {
            Number::Integer(i) => Term::integer(i),
            Number::Decimal(d) if !d.is_finite() => {
                return Err(ExpressionError::Arithmetic(format!("decimal overflow ({})", d)))
            }
            Number::Decimal(d) if d.fract() == 0.0 => Term::literal(format!("{:.1}", d), vocab::XSD_DECIMAL),
            Number::Decimal(d) => Term::literal(d.to_string(), vocab::XSD_DECIMAL),
            Number::Double(d) => Term::literal(format_double(d), vocab::XSD_DOUBLE),
        })
    }

    pub(crate) fn map(self, integer: impl Fn(i64) -> i64, float: impl Fn(f64) -> f64) -> Number {
        match self {
            Number::Integer(i) => Number::Integer(integer(i)),
            Number::Decimal(d) => Number::Decimal(float(d)),
            Number::Double(d) => Number::Double(float(d)),
        }
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d == f64::INFINITY {
        "INF".to_string()
    } else if d == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        format!("{:E}", d)
    }
}

const INTEGER_TYPES: [&str; 13] = [
    vocab::XSD_INTEGER,
    vocab::XSD_NON_NEGATIVE_INTEGER,
    vocab::XSD_POSITIVE_INTEGER,
    vocab::XSD_NON_POSITIVE_INTEGER,
    vocab::XSD_NEGATIVE_INTEGER,
    vocab::XSD_LONG,
    vocab::XSD_INT,
    vocab::XSD_SHORT,
    vocab::XSD_BYTE,
    vocab::XSD_UNSIGNED_LONG,
    vocab::XSD_UNSIGNED_INT,
    vocab::XSD_UNSIGNED_SHORT,
    vocab::XSD_UNSIGNED_BYTE,
];

fn literal_parts(term: &Term) -> Option<(&str, &str)> {
    match term {
        Term::Literal { lexical_form, datatype } => Some((lexical_form, datatype)),
        _ => None,
    }
}

pub fn number(term: &Term) -> Option<Number> {
    let (lexical_form, datatype) = literal_parts(term)?;
    let lexical_form = lexical_form.trim();
    if INTEGER_TYPES.contains(&datatype) {
        // Integers beyond i64 degrade to decimals
        return lexical_form
            .parse::<i64>()
            .map(Number::Integer)
            .or_else(|_| lexical_form.parse::<f64>().map(Number::Decimal))
            .ok();
    }
    match datatype {
        vocab::XSD_DECIMAL => lexical_form.parse::<f64>().ok().map(Number::Decimal),
        vocab::XSD_FLOAT | vocab::XSD_DOUBLE => {
            let value = match lexical_form {
                "INF" | "+INF" => f64::INFINITY,
                "-INF" => f64::NEG_INFINITY,
                "NaN" => f64::NAN,
                other => other.parse::<f64>().ok()?,
            };
            Some(Number::Double(value))
        }
        _ => None,
    }
}

pub fn boolean(term: &Term) -> Option<bool> {
    match literal_parts(term)? {
        ("true" | "1", vocab::XSD_BOOLEAN) => Some(true),
        ("false" | "0", vocab::XSD_BOOLEAN) => Some(false),
        _ => None,
    }
}

/// Text and language tag of a string literal
pub fn string(term: &Term) -> Option<(&str, Option<&str>)> {
    match literal_parts(term)? {
        (text, vocab::XSD_STRING) => Some((text, None)),
        (text, vocab::RDF_PLAIN_LITERAL) => match text.rfind('@') {
            Some(at) if at + 1 < text.len() => Some((&text[..at], Some(&text[at + 1..]))),
            Some(at) => Some((&text[..at], None)),
            None => Some((text, None)),
        },
        _ => None,
    }
}

pub fn boolean_term(value: bool) -> Term {
    Term::literal(if value { "true" } else { "false" }, vocab::XSD_BOOLEAN)
}

pub fn string_term(text: impl Into<String>, language: Option<&str>) -> Term {
    match language {
        Some(tag) => Term::literal(format!("{}@{}", text.into(), tag), vocab::RDF_PLAIN_LITERAL),
        None => Term::string(text),
    }
}

/// SPARQL effective boolean value
pub fn effective_boolean(term: &Term) -> ExpressionResult<bool> {
    if let Some(b) = boolean(term) {
        return Ok(b);
    }
    if let Some((text, _)) = string(term) {
        return Ok(!text.is_empty());
    }
    if let Some(n) = number(term) {
        let value = n.as_f64();
        return Ok(value != 0.0 && !value.is_nan());
    }
    Err(ExpressionError::Type(format!("{} has no boolean value", term)))
}

/// Comparable temporal value; offsets are normalized to UTC and values
/// with and without a timezone never compare
#[derive(Debug, PartialEq)]
enum Temporal {
    DateTime(NaiveDateTime, bool),
    Date(NaiveDate, Option<String>),
    Time(NaiveTime, Option<String>),
}

fn split_timezone(lexical_form: &str) -> (&str, Option<&str>) {
    if let Some(local) = lexical_form.strip_suffix('Z') {
        return (local, Some("+00:00"));
    }
    if lexical_form.len() > 6 {
        let (local, zone) = lexical_form.split_at(lexical_form.len() - 6);
        if zone.starts_with(['+', '-']) && zone.as_bytes()[3] == b':' {
            return (local, Some(zone));
        }
    }
    (lexical_form, None)
}

fn temporal(term: &Term) -> Option<Temporal> {
    let (lexical_form, datatype) = literal_parts(term)?;
    let (local, zone) = split_timezone(lexical_form);
    match datatype {
        vocab::XSD_DATE_TIME => match zone {
            Some(zone) => {
                let value = DateTime::parse_from_str(&format!("{}{}", local, zone), "%Y-%m-%dT%H:%M:%S%.f%:z").ok()?;
                Some(Temporal::DateTime(value.naive_utc(), true))
            }
            None => NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|value| Temporal::DateTime(value, false)),
        },
        vocab::XSD_DATE => NaiveDate::parse_from_str(local, "%Y-%m-%d")
            .ok()
            .map(|value| Temporal::Date(value, zone.map(str::to_string))),
        vocab::XSD_TIME => NaiveTime::parse_from_str(local, "%H:%M:%S%.f")
            .ok()
            .map(|value| Temporal::Time(value, zone.map(str::to_string))),
        _ => None,
    }
}

fn compare_temporal(a: &Temporal, b: &Temporal) -> Option<Ordering> {
    match (a, b) {
        (Temporal::DateTime(x, zx), Temporal::DateTime(y, zy)) if zx == zy => x.partial_cmp(y),
        (Temporal::Date(x, zx), Temporal::Date(y, zy)) if zx == zy => x.partial_cmp(y),
        (Temporal::Time(x, zx), Temporal::Time(y, zy)) if zx == zy => x.partial_cmp(y),
        _ => None,
    }
}

/// Value ordering; `Err` when the terms are not comparable
pub fn compare(a: &Term, b: &Term) -> ExpressionResult<Ordering> {
    let incomparable = || ExpressionError::Type(format!("cannot compare {} with {}", a, b));
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        let (x, y) = Number::promote(x, y);
        return match (x, y) {
            (Number::Integer(i), Number::Integer(j)) => Ok(i.cmp(&j)),
            _ => x.as_f64().partial_cmp(&y.as_f64()).ok_or_else(incomparable),
        };
    }
    if let (Some((x, lx)), Some((y, ly))) = (string(a), string(b)) {
        return if lx == ly { Ok(x.cmp(y)) } else { Err(incomparable()) };
    }
    if let (Some(x), Some(y)) = (boolean(a), boolean(b)) {
        return Ok(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (temporal(a), temporal(b)) {
        return compare_temporal(&x, &y).ok_or_else(incomparable);
    }
    Err(incomparable())
}

/// Value equality: identical terms are equal, comparable literals compare
/// by value and anything else is unequal
pub fn equals(a: &Term, b: &Term) -> ExpressionResult<bool> {
    if a == b {
        return Ok(true);
    }
    if !a.is_literal() || !b.is_literal() {
        return Ok(false);
    }
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        // NaN is unequal to everything
        let (x, y) = Number::promote(x, y);
        return Ok(match (x, y) {
            (Number::Integer(i), Number::Integer(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        });
    }
    match compare(a, b) {
        Ok(ordering) => Ok(ordering == Ordering::Equal),
        Err(_) => Ok(false),
    }
}

pub fn arithmetic(a: &Term, op: super::BinaryOp, b: &Term) -> ExpressionResult<Term> {
    use super::BinaryOp;
    let (Some(x), Some(y)) = (number(a), number(b)) else {
        return Err(ExpressionError::Type(format!("{} {} {} is not numeric", a, op.symbol(), b)));
    };
    let overflow = || ExpressionError::Arithmetic(format!("{} {} {} overflows", a, op.symbol(), b));
    let result = match Number::promote(x, y) {
        (Number::Integer(i), Number::Integer(j)) => match op {
            BinaryOp::Add => Number::Integer(i.checked_add(j).ok_or_else(overflow)?),
            BinaryOp::Sub => Number::Integer(i.checked_sub(j).ok_or_else(overflow)?),
            BinaryOp::Mul => Number::Integer(i.checked_mul(j).ok_or_else(overflow)?),
            BinaryOp::Div if j == 0 => return Err(ExpressionError::Arithmetic("division by zero".into())),
            BinaryOp::Div => Number::Decimal(i as f64 / j as f64),
            _ => return Err(ExpressionError::Type(format!("{} is not arithmetic", op.symbol()))),
        },
        (Number::Decimal(_), Number::Decimal(d)) if op == BinaryOp::Div && d == 0.0 => {
            return Err(ExpressionError::Arithmetic("division by zero".into()))
        }
        (x, y) => {
            let (p, q) = (x.as_f64(), y.as_f64());
            let value = match op {
                BinaryOp::Add => p + q,
                BinaryOp::Sub => p - q,
                BinaryOp::Mul => p * q,
                BinaryOp::Div => p / q,
                _ => return Err(ExpressionError::Type(format!("{} is not arithmetic", op.symbol()))),
            };
            match x {
                Number::Double(_) => Number::Double(value),
                _ => Number::Decimal(value),
            }
        }
    };
    result.to_term()
}
