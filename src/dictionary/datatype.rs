//! Term validation
//!
//! IRIs, blank node labels and language tags are checked by oxiri/oxrdf;
//! literal lexical forms against their datatype's lexical space. Literals
//! with an unrecognised datatype IRI are accepted as opaque values.

use super::{DictionaryError, DictionaryResult};
use crate::rdf::{vocab, Term};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use oxiri::IriRef;
use oxrdf::{BlankNode as OxBlankNode, Literal as OxLiteral};
use regex::Regex;
use std::sync::LazyLock;

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+$").unwrap());

static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").unwrap());

static TIMEZONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Z|[+-](0[0-9]|1[0-4]):[0-5][0-9])$").unwrap());

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?P([0-9]+Y)?([0-9]+M)?([0-9]+D)?(T([0-9]+H)?([0-9]+M)?([0-9]+(\.[0-9]+)?S)?)?$")
        .unwrap()
});

static G_YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]{4,}-(0[1-9]|1[0-2])$").unwrap());
static G_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?[0-9]{4,}$").unwrap());
static G_MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^--(0[1-9]|1[0-2])-(0[1-9]|[12][0-9]|3[01])$").unwrap());
static G_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^---(0[1-9]|[12][0-9]|3[01])$").unwrap());
static G_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^--(0[1-9]|1[0-2])$").unwrap());

/// Check that a term can be interned
pub(crate) fn validate(term: &Term) -> DictionaryResult<()> {
    match term {
        // Relative references such as <a0> are legal terms
        Term::Iri(iri) => IriRef::parse(iri.as_str())
            .map(|_| ())
            .map_err(|e| DictionaryError::InvalidIri(format!("<{}> ({})", iri, e))),
        Term::BlankNode(label) => OxBlankNode::new(label.as_str())
            .map(|_| ())
            .map_err(|e| DictionaryError::InvalidBlankNode(format!("_:{} ({})", label, e))),
        Term::Literal {
            lexical_form,
            datatype,
        } => {
            if is_valid_lexical_form(lexical_form, datatype) {
                Ok(())
            } else {
                Err(DictionaryError::MalformedTerm {
                    lexical_form: lexical_form.clone(),
                    datatype: datatype.clone(),
                })
            }
        }
    }
}

fn is_valid_lexical_form(lexical_form: &str, datatype: &str) -> bool {
    match datatype {
        vocab::XSD_STRING => true,
        vocab::RDF_PLAIN_LITERAL => match lexical_form.rfind('@') {
            Some(at) if at + 1 == lexical_form.len() => true,
            Some(at) => OxLiteral::new_language_tagged_literal(
                &lexical_form[..at],
                &lexical_form[at + 1..],
            )
            .is_ok(),
            None => false,
        },
        vocab::XSD_BOOLEAN => matches!(lexical_form, "true" | "false" | "1" | "0"),
        vocab::XSD_INTEGER => INTEGER.is_match(lexical_form),
        vocab::XSD_NON_NEGATIVE_INTEGER => {
            INTEGER.is_match(lexical_form) && !is_negative(lexical_form)
        }
        vocab::XSD_POSITIVE_INTEGER => {
            INTEGER.is_match(lexical_form) && !is_negative(lexical_form) && !is_zero(lexical_form)
        }
        vocab::XSD_NON_POSITIVE_INTEGER => {
            INTEGER.is_match(lexical_form) && (is_negative(lexical_form) || is_zero(lexical_form))
        }
        vocab::XSD_NEGATIVE_INTEGER => {
            INTEGER.is_match(lexical_form) && is_negative(lexical_form) && !is_zero(lexical_form)
        }
        vocab::XSD_LONG => lexical_form.parse::<i64>().is_ok(),
        vocab::XSD_INT => lexical_form.parse::<i32>().is_ok(),
        vocab::XSD_SHORT => lexical_form.parse::<i16>().is_ok(),
        vocab::XSD_BYTE => lexical_form.parse::<i8>().is_ok(),
        vocab::XSD_UNSIGNED_LONG => lexical_form.parse::<u64>().is_ok(),
        vocab::XSD_UNSIGNED_INT => lexical_form.parse::<u32>().is_ok(),
        vocab::XSD_UNSIGNED_SHORT => lexical_form.parse::<u16>().is_ok(),
        vocab::XSD_UNSIGNED_BYTE => lexical_form.parse::<u8>().is_ok(),
        vocab::XSD_DECIMAL => DECIMAL.is_match(lexical_form),
        vocab::XSD_FLOAT | vocab::XSD_DOUBLE => is_floating_point(lexical_form),
        vocab::XSD_DATE_TIME => {
            let local = strip_timezone(lexical_form);
            NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
        vocab::XSD_DATE => NaiveDate::parse_from_str(strip_timezone(lexical_form), "%Y-%m-%d").is_ok(),
        vocab::XSD_TIME => NaiveTime::parse_from_str(strip_timezone(lexical_form), "%H:%M:%S%.f").is_ok(),
        vocab::XSD_DURATION => {
            DURATION.is_match(lexical_form) && !lexical_form.ends_with('P') && !lexical_form.ends_with('T')
        }
        vocab::XSD_G_YEAR_MONTH => G_YEAR_MONTH.is_match(strip_timezone(lexical_form)),
        vocab::XSD_G_YEAR => G_YEAR.is_match(strip_timezone(lexical_form)),
        vocab::XSD_G_MONTH_DAY => G_MONTH_DAY.is_match(strip_timezone(lexical_form)),
        vocab::XSD_G_DAY => G_DAY.is_match(strip_timezone(lexical_form)),
        vocab::XSD_G_MONTH => G_MONTH.is_match(strip_timezone(lexical_form)),
        _ => true,
    }
}

fn is_negative(lexical_form: &str) -> bool {
    lexical_form.starts_with('-')
}

fn is_zero(lexical_form: &str) -> bool {
    lexical_form
        .trim_start_matches(['+', '-'])
        .chars()
        .all(|c| c == '0')
}

fn is_floating_point(lexical_form: &str) -> bool {
    match lexical_form {
        "INF" | "+INF" | "-INF" | "NaN" => true,
        // Rust also accepts "inf" and "infinity", which xsd does not
        other => other.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
            && other.parse::<f64>().is_ok(),
    }
}

fn strip_timezone(lexical_form: &str) -> &str {
    match TIMEZONE.find(lexical_form) {
        Some(tz) => &lexical_form[..tz.start()],
        None => lexical_form,
    }
}
