//! Built-in functions callable from FILTER and BIND expressions

use super::value::{self, boolean_term, number, string, string_term, Number};
use super::{ExpressionError, ExpressionResult};
use crate::rdf::{vocab, Term};
use regex::RegexBuilder;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Str,
    Lang,
    Datatype,
    StrLen,
    UCase,
    LCase,
    Contains,
    StrStarts,
    StrEnds,
    Regex,
    Concat,
    SameTerm,
    Abs,
    Ceil,
    Floor,
    Round,
    Iri,
    StrDt,
    StrLang,
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::IsIri => "isIRI",
            Function::IsBlank => "isBlank",
            Function::IsLiteral => "isLiteral",
            Function::IsNumeric => "isNumeric",
            Function::Str => "STR",
            Function::Lang => "LANG",
            Function::Datatype => "DATATYPE",
            Function::StrLen => "STRLEN",
            Function::UCase => "UCASE",
            Function::LCase => "LCASE",
            Function::Contains => "CONTAINS",
            Function::StrStarts => "STRSTARTS",
            Function::StrEnds => "STRENDS",
            Function::Regex => "REGEX",
            Function::Concat => "CONCAT",
            Function::SameTerm => "sameTerm",
            Function::Abs => "ABS",
            Function::Ceil => "CEIL",
            Function::Floor => "FLOOR",
            Function::Round => "ROUND",
            Function::Iri => "IRI",
            Function::StrDt => "STRDT",
            Function::StrLang => "STRLANG",
        }
    }

    /// Inclusive bounds on the argument count; `None` is unbounded
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Function::Contains
            | Function::StrStarts
            | Function::StrEnds
            | Function::SameTerm
            | Function::StrDt
            | Function::StrLang => (2, Some(2)),
            Function::Regex => (2, Some(3)),
            Function::Concat => (0, None),
            _ => (1, Some(1)),
        }
    }

    pub fn check_arity(self, found: usize) -> ExpressionResult<()> {
        let (min, max) = self.arity();
        if found >= min && max.map_or(true, |max| found <= max) {
            return Ok(());
        }
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        Err(ExpressionError::Arity {
            function: self,
            expected,
            found,
        })
    }

    /// Apply to evaluated arguments
    pub(crate) fn apply(self, args: &[Term]) -> ExpressionResult<Term> {
        self.check_arity(args.len())?;
        match self {
            Function::IsIri => Ok(boolean_term(args[0].is_iri())),
            Function::IsBlank => Ok(boolean_term(args[0].is_blank_node())),
            Function::IsLiteral => Ok(boolean_term(args[0].is_literal())),
            Function::IsNumeric => Ok(boolean_term(number(&args[0]).is_some())),
            Function::Str => match &args[0] {
                Term::Iri(iri) => Ok(Term::string(iri.as_str())),
                Term::BlankNode(_) => Err(type_error(self, &args[0])),
                literal => Ok(Term::string(string(literal).map_or(literal.lexical_form(), |(text, _)| text))),
            },
            Function::Lang => match string(&args[0]) {
                Some((_, language)) => Ok(Term::string(language.unwrap_or(""))),
                None if args[0].is_literal() => Ok(Term::string("")),
                None => Err(type_error(self, &args[0])),
            },
            Function::Datatype => match (&args[0], string(&args[0])) {
                (_, Some((_, Some(_)))) => Ok(Term::iri(vocab::RDF_PLAIN_LITERAL)),
                (_, Some((_, None))) => Ok(Term::iri(vocab::XSD_STRING)),
                (Term::Literal { datatype, .. }, None) => Ok(Term::iri(datatype.as_str())),
                (other, None) => Err(type_error(self, other)),
            },
            Function::StrLen => {
                let (text, _) = text_of(self, &args[0])?;
                let length = i64::try_from(text.chars().count())
                    .map_err(|_| ExpressionError::Arithmetic("string too long".into()))?;
                Ok(Term::integer(length))
            }
            Function::UCase => {
                let (text, language) = text_of(self, &args[0])?;
                Ok(string_term(text.to_uppercase(), language))
            }
            Function::LCase => {
                let (text, language) = text_of(self, &args[0])?;
                Ok(string_term(text.to_lowercase(), language))
            }
            Function::Contains | Function::StrStarts | Function::StrEnds => {
                let (haystack, _) = text_of(self, &args[0])?;
                let (needle, _) = text_of(self, &args[1])?;
                let found = match self {
                    Function::Contains => haystack.contains(needle),
                    Function::StrStarts => haystack.starts_with(needle),
                    _ => haystack.ends_with(needle),
                };
                Ok(boolean_term(found))
            }
            Function::Regex => {
                let (text, _) = text_of(self, &args[0])?;
                let (pattern, _) = text_of(self, &args[1])?;
                let flags = match args.get(2) {
                    Some(flags) => text_of(self, flags)?.0,
                    None => "",
                };
                // TODO: cache compiled patterns per expression; constant patterns are rebuilt for every binding
                let mut builder = RegexBuilder::new(pattern);
                for flag in flags.chars() {
                    match flag {
                        'i' => builder.case_insensitive(true),
                        'm' => builder.multi_line(true),
                        's' => builder.dot_matches_new_line(true),
                        'x' => builder.ignore_whitespace(true),
                        other => return Err(ExpressionError::Regex(format!("unknown flag '{}'", other))),
                    };
                }
                let regex = builder
                    .build()
                    .map_err(|e| ExpressionError::Regex(e.to_string()))?;
                Ok(boolean_term(regex.is_match(text)))
            }
            Function::Concat => {
                let mut result = String::new();
                let mut shared: Option<Option<&str>> = None;
                for arg in args {
                    let (text, language) = text_of(self, arg)?;
                    result.push_str(text);
                    shared = match shared {
                        None => Some(language),
                        Some(previous) if previous == language => Some(previous),
                        Some(_) => Some(None),
                    };
                }
                Ok(string_term(result, shared.flatten()))
            }
            Function::SameTerm => Ok(boolean_term(args[0] == args[1])),
            Function::Abs | Function::Ceil | Function::Floor | Function::Round => {
                let n = number(&args[0]).ok_or_else(|| type_error(self, &args[0]))?;
                let result = match self {
                    Function::Abs => n.map(i64::wrapping_abs, f64::abs),
                    Function::Ceil => n.map(|i| i, f64::ceil),
                    Function::Floor => n.map(|i| i, f64::floor),
                    // Halves round towards positive infinity
                    _ => n.map(|i| i, |d| (d + 0.5).floor()),
                };
                if self == Function::Abs && n == Number::Integer(i64::MIN) {
                    return Err(ExpressionError::Arithmetic("ABS overflows".into()));
                }
                result.to_term()
            }
            Function::Iri => match &args[0] {
                Term::Iri(_) => Ok(args[0].clone()),
                other => match string(other) {
                    Some((text, None)) => Ok(Term::iri(text)),
                    _ => Err(type_error(self, other)),
                },
            },
            Function::StrDt => match (string(&args[0]), &args[1]) {
                (Some((text, None)), Term::Iri(datatype)) => Ok(Term::literal(text, datatype.as_str())),
                _ => Err(type_error(self, &args[0])),
            },
            Function::StrLang => match (string(&args[0]), string(&args[1])) {
                (Some((text, None)), Some((tag, None))) if !tag.is_empty() => Ok(string_term(text, Some(tag))),
                _ => Err(type_error(self, &args[0])),
            },
        }
    }
}

fn type_error(function: Function, arg: &Term) -> ExpressionError {
    ExpressionError::Type(format!("{} does not accept {}", function.name(), arg))
}

fn text_of(function: Function, term: &Term) -> ExpressionResult<(&str, Option<&str>)> {
    value::string(term).ok_or_else(|| type_error(function, term))
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Function {
    type Err = ExpressionError;

    /// Case-insensitive; URI is a synonym for IRI and isURI for isIRI
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let function = match name.to_ascii_uppercase().as_str() {
            "ISIRI" | "ISURI" => Function::IsIri,
            "ISBLANK" => Function::IsBlank,
            "ISLITERAL" => Function::IsLiteral,
            "ISNUMERIC" => Function::IsNumeric,
            "STR" => Function::Str,
            "LANG" => Function::Lang,
            "DATATYPE" => Function::Datatype,
            "STRLEN" => Function::StrLen,
            "UCASE" => Function::UCase,
            "LCASE" => Function::LCase,
            "CONTAINS" => Function::Contains,
            "STRSTARTS" => Function::StrStarts,
            "STRENDS" => Function::StrEnds,
            "REGEX" => Function::Regex,
            "CONCAT" => Function::Concat,
            "SAMETERM" => Function::SameTerm,
            "ABS" => Function::Abs,
            "CEIL" => Function::Ceil,
            "FLOOR" => Function::Floor,
            "ROUND" => Function::Round,
            "IRI" | "URI" => Function::Iri,
            "STRDT" => Function::StrDt,
            "STRLANG" => Function::StrLang,
            _ => return Err(ExpressionError::UnknownFunction(name.to_string())),
        };
        Ok(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: Function, args: &[Term]) -> ExpressionResult<Term> {
        function.apply(args)
    }

    fn tagged(text: &str) -> Term {
        Term::literal(text, vocab::RDF_PLAIN_LITERAL)
    }

    #[test]
    fn test_names_are_case_insensitive() {
        assert_eq!("strlen".parse::<Function>(), Ok(Function::StrLen));
        assert_eq!("isURI".parse::<Function>(), Ok(Function::IsIri));
        assert!(matches!("nope".parse::<Function>(), Err(ExpressionError::UnknownFunction(_))));
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(call(Function::StrLen, &[Term::string("héllo")]), Ok(Term::integer(5)));
        assert_eq!(call(Function::UCase, &[tagged("chat@fr")]), Ok(tagged("CHAT@fr")));
        assert_eq!(call(Function::Lang, &[tagged("chat@fr")]), Ok(Term::string("fr")));
        assert_eq!(
            call(Function::Str, &[Term::iri("http://example.org/a")]),
            Ok(Term::string("http://example.org/a"))
        );
        assert_eq!(
            call(Function::Concat, &[tagged("a@en"), tagged("b@en")]),
            Ok(tagged("ab@en"))
        );
        assert_eq!(
            call(Function::Concat, &[tagged("a@en"), Term::string("b")]),
            Ok(Term::string("ab"))
        );
        assert_eq!(
            call(Function::StrStarts, &[Term::string("prefix"), Term::string("pre")]),
            Ok(boolean_term(true))
        );
        assert!(call(Function::StrLen, &[Term::integer(3)]).is_err());
    }

    #[test]
    fn test_regex_flags() {
        let text = Term::string("Hello World");
        assert_eq!(call(Function::Regex, &[text.clone(), Term::string("^hello")]), Ok(boolean_term(false)));
        assert_eq!(
            call(Function::Regex, &[text.clone(), Term::string("^hello"), Term::string("i")]),
            Ok(boolean_term(true))
        );
        assert!(matches!(
            call(Function::Regex, &[text.clone(), Term::string("(")]),
            Err(ExpressionError::Regex(_))
        ));
        assert!(call(Function::Regex, &[text, Term::string("x"), Term::string("q")]).is_err());
    }

    #[test]
    fn test_numeric_functions() {
        assert_eq!(call(Function::Abs, &[Term::integer(-3)]), Ok(Term::integer(3)));
        assert_eq!(
            call(Function::Round, &[Term::literal("2.5", vocab::XSD_DECIMAL)]),
            Ok(Term::literal("3.0", vocab::XSD_DECIMAL))
        );
        assert_eq!(
            call(Function::Floor, &[Term::literal("-1.5", vocab::XSD_DECIMAL)]),
            Ok(Term::literal("-2.0", vocab::XSD_DECIMAL))
        );
        assert!(call(Function::Abs, &[Term::integer(i64::MIN)]).is_err());
        assert_eq!(call(Function::IsNumeric, &[Term::string("1")]), Ok(boolean_term(false)));
    }

    #[test]
    fn test_term_constructors() {
        assert_eq!(
            call(Function::StrDt, &[Term::string("7"), Term::iri(vocab::XSD_INTEGER)]),
            Ok(Term::integer(7))
        );
        assert_eq!(call(Function::StrLang, &[Term::string("chat"), Term::string("fr")]), Ok(tagged("chat@fr")));
        assert_eq!(call(Function::Iri, &[Term::string("http://example.org/x")]), Ok(Term::iri("http://example.org/x")));
        assert_eq!(
            call(Function::Datatype, &[Term::integer(1)]),
            Ok(Term::iri(vocab::XSD_INTEGER))
        );
        assert!(call(Function::Datatype, &[Term::iri("a")]).is_err());
        assert!(matches!(
            call(Function::SameTerm, &[Term::integer(1)]),
            Err(ExpressionError::Arity { .. })
        ));
    }
}
