//! Text front-end using Pest
//!
//! Turns fact/rule documents and SELECT queries into term-level structures.
//! Nothing here touches the dictionary: resolution happens in the store.

use crate::expression::{BinaryOp, Condition, Expression, Function, UnaryOp};
use crate::rdf::{vocab, PrefixError, Prefixes, Term};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "formats/grammar.pest"]
pub(crate) struct TextParser;

// Loosest binding first
static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::comparison_op, Assoc::Left))
        .op(Op::infix(Rule::add_sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_div_op, Assoc::Left))
});

/// Parser errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Pest parsing error
    #[error("Parse error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    /// Undeclared prefix or malformed prefixed name
    #[error("Prefix error: {0}")]
    Prefix(#[from] PrefixError),

    /// Semantic error
    #[error("Semantic error: {0}")]
    Semantic(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// A parsed position: a named variable or a ground term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedTerm {
    Variable(String),
    Term(Term),
}

impl ParsedTerm {
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            ParsedTerm::Variable(name) => Some(name),
            ParsedTerm::Term(_) => None,
        }
    }
}

impl std::fmt::Display for ParsedTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedTerm::Variable(name) => write!(f, "?{}", name),
            ParsedTerm::Term(term) => write!(f, "{}", term),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAtom {
    pub subject: ParsedTerm,
    pub predicate: ParsedTerm,
    pub object: ParsedTerm,
}

impl ParsedAtom {
    pub fn terms(&self) -> [&ParsedTerm; 3] {
        [&self.subject, &self.predicate, &self.object]
    }
}

/// One statement of a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Ground fact
    Fact([Term; 3]),
    Rule {
        head: ParsedAtom,
        body: Vec<ParsedAtom>,
        /// FILTER and BIND items, in body order
        conditions: Vec<Condition<ParsedTerm>>,
    },
}

/// Parse a document of prefix declarations, facts and rules.
///
/// Prefix declarations are added to `prefixes` and apply to the rest of the
/// document.
pub fn parse_document(input: &str, prefixes: &mut Prefixes) -> ParseResult<Vec<Statement>> {
    let mut statements = Vec::new();
    let Some(document) = TextParser::parse(Rule::document, input)?.next() else {
        return Ok(statements);
    };

    for pair in document.into_inner() {
        match pair.as_rule() {
            Rule::prefix_decl => parse_prefix_decl(pair, prefixes)?,
            Rule::triples => parse_triples(pair, prefixes, &mut statements)?,
            Rule::rule => statements.push(parse_rule(pair, prefixes)?),
            _ => {}
        }
    }
    Ok(statements)
}

pub(crate) fn parse_prefix_decl(pair: Pair<Rule>, prefixes: &mut Prefixes) -> ParseResult<()> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| ParseError::Semantic("Prefix declaration missing name".to_string()))?;
    let iri = inner
        .next()
        .ok_or_else(|| ParseError::Semantic("Prefix declaration missing IRI".to_string()))?;
    let prefix = name.as_str().trim_end_matches(':');
    prefixes.declare(prefix, iri_body(iri));
    Ok(())
}

fn parse_triples(
    pair: Pair<Rule>,
    prefixes: &Prefixes,
    statements: &mut Vec<Statement>,
) -> ParseResult<()> {
    let mut inner = pair.into_inner();
    let subject = match inner.next() {
        Some(p) => ground(parse_term(p, prefixes)?)?,
        None => return Err(ParseError::Semantic("Triple missing subject".to_string())),
    };
    let Some(list) = inner.next() else {
        return Err(ParseError::Semantic("Triple missing predicate".to_string()));
    };

    let mut predicate: Option<Term> = None;
    for item in list.into_inner() {
        match item.as_rule() {
            Rule::object_list => {
                let predicate = predicate.clone().ok_or_else(|| {
                    ParseError::Semantic("Object list without predicate".to_string())
                })?;
                for object in item.into_inner() {
                    let object = ground(parse_term(object, prefixes)?)?;
                    statements.push(Statement::Fact([subject.clone(), predicate.clone(), object]));
                }
            }
            _ => predicate = Some(ground(parse_term(item, prefixes)?)?),
        }
    }
    Ok(())
}

fn parse_rule(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<Statement> {
    let mut atoms = Vec::new();
    let mut conditions = Vec::new();
    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::filter | Rule::bind => conditions.push(parse_condition(item, prefixes)?),
            _ => atoms.push(parse_atom(item, prefixes)?),
        }
    }
    let mut atoms = atoms.into_iter();
    let head = atoms
        .next()
        .ok_or_else(|| ParseError::Semantic("Rule missing head".to_string()))?;
    Ok(Statement::Rule {
        head,
        body: atoms.collect(),
        conditions,
    })
}

/// Parse a FILTER or BIND item
pub(crate) fn parse_condition(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<Condition<ParsedTerm>> {
    let kind = pair.as_rule();
    let mut inner = pair.into_inner();
    let expression = inner
        .next()
        .ok_or_else(|| ParseError::Semantic("Condition missing expression".to_string()))
        .and_then(|expr| parse_expression(expr, prefixes))?;
    match (kind, inner.next()) {
        (Rule::filter, None) => Ok(Condition::Filter(expression)),
        (Rule::bind, Some(variable)) => Ok(Condition::Bind {
            expression,
            variable: variable.as_str()[1..].to_string(),
        }),
        _ => Err(ParseError::Semantic(format!("Malformed {:?}", kind))),
    }
}

fn parse_expression(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<Expression<ParsedTerm>> {
    PRATT_PARSER
        .map_primary(|operand| parse_operand(operand, prefixes))
        .map_infix(|left, op, right| {
            let symbol = op.as_str();
            let op = BinaryOp::from_symbol(symbol)
                .ok_or_else(|| ParseError::Semantic(format!("Unknown operator: {}", symbol)))?;
            Ok(Expression::binary(left?, op, right?))
        })
        .parse(pair.into_inner())
}

fn parse_operand(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<Expression<ParsedTerm>> {
    let mut unary = Vec::new();
    let mut primary = None;
    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::unary_op => unary.push(match item.as_str() {
                "!" => UnaryOp::Not,
                "-" => UnaryOp::Minus,
                _ => UnaryOp::Plus,
            }),
            Rule::expression => primary = Some(parse_expression(item, prefixes)?),
            Rule::function_call => primary = Some(parse_call(item, prefixes)?),
            _ => primary = Some(Expression::Leaf(parse_term(item, prefixes)?)),
        }
    }
    let primary = primary.ok_or_else(|| ParseError::Semantic("Operand missing value".to_string()))?;
    // Innermost operator applies first
    Ok(unary.into_iter().rev().fold(primary, |expr, op| Expression::unary(op, expr)))
}

fn parse_call(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<Expression<ParsedTerm>> {
    let mut inner = pair.into_inner();
    let name = inner
        .next()
        .ok_or_else(|| ParseError::Semantic("Call missing function name".to_string()))?;
    let function: Function = name
        .as_str()
        .parse()
        .map_err(|e| ParseError::Semantic(format!("{}", e)))?;
    let args = inner
        .map(|arg| parse_expression(arg, prefixes))
        .collect::<ParseResult<Vec<_>>>()?;
    Expression::call(function, args).map_err(|e| ParseError::Semantic(e.to_string()))
}

fn parse_atom(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<ParsedAtom> {
    let kind = pair.as_rule();
    let terms = pair
        .into_inner()
        .map(|p| parse_term(p, prefixes))
        .collect::<ParseResult<Vec<_>>>()?;

    let atom = match (kind, terms.as_slice()) {
        (Rule::triple_atom, [s, p, o]) | (Rule::triple_pattern, [s, p, o]) => ParsedAtom {
            subject: s.clone(),
            predicate: p.clone(),
            object: o.clone(),
        },
        // P(s, o) is the triple (s P o)
        (Rule::predicate_atom, [p, s, o]) => ParsedAtom {
            subject: s.clone(),
            predicate: p.clone(),
            object: o.clone(),
        },
        // C(s) is the triple (s rdf:type C)
        (Rule::predicate_atom, [c, s]) => ParsedAtom {
            subject: s.clone(),
            predicate: ParsedTerm::Term(Term::iri(vocab::RDF_TYPE)),
            object: c.clone(),
        },
        _ => {
            return Err(ParseError::Semantic(format!(
                "Malformed atom with {} terms",
                terms.len()
            )))
        }
    };
    Ok(atom)
}

/// Parse a triple pattern of a query
pub(crate) fn parse_pattern(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<ParsedAtom> {
    parse_atom(pair, prefixes)
}

fn parse_term(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<ParsedTerm> {
    let term = match pair.as_rule() {
        Rule::variable => {
            return Ok(ParsedTerm::Variable(pair.as_str()[1..].to_string()));
        }
        Rule::IRIREF => Term::iri(iri_body(pair)),
        Rule::prefixed_name => Term::iri(prefixes.expand(pair.as_str())?),
        Rule::rdf_type => Term::iri(vocab::RDF_TYPE),
        Rule::blank_node => Term::blank_node(&pair.as_str()[2..]),
        Rule::rdf_literal => parse_rdf_literal(pair, prefixes)?,
        Rule::numeric => {
            let text = pair.as_str();
            let datatype = if text.contains(['e', 'E']) {
                vocab::XSD_DOUBLE
            } else if text.contains('.') {
                vocab::XSD_DECIMAL
            } else {
                vocab::XSD_INTEGER
            };
            Term::literal(text, datatype)
        }
        Rule::boolean => Term::literal(pair.as_str(), vocab::XSD_BOOLEAN),
        other => {
            return Err(ParseError::Semantic(format!("Unexpected term: {:?}", other)));
        }
    };
    Ok(ParsedTerm::Term(term))
}

fn parse_rdf_literal(pair: Pair<Rule>, prefixes: &Prefixes) -> ParseResult<Term> {
    let mut inner = pair.into_inner();
    let body = inner
        .next()
        .and_then(|string| string.into_inner().next())
        .map(|body| unescape(body.as_str()))
        .transpose()?
        .unwrap_or_default();

    match inner.next() {
        None => Ok(Term::string(body)),
        Some(tag) if tag.as_rule() == Rule::lang_tag => Ok(Term::literal(
            format!("{}{}", body, tag.as_str()),
            vocab::RDF_PLAIN_LITERAL,
        )),
        Some(datatype) => match parse_term(datatype, prefixes)? {
            ParsedTerm::Term(Term::Iri(iri)) => Ok(Term::literal(body, iri)),
            other => Err(ParseError::Semantic(format!("Invalid datatype: {:?}", other))),
        },
    }
}

fn iri_body(pair: Pair<Rule>) -> String {
    let text = pair.as_str();
    text[1..text.len() - 1].to_string()
}

fn ground(term: ParsedTerm) -> ParseResult<Term> {
    match term {
        ParsedTerm::Term(term) => Ok(term),
        ParsedTerm::Variable(name) => Err(ParseError::Semantic(format!(
            "Variable ?{} is not allowed in a fact",
            name
        ))),
    }
}

fn unescape(text: &str) -> ParseResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0C}'),
            Some(marker @ ('u' | 'U')) => {
                let width = if marker == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(width).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| ParseError::Semantic(format!("Invalid escape \\u{}", hex)))?;
                out.push(decoded);
            }
            other => {
                return Err(ParseError::Semantic(format!("Invalid escape \\{}", other.unwrap_or(' '))));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<Statement> {
        parse_document(input, &mut Prefixes::new()).unwrap()
    }

    fn var(name: &str) -> ParsedTerm {
        ParsedTerm::Variable(name.to_string())
    }

    fn iri(value: &str) -> ParsedTerm {
        ParsedTerm::Term(Term::iri(value))
    }

    #[test]
    fn test_parse_facts_with_lists() {
        let statements = parse(
            "@prefix ex: <http://example.org/> .\n\
             ex:a ex:knows ex:b, ex:c ; a ex:Person .",
        );
        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[2],
            Statement::Fact([
                Term::iri("http://example.org/a"),
                Term::iri(vocab::RDF_TYPE),
                Term::iri("http://example.org/Person"),
            ])
        );
    }

    #[test]
    fn test_parse_literals() {
        let statements = parse(
            r#"<s> <p> "plain", "tab\there", "hi"@en, "5"^^xsd:int, 42, 4.2, 4e2, true ."#,
        );
        let objects: Vec<Term> = statements
            .into_iter()
            .map(|s| match s {
                Statement::Fact([_, _, o]) => o,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(objects[0], Term::string("plain"));
        assert_eq!(objects[1], Term::string("tab\there"));
        assert_eq!(objects[2], Term::literal("hi@en", vocab::RDF_PLAIN_LITERAL));
        assert_eq!(objects[3], Term::literal("5", vocab::XSD_INT));
        assert_eq!(objects[4], Term::literal("42", vocab::XSD_INTEGER));
        assert_eq!(objects[5], Term::literal("4.2", vocab::XSD_DECIMAL));
        assert_eq!(objects[6], Term::literal("4e2", vocab::XSD_DOUBLE));
        assert_eq!(objects[7], Term::literal("true", vocab::XSD_BOOLEAN));
    }

    #[test]
    fn test_displayed_literals_parse_back() {
        let original = Term::string("quote \" slash \\ bell \u{07} form \u{0C}");
        let document = format!("<s> <p> {} .", original);
        let statements = parse(&document);
        assert_eq!(statements, vec![Statement::Fact([Term::iri("s"), Term::iri("p"), original])]);
    }

    #[test]
    fn test_parse_rules_in_both_atom_styles() {
        let statements = parse(
            "[?x, <R>, ?z] :- [?x, <R>, ?y], [?y, <R>, ?z] .\n\
             [?y1, owl:sameAs, ?y2] :- <R>(?x, ?y1), <R>(?x, ?y2) .\n\
             <Person>(?x) :- <knows>(?x, ?y) .",
        );
        assert_eq!(statements.len(), 3);

        let Statement::Rule { head, body, conditions } = &statements[1] else {
            panic!("expected a rule");
        };
        assert_eq!(head.predicate, iri(vocab::OWL_SAME_AS));
        assert_eq!(body[1].subject, var("x"));
        assert_eq!(body[1].predicate, iri("R"));
        assert_eq!(body[1].object, var("y2"));
        assert!(conditions.is_empty());

        let Statement::Rule { head, .. } = &statements[2] else {
            panic!("expected a rule");
        };
        assert_eq!(head.predicate, iri(vocab::RDF_TYPE));
        assert_eq!(head.object, iri("Person"));
    }

    #[test]
    fn test_parse_rule_conditions() {
        let statements = parse(
            "[?x, <older>, ?y] :- [?x, <age>, ?a], [?y, <age>, ?b], FILTER(?a > ?b + 1 && !isBlank(?x)), \
             BIND(?a - ?b AS ?gap) .",
        );
        let Statement::Rule { body, conditions, .. } = &statements[0] else {
            panic!("expected a rule");
        };
        assert_eq!(body.len(), 2);
        assert_eq!(conditions.len(), 2);

        let Condition::Filter(filter) = &conditions[0] else {
            panic!("expected a filter");
        };
        // && binds looser than >, which binds looser than +
        assert_eq!(filter.to_string(), "((?a > (?b + \"1\"^^<http://www.w3.org/2001/XMLSchema#integer>)) && !isBlank(?x))");

        let Condition::Bind { expression, variable } = &conditions[1] else {
            panic!("expected a bind");
        };
        assert_eq!(variable, "gap");
        assert_eq!(expression.to_string(), "(?a - ?b)");
    }

    #[test]
    fn test_expression_precedence_and_unary_operators() {
        let statements = parse("[?x, <p>, ?y] :- [?x, <q>, ?y], FILTER(-?y * 2 = 3 - 4 / 2 || ?x = <a>) .");
        let Statement::Rule { conditions, .. } = &statements[0] else {
            panic!("expected a rule");
        };
        let Condition::Filter(filter) = &conditions[0] else {
            panic!("expected a filter");
        };
        let text = filter.to_string().replace("\"^^<http://www.w3.org/2001/XMLSchema#integer>", "").replace('"', "");
        assert_eq!(text, "(((-?y * 2) = (3 - (4 / 2))) || (?x = <a>))");
    }

    #[test]
    fn test_condition_errors() {
        let mut prefixes = Prefixes::new();
        assert!(matches!(
            parse_document("[?x, <p>, ?y] :- [?x, <q>, ?y], FILTER(NOSUCH(?x)) .", &mut prefixes),
            Err(ParseError::Semantic(_))
        ));
        assert!(matches!(
            parse_document("[?x, <p>, ?y] :- [?x, <q>, ?y], FILTER(STRLEN(?x, ?y)) .", &mut prefixes),
            Err(ParseError::Semantic(_))
        ));
        assert!(matches!(
            parse_document("[?x, <p>, ?y] :- [?x, <q>, ?y], BIND(?x) .", &mut prefixes),
            Err(ParseError::Syntax(_))
        ));
    }

    #[test]
    fn test_comments_and_iris_with_hash() {
        let statements = parse("# leading comment\n<http://x.org/a#b> <p> <o> . # trailing");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_errors() {
        let mut prefixes = Prefixes::new();
        assert!(matches!(
            parse_document("<s> <p> ?x .", &mut prefixes),
            Err(ParseError::Semantic(_))
        ));
        assert!(matches!(
            parse_document("nope:a <p> <o> .", &mut prefixes),
            Err(ParseError::Prefix(_))
        ));
        assert!(matches!(
            parse_document("<s> <p> .", &mut prefixes),
            Err(ParseError::Syntax(_))
        ));
    }
}
