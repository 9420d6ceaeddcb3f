//! SELECT query parser

use super::ast::{ConjunctiveQuery, Projection, QueryAtom, QueryTerm};
use crate::expression::Condition;
use crate::formats::{
    parse_condition, parse_pattern, parse_prefix_decl, GrammarRule as Rule, ParseError, ParseResult,
    ParsedTerm, TextParser,
};
use std::convert::Infallible;
use crate::rdf::Prefixes;
use pest::Parser;

/// Parse `PREFIX* SELECT [DISTINCT] (?v+ | *) [WHERE] { ... }`.
///
/// The braces hold triple patterns and `FILTER(...)` conditions.
///
/// Prefix declarations in the query are added to `prefixes`.
pub fn parse_query(input: &str, prefixes: &mut Prefixes) -> ParseResult<ConjunctiveQuery> {
    let query = TextParser::parse(Rule::query, input)?
        .next()
        .ok_or_else(|| ParseError::Semantic("Empty query".to_string()))?;

    let mut distinct = false;
    let mut projection = Projection::All;
    let mut atoms = Vec::new();
    let mut filters = Vec::new();

    for pair in query.into_inner() {
        match pair.as_rule() {
            Rule::prefix_decl => parse_prefix_decl(pair, prefixes)?,
            Rule::select_clause => {
                for inner in pair.into_inner() {
                    match inner.as_rule() {
                        Rule::distinct => distinct = true,
                        Rule::projection => {
                            let variables: Vec<String> = inner
                                .into_inner()
                                .filter(|p| p.as_rule() == Rule::variable)
                                .map(|p| p.as_str()[1..].to_string())
                                .collect();
                            if !variables.is_empty() {
                                projection = Projection::Variables(variables);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Rule::where_clause => {
                for pattern in pair.into_inner() {
                    if pattern.as_rule() == Rule::filter {
                        if let Condition::Filter(filter) = parse_condition(pattern, prefixes)? {
                            let filter = filter.try_map(&mut |leaf| Ok::<_, Infallible>(convert(leaf.clone())));
                            filters.push(filter.unwrap_or_else(|never| match never {}));
                        }
                        continue;
                    }
                    let atom = parse_pattern(pattern, prefixes)?;
                    atoms.push(QueryAtom {
                        subject: convert(atom.subject),
                        predicate: convert(atom.predicate),
                        object: convert(atom.object),
                    });
                }
            }
            _ => {}
        }
    }

    let query = ConjunctiveQuery {
        distinct,
        projection,
        atoms,
        filters,
    };
    let variables = query.variables();
    for filter in &query.filters {
        if let Some(unbound) = filter
            .leaves()
            .into_iter()
            .filter_map(QueryTerm::as_variable)
            .find(|v| !variables.iter().any(|known| known == v))
        {
            return Err(ParseError::Semantic(format!(
                "Filter variable ?{} does not occur in a triple pattern",
                unbound
            )));
        }
    }
    if let Projection::Variables(projected) = &query.projection {
        if let Some(unbound) = projected.iter().find(|v| !variables.contains(*v)) {
            return Err(ParseError::Semantic(format!(
                "Projected variable ?{} does not occur in the query",
                unbound
            )));
        }
    }
    Ok(query)
}

fn convert(term: ParsedTerm) -> QueryTerm {
    match term {
        ParsedTerm::Variable(name) => QueryTerm::Variable(name),
        ParsedTerm::Term(term) => QueryTerm::Constant(term),
    }
}
