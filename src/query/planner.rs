//! Query compilation
//!
//! Resolves constants against the dictionary, numbers variables and fixes
//! the join order. Constants stay raw here; the iterator normalizes them for
//! the domain it runs over. Filters are attached to the earliest join depth
//! that binds all of their variables.

use super::ast::{ConjunctiveQuery, QueryTerm};
use super::{QueryError, QueryResult};
use crate::dictionary::Dictionary;
use crate::expression::{schedule, Builtin, Operand};
use crate::rdf::ResourceId;
use crate::storage::{order_by_boundness, PatternTerm, TriplePattern};
use std::collections::HashMap;

/// Executable form of a conjunctive query
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Patterns in join order
    patterns: Vec<TriplePattern>,
    variable_names: Vec<String>,
    /// Projected variable indices
    answer: Vec<usize>,
    /// Initial bindings from external parameters
    parameters: Vec<Option<ResourceId>>,
    filters: Vec<Builtin>,
    /// Filters to test after each join depth; entry 0 runs before the first pattern
    stages: Vec<Vec<usize>>,
    distinct: bool,
    /// False when a constant is unknown to the dictionary
    satisfiable: bool,
}

impl QueryPlan {
    pub fn compile(
        query: &ConjunctiveQuery,
        dictionary: &Dictionary,
        parameters: &HashMap<String, ResourceId>,
    ) -> QueryResult<Self> {
        let variable_names = query.variables();
        let index_of = |name: &str| variable_names.iter().position(|v| v == name);

        let mut satisfiable = true;
        let mut patterns = Vec::with_capacity(query.atoms.len());
        for atom in &query.atoms {
            let mut terms = [PatternTerm::Constant(ResourceId(0)); 3];
            for (slot, term) in terms.iter_mut().zip(atom.terms()) {
                *slot = match term {
                    QueryTerm::Variable(name) => {
                        PatternTerm::Variable(index_of(name).ok_or_else(|| {
                            QueryError::UnknownVariable(name.clone())
                        })?)
                    }
                    QueryTerm::Resource(id) => {
                        dictionary.check_ids(&[*id])?;
                        PatternTerm::Constant(*id)
                    }
                    QueryTerm::Constant(term) => match dictionary.try_resolve(term)? {
                        Some(id) => PatternTerm::Constant(id),
                        None => {
                            satisfiable = false;
                            PatternTerm::Constant(ResourceId(0))
                        }
                    },
                };
            }
            patterns.push(TriplePattern::new(terms[0], terms[1], terms[2]));
        }

        let answer = query
            .answer_variables()
            .iter()
            .map(|name| index_of(name).ok_or_else(|| QueryError::UnknownVariable(name.clone())))
            .collect::<QueryResult<Vec<_>>>()?;

        let mut initial = vec![None; variable_names.len()];
        for (name, id) in parameters {
            let v = index_of(name).ok_or_else(|| QueryError::UnknownVariable(name.clone()))?;
            dictionary.check_ids(&[*id])?;
            initial[v] = Some(*id);
        }

        let filters = query
            .filters
            .iter()
            .map(|filter| {
                let mut compile = |term: &QueryTerm| -> QueryResult<Operand> {
                    Ok(match term {
                        QueryTerm::Variable(name) => Operand::Variable(
                            index_of(name).ok_or_else(|| QueryError::UnknownVariable(name.clone()))?,
                        ),
                        QueryTerm::Resource(id) => {
                            dictionary.check_ids(&[*id])?;
                            Operand::Resource(*id)
                        }
                        // A constant outside the dictionary can still be compared by value
                        QueryTerm::Constant(term) => match dictionary.try_resolve(term)? {
                            Some(id) => Operand::Resource(id),
                            None => Operand::Term(term.clone()),
                        },
                    })
                };
                Ok(Builtin::Filter(filter.try_map(&mut compile)?))
            })
            .collect::<QueryResult<Vec<_>>>()?;

        let mut bound: Vec<bool> = initial.iter().map(Option::is_some).collect();
        let candidates: Vec<usize> = (0..patterns.len()).collect();
        let order = order_by_boundness(&patterns, &candidates, &mut bound);
        let patterns: Vec<TriplePattern> = order.into_iter().map(|i| patterns[i]).collect();

        let mut bound: Vec<bool> = initial.iter().map(Option::is_some).collect();
        let depths: Vec<usize> = (0..patterns.len()).collect();
        let stages = schedule(&filters, |p| patterns[p].variables().collect(), &depths, &mut bound);

        Ok(Self {
            patterns,
            variable_names,
            answer,
            parameters: initial,
            filters,
            stages,
            distinct: query.distinct,
            satisfiable,
        })
    }

    pub fn patterns(&self) -> &[TriplePattern] {
        &self.patterns
    }

    pub fn variable_names(&self) -> &[String] {
        &self.variable_names
    }

    /// Names of the projected variables, in projection order
    pub fn answer_names(&self) -> Vec<&str> {
        self.answer.iter().map(|&v| self.variable_names[v].as_str()).collect()
    }

    pub(crate) fn answer(&self) -> &[usize] {
        &self.answer
    }

    pub(crate) fn parameters(&self) -> &[Option<ResourceId>] {
        &self.parameters
    }

    pub(crate) fn filters(&self) -> &[Builtin] {
        &self.filters
    }

    pub(crate) fn stages(&self) -> &[Vec<usize>] {
        &self.stages
    }

    /// Variables some filter reads
    pub(crate) fn filter_variables(&self) -> Vec<usize> {
        let mut variables: Vec<usize> = self.filters.iter().flat_map(Builtin::inputs).collect();
        variables.sort_unstable();
        variables.dedup();
        variables
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn is_satisfiable(&self) -> bool {
        self.satisfiable
    }

    /// Patterns, parameters and filter constants mapped through `normalize`
    pub(crate) fn normalized(
        &self,
        normalize: impl Fn(ResourceId) -> ResourceId,
    ) -> (Vec<TriplePattern>, Vec<Option<ResourceId>>, Vec<Builtin>) {
        let patterns = self
            .patterns
            .iter()
            .map(|p| p.map_constants(&normalize))
            .collect();
        let parameters = self.parameters.iter().map(|p| p.map(&normalize)).collect();
        let filters = self
            .filters
            .iter()
            .map(|f| f.map_resources(&normalize))
            .collect();
        (patterns, parameters, filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{BinaryOp, Expression};
    use crate::query::QueryAtom;
    use crate::rdf::Term;

    fn dictionary() -> (Dictionary, ResourceId) {
        let dictionary = Dictionary::new();
        let p = dictionary.resolve_one(&Term::iri("p")).unwrap();
        (dictionary, p)
    }

    #[test]
    fn test_join_order_prefers_bound_patterns() {
        let (dictionary, p) = dictionary();
        let query = ConjunctiveQuery::new(vec![
            QueryAtom::new(QueryTerm::var("x"), QueryTerm::var("y"), QueryTerm::var("z")),
            QueryAtom::new(QueryTerm::var("z"), p, Term::iri("p")),
        ]);
        let plan = QueryPlan::compile(&query, &dictionary, &HashMap::new()).unwrap();
        assert!(plan.is_satisfiable());
        assert_eq!(plan.patterns()[0].predicate, PatternTerm::Constant(p));
        assert_eq!(plan.answer_names(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_parameters_bind_variables() {
        let (dictionary, p) = dictionary();
        let query = ConjunctiveQuery::select(
            ["y"],
            vec![
                QueryAtom::new(QueryTerm::var("x"), QueryTerm::var("q"), QueryTerm::var("y")),
                QueryAtom::new(QueryTerm::var("y"), QueryTerm::var("q"), QueryTerm::var("w")),
            ],
        );
        let mut parameters = HashMap::new();
        parameters.insert("x".to_string(), p);
        let plan = QueryPlan::compile(&query, &dictionary, &parameters).unwrap();
        assert_eq!(plan.parameters()[0], Some(p));
        // The pattern touching ?x runs first
        assert_eq!(plan.patterns()[0].subject, PatternTerm::Variable(0));

        parameters.insert("nope".to_string(), p);
        assert!(matches!(
            QueryPlan::compile(&query, &dictionary, &parameters),
            Err(QueryError::UnknownVariable(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_filters_run_once_their_variables_are_bound() {
        let (dictionary, p) = dictionary();
        let query = ConjunctiveQuery::new(vec![
            QueryAtom::new(QueryTerm::var("x"), p, QueryTerm::var("y")),
            QueryAtom::new(QueryTerm::var("y"), p, QueryTerm::var("z")),
        ])
        .with_filter(Expression::binary(
            Expression::leaf(QueryTerm::var("z")),
            BinaryOp::Ne,
            Expression::leaf(QueryTerm::Constant(Term::iri("never-seen"))),
        ))
        .with_filter(Expression::binary(
            Expression::leaf(QueryTerm::var("x")),
            BinaryOp::Ne,
            Expression::leaf(QueryTerm::Constant(Term::iri("p"))),
        ));
        let plan = QueryPlan::compile(&query, &dictionary, &HashMap::new()).unwrap();
        // An unknown constant in a filter does not empty the query
        assert!(plan.is_satisfiable());
        assert_eq!(plan.stages(), &[vec![], vec![1], vec![0]]);
        assert_eq!(plan.filter_variables(), vec![0, 2]);
        assert!(plan.filters()[1].resources().eq([p]));
    }

    #[test]
    fn test_unknown_constant_is_unsatisfiable() {
        let (dictionary, _) = dictionary();
        let query = ConjunctiveQuery::new(vec![QueryAtom::new(
            QueryTerm::var("x"),
            Term::iri("never-seen"),
            QueryTerm::var("y"),
        )]);
        let plan = QueryPlan::compile(&query, &dictionary, &HashMap::new()).unwrap();
        assert!(!plan.is_satisfiable());
        assert_eq!(dictionary.try_resolve(&Term::iri("never-seen")).unwrap(), None);
    }
}
