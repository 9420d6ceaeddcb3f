//! Text front-end
//!
//! A Turtle-like syntax for facts, a Datalog syntax for rules and a small
//! SELECT syntax for conjunctive queries, all in one Pest grammar.
//!
//! ```text
//! @prefix ex: <http://example.org/> .
//! ex:a ex:knows ex:b, ex:c ; a ex:Person .
//! [?x, ex:knows, ?z] :- [?x, ex:knows, ?y], [?y, ex:knows, ?z] .
//! ex:Person(?x) :- ex:knows(?x, ?y) .
//! [?x, ex:olderBy, ?d] :- [?x, ex:age, ?a], [?y, ex:age, ?b], FILTER(?a > ?b), BIND(?a - ?b AS ?d) .
//! ```

mod parser;

pub use parser::{parse_document, ParseError, ParseResult, ParsedAtom, ParsedTerm, Rule as GrammarRule, Statement};
pub(crate) use parser::{parse_condition, parse_pattern, parse_prefix_decl, TextParser};
