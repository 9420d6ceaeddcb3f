use deductive_store::rdf::Prefixes;
use deductive_store::{
    ConjunctiveQuery, DataStore, EqualityMode, QueryAtom, QueryDomain, QueryError, QueryOptions,
    QueryTerm, ResourceId, StoreConfig, StoreError, Term, TupleIterator, UpdateType,
};
use std::collections::HashMap;

fn store(equality: EqualityMode) -> DataStore {
    DataStore::new(StoreConfig::default().with_equality(equality).with_threads(2)).unwrap()
}

fn import(store: &DataStore, text: &str) {
    store.import_text(text, &Prefixes::default(), UpdateType::Add).unwrap();
}

/// Drain an iterator into sorted (row, multiplicity) pairs
fn sorted_rows(iterator: &mut TupleIterator) -> Vec<(Vec<ResourceId>, usize)> {
    let mut rows = iterator.rows().unwrap();
    rows.sort();
    rows
}

fn rendered(store: &DataStore, text: &str, domain: QueryDomain) -> Vec<(Vec<String>, usize)> {
    let mut iterator = store.compile_query_text(text, &QueryOptions::new(domain)).unwrap();
    let mut rows = Vec::new();
    let mut multiplicity = iterator.open().unwrap();
    while multiplicity > 0 {
        let values = (0..iterator.arity()).map(|i| iterator.render(i).unwrap()).collect();
        rows.push((values, multiplicity));
        multiplicity = iterator.advance().unwrap();
    }
    rows.sort();
    rows
}

fn cross_product_store(n: usize) -> (DataStore, Vec<ResourceId>) {
    let store = store(EqualityMode::Off);
    let resources: Vec<Term> = (0..n).map(|i| Term::iri(format!("r{}", i))).collect();
    let ids = store.resolve(&resources).unwrap();

    let mut flat = Vec::with_capacity(n * n * n * 3);
    for &s in &ids {
        for &p in &ids {
            for &o in &ids {
                flat.extend_from_slice(&[s, p, o]);
            }
        }
    }
    store.add_triples_by_resource_ids(&flat, UpdateType::Add).unwrap();
    (store, ids)
}

#[test]
fn test_cross_product_multiplicities() {
    let n = 4;
    let (store, ids) = cross_product_store(n);
    assert_eq!(store.count(QueryDomain::Edb).unwrap(), n * n * n);

    let mut reference = None;
    for window_size in [1, 10, 100, 1000] {
        let options = QueryOptions::new(QueryDomain::Edb).with_window_size(window_size);
        let mut iterator = store
            .compile_query_text("SELECT * WHERE { ?x ?y ?z . ?z ?u ?v }", &options)
            .unwrap();
        assert_eq!(iterator.variable_names(), vec!["x", "y", "z", "u", "v"]);
        let rows = sorted_rows(&mut iterator);

        let mut per_pair: HashMap<(ResourceId, ResourceId), usize> = HashMap::new();
        for (values, multiplicity) in &rows {
            *per_pair.entry((values[0], values[2])).or_default() += multiplicity;
        }
        assert_eq!(per_pair.len(), n * n);
        for x in &ids {
            for z in &ids {
                assert_eq!(per_pair[&(*x, *z)], n * n * n, "window {}", window_size);
            }
        }

        match &reference {
            None => reference = Some(rows),
            Some(expected) => assert_eq!(&rows, expected, "window {}", window_size),
        }
    }
}

#[test]
fn test_projection_sums_join_paths() {
    let n = 3;
    let (store, _) = cross_product_store(n);
    for window_size in [1, 7, 1000] {
        let options = QueryOptions::new(QueryDomain::Idb).with_window_size(window_size);
        let mut iterator = store
            .compile_query_text("SELECT ?x ?v WHERE { ?x ?y ?z . ?z ?u ?v }", &options)
            .unwrap();
        assert_eq!(iterator.arity(), 2);

        let mut per_pair: HashMap<Vec<ResourceId>, usize> = HashMap::new();
        for (values, multiplicity) in iterator.rows().unwrap() {
            *per_pair.entry(values).or_default() += multiplicity;
        }
        assert_eq!(per_pair.len(), n * n);
        assert!(per_pair.values().all(|&total| total == n * n * n));
    }
}

#[test]
fn test_structured_query_with_resource_constants() {
    let (store, ids) = cross_product_store(3);
    let query = ConjunctiveQuery::select(
        ["y"],
        vec![QueryAtom::new(ids[0], QueryTerm::var("y"), ids[1])],
    );
    let mut iterator = store.compile_query(&query, &QueryOptions::new(QueryDomain::Edb)).unwrap();
    let rows = sorted_rows(&mut iterator);
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|(_, multiplicity)| *multiplicity == 1));
}

const MERGED: &str = "<a> owl:sameAs <b> .\n<a> <p> <c> .\n<d> <p> <c> .";

#[test]
fn test_idb_domain_expands_equivalence_classes() {
    let store = store(EqualityMode::NoUna);
    import(&store, MERGED);
    store.materialize(false).unwrap();

    let s = |name: &str| format!("<{}>", name);

    // every member of the subject's class is an answer
    assert_eq!(
        rendered(&store, "SELECT ?x WHERE { ?x <p> <c> }", QueryDomain::Idb),
        vec![(vec![s("a")], 1), (vec![s("b")], 1), (vec![s("d")], 1)]
    );
    // only the representative in IDBrep
    assert_eq!(
        rendered(&store, "SELECT ?x WHERE { ?x <p> <c> }", QueryDomain::IdbRep),
        vec![(vec![s("a")], 1), (vec![s("d")], 1)]
    );
    // an unprojected variable multiplies by its class size
    assert_eq!(
        rendered(&store, "SELECT ?y WHERE { ?x <p> ?y }", QueryDomain::Idb),
        vec![(vec![s("c")], 1), (vec![s("c")], 2)]
    );
    // constants match through their representative
    assert_eq!(
        rendered(&store, "SELECT ?y WHERE { <b> <p> ?y }", QueryDomain::Idb),
        vec![(vec![s("c")], 1)]
    );
    // the explicit view knows nothing about <b>
    assert!(rendered(&store, "SELECT ?y WHERE { <b> <p> ?y }", QueryDomain::Edb).is_empty());
}

#[test]
fn test_idb_multiplicities_match_naive_extension() {
    let store = store(EqualityMode::NoUna);
    import(&store, MERGED);
    store.materialize(false).unwrap();

    let mut iterator = store
        .compile_query_text("SELECT * WHERE { ?x ?y ?z }", &QueryOptions::new(QueryDomain::Idb))
        .unwrap();
    let total: usize = iterator.rows().unwrap().iter().map(|(_, m)| m).sum();
    assert_eq!(total, store.count(QueryDomain::Idb).unwrap());

    let mut iterator = store
        .compile_query_text("SELECT ?x WHERE { ?x ?y ?z }", &QueryOptions::new(QueryDomain::Idb))
        .unwrap();
    let total: usize = iterator.rows().unwrap().iter().map(|(_, m)| m).sum();
    assert_eq!(total, store.count(QueryDomain::Idb).unwrap());
}

#[test]
fn test_parameters_are_reported_as_given() {
    let store = store(EqualityMode::NoUna);
    import(&store, MERGED);
    store.materialize(false).unwrap();
    let b = store.resolve(&[Term::iri("b")]).unwrap()[0];

    let options = QueryOptions::new(QueryDomain::Idb).with_parameter("x", b);
    let mut iterator = store
        .compile_query_text("SELECT ?x ?y WHERE { ?x <p> ?y }", &options)
        .unwrap();
    let rows = iterator.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0[0], b);
    assert_eq!(rows[0].1, 1);
}

#[test]
fn test_distinct_rows_have_unit_multiplicity() {
    let (store, ids) = cross_product_store(3);
    let mut iterator = store
        .compile_query_text(
            "SELECT DISTINCT ?x WHERE { ?x ?y ?z . ?z ?u ?v }",
            &QueryOptions::new(QueryDomain::Edb).with_window_size(2),
        )
        .unwrap();
    let rows = sorted_rows(&mut iterator);
    let mut expected: Vec<_> = ids.iter().map(|&id| (vec![id], 1)).collect();
    expected.sort();
    assert_eq!(rows, expected);
}

#[test]
fn test_representative_only_domain() {
    let store = store(EqualityMode::Off);
    import(
        &store,
        "<a> <R> <b> . <b> <R> <c> .\n[?x, <R>, ?z] :- [?x, <R>, ?y], [?y, <R>, ?z] .",
    );
    store.materialize(false).unwrap();

    assert_eq!(
        rendered(&store, "SELECT * WHERE { ?x <R> ?z }", QueryDomain::IdbRepNoEdb),
        vec![(vec!["<a>".to_string(), "<c>".to_string()], 1)]
    );
    assert_eq!(
        rendered(&store, "SELECT * WHERE { ?x <R> ?z }", QueryDomain::IdbRep).len(),
        3
    );
}

const AGES: &str = "<ann> <age> 41 . <bob> <age> 12 . <cy> <age> 30 . <dan> <age> \"old\" .";

#[test]
fn test_filters_restrict_answers() {
    let store = store(EqualityMode::Off);
    import(&store, AGES);
    let dictionary = store.dictionary().unwrap();
    let before = dictionary.len().unwrap();
    let names = |text: &str| -> Vec<String> {
        rendered(&store, text, QueryDomain::Edb)
            .into_iter()
            .map(|(values, _)| values.join(" "))
            .collect()
    };

    assert_eq!(
        names("SELECT ?x WHERE { ?x <age> ?a . FILTER(?a >= 18 && ?a < 35) }"),
        vec!["<cy>"]
    );
    // A string age is an error, and errors count as false
    assert_eq!(
        names("SELECT ?x WHERE { ?x <age> ?a . FILTER(?a > 20) }"),
        vec!["<ann>", "<cy>"]
    );
    assert_eq!(
        names("SELECT ?x WHERE { ?x <age> ?a . FILTER(!isNumeric(?a)) }"),
        vec!["<dan>"]
    );
    assert_eq!(
        names("SELECT ?x WHERE { ?x <age> ?a FILTER(STRSTARTS(STR(?x), \"b\") || ?a * 2 = 60) }"),
        vec!["<bob>", "<cy>"]
    );
    // A constant-only filter is checked before the join starts
    assert!(names("SELECT ?x WHERE { ?x <age> ?a . FILTER(1 > 2) }").is_empty());
    // Unknown constants compare by value and are not interned
    assert_eq!(names("SELECT ?x WHERE { ?x <age> ?a . FILTER(?x != <nobody>) }").len(), 4);
    assert_eq!(dictionary.len().unwrap(), before);
}

#[test]
fn test_filters_over_equivalence_classes() {
    let store = store(EqualityMode::NoUna);
    import(&store, MERGED);
    store.materialize(false).unwrap();
    let s = |name: &str| format!("<{}>", name);

    // Each class member is tested on its own
    assert_eq!(
        rendered(&store, "SELECT ?x WHERE { ?x <p> <c> . FILTER(?x != <a>) }", QueryDomain::Idb),
        vec![(vec![s("b")], 1), (vec![s("d")], 1)]
    );
    // Representatives stand for their class, constants included
    assert_eq!(
        rendered(&store, "SELECT ?x WHERE { ?x <p> <c> . FILTER(?x != <b>) }", QueryDomain::IdbRep),
        vec![(vec![s("d")], 1)]
    );
    // A filtered variable no longer multiplies the answer by its class size
    assert_eq!(
        rendered(&store, "SELECT ?y WHERE { ?x <p> ?y . FILTER(?x = <b>) }", QueryDomain::Idb),
        vec![(vec![s("c")], 1)]
    );
}

#[test]
fn test_filter_variables_must_occur_in_patterns() {
    let (store, _) = cross_product_store(2);
    assert!(matches!(
        store.compile_query_text("SELECT ?x WHERE { ?x ?y ?z . FILTER(?w > 1) }", &QueryOptions::default()),
        Err(StoreError::Query(QueryError::Parse(_)))
    ));
}

#[test]
fn test_unknown_constant_yields_no_answers() {
    let (store, _) = cross_product_store(2);
    let dictionary = store.dictionary().unwrap();
    let before = dictionary.len().unwrap();

    let mut iterator = store
        .compile_query_text("SELECT ?x WHERE { ?x <never-seen> ?y }", &QueryOptions::default())
        .unwrap();
    assert_eq!(iterator.open().unwrap(), 0);
    assert!(iterator.is_exhausted().unwrap());
    assert_eq!(dictionary.len().unwrap(), before);
    assert_eq!(dictionary.try_resolve(&Term::iri("never-seen")).unwrap(), None);
}

#[test]
fn test_iterator_protocol() {
    let (store, _) = cross_product_store(2);
    let mut iterator = store
        .compile_query_text("SELECT ?x WHERE { ?x ?y ?z }", &QueryOptions::default())
        .unwrap();

    assert!(matches!(iterator.advance(), Err(StoreError::InconsistentState(_))));
    assert!(matches!(iterator.multiplicity(), Err(StoreError::InconsistentState(_))));

    assert_eq!(iterator.open().unwrap(), 1);
    let first = iterator.ground_term(0).unwrap();
    assert!(first.is_iri());
    assert!(matches!(iterator.resource(1), Err(StoreError::InvalidArgument(_))));

    let mut count = 1;
    while iterator.advance().unwrap() > 0 {
        count += 1;
    }
    assert_eq!(count, 8);
    assert_eq!(iterator.advance().unwrap(), 0);
    assert!(matches!(iterator.resource(0), Err(StoreError::InvalidArgument(_))));

    // reopening restarts from the first answer
    assert_eq!(iterator.open().unwrap(), 1);
    assert_eq!(iterator.ground_term(0).unwrap(), first);
}

#[test]
fn test_iterator_sees_facts_added_between_windows() {
    let store = store(EqualityMode::Off);
    import(&store, "<a> <p> <b> .");
    let mut iterator = store
        .compile_query_text("SELECT * { ?x <p> ?y }", &QueryOptions::default())
        .unwrap();
    assert_eq!(iterator.rows().unwrap().len(), 1);

    import(&store, "<c> <p> <d> .");
    assert_eq!(iterator.open().unwrap(), 1);
    assert_eq!(iterator.rows().unwrap().len(), 2);
}

#[test]
fn test_rendering_uses_prefixes() {
    let store = store(EqualityMode::Off);
    import(&store, "@prefix ex: <http://example.org/> . ex:a ex:name \"Ann\" ; ex:age 30 .");

    let mut prefixes = Prefixes::default();
    prefixes.declare("ex", "http://example.org/");
    let mut iterator = store
        .compile_query_text(
            "SELECT ?p ?o WHERE { ex:a ?p ?o }",
            &QueryOptions::new(QueryDomain::Edb).with_prefixes(prefixes),
        )
        .unwrap();

    let mut rendered = Vec::new();
    let mut multiplicity = iterator.open().unwrap();
    while multiplicity > 0 {
        rendered.push(format!("{} {}", iterator.render(0).unwrap(), iterator.render(1).unwrap()));
        multiplicity = iterator.advance().unwrap();
    }
    rendered.sort();
    assert_eq!(rendered.len(), 2);
    assert!(rendered[0].starts_with("ex:age"));
    assert!(rendered[1].starts_with("ex:name"));
}

#[test]
fn test_invalid_queries() {
    let (store, _) = cross_product_store(2);
    assert!(matches!(
        store.compile_query_text(
            "SELECT * { ?x ?y ?z }",
            &QueryOptions::default().with_window_size(0)
        ),
        Err(StoreError::Query(QueryError::InvalidWindowSize))
    ));
    assert!(matches!(
        store.compile_query_text("SELECT ?w { ?x ?y ?z }", &QueryOptions::default()),
        Err(StoreError::Query(QueryError::Parse(_)))
    ));

    let query = ConjunctiveQuery::new(vec![QueryAtom::new(
        QueryTerm::var("x"),
        QueryTerm::var("y"),
        QueryTerm::var("z"),
    )]);
    let options = QueryOptions::default().with_parameter("nope", ResourceId(0));
    assert!(matches!(
        store.compile_query(&query, &options),
        Err(StoreError::Query(QueryError::UnknownVariable(_)))
    ));
}

const MERGED_CHAINS: &str = "\
<a> owl:sameAs <b> . <c> owl:sameAs <d> . <d> owl:sameAs <e> .\n\
<a> <p> <c> . <b> <p> <f> . <c> <q> <g> . <f> <q> <a> . <e> <p> <a> . <g> <q> <e> .\n\
[?x, <r>, ?z] :- [?x, <p>, ?y], [?y, <q>, ?z] .";

#[test]
fn test_answers_do_not_depend_on_window_size() {
    let store = store(EqualityMode::NoUna);
    import(&store, MERGED_CHAINS);
    store.materialize(false).unwrap();

    let queries = [
        ("SELECT * WHERE { ?x ?y ?z }", false),
        ("SELECT DISTINCT ?x WHERE { ?x ?y ?z }", true),
        ("SELECT DISTINCT * WHERE { ?x ?y ?z }", true),
        ("SELECT ?x ?z WHERE { ?x <p> ?y . ?y <q> ?z }", false),
        ("SELECT * WHERE { ?x <p> ?y . ?y ?u ?z }", false),
        ("SELECT DISTINCT ?x ?z WHERE { ?x <p> ?y . ?y ?u ?z }", true),
        ("SELECT ?z WHERE { ?x <r> ?z }", false),
        ("SELECT ?x ?z WHERE { ?x <p> ?y . ?y <q> ?z . FILTER(?x != ?z) }", false),
        ("SELECT ?y WHERE { ?x <p> ?y . FILTER(?x = <b> || ?y = <c>) }", false),
    ];

    for domain in QueryDomain::ALL {
        for (text, distinct) in queries {
            let mut reference: Option<Vec<(Vec<ResourceId>, usize)>> = None;
            for window_size in [1, 2, 3, 10, 1000] {
                let options = QueryOptions::new(domain).with_window_size(window_size);
                let mut iterator = store.compile_query_text(text, &options).unwrap();
                let rows = sorted_rows(&mut iterator);

                if distinct {
                    assert!(rows.iter().all(|(_, m)| *m == 1), "{} in {}", text, domain);
                    let mut tuples: Vec<_> = rows.iter().map(|(values, _)| values).collect();
                    tuples.dedup();
                    assert_eq!(tuples.len(), rows.len(), "{} in {}", text, domain);
                }
                match &reference {
                    None => reference = Some(rows),
                    Some(expected) => {
                        assert_eq!(&rows, expected, "{} in {} with window {}", text, domain, window_size)
                    }
                }
            }
        }
    }

    // the full scan of each domain adds up to its size
    for domain in QueryDomain::ALL {
        let options = QueryOptions::new(domain).with_window_size(2);
        let mut iterator = store.compile_query_text("SELECT * WHERE { ?x ?y ?z }", &options).unwrap();
        let total: usize = iterator.rows().unwrap().iter().map(|(_, m)| m).sum();
        assert_eq!(total, store.count(domain).unwrap(), "{}", domain);
    }
}
