use deductive_store::rdf::Prefixes;
use deductive_store::{
    DataStore, Lifecycle, QueryDomain, QueryOptions, StoreConfig, StoreError, Term, UpdateType,
};

fn populated_store() -> DataStore {
    let store = DataStore::new(StoreConfig::default().with_threads(2)).unwrap();
    store
        .import_text(
            "<a> <R> <b> . <b> <R> <c> .\n[?x, <R>, ?z] :- [?x, <R>, ?y], [?y, <R>, ?z] .",
            &Prefixes::default(),
            UpdateType::Add,
        )
        .unwrap();
    store.materialize(false).unwrap();
    store
}

fn is_use_after_dispose<T>(result: Result<T, StoreError>) -> bool {
    matches!(result, Err(StoreError::UseAfterDispose))
}

#[test]
fn test_store_operations_fail_after_dispose() {
    let store = populated_store();
    store.dispose().unwrap();
    assert!(store.is_disposed());
    assert_eq!(store.lifecycle(), Lifecycle::Disposed);

    assert!(is_use_after_dispose(store.count(QueryDomain::Edb)));
    assert!(is_use_after_dispose(store.materialize(true)));
    assert!(is_use_after_dispose(store.resolve(&[Term::iri("a")])));
    assert!(is_use_after_dispose(store.add_triples_by_terms(
        &[Term::iri("x"), Term::iri("y"), Term::iri("z")],
        UpdateType::Add
    )));
    assert!(is_use_after_dispose(store.import_text("<x> <y> <z> .", &Prefixes::default(), UpdateType::Add)));
    assert!(is_use_after_dispose(store.rules()));
    assert!(is_use_after_dispose(store.export(QueryDomain::Edb, &Prefixes::default())));
    assert!(is_use_after_dispose(
        store.compile_query_text("SELECT * { ?x ?y ?z }", &QueryOptions::default())
    ));
    assert!(is_use_after_dispose(store.dictionary()));
    assert!(is_use_after_dispose(store.initialize()));
    assert!(is_use_after_dispose(store.dispose()));
}

#[test]
fn test_iterators_and_handles_fail_after_store_dispose() {
    let store = populated_store();
    let dictionary = store.dictionary().unwrap();
    let mut iterator = store
        .compile_query_text("SELECT * { ?x <R> ?y }", &QueryOptions::default().with_window_size(1))
        .unwrap();
    assert_eq!(iterator.open().unwrap(), 1);

    store.dispose().unwrap();

    assert!(is_use_after_dispose(iterator.advance()));
    assert!(is_use_after_dispose(iterator.open()));
    assert!(is_use_after_dispose(iterator.resource(0)));
    assert!(is_use_after_dispose(dictionary.resolve_one(&Term::iri("a"))));
    assert!(is_use_after_dispose(dictionary.len()));
}

#[test]
fn test_disposed_iterator_fails() {
    let store = populated_store();
    let mut iterator = store
        .compile_query_text("SELECT * { ?x <R> ?y }", &QueryOptions::default())
        .unwrap();
    iterator.open().unwrap();
    iterator.dispose();

    assert!(is_use_after_dispose(iterator.advance()));
    assert!(is_use_after_dispose(iterator.multiplicity()));
    assert!(is_use_after_dispose(iterator.open()));

    // the store itself is unaffected
    assert_eq!(store.count(QueryDomain::Idb).unwrap(), 3);
}

#[test]
fn test_disposing_one_store_leaves_others_alive() {
    let first = populated_store();
    let second = populated_store();
    first.dispose().unwrap();

    assert_eq!(second.count(QueryDomain::Idb).unwrap(), 3);
    let mut iterator = second
        .compile_query_text("SELECT * { ?x <R> ?y }", &QueryOptions::default())
        .unwrap();
    assert_eq!(iterator.rows().unwrap().len(), 3);
}

#[test]
fn test_dropped_store_invalidates_handles() {
    let store = populated_store();
    let dictionary = store.dictionary().unwrap();
    drop(store);
    assert!(is_use_after_dispose(dictionary.len()));
}

#[test]
fn test_uninitialized_store_rejects_operations() {
    let store = DataStore::uninitialized(StoreConfig::default()).unwrap();
    assert_eq!(store.lifecycle(), Lifecycle::Uninitialized);
    assert!(matches!(store.count(QueryDomain::Edb), Err(StoreError::InconsistentState(_))));
    assert!(matches!(store.materialize(false), Err(StoreError::InconsistentState(_))));
    assert!(matches!(store.resolve(&[Term::iri("a")]), Err(StoreError::InconsistentState(_))));
    assert!(matches!(
        store.import_text("<x> <y> <z> .", &Prefixes::default(), UpdateType::Add),
        Err(StoreError::InconsistentState(_))
    ));
    assert!(matches!(
        store.compile_query_text("SELECT * { ?x ?y ?z }", &QueryOptions::default()),
        Err(StoreError::InconsistentState(_))
    ));

    store.initialize().unwrap();
    assert_eq!(store.lifecycle(), Lifecycle::Empty);
    assert_eq!(store.count(QueryDomain::Edb).unwrap(), 0);
}

#[test]
fn test_initialize_keeps_resource_ids() {
    let store = populated_store();
    let a = store.resolve(&[Term::iri("a")]).unwrap()[0];
    store.initialize().unwrap();

    assert_eq!(store.count(QueryDomain::Idb).unwrap(), 0);
    assert!(store.rules().unwrap().is_empty());
    assert_eq!(store.resolve(&[Term::iri("a")]).unwrap()[0], a);
    assert_eq!(store.term_of(a).unwrap(), Term::iri("a"));
}

#[test]
fn test_lifecycle_tracks_changes() {
    let store = populated_store();
    assert_eq!(store.lifecycle(), Lifecycle::Materialized);

    store
        .import_text("<c> <R> <d> .", &Prefixes::default(), UpdateType::Add)
        .unwrap();
    assert_eq!(store.lifecycle(), Lifecycle::Populated);
    assert_eq!(store.lifecycle().to_string(), "populated");

    store.materialize(true).unwrap();
    assert_eq!(store.lifecycle(), Lifecycle::Materialized);
    assert_eq!(store.count(QueryDomain::Idb).unwrap(), 6);
}
