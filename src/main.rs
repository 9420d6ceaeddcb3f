use deductive_store::rdf::Prefixes;
use deductive_store::{
    DataStore, EqualityMode, QueryDomain, QueryOptions, StoreConfig, UpdateType,
};

const CYCLE_LENGTH: usize = 5;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Deductive Store v{}", deductive_store::version());
    println!("==========================================");
    println!();

    // Demo 1: Transitive closure over a cycle
    let store = demo_transitive_closure()?;

    // Demo 2: Equality reasoning, added incrementally
    demo_equality(&store)?;

    // Demo 3: Conjunctive queries
    demo_queries(&store)?;

    store.dispose()?;
    Ok(())
}

fn cycle_document(length: usize) -> String {
    let mut text = String::from("@prefix ex: <http://example.org/> .\n");
    for i in 0..length {
        text.push_str(&format!("ex:n{} ex:R ex:n{} .\n", i, (i + 1) % length));
    }
    text.push_str("ex:R(?x, ?z) :- ex:R(?x, ?y), ex:R(?y, ?z) .\n");
    text
}

fn print_counts(store: &DataStore) -> anyhow::Result<()> {
    for domain in QueryDomain::ALL {
        println!("  {:<12} {}", domain, store.count(domain)?);
    }
    Ok(())
}

fn demo_transitive_closure() -> anyhow::Result<DataStore> {
    println!("=== Demo 1: Transitive Closure ===");
    let store = DataStore::new(StoreConfig::default().with_equality(EqualityMode::NoUna))?;

    let summary = store.import_text(&cycle_document(CYCLE_LENGTH), &Prefixes::default(), UpdateType::Add)?;
    println!("✓ Imported {} facts and {} rule(s)", summary.facts, summary.rules);

    let stats = store.materialize(false)?;
    println!(
        "✓ Materialized in {} rounds ({} derivations, {} new triples)",
        stats.rounds, stats.derivations, stats.inserted
    );

    println!("\nTriple counts:");
    print_counts(&store)?;
    Ok(store)
}

fn demo_equality(store: &DataStore) -> anyhow::Result<()> {
    println!("\n=== Demo 2: Equality Reasoning ===");
    store.import_text(
        "@prefix ex: <http://example.org/> .\n\
         [?y1, owl:sameAs, ?y2] :- ex:R(?x, ?y1), ex:R(?x, ?y2) .",
        &Prefixes::default(),
        UpdateType::Add,
    )?;
    println!("✓ Added a rule deriving owl:sameAs between R-successors");

    let stats = store.materialize(true)?;
    println!("✓ Incremental materialization: {} merges, {} clashes", stats.merges, stats.clashes);

    let n0 = store.resolve(&[deductive_store::Term::iri("http://example.org/n0")])?[0];
    println!("  n0 now has {} equivalent terms", store.equivalents_of(n0)?.len());

    println!("\nTriple counts:");
    print_counts(store)
}

fn demo_queries(store: &DataStore) -> anyhow::Result<()> {
    println!("\n=== Demo 3: Queries ===");

    let queries = [
        (QueryDomain::IdbRep, "SELECT ?x ?y WHERE { ?x ex:R ?y }"),
        (QueryDomain::Idb, "SELECT DISTINCT ?x WHERE { ?x owl:sameAs ex:n0 }"),
    ];

    let mut prefixes = Prefixes::default();
    prefixes.declare("ex", "http://example.org/");

    for (domain, text) in queries {
        println!("\n[{}] {}", domain, text);
        let options = QueryOptions::new(domain).with_prefixes(prefixes.clone());
        let mut answers = store.compile_query_text(text, &options)?;

        let mut multiplicity = answers.open()?;
        let mut rows = 0;
        while multiplicity > 0 {
            let values = (0..answers.arity())
                .map(|i| answers.render(i))
                .collect::<Result<Vec<_>, _>>()?;
            println!("  {} (x{})", values.join(" "), multiplicity);
            rows += 1;
            multiplicity = answers.advance()?;
        }
        println!("  → {} row(s)", rows);
    }

    println!("\n✅ All queries executed successfully!");
    Ok(())
}
