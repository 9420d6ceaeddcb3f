//! Deductive store CLI: load facts and rules, materialize, and query
//!
//! Runs an in-process `DataStore`; there is no server to connect to.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use deductive_store::rdf::Prefixes;
use deductive_store::{
    DataStore, EqualityMode, QueryDomain, QueryOptions, StoreConfig, UpdateType,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "deductive-store", version, about = "Deductive RDF store CLI")]
struct Cli {
    /// YAML store configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Equality reasoning mode (off, noUNA, UNA); overrides the config file
    #[arg(long, global = true)]
    equality: Option<EqualityMode>,

    /// Materialization threads, 0 for all cores; overrides the config file
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Load files, materialize, print counts and optionally answer a query
    Run {
        /// Fact files
        #[arg(long, num_args = 1..)]
        facts: Vec<PathBuf>,

        /// Rule files
        #[arg(long, num_args = 1..)]
        rules: Vec<PathBuf>,

        /// SELECT query to answer after materialization
        #[arg(long)]
        query: Option<String>,

        /// Domain the query ranges over (EDB, IDB, IDBrep, IDBrepNoEDB)
        #[arg(long, default_value = "IDB")]
        domain: QueryDomain,
    },
    /// Start an interactive REPL
    Shell,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = build_store(&cli).and_then(|store| match &cli.command {
        Commands::Run {
            facts,
            rules,
            query,
            domain,
        } => run(&store, facts, rules, query.as_deref(), *domain, &cli.format),
        Commands::Shell => run_shell(&store, &cli.format),
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn build_store(cli: &Cli) -> anyhow::Result<DataStore> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(equality) = cli.equality {
        config = config.with_equality(equality);
    }
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    Ok(DataStore::new(config)?)
}

fn load(store: &DataStore, path: &Path, prefixes: &Prefixes) -> anyhow::Result<()> {
    let summary = store
        .import_file(path, prefixes, UpdateType::Add)
        .with_context(|| format!("importing {}", path.display()))?;
    println!(
        "Loaded {}: {} fact(s), {} rule(s)",
        path.display(),
        summary.facts,
        summary.rules
    );
    Ok(())
}

fn run(
    store: &DataStore,
    facts: &[PathBuf],
    rules: &[PathBuf],
    query: Option<&str>,
    domain: QueryDomain,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let prefixes = Prefixes::default();
    for path in facts.iter().chain(rules) {
        load(store, path, &prefixes)?;
    }

    let stats = store.materialize(false)?;
    println!(
        "Materialized: {} round(s), {} derivation(s), {} merge(s)",
        stats.rounds, stats.derivations, stats.merges
    );
    print_counts(store, format)?;

    if let Some(text) = query {
        run_query(store, text, domain, &prefixes, format)?;
    }
    Ok(())
}

fn print_counts(store: &DataStore, format: &OutputFormat) -> anyhow::Result<()> {
    let mut counts = Vec::with_capacity(QueryDomain::ALL.len());
    for domain in QueryDomain::ALL {
        counts.push((domain.to_string(), store.count(domain)?));
    }

    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = counts
                .into_iter()
                .map(|(domain, count)| (domain, serde_json::Value::from(count)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        OutputFormat::Csv => {
            println!("domain,triples");
            for (domain, count) in counts {
                println!("{},{}", domain, count);
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["domain", "triples"]);
            for (domain, count) in counts {
                table.add_row(vec![domain, count.to_string()]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn run_query(
    store: &DataStore,
    text: &str,
    domain: QueryDomain,
    prefixes: &Prefixes,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let options = QueryOptions::new(domain).with_prefixes(prefixes.clone());
    let mut answers = store.compile_query_text(text, &options)?;

    let mut columns: Vec<String> = answers
        .variable_names()
        .iter()
        .map(|name| format!("?{}", name))
        .collect();
    columns.push("multiplicity".to_string());

    let mut records: Vec<Vec<String>> = Vec::new();
    let mut multiplicity = answers.open()?;
    while multiplicity > 0 {
        let mut row = (0..answers.arity())
            .map(|i| answers.render(i))
            .collect::<Result<Vec<_>, _>>()?;
        row.push(multiplicity.to_string());
        records.push(row);
        multiplicity = answers.advance()?;
    }
    answers.dispose();

    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = records
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .zip(row)
                        .map(|(column, value)| (column.clone(), serde_json::Value::from(value.as_str())))
                        .collect::<serde_json::Map<_, _>>()
                        .into()
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Csv => {
            println!("{}", columns.join(","));
            for row in &records {
                let cells: Vec<String> = row.iter().map(|v| format_csv_value(v)).collect();
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Table => {
            if records.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&columns);
            for row in &records {
                table.add_row(row);
            }

            println!("{}", table);
            println!("{} row(s)", records.len());
        }
    }

    Ok(())
}

fn run_shell(store: &DataStore, format: &OutputFormat) -> anyhow::Result<()> {
    println!("Deductive Store Interactive Shell");
    println!("Type SELECT queries, or :help for commands. :quit to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();
    let prefixes = Prefixes::default();
    let mut domain = QueryDomain::Idb;

    loop {
        eprint!("deductive> ");

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (command, argument) = match trimmed.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (trimmed, ""),
        };

        let result = match command {
            ":quit" | ":exit" | ":q" => break,
            ":help" | ":h" => {
                println!("Commands:");
                println!("  :load <file>          Import facts and rules");
                println!("  :rules                List active rules");
                println!("  :materialize [full]   Materialize (incremental unless 'full')");
                println!("  :count                Triple counts per domain");
                println!("  :domain <name>        Query domain (EDB, IDB, IDBrep, IDBrepNoEDB)");
                println!("  :export <file>        Write the domain's facts and the rules to a file");
                println!("  :quit                 Exit shell");
                println!("  <query>               Answer a SELECT query");
                Ok(())
            }
            ":load" => load(store, Path::new(argument), &prefixes),
            ":rules" => print_rules(store, &prefixes),
            ":materialize" => materialize(store, argument != "full"),
            ":count" => print_counts(store, format),
            ":domain" => match argument.parse::<QueryDomain>() {
                Ok(parsed) => {
                    domain = parsed;
                    println!("Query domain: {}", domain);
                    Ok(())
                }
                Err(e) => Err(anyhow::anyhow!(e)),
            },
            ":export" if argument.is_empty() => Err(anyhow::anyhow!("usage: :export <file>")),
            ":export" => store
                .export_file(argument, domain, &prefixes)
                .with_context(|| format!("failed to export to {}", argument))
                .map(|()| println!("Exported {} to {}", domain, argument)),
            other if other.starts_with(':') => Err(anyhow::anyhow!("unknown command {}", other)),
            _ => run_query(store, trimmed, domain, &prefixes, format),
        };

        if let Err(e) = result {
            eprintln!("Error: {:#}", e);
        }
    }

    println!("Bye!");
    Ok(())
}

fn print_rules(store: &DataStore, prefixes: &Prefixes) -> anyhow::Result<()> {
    let rules = store.rules_text(prefixes)?;
    if rules.is_empty() {
        println!("(no rules)");
    }
    for rule in rules {
        println!("{}", rule);
    }
    Ok(())
}

fn materialize(store: &DataStore, incremental: bool) -> anyhow::Result<()> {
    if store.is_disposed() {
        bail!("store has been disposed");
    }
    let stats = store.materialize(incremental)?;
    println!(
        "{} round(s), {} derivation(s), {} new triple(s), {} merge(s), {} clash(es)",
        stats.rounds, stats.derivations, stats.inserted, stats.merges, stats.clashes
    );
    if stats.deleted > 0 {
        println!("{} triple(s) overdeleted, {} rederived", stats.deleted, stats.rederived);
    }
    Ok(())
}

fn format_csv_value(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
