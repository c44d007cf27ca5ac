//! Kaiseki CLI - drive the annotation workbench from the terminal
//!
//! Usage:
//!   kaiseki segment <text>
//!   kaiseki chart <text>
//!   kaiseki expand <text> <i> <j>
//!   kaiseki match <text> <i> <j>
//!   kaiseki patterns
//!   kaiseki verify <subject> <predicate> <object> --ontology <file>

use anyhow::Context;
use clap::{Parser, Subcommand};
use kaiseki_core::{AppConfig, Ontology};
use kaiseki_gateway::{Gateway, HttpGateway};
use kaiseki_session::{AnnotationSession, Intent};
use kaiseki_verify::Verdict;

#[derive(Parser)]
#[command(name = "kaiseki")]
#[command(about = "Japanese annotation workbench CLI")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file; environment variables otherwise
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a sentence into bunsetsu
    Segment {
        /// Sentence text
        text: String,
    },
    /// Build and print the combinability chart for a sentence
    Chart {
        text: String,
    },
    /// Expand one chart cell into candidate trees
    Expand {
        text: String,
        /// Row index of the cell
        i: usize,
        /// Column index of the cell
        j: usize,
    },
    /// Expand a cell and extract triples for all matched patterns
    Match {
        text: String,
        /// Row index of the cell
        i: usize,
        /// Column index of the cell
        j: usize,
    },
    /// List the pattern catalog
    Patterns,
    /// Run the verification pipeline for one triple
    Verify {
        subject: String,
        predicate: String,
        object: String,
        /// JSON file holding the ontology (concepts and relations)
        #[arg(long)]
        ontology: String,
        /// Register the triple on a valid verdict and print its id
        #[arg(long)]
        register: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    let gateway = HttpGateway::from_config(&config.service)?;

    match cli.command {
        Commands::Segment { text } => {
            let mut session = AnnotationSession::new(config);
            let status = session.load_sentence(&gateway, text).await?;
            println!("status: {status:?}");
            for (idx, bunsetsu) in session.segmentation().iter().enumerate() {
                let types: Vec<String> = bunsetsu
                    .morph_types()
                    .iter()
                    .map(|t| t.to_string())
                    .collect();
                println!("{idx}: {} [{}]", bunsetsu.surface(), types.join(", "));
            }
        }

        Commands::Chart { text } => {
            let mut session = AnnotationSession::new(config);
            session.load_sentence(&gateway, text).await?;
            session.build_chart(&gateway).await?;
            print_chart(&session);
        }

        Commands::Expand { text, i, j } => {
            let mut session = AnnotationSession::new(config);
            session.load_sentence(&gateway, text).await?;
            session.build_chart(&gateway).await?;
            session.dispatch(&gateway, Intent::SelectCell { i, j }).await?;

            match session.expansion() {
                Some(expansion) => match expansion.summary() {
                    Some(summary) => {
                        println!("pred=1: {}, pred=0: {}", summary.pred1, summary.pred0);
                        if let Some(tree) = expansion.active_tree() {
                            println!(
                                "tree {}: {} | {}",
                                tree.tree_number, tree.left_split, tree.right_split
                            );
                        }
                    }
                    None => println!("cell ({i}, {j}) is terminal"),
                },
                None => println!("cell ({i}, {j}) is not expandable"),
            }
        }

        Commands::Match { text, i, j } => {
            let mut session = AnnotationSession::new(config);
            session.load_sentence(&gateway, text).await?;
            session.build_chart(&gateway).await?;
            session.dispatch(&gateway, Intent::SelectCell { i, j }).await?;
            session.dispatch(&gateway, Intent::SelectAllMatched).await?;

            for (idx, triple) in session.matching().triples().iter().enumerate() {
                println!("{idx}: {triple}");
                if let Some(provenance) = &triple.provenance {
                    if let Some(pattern) = &provenance.pattern_text {
                        println!("   pattern: {pattern}");
                    }
                }
                for (slot, value) in triple.core_bindings() {
                    println!("   {slot} = {value}");
                }
            }
        }

        Commands::Patterns => {
            let catalog = gateway.list_patterns().await?;
            for (id, descriptor) in &catalog {
                println!("{id}: {}", descriptor.representative_pattern);
            }
        }

        Commands::Verify {
            subject,
            predicate,
            object,
            ontology,
            register,
        } => {
            let content = std::fs::read_to_string(&ontology)
                .with_context(|| format!("reading ontology file {ontology}"))?;
            let ontology: Ontology =
                serde_json::from_str(&content).context("parsing ontology file")?;

            match ontology.find_relation(&predicate) {
                Some(relation) => println!(
                    "relation: {} ({} -> {})",
                    relation.label, relation.domain, relation.object_class
                ),
                None => println!("note: {predicate} is not defined in the local ontology"),
            }

            let triple = kaiseki_core::Triple::new(subject, predicate, object);
            let run = kaiseki_verify::run_pipeline(&gateway, triple, &ontology).await;

            if let Some(definition) = &run.definition {
                println!("stage1 matched: {}", definition.matched);
            }
            if let Some(direction) = &run.direction {
                println!(
                    "stage2 pattern: {}",
                    direction.pattern.as_deref().unwrap_or("A")
                );
            }
            if let Some(membership) = &run.membership {
                println!(
                    "step4 valid: {} (subject_class: {}, object_class: {})",
                    membership.valid, membership.subject_class, membership.object_class
                );
            }
            println!("{}", run.verdict);

            if register && run.verdict == Verdict::Valid {
                let mut registry = kaiseki_verify::TripleRegistry::new();
                let entry = registry.register(&run)?;
                println!("registered id {}: {}", entry.id, entry.triple);
            }
        }
    }

    Ok(())
}

fn print_chart(session: &AnnotationSession) {
    let chart = match session.chart() {
        Some(chart) => chart,
        None => return,
    };
    for i in 0..chart.len() {
        for j in i..chart.len() {
            match chart.cell(i, j) {
                Some(kaiseki_chart::Cell::Diagonal(text)) => {
                    println!("({i}, {j}) [bunsetsu] {text}");
                }
                Some(kaiseki_chart::Cell::Combinable(cell)) => {
                    println!(
                        "({i}, {j}) {} (pred1: {}, pred0: {})",
                        cell.text, cell.counts.pred1, cell.counts.pred0
                    );
                }
                None => {}
            }
        }
    }
}
