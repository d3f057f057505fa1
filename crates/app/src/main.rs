mod ops;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use evidence_curator_core::{
    AnnotationSession, EvidenceUpdate, InMemoryCatalog, PageCatalog, QueryWithEvidence,
};
use ops::Op;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "evidence-curator", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Catalog JSON for the document being browsed
    #[arg(long, env = "EVIDENCE_CATALOG")]
    catalog: PathBuf,

    /// Saved annotation JSON to start from
    #[arg(long, env = "EVIDENCE_ANNOTATION")]
    annotation: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print evidence groups with their chunk scores.
    Show {
        /// Also print the digest of the saved form.
        #[arg(long, default_value_t = false)]
        digest: bool,
    },
    /// Apply authoring operations, e.g. --op "add 12" --op "mode custom".
    Edit {
        /// Operation to apply; repeat for several, applied in order.
        #[arg(long = "op", required = true)]
        ops: Vec<Op>,
        /// Where to write the resulting annotation. Printed when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print retrieval_relation rows for the annotation.
    Relations {
        #[arg(long)]
        query_id: i64,
    },
    /// Print the create-query request for the annotation.
    Request,
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "evidence-curator boot"
    );

    let catalog = InMemoryCatalog::load_json(&cli.catalog)
        .with_context(|| format!("loading catalog {}", cli.catalog.display()))?;
    let mut session = AnnotationSession::new();
    let mut updates = session.evidence.subscribe_updates();

    if let Some(path) = &cli.annotation {
        let record = read_annotation(path)?;
        session.load(&record, &catalog);
    }

    match cli.command {
        Command::Show { digest } => {
            print_groups(&session, &catalog);
            if digest {
                println!("digest: {}", session.evidence.evidence_digest());
            }
        }
        Command::Edit { ops, out } => {
            let before = session.evidence.evidence_digest();
            for op in &ops {
                ops::apply(&mut session, &catalog, op);
            }
            let logged = drain_updates(&mut updates);
            debug!(logged, "evidence updates drained");

            print_groups(&session, &catalog);
            if session.evidence.evidence_digest() == before {
                println!("evidence unchanged");
            }

            let record = serde_json::to_string_pretty(&session.to_record())?;
            match out {
                Some(path) => {
                    std::fs::write(&path, record)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "annotation written");
                }
                None => println!("{record}"),
            }
        }
        Command::Relations { query_id } => {
            println!("query_id,group_index,group_order,chunk_id,score");
            for row in session.evidence.retrieval_relations(query_id) {
                println!(
                    "{},{},{},{},{}",
                    row.query_id, row.group_index, row.group_order, row.chunk_id, row.score
                );
            }
        }
        Command::Request => {
            let request = session.to_create_request()?;
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }

    Ok(())
}

fn read_annotation(path: &Path) -> anyhow::Result<QueryWithEvidence> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading annotation {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing annotation {}", path.display()))
}

fn print_groups(session: &AnnotationSession, catalog: &impl PageCatalog) {
    let evidence = &session.evidence;
    println!("document: {}", catalog.document_title());
    if !session.query.contents.is_empty() {
        println!("question: {}", session.query.contents);
    }
    if let Some(page_id) = session.focus.focused() {
        println!("focus: page {page_id}");
    }
    println!(
        "mode={:?} pages={} groups={}",
        evidence.grouping_mode(),
        evidence.evidence_count(),
        evidence.groups().len()
    );

    for (index, page_ids) in evidence.groups().iter().enumerate() {
        println!("group {index}:");
        for page_id in page_ids {
            let Some(item) = evidence.item(*page_id) else {
                continue;
            };
            println!(
                "  page {} (#{} of {})",
                page_id, item.page.page_number, item.document_title
            );
            for chunk_id in &item.page.chunk_ids {
                println!(
                    "    chunk={} score={}",
                    chunk_id,
                    evidence.get_chunk_score(*chunk_id)
                );
            }
        }
    }
}

fn log_update(update: &EvidenceUpdate) {
    debug!(?update, "evidence update");
}

/// Logs every queued update. A lagging receiver reports how many were
/// overwritten and keeps reading from the oldest one still buffered.
fn drain_updates(updates: &mut broadcast::Receiver<EvidenceUpdate>) -> usize {
    let mut logged = 0;
    loop {
        match updates.try_recv() {
            Ok(update) => {
                log_update(&update);
                logged += 1;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "evidence updates dropped before they were logged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    logged
}
