//! Freshgraph CLI
//!
//! - `run`: walk the Freshmaker events feed and upsert events, advisories and
//!   container builds into the graph
//! - `init-constraints`: create the per-label `id` uniqueness constraints in
//!   Neo4j

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use freshgraph_ingest::{
    HttpClient, IngestReport, IngestionPipeline, RunWindow, TaskResolver, TeiidClient,
};
use freshgraph_store::{GraphStore, GraphWriter, MemoryGraph, Neo4jGraph};
use std::sync::Arc;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};
use url::Url;

mod config;

use config::{Backend, FeedArgs, GraphArgs, Neo4jArgs, TeiidArgs};

#[derive(Parser)]
#[command(name = "freshgraph")]
#[command(author, version, about = "Freshmaker build-event graph ingester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the whole events feed (full resync).
    Run {
        /// Accepted for compatibility; the feed cannot be filtered by time.
        #[arg(long)]
        since: Option<String>,
        /// Accepted for compatibility; the feed cannot be filtered by time.
        #[arg(long)]
        until: Option<String>,
        #[command(flatten)]
        feed: FeedArgs,
        #[command(flatten)]
        teiid: TeiidArgs,
        #[command(flatten)]
        graph: GraphArgs,
    },

    /// Create the uniqueness constraints the ingester relies on.
    InitConstraints {
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            since,
            until,
            feed,
            teiid,
            graph,
        } => {
            let window = RunWindow { since, until };
            let report = cmd_run(&window, &feed, &teiid, &graph).await?;
            eprintln!("{} {}", "ingested".green().bold(), report);
        }
        Commands::InitConstraints { neo4j } => {
            let graph = Neo4jGraph::connect(&neo4j.config())
                .await
                .with_context(|| format!("failed to connect to {}", neo4j.neo4j_uri))?;
            graph.ensure_constraints().await?;
            eprintln!("{} constraints in place", "ok".green().bold());
        }
    }
    Ok(())
}

/// Compact logs on stderr, `info` unless `RUST_LOG` says otherwise.
fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow::anyhow!("error initializing logging: {err}"))
}

async fn cmd_run(
    window: &RunWindow,
    feed: &FeedArgs,
    teiid: &TeiidArgs,
    graph: &GraphArgs,
) -> Result<IngestReport> {
    let start = Url::parse(&feed.feed_url)
        .with_context(|| format!("invalid feed url {:?}", feed.feed_url))?;
    let http = HttpClient::new(&feed.http_config())?;
    let resolver = TaskResolver::new(TeiidClient::connect_lazy(&teiid.config()));

    match graph.graph_backend {
        Backend::Memory => {
            let store = Arc::new(
                MemoryGraph::load(&graph.snapshot)
                    .with_context(|| format!("failed to load {}", graph.snapshot.display()))?,
            );
            let outcome = run_pipeline(http, resolver, store.clone(), start, window).await;

            // committed writes are kept even when the run fails
            store
                .save(&graph.snapshot)
                .with_context(|| format!("failed to save {}", graph.snapshot.display()))?;
            eprintln!(
                "{} {} ({} nodes, {} edges)",
                "wrote".green().bold(),
                graph.snapshot.display().to_string().bold(),
                store.node_count(),
                store.edge_count()
            );
            outcome
        }
        Backend::Neo4j => {
            let store = Neo4jGraph::connect(&graph.neo4j.config())
                .await
                .with_context(|| format!("failed to connect to {}", graph.neo4j.neo4j_uri))?;
            store.ensure_constraints().await?;
            run_pipeline(http, resolver, store, start, window).await
        }
    }
}

async fn run_pipeline<G: GraphStore>(
    http: HttpClient,
    resolver: TaskResolver<TeiidClient>,
    store: G,
    start: Url,
    window: &RunWindow,
) -> Result<IngestReport> {
    let pipeline = IngestionPipeline::new(http, resolver, GraphWriter::new(store), start);
    Ok(pipeline.run(window).await?)
}
