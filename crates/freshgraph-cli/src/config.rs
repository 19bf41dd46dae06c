//! Command-line and environment configuration.
//!
//! Every connection setting can come from a flag or its environment variable;
//! flags win.

use clap::{Args, ValueEnum};
use freshgraph_ingest::{HttpConfig, RetryPolicy, TeiidConfig, DEFAULT_FEED_URL};
use freshgraph_store::Neo4jConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct FeedArgs {
    /// First page of the Freshmaker events API.
    #[arg(long, env = "FRESHGRAPH_FEED_URL", default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// Per-request timeout in seconds.
    #[arg(long, env = "FRESHGRAPH_HTTP_TIMEOUT", default_value_t = 15)]
    pub http_timeout_secs: u64,

    /// Retries for connection errors and 500/502/504 responses.
    #[arg(long, env = "FRESHGRAPH_HTTP_RETRIES", default_value_t = 3)]
    pub http_retries: u32,
}

impl FeedArgs {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            retry: RetryPolicy {
                max_retries: self.http_retries,
                ..RetryPolicy::default()
            },
            ..HttpConfig::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TeiidArgs {
    #[arg(long, env = "TEIID_HOST")]
    pub teiid_host: String,

    #[arg(long, env = "TEIID_PORT", default_value_t = TeiidConfig::DEFAULT_PORT)]
    pub teiid_port: u16,

    #[arg(long, env = "TEIID_DATABASE", default_value = "public")]
    pub teiid_database: String,

    #[arg(long, env = "TEIID_USER")]
    pub teiid_user: String,

    #[arg(long, env = "TEIID_PASSWORD", hide_env_values = true)]
    pub teiid_password: String,
}

impl TeiidArgs {
    pub fn config(&self) -> TeiidConfig {
        TeiidConfig {
            host: self.teiid_host.clone(),
            port: self.teiid_port,
            database: self.teiid_database.clone(),
            user: self.teiid_user.clone(),
            password: self.teiid_password.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct Neo4jArgs {
    #[arg(long, env = "NEO4J_URI", default_value = "bolt://localhost:7687")]
    pub neo4j_uri: String,

    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    pub neo4j_user: String,

    #[arg(long, env = "NEO4J_PASSWORD", default_value = "neo4j", hide_env_values = true)]
    pub neo4j_password: String,
}

impl Neo4jArgs {
    pub fn config(&self) -> Neo4jConfig {
        Neo4jConfig {
            uri: self.neo4j_uri.clone(),
            user: self.neo4j_user.clone(),
            password: self.neo4j_password.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// In-process graph persisted to a JSON snapshot.
    Memory,
    Neo4j,
}

#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    #[arg(long, env = "FRESHGRAPH_GRAPH_BACKEND", value_enum, default_value_t = Backend::Memory)]
    pub graph_backend: Backend,

    /// Snapshot file for the memory backend; created if missing.
    #[arg(long, env = "FRESHGRAPH_SNAPSHOT", default_value = "freshgraph-graph.json")]
    pub snapshot: PathBuf,

    #[command(flatten)]
    pub neo4j: Neo4jArgs,
}
