use freshgraph_store::StoreError;

/// Fatal ingestion errors. Anything that only invalidates a single event or
/// build entry is logged and skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed events page from {url}: {source}")]
    MalformedPage {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid url {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("task query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
