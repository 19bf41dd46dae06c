//! Freshmaker events feed ingestion.
//!
//! The pieces, leaf first:
//!
//! - [`http`]: retrying HTTP session
//! - [`paginator`]: single-pass walk of the paginated feed
//! - [`xml`] and [`task`]: Koji task id to build id resolution
//! - [`teiid`]: the warehouse behind task resolution (feature `teiid`)
//! - [`pipeline`]: the per-page, per-event orchestration

pub mod error;
pub mod http;
pub mod paginator;
pub mod pipeline;
pub mod task;
#[cfg(feature = "teiid")]
pub mod teiid;
pub mod xml;

pub use error::{IngestError, Result};
pub use http::{HttpClient, HttpConfig, RetryPolicy};
pub use paginator::{PageSource, Paginator};
pub use pipeline::{IngestReport, IngestionPipeline, RunWindow};
pub use task::{QueryService, Row, TaskResolver, TASK_RESULT_QUERY};
#[cfg(feature = "teiid")]
pub use teiid::{TeiidClient, TeiidConfig};
pub use xml::{koji_builds, XmlError};

/// Default entry point of the events feed.
pub const DEFAULT_FEED_URL: &str =
    "https://freshmaker.engineering.redhat.com/api/1/events/?per_page=100";
