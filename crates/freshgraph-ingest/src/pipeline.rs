//! The ingestion run.
//!
//! ```text
//! page ─► item ─► search_key is an integer? ──no──► skip
//!                     │yes
//!                     ▼
//!         shaped like an event? ──no──► skip (warn)
//!                     │yes
//!                     ▼
//!         upsert Event, upsert Advisory, Event -[TRIGGERED_BY]-> Advisory
//!                     │
//!                     ▼ for each build entry
//!         task id > 0? ─► resolve build id ─► upsert container build
//!                                         ─► Event -[TRIGGERED]-> build
//! ```
//!
//! Everything runs strictly in feed order, one call at a time. Skips are
//! logged; any returned error aborts the run, keeping earlier writes.

use crate::error::Result;
use crate::paginator::{PageSource, Paginator};
use crate::task::{QueryService, TaskResolver};
use freshgraph_model::{EventNode, FeedBuild, FeedEvent, FeedItem, NodeKey};
use freshgraph_store::{BuildOutcome, GraphStore, GraphWriter};
use std::fmt;
use url::Url;

/// Optional run window. The feed has no server-side filter, so every run is a
/// full resync and both bounds are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunWindow {
    pub since: Option<String>,
    pub until: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub pages: usize,
    pub events_seen: usize,
    pub events_written: usize,
    pub events_skipped: usize,
    pub builds_written: usize,
    pub builds_skipped: usize,
    pub builds_reconciled: usize,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} events ({} written, {} skipped), {} builds written ({} reconciled), {} build entries skipped",
            self.pages,
            self.events_seen,
            self.events_written,
            self.events_skipped,
            self.builds_written,
            self.builds_reconciled,
            self.builds_skipped,
        )
    }
}

pub struct IngestionPipeline<S, Q, G> {
    source: S,
    resolver: TaskResolver<Q>,
    writer: GraphWriter<G>,
    start_url: Url,
}

impl<S, Q, G> IngestionPipeline<S, Q, G>
where
    S: PageSource,
    Q: QueryService,
    G: GraphStore,
{
    pub fn new(source: S, resolver: TaskResolver<Q>, writer: GraphWriter<G>, start_url: Url) -> Self {
        Self {
            source,
            resolver,
            writer,
            start_url,
        }
    }

    pub fn resolver(&self) -> &TaskResolver<Q> {
        &self.resolver
    }

    pub fn writer(&self) -> &GraphWriter<G> {
        &self.writer
    }

    pub async fn run(&self, window: &RunWindow) -> Result<IngestReport> {
        if window.since.is_some() || window.until.is_some() {
            tracing::warn!(
                since = ?window.since,
                until = ?window.until,
                "the events feed cannot be filtered by time; ignoring the window and doing a full resync"
            );
        }

        let mut report = IngestReport::default();
        let mut pages = Paginator::new(&self.source, self.start_url.clone());
        tracing::info!(url = %self.start_url, "starting events feed walk");

        while let Some(page) = pages.next_page().await? {
            for item in &page.items {
                report.events_seen += 1;
                match FeedItem::read(item) {
                    FeedItem::Event { advisory_id, event } => {
                        self.ingest_event(&event, advisory_id, &mut report).await?;
                    }
                    FeedItem::NotAnAdvisory { id, search_key } => {
                        tracing::debug!(
                            event_id = ?id,
                            ?search_key,
                            "search_key is not an advisory id; skipping event"
                        );
                        report.events_skipped += 1;
                    }
                    FeedItem::Malformed { id, error } => {
                        tracing::warn!(event_id = ?id, %error, "malformed event record; skipping");
                        report.events_skipped += 1;
                    }
                }
            }
        }
        report.pages = pages.pages_fetched();

        tracing::info!(
            pages = report.pages,
            events = report.events_seen,
            builds = report.builds_written,
            reconciled = report.builds_reconciled,
            "events feed ingested"
        );
        Ok(report)
    }

    async fn ingest_event(
        &self,
        event: &FeedEvent,
        advisory_id: i64,
        report: &mut IngestReport,
    ) -> Result<()> {
        let event_key = self.writer.upsert_event(&EventNode::from(event)).await?;
        let advisory_key = self.writer.upsert_advisory(advisory_id).await?;
        self.writer.link_advisory(&event_key, &advisory_key).await?;
        report.events_written += 1;

        for build in &event.builds {
            self.ingest_build(&event.id, &event_key, build, report).await?;
        }
        Ok(())
    }

    async fn ingest_build(
        &self,
        event_id: &str,
        event_key: &NodeKey,
        build: &FeedBuild,
        report: &mut IngestReport,
    ) -> Result<()> {
        let Some(task_id) = build.task_id() else {
            tracing::debug!(event_id, build_id = ?build.build_id, "build entry has no usable task id");
            report.builds_skipped += 1;
            return Ok(());
        };

        let Some(build_id) = self.resolver.resolve(task_id).await? else {
            tracing::info!(event_id, task_id, "task did not resolve to a build; skipping");
            report.builds_skipped += 1;
            return Ok(());
        };

        let written = self
            .writer
            .upsert_container_build(&build_id, build.original_nvr.clone())
            .await?;
        if written.outcome == BuildOutcome::Reconciled {
            report.builds_reconciled += 1;
        }
        self.writer.link_build(event_key, &written).await?;
        report.builds_written += 1;
        tracing::debug!(event_id, task_id, build_id = %build_id, outcome = ?written.outcome, "linked build");
        Ok(())
    }
}
