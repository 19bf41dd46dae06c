//! Task-to-build resolution.
//!
//! The events feed only knows Koji task ids. The build a task produced is
//! recorded in the task's XML-RPC result, which the data warehouse exposes as
//! `brew.task.result`.

use crate::error::Result;
use crate::xml::koji_builds;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// A result row: column name to value.
pub type Row = BTreeMap<String, Value>;

pub const TASK_RESULT_QUERY: &str = "SELECT result FROM brew.task WHERE id = $1";

/// Tabular query service with positional integer parameters (`$1`, `$2`, ...).
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn query(&self, sql: &str, params: &[i64]) -> Result<Vec<Row>>;
}

pub struct TaskResolver<Q> {
    service: Q,
}

impl<Q: QueryService> TaskResolver<Q> {
    pub fn new(service: Q) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Q {
        &self.service
    }

    /// Raw result payload of a task; `None` when there is no row or the
    /// result is null.
    pub async fn task_result(&self, task_id: i64) -> Result<Option<String>> {
        let rows = self.service.query(TASK_RESULT_QUERY, &[task_id]).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("result"))
            .and_then(|value| match value {
                Value::String(s) => Some(s),
                _ => None,
            }))
    }

    /// Build id produced by a task, if the task result names one.
    pub async fn resolve(&self, task_id: i64) -> Result<Option<String>> {
        let Some(payload) = self.task_result(task_id).await? else {
            tracing::debug!(task_id, "no result recorded for task");
            return Ok(None);
        };

        let builds = match koji_builds(&payload) {
            Ok(builds) => builds,
            Err(err) => {
                tracing::warn!(task_id, error = %err, "task result is not valid xml");
                return Ok(None);
            }
        };

        let mut builds = builds.into_iter();
        let first = builds.next().filter(|id| !id.is_empty());
        let ignored: Vec<String> = builds.collect();
        if first.is_some() && !ignored.is_empty() {
            tracing::warn!(task_id, ?ignored, "task produced several builds; keeping the first");
        }
        Ok(first)
    }
}
