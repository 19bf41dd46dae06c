//! Freshmaker events API records.
//!
//! A page looks like:
//!
//! ```text
//! {
//!   "items": [ { "id": 42, "search_key": "7", "builds": [ ... ], ... } ],
//!   "meta":  { "next": "https://.../events/?page=2&per_page=100", ... }
//! }
//! ```
//!
//! Records are decoded one at a time: a page only has to be a JSON object
//! with `items` and `meta`, and each item is read through [`FeedItem::read`],
//! which looks at `search_key` before anything else. A record with a bad
//! shape costs that record, not the page.
//!
//! Unknown fields are ignored. Fields the pipeline keys on (`id`,
//! `search_key`, `builds[].build_id`) accept both JSON strings and numbers,
//! because the upstream API has served both over its lifetime.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One page of the events feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    /// Raw event records, in feed order.
    pub items: Vec<Value>,
    pub meta: PageMeta,
}

/// Pagination metadata. Only `next` drives the walk; the rest is informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub pages: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// A build-trigger event as served by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    #[serde(deserialize_with = "event_id")]
    pub id: String,
    pub event_type_id: i64,
    pub message_id: String,
    pub state: i64,
    pub state_name: String,
    #[serde(default)]
    pub state_reason: Option<String>,
    pub url: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub search_key: Option<String>,
    #[serde(default)]
    pub builds: Vec<FeedBuild>,
}

/// A build entry attached to an event.
///
/// `build_id` is a Koji *task* id, not a build id; the real build id is
/// recovered from the task's result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedBuild {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub build_id: Option<i64>,
    #[serde(default)]
    pub original_nvr: Option<String>,
}

/// A raw feed record, sorted by what ingestion does with it.
#[derive(Debug)]
pub enum FeedItem {
    /// Triggered by an advisory and shaped like an event.
    Event { advisory_id: i64, event: FeedEvent },
    /// `search_key` is missing or not an integer.
    NotAnAdvisory {
        id: Option<String>,
        search_key: Option<String>,
    },
    /// Triggered by an advisory, but the record is not a valid event.
    Malformed {
        id: Option<String>,
        error: serde_json::Error,
    },
}

impl FeedItem {
    pub fn read(item: &Value) -> Self {
        let id = item.get("id").and_then(scalar_text);
        let search_key = item.get("search_key").and_then(scalar_text);
        let Some(advisory_id) = search_key.as_deref().and_then(parse_advisory_id) else {
            return FeedItem::NotAnAdvisory { id, search_key };
        };
        match FeedEvent::deserialize(item) {
            Ok(event) => FeedItem::Event { advisory_id, event },
            Err(error) => FeedItem::Malformed { id, error },
        }
    }
}

impl FeedEvent {
    /// The advisory this event was triggered by, if `search_key` is an integer.
    pub fn advisory_id(&self) -> Option<i64> {
        self.search_key.as_deref().and_then(parse_advisory_id)
    }
}

impl FeedBuild {
    /// The Koji task id behind this entry.
    ///
    /// Missing, zero and negative ids are known-faulty upstream data and
    /// yield `None`.
    pub fn task_id(&self) -> Option<i64> {
        self.build_id.filter(|id| *id > 0)
    }
}

/// Parse a `search_key` as an advisory id.
///
/// Surrounding whitespace and an explicit sign are accepted; anything else
/// that is not a base-10 integer is rejected.
pub fn parse_advisory_id(search_key: &str) -> Option<i64> {
    search_key.trim().parse::<i64>().ok()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn event_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_text(&value)
        .ok_or_else(|| D::Error::custom(format!("event id must be a string or a number, got {value}")))
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(scalar_text))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
