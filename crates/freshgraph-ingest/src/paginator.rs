//! Walk of the events feed.
//!
//! The feed is a linked list of pages: each page's `meta.next` is the URL of
//! the following page, possibly relative, and `null` on the last page.

use crate::error::{IngestError, Result};
use crate::http::HttpClient;
use async_trait::async_trait;
use freshgraph_model::EventPage;
use url::Url;

/// Anything that can serve one page of the feed.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<EventPage>;
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch_page(&self, url: &Url) -> Result<EventPage> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|source| IngestError::MalformedPage {
            url: url.to_string(),
            source,
        })
    }
}

/// Single-pass cursor over the feed. Once exhausted it stays exhausted.
pub struct Paginator<'a, S: ?Sized> {
    source: &'a S,
    next: Option<Url>,
    fetched: usize,
}

impl<'a, S: PageSource + ?Sized> Paginator<'a, S> {
    pub fn new(source: &'a S, start: Url) -> Self {
        Self {
            source,
            next: Some(start),
            fetched: 0,
        }
    }

    /// Fetch the next page, or `None` once the feed has no further link.
    pub async fn next_page(&mut self) -> Result<Option<EventPage>> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };
        let page = self.source.fetch_page(&url).await?;
        self.fetched += 1;

        self.next = match page.meta.next.as_deref() {
            Some(next) if !next.is_empty() => {
                Some(url.join(next).map_err(|source| IngestError::Url {
                    url: next.to_string(),
                    source,
                })?)
            }
            _ => None,
        };
        tracing::debug!(
            url = %url,
            items = page.items.len(),
            has_next = self.next.is_some(),
            "fetched events page"
        );
        Ok(Some(page))
    }

    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }
}
