//! Lazy page iteration
//!
//! [`PageIterator`] drives one paginator against the HTTP client, one page
//! per `next_page` call. The stored position only advances after a page was
//! fetched and decoded, so a failed call can be retried from the same
//! position.

use super::types::{NextPage, PageRequest, PageToken, Paginator, RecordSelector};
use crate::error::Result;
use crate::http::{HttpClient, RequestConfig};
use serde_json::Value;
use tracing::debug;

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// Raw records, in response order
    pub records: Vec<Value>,
    /// Position this page was fetched from
    pub token: Option<PageToken>,
}

/// Iterates the pages of one request template
pub struct PageIterator<'a> {
    client: &'a HttpClient,
    request: PageRequest,
    paginator: &'a dyn Paginator,
    selector: RecordSelector,
    token: Option<PageToken>,
    done: bool,
    pages: u64,
}

impl<'a> PageIterator<'a> {
    /// Create an iterator positioned at the paginator's first page
    pub fn new(
        client: &'a HttpClient,
        request: PageRequest,
        paginator: &'a dyn Paginator,
        selector: RecordSelector,
    ) -> Self {
        Self {
            client,
            request,
            token: paginator.initial_token(),
            paginator,
            selector,
            done: false,
            pages: 0,
        }
    }

    /// Restart from a previously returned position
    #[must_use]
    pub fn resume_from(mut self, token: PageToken) -> Self {
        self.token = Some(token);
        self.done = false;
        self
    }

    /// Position of the next page to fetch
    pub fn cursor(&self) -> Option<&PageToken> {
        self.token.as_ref()
    }

    /// Whether iteration has finished
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> u64 {
        self.pages
    }

    /// Stop before the paginator runs out
    pub fn stop(&mut self) {
        self.done = true;
    }

    /// Fetch the next page, or `None` once exhausted
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }

        let mut request = self.request.clone();
        self.paginator
            .apply_token(&mut request, self.token.as_ref());

        let config = RequestConfig {
            query: request.query,
            body: request.body,
            ..RequestConfig::default()
        };
        let response = self
            .client
            .request(request.method, &request.path, config)
            .await?;

        let records = self.selector.extract(&response.body)?;
        let next = self
            .paginator
            .process_response(&response.body, &records, self.token.as_ref())?;

        self.pages += 1;
        debug!(
            path = %request.path,
            page = self.pages,
            records = records.len(),
            "Fetched page"
        );

        let fetched_from = match next {
            NextPage::Continue(token) => self.token.replace(token),
            NextPage::Done => {
                self.done = true;
                self.token.clone()
            }
        };

        Ok(Some(Page {
            records,
            token: fetched_from,
        }))
    }
}

impl std::fmt::Debug for PageIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageIterator")
            .field("path", &self.request.path)
            .field("paginator", &self.paginator)
            .field("token", &self.token)
            .field("done", &self.done)
            .field("pages", &self.pages)
            .finish()
    }
}
