use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::catalog::{FetchError, PagedMovieSource, RemotePage};

use super::criteria::{Criteria, CriteriaError, CriteriaUpdate};
use super::debounce::{QueryInput, DEFAULT_QUIESCENCE};
use super::pagination::ResultPage;
use super::sync::{CriteriaStore, SyncedCriteria};

/// What a remote-backed listing currently shows.
///
/// A failed fetch sets `error` but leaves `page` at the last good result,
/// so "could not load" stays distinguishable from "nothing matched".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteView {
    pub page: Option<ResultPage>,
    pub error: Option<FetchError>,
    pub loading: bool,
    /// Most recently issued request.
    pub latest_request: u64,
    /// Request whose outcome is shown.
    pub applied_request: u64,
}

impl RemoteView {
    pub fn is_settled(&self) -> bool {
        !self.loading && self.applied_request == self.latest_request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

/// Issues request tickets and applies responses, last request wins.
///
/// Both operations run under the view's lock, so a response can never be
/// applied after a newer request was issued.
#[derive(Debug)]
pub struct RequestTracker {
    view: watch::Sender<RemoteView>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        let (view, _) = watch::channel(RemoteView::default());
        Self { view }
    }

    pub fn begin(&self) -> u64 {
        let mut ticket = 0;
        self.view.send_modify(|view| {
            view.latest_request += 1;
            view.loading = true;
            ticket = view.latest_request;
        });
        ticket
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.view.borrow().latest_request == ticket
    }

    pub fn complete(&self, ticket: u64, result: Result<RemotePage, FetchError>) -> Completion {
        let mut completion = Completion::Stale;
        self.view.send_if_modified(|view| {
            if view.latest_request != ticket {
                return false;
            }
            view.loading = false;
            view.applied_request = ticket;
            match result {
                Ok(page) => {
                    view.page = Some(page.into_result_page());
                    view.error = None;
                }
                Err(e) => {
                    warn!(request = ticket, error = %e, "Movie fetch failed");
                    view.error = Some(e);
                }
            }
            completion = Completion::Applied;
            true
        });
        if completion == Completion::Stale {
            debug!(request = ticket, "Discarding stale response");
        }
        completion
    }

    pub fn view(&self) -> RemoteView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RemoteView> {
        self.view.subscribe()
    }
}

/// Discovery against a source that filters and pages remotely. Every
/// criteria change issues a refetch; only the newest one is shown.
pub struct RemoteDiscovery<P, S> {
    source: Arc<P>,
    synced: SyncedCriteria<S>,
    tracker: Arc<RequestTracker>,
    in_flight: Option<JoinHandle<()>>,
    abort_superseded: bool,
    query_input: QueryInput,
}

impl<P: PagedMovieSource, S: CriteriaStore> RemoteDiscovery<P, S> {
    /// Read the criteria from the store and issue the first fetch.
    /// Must be called within a tokio runtime.
    pub fn new(source: Arc<P>, store: S) -> Self {
        let synced = SyncedCriteria::mount(store);
        let query_input = QueryInput::new(synced.criteria().query.clone(), DEFAULT_QUIESCENCE);
        let mut discovery = Self {
            source,
            synced,
            tracker: Arc::new(RequestTracker::new()),
            in_flight: None,
            abort_superseded: true,
            query_input,
        };
        discovery.refetch();
        discovery
    }

    /// Whether a newer request aborts the one in flight. When off,
    /// superseded responses still arrive and are discarded.
    pub fn with_abort_superseded(mut self, abort: bool) -> Self {
        self.abort_superseded = abort;
        self
    }

    /// Quiet period for typed search text, e.g. `config.discovery.debounce()`.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.query_input = QueryInput::new(self.criteria().query.clone(), window);
        self
    }

    pub fn criteria(&self) -> &Criteria {
        self.synced.criteria()
    }

    pub fn store(&self) -> &S {
        self.synced.store()
    }

    pub fn store_mut(&mut self) -> &mut S {
        self.synced.store_mut()
    }

    pub fn subscribe(&self) -> watch::Receiver<RemoteView> {
        self.tracker.subscribe()
    }

    pub fn set_criteria_field(&mut self, update: CriteriaUpdate) -> Result<bool, CriteriaError> {
        let clearing = matches!(update, CriteriaUpdate::Clear);
        let changed = self.synced.update(update)?;
        if changed {
            if clearing {
                self.query_input.reset("");
            }
            self.refetch();
        }
        Ok(changed)
    }

    pub fn query_buffer(&self) -> &str {
        self.query_input.buffer()
    }

    /// A keystroke in the search box. Nothing is fetched until the
    /// quiet period passes and the commit is applied.
    pub fn type_query(&mut self, text: impl Into<String>) {
        self.query_input.input(text);
    }

    pub fn submit_query(&mut self) {
        self.query_input.flush();
    }

    /// Apply the newest committed search text, if one arrived.
    pub fn apply_query_commits(&mut self) -> Result<bool, CriteriaError> {
        match self.query_input.take_latest() {
            Some(query) => self.set_criteria_field(CriteriaUpdate::Query(query)),
            None => Ok(false),
        }
    }

    /// Wait for the search box to commit, then apply it and refetch.
    pub async fn next_query_commit(&mut self) -> Result<bool, CriteriaError> {
        match self.query_input.next_commit().await {
            Some(query) => self.set_criteria_field(CriteriaUpdate::Query(query)),
            None => Ok(false),
        }
    }

    pub fn sync_from_store(&mut self) -> bool {
        if !self.synced.resync() {
            return false;
        }
        self.query_input.reset(self.synced.criteria().query.clone());
        self.refetch();
        true
    }

    /// Issue a fetch for the current criteria. Returns its ticket.
    pub fn refetch(&mut self) -> u64 {
        let ticket = self.tracker.begin();
        if let Some(previous) = self.in_flight.take() {
            if self.abort_superseded {
                previous.abort();
            }
        }

        let source = Arc::clone(&self.source);
        let tracker = Arc::clone(&self.tracker);
        let criteria = self.synced.criteria().clone();
        debug!(request = ticket, criteria = ?criteria, "Fetching movies");

        self.in_flight = Some(tokio::spawn(async move {
            let result = fetch_clamped(source.as_ref(), &tracker, ticket, criteria).await;
            tracker.complete(ticket, result);
        }));
        ticket
    }

    /// The current view. When the shown page differs from the requested
    /// one (the source had fewer pages), the criteria follow the page.
    pub fn current(&mut self) -> RemoteView {
        let view = self.tracker.view();
        if view.is_settled() && view.error.is_none() {
            if let Some(ref page) = view.page {
                self.synced.clamp_page(page.page);
            }
        }
        view
    }
}

impl<P, S> Drop for RemoteDiscovery<P, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

/// Fetch the requested page; when the source reports fewer pages than
/// that, fetch its last page instead.
async fn fetch_clamped<P: PagedMovieSource>(
    source: &P,
    tracker: &RequestTracker,
    ticket: u64,
    criteria: Criteria,
) -> Result<RemotePage, FetchError> {
    let page = source.fetch_page(&criteria).await?;
    if page.total_pages == 0 || criteria.page <= page.total_pages || !tracker.is_current(ticket) {
        return Ok(page);
    }

    let clamped = Criteria {
        page: page.total_pages,
        ..criteria
    };
    source.fetch_page(&clamped).await
}
