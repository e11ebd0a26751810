//! Filtering, sorting and pagination of movie listings, plus the state
//! machinery around it: criteria kept in sync with an external store,
//! a debounced text query, and last-request-wins remote fetching.
use chrono::Datelike;

pub mod criteria;
pub mod debounce;
pub mod engine;
pub mod filter;
pub mod pagination;
pub mod remote;
pub mod sort;
pub mod sync;

pub use criteria::{Criteria, CriteriaError, CriteriaUpdate, SortKey, YearBucket};
pub use debounce::{DebouncedQuery, QueryInput, DEFAULT_QUIESCENCE};
pub use engine::DiscoveryEngine;
pub use filter::apply_filters;
pub use pagination::{discover, paginate, ResultPage, DEFAULT_PAGE_SIZE};
pub use remote::{Completion, RemoteDiscovery, RemoteView, RequestTracker};
pub use sort::sort_movies;
pub use sync::{decode, encode, CriteriaStore, HistoryStore, MemoryStore, SyncedCriteria};

/// The year `recent` is measured from.
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}
