use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::catalog::Movie;
use crate::config::DiscoveryConfig;

use super::criteria::{Criteria, CriteriaError, CriteriaUpdate};
use super::debounce::{QueryInput, DEFAULT_QUIESCENCE};
use super::pagination::{discover, ResultPage};
use super::sync::{CriteriaStore, SyncedCriteria};

/// Discovery over an in-memory candidate set.
///
/// The external store is the source of truth for the criteria: it is read
/// once at construction, written on every change, and re-read after
/// history navigation. The result page is recomputed after each of those.
///
/// Typed search text goes through a debounced [`QueryInput`]; a commit
/// becomes a `Query` update once applied with [`Self::apply_query_commits`]
/// or [`Self::next_query_commit`].
#[derive(Debug)]
pub struct DiscoveryEngine<S> {
    candidates: Arc<Vec<Movie>>,
    synced: SyncedCriteria<S>,
    result: ResultPage,
    page_size: usize,
    current_year: i32,
    query_input: QueryInput,
}

impl<S: CriteriaStore> DiscoveryEngine<S> {
    pub fn new(candidates: Arc<Vec<Movie>>, store: S, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let synced = SyncedCriteria::mount(store);
        let query_input = QueryInput::new(synced.criteria().query.clone(), DEFAULT_QUIESCENCE);
        let mut engine = Self {
            candidates,
            synced,
            result: ResultPage::empty(page_size),
            page_size,
            current_year: super::current_year(),
            query_input,
        };
        engine.recompute();
        engine
    }

    /// Page size and quiet period taken from the `discovery` config section.
    pub fn from_config(candidates: Arc<Vec<Movie>>, store: S, config: &DiscoveryConfig) -> Self {
        Self::new(candidates, store, config.page_size).with_debounce(config.debounce())
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.query_input = QueryInput::new(self.criteria().query.clone(), window);
        self
    }

    /// Pin the year that `recent` is measured from.
    pub fn with_current_year(mut self, current_year: i32) -> Self {
        self.current_year = current_year;
        self.recompute();
        self
    }

    pub fn criteria(&self) -> &Criteria {
        self.synced.criteria()
    }

    pub fn result(&self) -> &ResultPage {
        &self.result
    }

    pub fn store(&self) -> &S {
        self.synced.store()
    }

    pub fn store_mut(&mut self) -> &mut S {
        self.synced.store_mut()
    }

    /// Change one criteria field, persist, and recompute.
    /// Returns whether anything changed.
    pub fn set_criteria_field(&mut self, update: CriteriaUpdate) -> Result<bool, CriteriaError> {
        let clearing = matches!(update, CriteriaUpdate::Clear);
        let changed = self.synced.update(update)?;
        if changed {
            if clearing {
                self.query_input.reset("");
            }
            self.recompute();
        }
        Ok(changed)
    }

    /// Text currently in the search box, committed or not.
    pub fn query_buffer(&self) -> &str {
        self.query_input.buffer()
    }

    /// A keystroke in the search box.
    pub fn type_query(&mut self, text: impl Into<String>) {
        self.query_input.input(text);
    }

    /// Commit the search box now, skipping the quiet period.
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

    /// Wait for the search box to commit, then apply it.
    pub async fn next_query_commit(&mut self) -> Result<bool, CriteriaError> {
        match self.query_input.next_commit().await {
            Some(query) => self.set_criteria_field(CriteriaUpdate::Query(query)),
            None => Ok(false),
        }
    }

    pub fn next_page(&mut self) -> bool {
        if !self.result.has_next() {
            return false;
        }
        let page = self.result.page + 1;
        self.set_criteria_field(CriteriaUpdate::Page(page)).unwrap_or(false)
    }

    pub fn previous_page(&mut self) -> bool {
        if !self.result.has_previous() {
            return false;
        }
        let page = self.result.page - 1;
        self.set_criteria_field(CriteriaUpdate::Page(page)).unwrap_or(false)
    }

    /// Swap the candidate set, e.g. after a movie was added or rated.
    pub fn set_candidates(&mut self, candidates: Arc<Vec<Movie>>) {
        self.candidates = candidates;
        self.recompute();
    }

    /// Re-read the store after it was changed from outside, as on back
    /// or forward navigation. Returns whether the criteria changed.
    pub fn sync_from_store(&mut self) -> bool {
        if !self.synced.resync() {
            return false;
        }
        debug!(criteria = ?self.synced.criteria(), "Criteria restored from store");
        self.query_input.reset(self.synced.criteria().query.clone());
        self.recompute();
        true
    }

    fn recompute(&mut self) {
        self.result = discover(
            &self.candidates,
            self.synced.criteria(),
            self.page_size,
            self.current_year,
        );
        self.synced.clamp_page(self.result.page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::criteria::{SortKey, YearBucket};
    use crate::discovery::filter::tests::movie;
    use crate::discovery::sync::{HistoryStore, MemoryStore};

    fn catalog(n: usize) -> Arc<Vec<Movie>> {
        Arc::new(
            (0..n)
                .map(|i| {
                    let genre = if i % 2 == 0 { "Drama" } else { "Comedy" };
                    movie(&i.to_string(), &format!("Movie {:02}", i), 1990 + i as i32, 3.0, &[genre])
                })
                .collect(),
        )
    }

    #[test]
    fn test_mount_reads_store() {
        let store = MemoryStore::from_query_string("genre=Drama&sortBy=title-asc&page=2");
        let engine = DiscoveryEngine::new(catalog(30), store, 5).with_current_year(2024);
        assert_eq!(engine.criteria().page, 2);
        assert_eq!(engine.result().total_results, 15);
        assert_eq!(engine.result().total_pages, 3);
        assert_eq!(engine.result().items[0].title, "Movie 10");
    }

    #[test]
    fn test_mount_clamps_page_and_rewrites_store() {
        let store = MemoryStore::from_query_string("page=40");
        let engine = DiscoveryEngine::new(catalog(12), store, 5).with_current_year(2024);
        assert_eq!(engine.result().page, 3);
        assert_eq!(engine.criteria().page, 3);
        assert_eq!(engine.store().query_string(), "page=3");
    }

    #[test]
    fn test_change_resets_page_and_persists() {
        let mut engine =
            DiscoveryEngine::new(catalog(30), MemoryStore::default(), 5).with_current_year(2024);
        assert!(engine.next_page());
        assert!(engine.next_page());
        assert_eq!(engine.store().query_string(), "page=3");

        engine
            .set_criteria_field(CriteriaUpdate::SortKey(SortKey::YearDesc))
            .unwrap();
        assert_eq!(engine.criteria().page, 1);
        assert_eq!(engine.store().query_string(), "sortBy=year-desc");
        assert_eq!(engine.result().items[0].release_year, 2019);
    }

    #[test]
    fn test_shrinking_candidates_clamps_page() {
        let mut engine =
            DiscoveryEngine::new(catalog(30), MemoryStore::default(), 5).with_current_year(2024);
        engine.set_criteria_field(CriteriaUpdate::Page(6)).unwrap();
        assert_eq!(engine.result().items.len(), 5);

        engine.set_candidates(catalog(8));
        assert_eq!(engine.result().page, 2);
        assert_eq!(engine.result().items.len(), 3);
        assert_eq!(engine.criteria().page, 2);
    }

    #[test]
    fn test_empty_candidates() {
        let engine = DiscoveryEngine::new(Arc::new(Vec::new()), MemoryStore::default(), 5);
        assert_eq!(engine.result(), &ResultPage::empty(5));
        assert!(engine.store().query_string().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_commits_one_query_update() {
        let config = DiscoveryConfig {
            page_size: 5,
            debounce_ms: 400,
        };
        let store = MemoryStore::from_query_string("page=3");
        let mut engine = DiscoveryEngine::from_config(catalog(30), store, &config);
        let writes = engine.store().writes();

        for text in ["m", "mo", "movie", "movie 1"] {
            engine.type_query(text);
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        assert_eq!(engine.query_buffer(), "movie 1");
        assert!(!engine.apply_query_commits().unwrap());
        assert_eq!(engine.criteria().query, "");
        assert_eq!(engine.criteria().page, 3);

        assert!(engine.next_query_commit().await.unwrap());
        assert_eq!(engine.criteria().query, "movie 1");
        assert_eq!(engine.criteria().page, 1);
        assert_eq!(engine.result().total_results, 10);
        assert_eq!(engine.store().writes(), writes + 1);
        assert_eq!(engine.store().query_string(), "query=movie%201");

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert!(!engine.apply_query_commits().unwrap());
        assert_eq!(engine.store().writes(), writes + 1);
    }

    #[test]
    fn test_history_restores_search_box() {
        let mut engine = DiscoveryEngine::new(
            catalog(30),
            HistoryStore::new(crate::discovery::sync::parse_query_string("query=movie")),
            5,
        );
        assert_eq!(engine.query_buffer(), "movie");
        engine
            .set_criteria_field(CriteriaUpdate::Query("movie 2".to_string()))
            .unwrap();
        assert!(engine.store_mut().back());
        assert!(engine.sync_from_store());
        assert_eq!(engine.query_buffer(), "movie");
        assert!(engine.store_mut().forward());
        assert!(engine.sync_from_store());
        assert_eq!(engine.query_buffer(), "movie 2");

        engine.set_criteria_field(CriteriaUpdate::Clear).unwrap();
        assert_eq!(engine.query_buffer(), "");
    }

    #[test]
    fn test_back_and_forward() {
        let mut engine =
            DiscoveryEngine::new(catalog(30), HistoryStore::default(), 5).with_current_year(2024);
        engine
            .set_criteria_field(CriteriaUpdate::ToggleGenre("Comedy".to_string()))
            .unwrap();
        engine
            .set_criteria_field(CriteriaUpdate::YearBucket(YearBucket::Classic))
            .unwrap();
        assert_eq!(engine.result().total_results, 5);

        assert!(engine.store_mut().back());
        assert!(engine.sync_from_store());
        assert_eq!(engine.criteria().year_bucket, YearBucket::All);
        assert_eq!(engine.result().total_results, 15);

        assert!(engine.store_mut().forward());
        assert!(engine.sync_from_store());
        assert_eq!(engine.criteria().year_bucket, YearBucket::Classic);
        assert!(!engine.sync_from_store());
    }
}
