use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::Serialize;

use super::movie::Movie;
use crate::discovery::{self, Criteria, ResultPage};

/// One page as reported by a paged source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePage {
    pub items: Vec<Movie>,
    pub total_pages: u32,
    pub total_results: usize,
    pub page: u32,
    /// Page size the source pages by, not the length of `items`.
    pub page_size: usize,
}

impl RemotePage {
    /// An empty result set is always page 1 of 0, whatever page was asked for.
    pub fn into_result_page(self) -> ResultPage {
        let page = if self.total_pages == 0 {
            1
        } else {
            self.page.max(1)
        };
        ResultPage {
            items: self.items,
            total_results: self.total_results,
            total_pages: self.total_pages,
            page,
            page_size: self.page_size,
        }
    }
}

/// A source that hands out its whole candidate set; filtering, sorting
/// and pagination happen locally.
#[async_trait]
pub trait MovieSource: Send + Sync {
    async fn all(&self) -> Result<Arc<Vec<Movie>>, FetchError>;
}

/// A source that filters and pages on its side.
#[async_trait]
pub trait PagedMovieSource: Send + Sync + 'static {
    async fn fetch_page(&self, criteria: &Criteria) -> Result<RemotePage, FetchError>;
}

/// In-memory candidate set. Readers always see a complete snapshot while
/// writers swap in a new one.
#[derive(Debug)]
pub struct LocalSource {
    movies: ArcSwap<Vec<Movie>>,
    page_size: usize,
}

impl LocalSource {
    pub fn new(movies: Vec<Movie>) -> Self {
        Self {
            movies: ArcSwap::from_pointee(movies),
            page_size: discovery::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn snapshot(&self) -> Arc<Vec<Movie>> {
        self.movies.load_full()
    }

    pub fn replace(&self, movies: Vec<Movie>) {
        self.movies.store(Arc::new(movies));
    }

    /// Insert or update a movie, keeping the position of an existing one.
    pub fn upsert(&self, movie: Movie) {
        self.movies.rcu(|current| {
            let mut next = Vec::clone(current);
            match next.iter_mut().find(|m| m.id == movie.id) {
                Some(existing) => *existing = movie.clone(),
                None => next.push(movie.clone()),
            }
            next
        });
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut removed = false;
        self.movies.rcu(|current| {
            let next: Vec<Movie> = current.iter().filter(|m| m.id != id).cloned().collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    pub fn get(&self, id: &str) -> Option<Movie> {
        self.movies.load().iter().find(|m| m.id == id).cloned()
    }

    /// Distinct genres across the catalog, alphabetical.
    pub fn genres(&self) -> Vec<String> {
        let mut genres: Vec<String> = self
            .movies
            .load()
            .iter()
            .flat_map(|m| m.genres.iter().cloned())
            .collect();
        genres.sort();
        genres.dedup();
        genres
    }
}

#[async_trait]
impl MovieSource for LocalSource {
    async fn all(&self) -> Result<Arc<Vec<Movie>>, FetchError> {
        Ok(self.snapshot())
    }
}

#[async_trait]
impl PagedMovieSource for LocalSource {
    async fn fetch_page(&self, criteria: &Criteria) -> Result<RemotePage, FetchError> {
        let result = discovery::discover(
            &self.snapshot(),
            criteria,
            self.page_size,
            discovery::current_year(),
        );
        Ok(RemotePage {
            items: result.items,
            total_pages: result.total_pages,
            total_results: result.total_results,
            page: result.page,
            page_size: result.page_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Http(String),
    #[error("Upstream returned status {0}")]
    Status(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Invalid upstream response: {0}")]
    Decode(String),
    #[error("Remote source is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Http(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::filter::tests::movie;

    #[test]
    fn test_upsert_and_remove() {
        let source = LocalSource::new(vec![
            movie("1", "Heat", 1995, 4.0, &["Crime"]),
            movie("2", "Ronin", 1998, 3.5, &["Action"]),
        ]);
        let before = source.snapshot();

        source.upsert(movie("1", "Heat", 1995, 4.5, &["Crime", "Drama"]));
        source.upsert(movie("3", "Collateral", 2004, 4.1, &["Crime"]));

        // Earlier snapshots are unaffected.
        assert_eq!(before[0].average_rating, 4.0);
        let after = source.snapshot();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0].average_rating, 4.5);
        assert_eq!(source.genres(), vec!["Action", "Crime", "Drama"]);

        assert!(source.remove("2"));
        assert!(!source.remove("2"));
        assert!(source.get("2").is_none());
    }

    #[tokio::test]
    async fn test_local_fetch_page() {
        let movies = (0..5)
            .map(|i| movie(&i.to_string(), "m", 2010 + i, i as f32, &["Drama"]))
            .collect();
        let source = LocalSource::new(movies).with_page_size(2);
        let criteria = Criteria {
            page: 3,
            ..Criteria::default()
        };
        let page = source.fetch_page(&criteria).await.unwrap();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_results, 5);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "0");

        let result = page.into_result_page();
        assert_eq!(result.page_size, 2);
        assert_eq!(result.page, 3);
    }

    #[test]
    fn test_empty_remote_page_is_first_page() {
        let page = RemotePage {
            items: Vec::new(),
            total_pages: 0,
            total_results: 0,
            page: 4,
            page_size: 20,
        };
        assert_eq!(page.into_result_page(), ResultPage::empty(20));
    }
}
