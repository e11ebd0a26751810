use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::movie::{Movie, MAX_RATING};
use super::source::{FetchError, PagedMovieSource, RemotePage};
use crate::config::TmdbConfig;
use crate::discovery::{self, Criteria, SortKey};

const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
/// TMDB refuses pages beyond this.
const MAX_PAGES: u32 = 500;
const TMDB_SCALE: f32 = 10.0;
/// Results per page on the discover and search endpoints.
pub const TMDB_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenre {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct GenreList {
    genres: Vec<TmdbGenre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbResponse {
    pub page: u32,
    pub results: Vec<TmdbMovie>,
    pub total_pages: u32,
    pub total_results: usize,
}

/// Client for The Movie Database, used as a remote paged movie source.
pub struct TmdbClient {
    client: reqwest::Client,
    config: TmdbConfig,
    genres: RwLock<Option<Vec<TmdbGenre>>>,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> Result<Self, FetchError> {
        if !config.is_configured() {
            return Err(FetchError::NotConfigured);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        Ok(Self {
            client,
            config,
            genres: RwLock::new(None),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut request = self
            .client
            .get(&url)
            .query(&[("language", self.config.language.as_str())])
            .query(params);

        if let Some(ref token) = self.config.read_token {
            request = request.bearer_auth(token);
        } else if let Some(ref key) = self.config.api_key {
            request = request.query(&[("api_key", key.as_str())]);
        }

        debug!(path = path, "TMDB request");
        let response = request.send().await?;
        if !response.status().is_success() {
            warn!(path = path, status = %response.status(), "TMDB request failed");
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }

    /// The TMDB genre list, fetched once.
    pub async fn genres(&self) -> Result<Vec<TmdbGenre>, FetchError> {
        if let Some(ref genres) = *self.genres.read().await {
            return Ok(genres.clone());
        }
        let list: GenreList = self.request("/genre/movie/list", &[]).await?;
        *self.genres.write().await = Some(list.genres.clone());
        Ok(list.genres)
    }

    /// Movie details with credits, passed through as-is.
    pub async fn get_movie(&self, id: u64) -> Result<serde_json::Value, FetchError> {
        self.request(
            &format!("/movie/{}", id),
            &[("append_to_response", "credits,reviews".to_string())],
        )
        .await
    }
}

#[async_trait]
impl PagedMovieSource for TmdbClient {
    async fn fetch_page(&self, criteria: &Criteria) -> Result<RemotePage, FetchError> {
        let genres = self.genres().await?;
        let page = criteria.page.min(MAX_PAGES);

        let response: TmdbResponse = if !criteria.query.trim().is_empty() {
            let params = vec![
                ("query", criteria.query.trim().to_string()),
                ("page", page.to_string()),
                ("include_adult", "false".to_string()),
            ];
            self.request("/search/movie", &params).await?
        } else {
            let Some(params) = discover_params(criteria, &genres, discovery::current_year()) else {
                // Only unknown genres selected, nothing can match.
                return Ok(RemotePage {
                    items: Vec::new(),
                    total_pages: 0,
                    total_results: 0,
                    page: 1,
                    page_size: TMDB_PAGE_SIZE,
                });
            };
            self.request("/discover/movie", &params).await?
        };

        Ok(RemotePage {
            items: response
                .results
                .iter()
                .map(|m| to_movie(m, &genres))
                .collect(),
            total_pages: response.total_pages.min(MAX_PAGES),
            total_results: response.total_results,
            page: response.page,
            page_size: TMDB_PAGE_SIZE,
        })
    }
}

/// TMDB's genre names differ from ours in places.
fn local_genre_name(tmdb_name: &str) -> &str {
    match tmdb_name {
        "Science Fiction" => "Sci-Fi",
        other => other,
    }
}

fn sort_param(sort_key: SortKey) -> &'static str {
    match sort_key {
        SortKey::RatingDesc => "vote_average.desc",
        SortKey::YearDesc => "primary_release_date.desc",
        SortKey::TitleAsc => "title.asc",
        // TMDB cannot sort by runtime.
        SortKey::DurationDesc => "popularity.desc",
    }
}

/// Query parameters for `/discover/movie`. Returns `None` when genres are
/// selected but none of them is known to TMDB.
pub fn discover_params(
    criteria: &Criteria,
    genres: &[TmdbGenre],
    current_year: i32,
) -> Option<Vec<(&'static str, String)>> {
    let mut params = vec![
        ("page", criteria.page.min(MAX_PAGES).to_string()),
        ("sort_by", sort_param(criteria.sort_key).to_string()),
        ("include_adult", "false".to_string()),
    ];

    if !criteria.genres.is_empty() {
        let ids: Vec<String> = genres
            .iter()
            .filter(|g| criteria.genres.contains(local_genre_name(&g.name)))
            .map(|g| g.id.to_string())
            .collect();
        if ids.is_empty() {
            return None;
        }
        // '|' is OR for TMDB.
        params.push(("with_genres", ids.join("|")));
    }

    let (from, to) = criteria.year_bucket.year_range(current_year);
    if let Some(from) = from {
        params.push(("primary_release_date.gte", format!("{}-01-01", from)));
    }
    if let Some(to) = to {
        params.push(("primary_release_date.lte", format!("{}-12-31", to)));
    }

    if let Some(rating) = criteria.minimum_rating {
        let vote = rating * TMDB_SCALE / MAX_RATING;
        params.push(("vote_average.gte", vote.to_string()));
    }

    Some(params)
}

pub fn to_movie(m: &TmdbMovie, genres: &[TmdbGenre]) -> Movie {
    let release_year = m
        .release_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok())
        .unwrap_or(0);

    Movie {
        id: format!("tmdb-{}", m.id),
        title: m.title.clone(),
        genres: m
            .genre_ids
            .iter()
            .filter_map(|id| genres.iter().find(|g| g.id == *id))
            .map(|g| local_genre_name(&g.name).to_string())
            .collect(),
        release_year,
        director: String::new(),
        cast: Vec::new(),
        synopsis: m.overview.clone(),
        poster: m.poster_path.as_ref().map(|p| format!("{}/w500{}", IMAGE_BASE, p)),
        backdrop: m
            .backdrop_path
            .as_ref()
            .map(|p| format!("{}/w1280{}", IMAGE_BASE, p)),
        trailer: None,
        average_rating: (m.vote_average * MAX_RATING / TMDB_SCALE).clamp(0.0, MAX_RATING),
        runtime_minutes: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::YearBucket;
    use std::collections::BTreeSet;

    fn genres() -> Vec<TmdbGenre> {
        vec![
            TmdbGenre { id: 28, name: "Action".to_string() },
            TmdbGenre { id: 878, name: "Science Fiction".to_string() },
            TmdbGenre { id: 27, name: "Horror".to_string() },
        ]
    }

    fn get<'a>(params: &'a [(&str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_discover_params() {
        let criteria = Criteria {
            genres: BTreeSet::from(["Sci-Fi".to_string(), "Action".to_string()]),
            year_bucket: YearBucket::Recent,
            minimum_rating: Some(3.5),
            sort_key: SortKey::YearDesc,
            page: 2,
            ..Criteria::default()
        };
        let params = discover_params(&criteria, &genres(), 2024).unwrap();
        assert_eq!(get(&params, "page"), Some("2"));
        assert_eq!(get(&params, "with_genres"), Some("28|878"));
        assert_eq!(get(&params, "primary_release_date.gte"), Some("2021-01-01"));
        assert_eq!(get(&params, "primary_release_date.lte"), None);
        assert_eq!(get(&params, "vote_average.gte"), Some("7"));
        assert_eq!(get(&params, "sort_by"), Some("primary_release_date.desc"));
    }

    #[test]
    fn test_unknown_genres_match_nothing() {
        let criteria = Criteria {
            genres: BTreeSet::from(["Western".to_string()]),
            ..Criteria::default()
        };
        assert!(discover_params(&criteria, &genres(), 2024).is_none());
    }

    #[test]
    fn test_to_movie_rescales_rating() {
        let tmdb: TmdbMovie = serde_json::from_str(
            r#"{
                "id": 438631,
                "title": "Dune",
                "overview": "Paul Atreides...",
                "poster_path": "/d5NXSklXo0qyIYkgV94XAgMIckC.jpg",
                "backdrop_path": null,
                "release_date": "2021-09-15",
                "vote_average": 7.8,
                "genre_ids": [878, 12]
            }"#,
        )
        .unwrap();
        let movie = to_movie(&tmdb, &genres());
        assert_eq!(movie.id, "tmdb-438631");
        assert_eq!(movie.release_year, 2021);
        assert_eq!(movie.genres, vec!["Sci-Fi"]);
        assert!((movie.average_rating - 3.9).abs() < 1e-5);
        assert!(movie.poster.unwrap().ends_with("/w500/d5NXSklXo0qyIYkgV94XAgMIckC.jpg"));
        assert!(movie.backdrop.is_none());
    }

    #[test]
    fn test_requires_credentials() {
        assert!(matches!(
            TmdbClient::new(TmdbConfig::default()),
            Err(FetchError::NotConfigured)
        ));
    }
}
