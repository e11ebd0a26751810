use serde::{Deserialize, Serialize};

use crate::catalog::Movie;
use crate::discovery::ResultPage;
use crate::session::UserProfile;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieListResponse {
    pub movies: Vec<Movie>,
    pub total_results: usize,
    pub total_pages: u32,
    pub page: u32,
    pub page_size: usize,
    /// Canonical query string for the applied criteria, for shareable links.
    pub query: String,
}

impl MovieListResponse {
    pub fn new(page: ResultPage, query: String) -> Self {
        Self {
            movies: page.items,
            total_results: page.total_results,
            total_pages: page.total_pages,
            page: page.page,
            page_size: page.page_size,
            query,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistRequest {
    pub movie_id: String,
}
