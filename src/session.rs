//! Client-side application state: the loaded movies and reviews and the
//! signed-in user, changed only through `SessionAction`s.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::catalog::{Movie, Review};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub join_date: DateTime<Utc>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub watchlist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub movies: Arc<Vec<Movie>>,
    pub reviews: Vec<Review>,
    pub user: Option<UserProfile>,
    pub loading: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn in_watchlist(&self, movie_id: &str) -> bool {
        self.user
            .as_ref()
            .map(|u| u.watchlist.iter().any(|id| id == movie_id))
            .unwrap_or(false)
    }

    pub fn reviews_for(&self, movie_id: &str) -> impl Iterator<Item = &Review> {
        let movie_id = movie_id.to_string();
        self.reviews.iter().filter(move |r| r.movie_id == movie_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    SetMovies(Arc<Vec<Movie>>),
    SetReviews(Vec<Review>),
    AddReview(Review),
    Login(UserProfile),
    Logout,
    AddToWatchlist(String),
    RemoveFromWatchlist(String),
    SetLoading(bool),
}

/// Apply one action. Watchlist actions without a signed-in user leave
/// the state unchanged.
pub fn reduce(mut state: SessionState, action: SessionAction) -> SessionState {
    match action {
        SessionAction::SetMovies(movies) => state.movies = movies,
        SessionAction::SetReviews(reviews) => state.reviews = reviews,
        SessionAction::AddReview(review) => state.reviews.push(review),
        SessionAction::Login(user) => state.user = Some(user),
        SessionAction::Logout => state.user = None,
        SessionAction::AddToWatchlist(movie_id) => {
            if let Some(ref mut user) = state.user {
                if !user.watchlist.contains(&movie_id) {
                    user.watchlist.push(movie_id);
                }
            }
        }
        SessionAction::RemoveFromWatchlist(movie_id) => {
            if let Some(ref mut user) = state.user {
                user.watchlist.retain(|id| *id != movie_id);
            }
        }
        SessionAction::SetLoading(loading) => state.loading = loading,
    }
    state
}

/// Shared owner of a `SessionState`. Subscribers see every change.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionState::default())
    }
}

impl SessionStore {
    pub fn new(initial: SessionState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn dispatch(&self, action: SessionAction) {
        debug!(action = ?action_name(&action), "Session action");
        self.tx.send_if_modified(|state| {
            let next = reduce(state.clone(), action);
            if next == *state {
                return false;
            }
            *state = next;
            true
        });
    }

    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}

fn action_name(action: &SessionAction) -> &'static str {
    match action {
        SessionAction::SetMovies(_) => "set_movies",
        SessionAction::SetReviews(_) => "set_reviews",
        SessionAction::AddReview(_) => "add_review",
        SessionAction::Login(_) => "login",
        SessionAction::Logout => "logout",
        SessionAction::AddToWatchlist(_) => "add_to_watchlist",
        SessionAction::RemoveFromWatchlist(_) => "remove_from_watchlist",
        SessionAction::SetLoading(_) => "set_loading",
    }
}
