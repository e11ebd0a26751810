pub mod movie;
pub mod repo;
pub mod seed;
pub mod source;
pub mod tmdb;

pub use movie::{average_rating, validate_review_rating, Movie, NewMovie, Review, ValidationError, MAX_RATING};
pub use repo::{CatalogError, CatalogRepo};
pub use seed::{seed_movies, GENRES};
pub use source::{FetchError, LocalSource, MovieSource, PagedMovieSource, RemotePage};
pub use tmdb::TmdbClient;
