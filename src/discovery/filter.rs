use crate::catalog::Movie;

use super::criteria::Criteria;

/// Apply the criteria to a single movie.
/// Returns true if the movie should be included, false if it should be filtered out.
pub fn apply_movie_filter(movie: &Movie, criteria: &Criteria, current_year: i32) -> bool {
    // Free text - title, director, cast or genre, case-insensitive substring
    if !criteria.query.is_empty() {
        let needle = criteria.query.to_lowercase();
        let matches = movie.title.to_lowercase().contains(&needle)
            || movie.director.to_lowercase().contains(&needle)
            || movie
                .cast
                .iter()
                .any(|actor| actor.to_lowercase().contains(&needle))
            || movie
                .genres
                .iter()
                .any(|genre| genre.to_lowercase().contains(&needle));
        if !matches {
            return false;
        }
    }

    // Genre selection - OR within the selected set
    if !criteria.genres.is_empty() {
        let keep_movie = movie.genres.iter().any(|g| criteria.genres.contains(g));
        if !keep_movie {
            return false;
        }
    }

    if !criteria.year_bucket.contains(movie.release_year, current_year) {
        return false;
    }

    if let Some(min_rating) = criteria.minimum_rating {
        if movie.average_rating < min_rating {
            return false;
        }
    }

    true
}

/// Apply filtering to a list of movies, keeping their relative order.
pub fn apply_filters(candidates: &[Movie], criteria: &Criteria, current_year: i32) -> Vec<Movie> {
    candidates
        .iter()
        .filter(|movie| apply_movie_filter(movie, criteria, current_year))
        .cloned()
        .collect()
}
