use super::movie::Movie;

/// Genres offered as filter chips, whether or not a movie carries them.
pub const GENRES: &[&str] = &[
    "Action",
    "Adventure",
    "Animation",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "Horror",
    "Music",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Thriller",
    "War",
    "Western",
];

struct SeedMovie {
    id: &'static str,
    title: &'static str,
    genres: &'static [&'static str],
    year: i32,
    director: &'static str,
    cast: &'static [&'static str],
    synopsis: &'static str,
    rating: f32,
    runtime: u32,
}

const SEED: &[SeedMovie] = &[
    SeedMovie {
        id: "1",
        title: "Interstellar",
        genres: &["Sci-Fi", "Drama", "Adventure"],
        year: 2014,
        director: "Christopher Nolan",
        cast: &["Matthew McConaughey", "Anne Hathaway", "Jessica Chastain"],
        synopsis: "A team of explorers travel through a wormhole in space in an attempt to ensure humanity's survival.",
        rating: 4.8,
        runtime: 169,
    },
    SeedMovie {
        id: "2",
        title: "The Dark Knight",
        genres: &["Action", "Crime", "Drama"],
        year: 2008,
        director: "Christopher Nolan",
        cast: &["Christian Bale", "Heath Ledger", "Aaron Eckhart"],
        synopsis: "When the menace known as the Joker wreaks havoc and chaos on the people of Gotham, Batman must accept one of the greatest psychological and physical tests of his ability to fight injustice.",
        rating: 4.9,
        runtime: 152,
    },
    SeedMovie {
        id: "3",
        title: "Inception",
        genres: &["Sci-Fi", "Action", "Thriller"],
        year: 2010,
        director: "Christopher Nolan",
        cast: &["Leonardo DiCaprio", "Marion Cotillard", "Tom Hardy"],
        synopsis: "A thief who steals corporate secrets through the use of dream-sharing technology is given the inverse task of planting an idea into the mind of a C.E.O.",
        rating: 4.7,
        runtime: 148,
    },
    SeedMovie {
        id: "4",
        title: "Parasite",
        genres: &["Thriller", "Drama", "Comedy"],
        year: 2019,
        director: "Bong Joon-ho",
        cast: &["Song Kang-ho", "Lee Sun-kyun", "Cho Yeo-jeong"],
        synopsis: "A poor family schemes to become employed by a wealthy family and infiltrate their household by posing as unrelated, highly qualified individuals.",
        rating: 4.6,
        runtime: 132,
    },
    SeedMovie {
        id: "5",
        title: "Dune",
        genres: &["Sci-Fi", "Adventure", "Drama"],
        year: 2021,
        director: "Denis Villeneuve",
        cast: &["Timothée Chalamet", "Rebecca Ferguson", "Oscar Isaac"],
        synopsis: "A noble family becomes embroiled in a war for control over the galaxy's most valuable asset while its heir becomes troubled by visions of a dark future.",
        rating: 4.5,
        runtime: 155,
    },
];

/// The demonstration catalog loaded into an empty database.
pub fn seed_movies() -> Vec<Movie> {
    SEED.iter()
        .map(|s| Movie {
            id: s.id.to_string(),
            title: s.title.to_string(),
            genres: s.genres.iter().map(|g| g.to_string()).collect(),
            release_year: s.year,
            director: s.director.to_string(),
            cast: s.cast.iter().map(|c| c.to_string()).collect(),
            synopsis: s.synopsis.to_string(),
            poster: None,
            backdrop: None,
            trailer: None,
            average_rating: s.rating,
            runtime_minutes: s.runtime,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seed_is_consistent() {
        let movies = seed_movies();
        let ids: HashSet<_> = movies.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), movies.len());
        for movie in &movies {
            assert!((0.0..=5.0).contains(&movie.average_rating));
            assert!(movie.genres.iter().all(|g| GENRES.contains(&g.as_str())));
        }
    }
}
