use std::cmp::Ordering;

use crate::catalog::Movie;

use super::criteria::SortKey;

/// Sort movies by the given key.
///
/// The sort is stable: movies that compare equal under the key keep the
/// order in which they were passed in.
pub fn sort_movies(mut movies: Vec<Movie>, sort_key: SortKey) -> Vec<Movie> {
    movies.sort_by(|a, b| compare(a, b, sort_key));
    movies
}

fn compare(a: &Movie, b: &Movie, sort_key: SortKey) -> Ordering {
    match sort_key {
        SortKey::RatingDesc => b.average_rating.total_cmp(&a.average_rating),
        SortKey::YearDesc => b.release_year.cmp(&a.release_year),
        SortKey::TitleAsc => compare_titles(&a.title, &b.title),
        SortKey::DurationDesc => b.runtime_minutes.cmp(&a.runtime_minutes),
    }
}

/// Dictionary-style title comparison: case and common Latin accents are
/// ignored, so "Amélie" sorts between "Amadeus" and "Avatar".
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    let a = a.chars().flat_map(char::to_lowercase).map(fold_accent);
    let b = b.chars().flat_map(char::to_lowercase).map(fold_accent);
    a.cmp(b)
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'č' | 'ć' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'š' | 'ś' => 's',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => 'u',
        'ý' | 'ÿ' => 'y',
        'ž' | 'ź' | 'ż' => 'z',
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::filter::tests::movie;
    use proptest::prelude::*;

    fn ids(movies: &[Movie]) -> Vec<&str> {
        movies.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_equal_ratings_keep_insertion_order() {
        let movies = vec![
            movie("A", "Alpha", 2010, 4.8, &[]),
            movie("C", "Gamma", 2012, 4.9, &[]),
            movie("B", "Beta", 2011, 4.8, &[]),
        ];
        let sorted = sort_movies(movies, SortKey::RatingDesc);
        assert_eq!(ids(&sorted), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_nan_rating_sorts_consistently() {
        let movies = vec![
            movie("3", "c", 2000, 3.0, &[]),
            movie("nan", "n", 2000, f32::NAN, &[]),
            movie("4", "d", 2000, 4.0, &[]),
        ];
        let sorted = sort_movies(movies, SortKey::RatingDesc);
        let order = ids(&sorted);
        let pos = |id: &str| order.iter().position(|x| *x == id).unwrap();
        assert_eq!(order.len(), 3);
        assert!(pos("4") < pos("3"));
    }

    #[test]
    fn test_year_and_duration_descending() {
        let mut short = movie("1", "x", 2001, 3.0, &[]);
        short.runtime_minutes = 90;
        let mut long = movie("2", "y", 1999, 3.0, &[]);
        long.runtime_minutes = 169;

        let by_year = sort_movies(vec![long.clone(), short.clone()], SortKey::YearDesc);
        assert_eq!(ids(&by_year), vec!["1", "2"]);

        let by_duration = sort_movies(vec![short, long], SortKey::DurationDesc);
        assert_eq!(ids(&by_duration), vec!["2", "1"]);
    }

    #[test]
    fn test_title_ascending_ignores_case_and_accents() {
        let movies = vec![
            movie("1", "avatar", 2009, 3.0, &[]),
            movie("2", "Amélie", 2001, 3.0, &[]),
            movie("3", "Amadeus", 1984, 3.0, &[]),
        ];
        let sorted = sort_movies(movies, SortKey::TitleAsc);
        assert_eq!(ids(&sorted), vec!["3", "2", "1"]);
        assert_eq!(compare_titles("DUNE", "dune"), Ordering::Equal);
    }

    proptest! {
        #[test]
        fn prop_sort_is_stable(
            ratings in prop::collection::vec(0u8..4, 0..30),
            key in prop::sample::select(SortKey::ALL.to_vec()),
        ) {
            // Few distinct values so that ties are common.
            let movies: Vec<Movie> = ratings
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    let mut m = movie(&i.to_string(), ["b", "B", "a"][*r as usize % 3], 2000 + *r as i32, *r as f32, &[]);
                    m.runtime_minutes = 90 + *r as u32;
                    m
                })
                .collect();
            let sorted = sort_movies(movies, key);
            for pair in sorted.windows(2) {
                if compare(&pair[0], &pair[1], key) == Ordering::Equal {
                    let first: usize = pair[0].id.parse().unwrap();
                    let second: usize = pair[1].id.parse().unwrap();
                    prop_assert!(first < second);
                }
            }
        }
    }
}
