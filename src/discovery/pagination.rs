use serde::Serialize;

use crate::catalog::Movie;

use super::criteria::Criteria;
use super::filter::apply_filters;
use super::sort::sort_movies;

/// Default number of movies per page.
pub const DEFAULT_PAGE_SIZE: usize = 12;

/// One page of discovery results.
///
/// An empty match set has `total_pages == 0` and `page == 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    pub items: Vec<Movie>,
    pub total_results: usize,
    pub total_pages: u32,
    pub page: u32,
    pub page_size: usize,
}

impl ResultPage {
    pub fn empty(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            total_results: 0,
            total_pages: 0,
            page: 1,
            page_size,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

pub fn total_pages(total_results: usize, page_size: usize) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total_results.div_ceil(page_size) as u32
}

/// Slice one page out of an already sorted list.
///
/// A page past the end is clamped to the last page, and page 0 to the
/// first, so a valid page is returned whenever there are results.
pub fn paginate(sorted: Vec<Movie>, page: u32, page_size: usize) -> ResultPage {
    let page_size = page_size.max(1);
    let total_results = sorted.len();
    let total_pages = total_pages(total_results, page_size);
    let page = page.clamp(1, total_pages.max(1));

    let start_index = (page as usize - 1) * page_size;
    let items = sorted
        .into_iter()
        .skip(start_index)
        .take(page_size)
        .collect();

    ResultPage {
        items,
        total_results,
        total_pages,
        page,
        page_size,
    }
}

/// Filter, sort and paginate in one pass.
pub fn discover(
    candidates: &[Movie],
    criteria: &Criteria,
    page_size: usize,
    current_year: i32,
) -> ResultPage {
    let filtered = apply_filters(candidates, criteria, current_year);
    let sorted = sort_movies(filtered, criteria.sort_key);
    paginate(sorted, criteria.page, page_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::filter::tests::movie;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn movies(n: usize) -> Vec<Movie> {
        (0..n)
            .map(|i| movie(&i.to_string(), "m", 2010, 3.0, &["Drama"]))
            .collect()
    }

    #[test]
    fn test_slices_requested_page() {
        let page = paginate(movies(25), 2, 10);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0].id, "10");
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(page.has_previous());

        let last = paginate(movies(25), 3, 10);
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_next());
    }

    #[test]
    fn test_out_of_range_page_is_clamped() {
        let page = paginate(movies(15), 9, 10);
        assert_eq!(page.page, 2);
        assert_eq!(page.items.len(), 5);

        let page = paginate(movies(3), 0, 10);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn test_empty_result_policy() {
        let page = paginate(Vec::new(), 4, 10);
        assert_eq!(page, ResultPage::empty(10));
    }

    #[test]
    fn test_horror_on_no_horror() {
        let criteria = Criteria {
            genres: BTreeSet::from(["Horror".to_string()]),
            ..Criteria::default()
        };
        let page = discover(&movies(5), &criteria, 10, 2024);
        assert_eq!(page.total_results, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.page, 1);
        assert!(page.items.is_empty());
    }

    proptest! {
        #[test]
        fn prop_total_pages_is_ceiling(n in 0usize..200, size in 1usize..30, page in 0u32..20) {
            let result = paginate(movies(n), page, size);
            prop_assert_eq!(result.total_pages as usize, (n + size - 1) / size);
            prop_assert!(result.items.len() <= size);
            prop_assert!(result.page >= 1);
            if n > 0 {
                prop_assert!(result.page <= result.total_pages);
                prop_assert!(!result.items.is_empty());
            }
        }
    }
}
