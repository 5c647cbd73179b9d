//! Offset pagination helpers
//!
//! Every listing endpoint speaks the same dialect: 1-based `page`,
//! clamped `limit`, and a metadata block computed from the total row
//! count.

use serde::{Deserialize, Serialize};

use crate::{MAX_PAGE_INDEX, MAX_PAGE_LIMIT};

/// Normalized pagination input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-based page index, clamped to 1..=MAX_PAGE_INDEX
    pub page: u64,
    /// Items per page, clamped to 1..=MAX_PAGE_LIMIT
    pub limit: u64,
}

impl PageQuery {
    /// Normalize raw query parameters. Zero or missing values fall back
    /// to page 1 / limit 20; values above either ceiling are clamped,
    /// so `page * limit` can never overflow.
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, MAX_PAGE_INDEX);
        let limit = limit.unwrap_or(20).clamp(1, MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    /// Row offset for the database query
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination metadata returned alongside every listing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMeta {
    pub current_page: u64,
    pub total_pages: u64,
    pub total: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    /// Compute metadata for a page. `has_next_page` holds exactly when
    /// `page * limit < total`.
    pub fn compute(query: PageQuery, total: u64) -> Self {
        let total_pages = total.div_ceil(query.limit);
        Self {
            current_page: query.page,
            total_pages,
            total,
            has_next_page: query.page.saturating_mul(query.limit) < total,
            has_prev_page: query.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_limit_and_page() {
        let q = PageQuery::new(Some(0), Some(0));
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, 1);

        let q = PageQuery::new(None, Some(10_000));
        assert_eq!(q.limit, MAX_PAGE_LIMIT);

        let q = PageQuery::new(Some(u64::MAX), None);
        assert_eq!(q.page, MAX_PAGE_INDEX);
    }

    #[test]
    fn test_absurd_page_never_overflows() {
        // u64::MAX page must clamp, not panic or wrap
        let q = PageQuery::new(Some(u64::MAX), Some(u64::MAX));
        assert_eq!(q.offset(), (MAX_PAGE_INDEX - 1) * MAX_PAGE_LIMIT);

        let meta = PageMeta::compute(q, 45);
        assert!(!meta.has_next_page);
        assert!(meta.has_prev_page);
        assert_eq!(meta.current_page, MAX_PAGE_INDEX);
    }

    #[test]
    fn test_offset() {
        let q = PageQuery::new(Some(3), Some(25));
        assert_eq!(q.offset(), 50);
    }

    #[test]
    fn test_has_next_page_iff_more_rows_remain() {
        // 45 rows, 20 per page: pages 1 and 2 have more, page 3 does not
        for (page, expected) in [(1, true), (2, true), (3, false)] {
            let meta = PageMeta::compute(PageQuery::new(Some(page), Some(20)), 45);
            assert_eq!(meta.has_next_page, expected, "page {}", page);
        }
    }

    #[test]
    fn test_boundary_exact_multiple() {
        // 40 rows, 20 per page: page 2 is the last page
        let meta = PageMeta::compute(PageQuery::new(Some(2), Some(20)), 40);
        assert!(!meta.has_next_page);
        assert!(meta.has_prev_page);
        assert_eq!(meta.total_pages, 2);
    }

    #[test]
    fn test_empty_collection() {
        let meta = PageMeta::compute(PageQuery::default(), 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_prev_page);
    }

    #[test]
    fn test_next_page_law_holds_for_arbitrary_inputs() {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let page = PageQuery::new(Some(rng.gen_range(0..50)), Some(rng.gen_range(0..200)));
            let total = rng.gen_range(0..2000);
            let meta = PageMeta::compute(page, total);

            assert_eq!(meta.has_next_page, page.page * page.limit < total);
            assert_eq!(meta.has_prev_page, page.page > 1);
            assert!(meta.total_pages * page.limit >= total);
        }
    }
}
