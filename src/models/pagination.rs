//! Paginated result container

use serde::{Deserialize, Serialize};

/// One page of a filtered listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    /// Items in the current page, in fetch order
    pub items: Vec<T>,
    /// Total number of matching items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Page size
    pub limit: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, limit: u32) -> Self {
        Self {
            items,
            total,
            page,
            limit,
        }
    }

    /// `ceil(total / limit)`, 0 when nothing matched
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 || self.total <= 0 {
            return 0;
        }
        let limit = i64::from(self.limit);
        ((self.total + limit - 1) / limit) as u32
    }

    /// Convert every item, keeping the page metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }

    /// Fallible [`map`](Self::map)
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PaginatedResult<U>, E> {
        Ok(PaginatedResult {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            total: self.total,
            page: self.page,
            limit: self.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(PaginatedResult::<()>::new(vec![], 0, 1, 10).total_pages(), 0);
        assert_eq!(PaginatedResult::<()>::new(vec![], 1, 1, 10).total_pages(), 1);
        assert_eq!(PaginatedResult::<()>::new(vec![], 10, 1, 10).total_pages(), 1);
        assert_eq!(PaginatedResult::<()>::new(vec![], 25, 1, 10).total_pages(), 3);
    }

    #[test]
    fn test_try_map_keeps_metadata() {
        let page = PaginatedResult::new(vec!["1", "2"], 12, 2, 2);
        let parsed: PaginatedResult<i32> = page.try_map(|s| s.parse::<i32>()).unwrap();
        assert_eq!(parsed.items, vec![1, 2]);
        assert_eq!(parsed.total, 12);
        assert_eq!(parsed.page, 2);
        assert_eq!(parsed.total_pages(), 6);

        let bad = PaginatedResult::new(vec!["x"], 1, 1, 10).try_map(|s| s.parse::<i32>());
        assert!(bad.is_err());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn total_pages_is_ceiling(total in 0i64..100_000, limit in 1u32..=100) {
            let result = PaginatedResult::<()>::new(vec![], total, 1, limit);
            let pages = i64::from(result.total_pages());
            prop_assert!(pages * i64::from(limit) >= total);
            prop_assert!((pages - 1).max(0) * i64::from(limit) < total.max(1));
            if total == 0 {
                prop_assert_eq!(pages, 0);
            }
        }
    }
}
