//! Fixed-size page slicing for post feeds.
//!
//! Page numbers come straight from the `page` query parameter, so resolution
//! is lenient: a missing or malformed number selects the first page and a
//! number outside the valid range selects the last one.

use serde::Serialize;

/// Posts per page when nothing is configured.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Splits an ordered collection into pages of `per_page` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: u64,
}

impl Paginator {
    pub fn new(per_page: u64) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Number of pages for `count` items. An empty collection still has one
    /// (empty) page.
    pub fn num_pages(&self, count: u64) -> u64 {
        count.div_ceil(self.per_page).max(1)
    }

    /// Resolve the requested page number against `count` items.
    pub fn resolve(&self, count: u64, requested: Option<&str>) -> PageWindow {
        let num_pages = self.num_pages(count);
        let number = match requested.map(str::trim) {
            None => 1,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n < 1 || n as u64 > num_pages => num_pages,
                Ok(n) => n as u64,
                Err(_) if is_integer(raw) => num_pages,
                Err(_) => 1,
            },
        };

        let offset = (number - 1) * self.per_page;
        let limit = self.per_page.min(count.saturating_sub(offset));

        PageWindow {
            number,
            num_pages,
            count,
            offset,
            limit,
        }
    }
}

/// Optionally signed run of ASCII digits, whatever its magnitude.
fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Position of one page inside a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number.
    pub number: u64,
    pub num_pages: u64,
    /// Total items in the collection.
    pub count: u64,
    pub offset: u64,
    /// Items on this page.
    pub limit: u64,
}

/// One page of items plus the navigation data templates need.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub count: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<u64>,
    pub next_page_number: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        let has_previous = window.number > 1;
        let has_next = window.number < window.num_pages;
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            count: window.count,
            has_previous,
            has_next,
            previous_page_number: has_previous.then(|| window.number - 1),
            next_page_number: has_next.then(|| window.number + 1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the items, keeping the navigation data.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_previous: self.has_previous,
            has_next: self.has_next,
            previous_page_number: self.previous_page_number,
            next_page_number: self.next_page_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_k_holds_min_of_size_and_remaining() {
        for per_page in 1..=12u64 {
            let paginator = Paginator::new(per_page);
            for count in 0..=40u64 {
                for k in 1..=paginator.num_pages(count) {
                    let window = paginator.resolve(count, Some(&k.to_string()));
                    let remaining = count.saturating_sub((k - 1) * per_page);
                    assert_eq!(window.number, k);
                    assert_eq!(window.limit, per_page.min(remaining));
                }
            }
        }
    }

    #[test]
    fn twenty_six_posts_split_ten_ten_six() {
        let paginator = Paginator::new(10);
        let sizes: Vec<u64> = ["1", "2", "3"]
            .iter()
            .map(|p| paginator.resolve(26, Some(p)).limit)
            .collect();
        assert_eq!(sizes, vec![10, 10, 6]);
    }

    #[test]
    fn missing_or_malformed_page_selects_first() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.resolve(30, None).number, 1);
        assert_eq!(paginator.resolve(30, Some("abc")).number, 1);
        assert_eq!(paginator.resolve(30, Some("")).number, 1);
    }

    #[test]
    fn out_of_range_page_clamps_to_last() {
        let paginator = Paginator::new(10);
        let window = paginator.resolve(25, Some("99"));
        assert_eq!(window.number, 3);
        assert_eq!(window.offset, 20);
        assert_eq!(window.limit, 5);

        assert_eq!(paginator.resolve(25, Some("0")).number, 3);
        assert_eq!(paginator.resolve(25, Some("-4")).number, 3);
    }

    #[test]
    fn huge_page_number_clamps_to_last() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.resolve(25, Some("99999999999999999999")).number, 3);
        assert_eq!(paginator.resolve(25, Some("-99999999999999999999")).number, 3);
        assert_eq!(paginator.resolve(25, Some("9999x")).number, 1);
    }

    #[test]
    fn empty_collection_has_one_empty_page() {
        let paginator = Paginator::new(10);
        let window = paginator.resolve(0, Some("5"));
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);
        assert_eq!(window.limit, 0);
    }

    #[test]
    fn page_navigation_flags() {
        let paginator = Paginator::new(10);
        let page = Page::new(vec![1, 2, 3], paginator.resolve(23, Some("2")));
        assert!(page.has_previous);
        assert!(page.has_next);
        assert_eq!(page.previous_page_number, Some(1));
        assert_eq!(page.next_page_number, Some(3));

        let last = Page::new(vec![1], paginator.resolve(23, Some("3")));
        assert!(!last.has_next);
        assert_eq!(last.next_page_number, None);
    }
}
