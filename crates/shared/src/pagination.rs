//! Offset-based pagination utilities.
//!
//! Pages are zero-based. A request without a page starts at page 0 and a
//! request without a size uses [`DEFAULT_PAGE_SIZE`].

use serde::Serialize;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 3;

/// Upper bound on the page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A resolved page request (zero-based page, bounded size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Resolves optional client values into a page request.
    ///
    /// Negative pages clamp to 0; a size of 0 or below falls back to the
    /// default, anything above [`MAX_PAGE_SIZE`] is capped.
    pub fn new(page: Option<i64>, size: Option<i64>) -> Self {
        let page = page.unwrap_or(0).clamp(0, u32::MAX as i64) as u32;
        let size = match size {
            Some(s) if s > 0 => s.min(MAX_PAGE_SIZE as i64) as u32,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, size }
    }

    /// Number of rows to fetch.
    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total_items: i64,
    pub items: Vec<T>,
    pub total_pages: i64,
    pub current_page: u32,
}

impl<T> Page<T> {
    /// Builds a page from the rows of the current page and the total match count.
    pub fn new(items: Vec<T>, total_items: i64, request: PageRequest) -> Self {
        Self {
            total_items,
            items,
            total_pages: total_pages(total_items, request.size),
            current_page: request.page,
        }
    }

    /// Converts the items while keeping the page totals.
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            total_items: self.total_items,
            items: self.items.into_iter().map(f).collect(),
            total_pages: self.total_pages,
            current_page: self.current_page,
        }
    }
}

/// `ceil(total_items / size)`, 0 for an empty result.
pub fn total_pages(total_items: i64, size: u32) -> i64 {
    if total_items <= 0 || size == 0 {
        return 0;
    }
    let size = size as i64;
    (total_items + size - 1) / size
}
