//! Page navigation helpers for the movie list.

use std::fmt;

/// Pages shown in full before the navigation collapses into a window.
const MAX_VISIBLE_PAGES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{n}"),
            Self::Ellipsis => f.write_str("..."),
        }
    }
}

/// Page links to show for `page` out of `total_pages`.
///
/// Every page when there are at most five. Otherwise `page ± 2`, plus the first and last
/// pages, with an ellipsis wherever pages are skipped.
pub fn page_numbers(page: u32, total_pages: u32) -> Vec<PageItem> {
    if total_pages <= MAX_VISIBLE_PAGES {
        return (1..=total_pages).map(PageItem::Page).collect();
    }

    let page = page.clamp(1, total_pages);
    let start = page.saturating_sub(2).max(1);
    let end = page.saturating_add(2).min(total_pages);
    let mut items = Vec::with_capacity(9);

    if start > 1 {
        items.push(PageItem::Page(1));
        if start > 2 {
            items.push(PageItem::Ellipsis);
        }
    }

    items.extend((start..=end).map(PageItem::Page));

    if end < total_pages {
        if end < total_pages - 1 {
            items.push(PageItem::Ellipsis);
        }
        items.push(PageItem::Page(total_pages));
    }

    items
}

/// First and last result numbers shown on `page`, 1-based. `(0, 0)` when there are no
/// results.
pub fn result_range(page: u32, limit: u32, total_count: u64) -> (u64, u64) {
    if total_count == 0 {
        return (0, 0);
    }
    let page = u64::from(page.max(1));
    let limit = u64::from(limit);
    let first = (page - 1) * limit + 1;
    let last = (page * limit).min(total_count);
    (first, last)
}

/// "Showing 11 to 20 of 42 movies".
pub fn result_summary(page: u32, limit: u32, total_count: u64) -> String {
    let (first, last) = result_range(page, limit, total_count);
    format!("Showing {first} to {last} of {total_count} movies")
}
