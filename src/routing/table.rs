//! Ordered page registration.
//!
//! Pages arrive from several sources (modules, plugins, generated
//! registries). Each source has an ordinal, and pages inside a source carry
//! a declared order. The table sorts by `(source, order)` and keeps
//! insertion order for ties, so the final sequence is deterministic no
//! matter how registration was interleaved.

use crate::engine::Page;

#[derive(Debug)]
struct Entry {
    source: u32,
    order: i32,
    page: Page,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<Entry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `page` from `source` at `order`. Lower values come first.
    pub fn insert(&mut self, source: u32, order: i32, page: Page) -> &mut Self {
        self.entries.push(Entry {
            source,
            order,
            page,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pages in trial order.
    pub fn into_pages(mut self) -> Vec<Page> {
        // Stable sort: equal keys keep registration order.
        self.entries.sort_by_key(|e| (e.source, e.order));
        let pages: Vec<Page> = self.entries.into_iter().map(|e| e.page).collect();
        tracing::debug!(
            pages = ?pages.iter().map(Page::name).collect::<Vec<_>>(),
            "Route table compiled"
        );
        pages
    }
}
