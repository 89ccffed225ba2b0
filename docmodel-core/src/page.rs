//! Cursor pagination over query sets.
//!
//! A [`Paginator`] walks a query in pages of `page_size` instances. Each page after the first
//! starts after the last document of the previous page, so pages stay consistent while earlier
//! documents are inserted or removed. A limit set on the query set caps the total across pages.
//!
//! ```ignore
//! let mut pages = store.objects(&user)?.paginate(50)?;
//!
//! while let Some(page) = pages.next_page().await? {
//!     for user in page.items {
//!         // ...
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    backend::StoreBackend,
    error::{DocumentStoreError, DocumentStoreResult},
    manager::QuerySet,
    model::Instance,
};

/// A single page of results.
///
/// # Example
///
/// ```ignore
/// use docmodel::page::Page;
///
/// let page: Page<String> = Page::builder(vec!["item1".to_string()])
///     .with_number(1)
///     .with_cursor(Some("item1".to_string()))
///     .build();
///
/// assert_eq!(page.items.len(), 1);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub number: usize,
    /// Identifier of the last item, which the next page starts after. `None` on the last page.
    pub cursor: Option<String>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Whether another page may follow.
    pub fn has_next(&self) -> bool {
        self.cursor.is_some()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            number: 1,
            cursor: None,
            previous_page: None,
        }
    }
}

/// Builder for [`Page`] values.
pub struct PageBuilder<T> {
    items: Vec<T>,
    number: usize,
    cursor: Option<String>,
}

impl<T> PageBuilder<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            number: 1,
            cursor: None,
        }
    }

    pub fn with_number(mut self, number: usize) -> Self {
        self.number = number.max(1);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            number: self.number,
            cursor: self.cursor,
            previous_page: self.number.checked_sub(1).filter(|page| *page > 0),
        }
    }
}

/// Walks a query set page by page.
#[derive(Debug)]
pub struct Paginator<'a, B: StoreBackend> {
    queryset: QuerySet<'a, B>,
    page_size: usize,
    cursor: Option<String>,
    number: usize,
    remaining: Option<usize>,
    exhausted: bool,
}

impl<'a, B: StoreBackend> Paginator<'a, B> {
    pub(crate) fn new(queryset: QuerySet<'a, B>, page_size: usize) -> DocumentStoreResult<Self> {
        if page_size == 0 {
            return Err(DocumentStoreError::config("page size must be at least 1"));
        }

        Ok(Self {
            remaining: queryset.max_results(),
            queryset,
            page_size,
            cursor: None,
            number: 0,
            exhausted: false,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetches the next page, or `None` once the query is exhausted.
    pub async fn next_page(&mut self) -> DocumentStoreResult<Option<Page<Instance>>> {
        let batch = self
            .remaining
            .map_or(self.page_size, |remaining| remaining.min(self.page_size));
        if self.exhausted || batch == 0 {
            self.exhausted = true;
            return Ok(None);
        }

        let mut queryset = self.queryset.clone().limit(batch);
        if let Some(cursor) = &self.cursor {
            queryset = queryset.start_after(cursor.clone());
        }

        let items = queryset.fetch().await?;
        if items.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        if let Some(remaining) = &mut self.remaining {
            *remaining = remaining.saturating_sub(items.len());
        }

        self.cursor = if items.len() < batch || self.remaining == Some(0) {
            None
        } else {
            items
                .last()
                .and_then(Instance::id)
                .map(str::to_string)
        };
        self.exhausted = self.cursor.is_none();
        self.number += 1;

        Ok(Some(
            Page::builder(items)
                .with_number(self.number)
                .with_cursor(self.cursor.clone())
                .build(),
        ))
    }

    /// Fetches every remaining page.
    pub async fn collect_pages(mut self) -> DocumentStoreResult<Vec<Page<Instance>>> {
        let mut pages = Vec::new();
        while let Some(page) = self.next_page().await? {
            pages.push(page);
        }

        Ok(pages)
    }
}
