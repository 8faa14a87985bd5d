use std::cell::Cell;

use crate::common::types::{PageId, PagePtr};
use crate::storage::buffer::BufferPool;
use crate::storage::buffer::error::BufferPoolError;

/// Scoped pin on a buffer pool page.
///
/// Acquisition pins the page; dropping the guard unpins it with whatever
/// dirty flag was recorded through [`mark_dirty`](Self::mark_dirty). Callers
/// therefore cannot forget an unpin or report the wrong flag.
pub struct PageGuard<'a> {
    pool: &'a dyn BufferPool,
    page: PagePtr,
    page_id: PageId,
    dirty: Cell<bool>,
}

impl<'a> PageGuard<'a> {
    /// Pin an existing page
    pub fn fetch(pool: &'a dyn BufferPool, page_id: PageId) -> Result<Self, BufferPoolError> {
        let page = pool.fetch_page(page_id)?;
        Ok(Self {
            pool,
            page,
            page_id,
            dirty: Cell::new(false),
        })
    }

    /// Allocate and pin a fresh page. New pages unpin dirty so their zeroed
    /// contents reach disk.
    pub fn create(pool: &'a dyn BufferPool) -> Result<Self, BufferPoolError> {
        let (page, page_id) = pool.new_page()?;
        Ok(Self {
            pool,
            page,
            page_id,
            dirty: Cell::new(true),
        })
    }

    pub fn page(&self) -> &PagePtr {
        &self.page
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Record that the caller modified the page contents
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }
}

impl Drop for PageGuard<'_> {
    fn drop(&mut self) {
        // The page may already be gone if the caller deleted it; nothing
        // useful to do with the error here.
        let _ = self.pool.unpin_page(self.page_id, self.dirty.get());
    }
}
