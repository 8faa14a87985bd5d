use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use log::debug;
use parking_lot::Mutex;

use crate::common::types::{Page, PageId, PagePtr, Frame, FrameId, FramePtr, INVALID_PAGE_ID};
use crate::storage::buffer::BufferPool;
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LRUReplacer;
use crate::storage::disk::DiskManager;

/// Bookkeeping state guarded by the instance mutex
struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    free_page_ids: Vec<PageId>,
}

/// A single buffer pool instance: a fixed array of frames shadowing on-disk
/// pages, materialized on demand and written back on eviction.
///
/// When the instance is part of a parallel pool, page IDs are allocated with
/// a stride of `num_instances` starting at `instance_index`, so the
/// `page_id % num_instances` routing rule holds for every page this instance
/// ever creates.
pub struct BufferPoolManager {
    pool_size: usize,
    num_instances: usize,
    frames: Vec<FramePtr>,
    state: Mutex<PoolState>,
    next_page_id: AtomicU32,
    replacer: LRUReplacer,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    /// Create a standalone buffer pool over the given database file
    pub fn new(pool_size: usize, db_path: impl AsRef<Path>) -> Result<Self, BufferPoolError> {
        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        Ok(Self::with_instance(pool_size, 1, 0, disk_manager))
    }

    /// Create one instance of a sharded pool. `instance_index` must be less
    /// than `num_instances`; all instances share the disk manager.
    pub fn with_instance(
        pool_size: usize,
        num_instances: usize,
        instance_index: usize,
        disk_manager: Arc<DiskManager>,
    ) -> Self {
        assert!(num_instances > 0 && instance_index < num_instances);

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = i as FrameId;
            let frame = Frame::new(frame_id, Arc::new(parking_lot::RwLock::new(Page::new(INVALID_PAGE_ID))));
            frames.push(Arc::new(parking_lot::RwLock::new(frame)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            num_instances,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                free_page_ids: Vec::new(),
            }),
            next_page_id: AtomicU32::new(instance_index as u32),
            replacer: LRUReplacer::new(pool_size),
            disk_manager,
        }
    }

    /// Fetch a page from the buffer pool or disk
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation("Cannot fetch invalid page ID".to_string()));
        }

        let mut state = self.state.lock();

        // Fast path: page is already resident
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id as usize];
            {
                let mut frame_guard = frame.write();
                frame_guard.pin_count += 1;
            }
            self.replacer.pin(frame_id);
            return Ok(frame.read().page.clone());
        }

        // Miss: claim a frame, then load the page from disk
        let frame_id = self.reclaim_frame(&mut state)?;

        let mut new_page = Page::new(page_id);
        self.disk_manager.read_page(page_id, &mut new_page)?;

        {
            let frame = &self.frames[frame_id as usize];
            let mut frame_guard = frame.write();
            {
                let mut page_guard = frame_guard.page.write();
                *page_guard = new_page;
            }
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = false;
        }

        state.page_table.insert(page_id, frame_id);
        Ok(self.frames[frame_id as usize].read().page.clone())
    }

    /// Create a new page, pinned
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let mut state = self.state.lock();

        // Claim a frame first; a pool with every frame pinned fails before
        // consuming a page ID.
        let frame_id = self.reclaim_frame(&mut state)?;
        let page_id = self.allocate_page_id(&mut state);

        {
            let frame = &self.frames[frame_id as usize];
            let mut frame_guard = frame.write();
            {
                let mut page_guard = frame_guard.page.write();
                *page_guard = Page::new(page_id);
            }
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = true;
        }

        state.page_table.insert(page_id, frame_id);
        Ok((self.frames[frame_id as usize].read().page.clone(), page_id))
    }

    /// Unpin a page, potentially marking it as dirty
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Err(BufferPoolError::PageNotFound(page_id)),
        };

        let pin_count = {
            let frame = &self.frames[frame_id as usize];
            let mut frame_guard = frame.write();

            if frame_guard.pin_count == 0 {
                return Err(BufferPoolError::InvalidOperation(
                    format!("Page {} is not pinned", page_id)
                ));
            }

            frame_guard.pin_count -= 1;
            if is_dirty {
                frame_guard.is_dirty = true;
            }
            frame_guard.pin_count
        };

        if pin_count == 0 {
            self.replacer.unpin(frame_id);
        }

        Ok(())
    }

    /// Flush a specific page to disk, whether or not it is dirty
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation("Cannot flush invalid page ID".to_string()));
        }

        let state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Err(BufferPoolError::PageNotFound(page_id)),
        };

        let frame = &self.frames[frame_id as usize];
        let page_copy = {
            let frame_guard = frame.read();
            let page_copy = frame_guard.page.read().clone();
            page_copy
        };

        self.disk_manager.write_page(&page_copy)?;

        let mut frame_guard = frame.write();
        frame_guard.is_dirty = false;

        Ok(())
    }

    /// Flush all pages in the buffer pool to disk
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let page_ids: Vec<PageId> = {
            let state = self.state.lock();
            state.page_table.keys().cloned().collect()
        };

        for page_id in page_ids {
            self.flush_page(page_id)?;
        }

        Ok(())
    }

    /// Delete a page from the buffer pool; the on-disk ID is recycled
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation("Cannot delete invalid page ID".to_string()));
        }

        let mut state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&id) => id,
            None => {
                // Not resident; just recycle the ID
                state.free_page_ids.push(page_id);
                return Ok(());
            }
        };

        {
            let frame = &self.frames[frame_id as usize];
            let mut frame_guard = frame.write();

            if frame_guard.pin_count > 0 {
                return Err(BufferPoolError::PagePinned(page_id));
            }

            {
                let mut page_guard = frame_guard.page.write();
                *page_guard = Page::new(INVALID_PAGE_ID);
            }
            frame_guard.is_dirty = false;
        }

        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        state.free_list.push_back(frame_id);
        state.free_page_ids.push(page_id);

        Ok(())
    }

    /// Number of frames in this instance
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Claim a frame: first from the free list, then by evicting the LRU
    /// victim, writing it back if dirty.
    fn reclaim_frame(&self, state: &mut PoolState) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.victim().ok_or(BufferPoolError::NoAvailableFrame)?;
        let frame = &self.frames[frame_id as usize];

        let (old_page_id, page_to_write) = {
            let frame_guard = frame.read();
            assert_eq!(frame_guard.pin_count, 0, "victim frame must be unpinned");
            let page_guard = frame_guard.page.read();
            let copy = if frame_guard.is_dirty {
                Some(page_guard.clone())
            } else {
                None
            };
            (page_guard.page_id, copy)
        };

        if let Some(page) = page_to_write {
            debug!("evicting dirty page {} from frame {}", old_page_id, frame_id);
            self.disk_manager.write_page(&page)?;
        }

        if old_page_id != INVALID_PAGE_ID {
            state.page_table.remove(&old_page_id);
        }

        Ok(frame_id)
    }

    /// Allocate a page ID, preferring recycled IDs. Fresh IDs stride by the
    /// number of instances so they always route back to this instance.
    fn allocate_page_id(&self, state: &mut PoolState) -> PageId {
        if let Some(page_id) = state.free_page_ids.pop() {
            return page_id;
        }
        self.next_page_id.fetch_add(self.num_instances as u32, Ordering::SeqCst)
    }
}

impl BufferPool for BufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        BufferPoolManager::fetch_page(self, page_id)
    }

    fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        BufferPoolManager::new_page(self)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        BufferPoolManager::unpin_page(self, page_id, is_dirty)
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        BufferPoolManager::delete_page(self, page_id)
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        BufferPoolManager::flush_page(self, page_id)
    }

    fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        BufferPoolManager::flush_all_pages(self)
    }

    fn pool_size(&self) -> usize {
        BufferPoolManager::pool_size(self)
    }
}
