use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::common::types::{PageId, PagePtr};
use crate::storage::buffer::BufferPool;
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::manager::BufferPoolManager;
use crate::storage::disk::DiskManager;

/// Shards pages over N independent buffer pool instances to reduce latch
/// contention. Every per-page operation routes by `page_id % N`; page
/// creation round-robins over the instances. The router itself holds no
/// latch; each instance synchronizes on its own.
pub struct ParallelBufferPoolManager {
    instances: Vec<Arc<BufferPoolManager>>,
    num_instances: usize,
    start_index: AtomicUsize,
}

impl ParallelBufferPoolManager {
    pub fn new(
        num_instances: usize,
        pool_size: usize,
        db_path: impl AsRef<Path>,
    ) -> Result<Self, BufferPoolError> {
        assert!(num_instances > 0);
        let disk_manager = Arc::new(DiskManager::new(db_path)?);

        let instances = (0..num_instances)
            .map(|i| {
                Arc::new(BufferPoolManager::with_instance(
                    pool_size,
                    num_instances,
                    i,
                    disk_manager.clone(),
                ))
            })
            .collect();

        Ok(Self {
            instances,
            num_instances,
            start_index: AtomicUsize::new(0),
        })
    }

    /// The instance responsible for the given page
    fn instance_for(&self, page_id: PageId) -> &BufferPoolManager {
        &self.instances[page_id as usize % self.num_instances]
    }

    pub fn num_instances(&self) -> usize {
        self.num_instances
    }
}

impl BufferPool for ParallelBufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    /// Round-robin with wrap: start where the last call left off and take the
    /// first instance that has a frame to spare, so concurrent callers spread
    /// across instances.
    fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let start = self.start_index.fetch_add(1, Ordering::Relaxed) % self.num_instances;

        for offset in 0..self.num_instances {
            let idx = (start + offset) % self.num_instances;
            match self.instances[idx].new_page() {
                Ok(result) => return Ok(result),
                Err(BufferPoolError::NoAvailableFrame) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(BufferPoolError::NoAvailableFrame)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).delete_page(page_id)
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).flush_page(page_id)
    }

    fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        for instance in &self.instances {
            instance.flush_all_pages()?;
        }
        Ok(())
    }

    fn pool_size(&self) -> usize {
        self.instances.iter().map(|i| i.pool_size()).sum()
    }
}
