use std::collections::HashSet;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::hash::hash_key;
use crate::common::types::{PageId, INVALID_PAGE_ID};
use crate::index::hash::error::HashIndexError;
use crate::storage::buffer::{BufferPool, PageGuard};
use crate::storage::page::{BucketPage, DirectoryPage, MAX_BUCKET_DEPTH};

/// Disk-resident extendible hash table.
///
/// The directory and every bucket live in buffer pool pages; the table owns
/// only page identities. Point operations take the table latch in read mode
/// plus the bucket's page latch; structural changes (split, merge) take the
/// table latch in write mode.
pub struct ExtendibleHashTable<K, V> {
    buffer_pool: Arc<dyn BufferPool>,
    directory_page_id: Mutex<PageId>,
    table_latch: RwLock<()>,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Eq + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a hash table over the given buffer pool. No pages are
    /// allocated until the first operation touches the table.
    pub fn new(buffer_pool: Arc<dyn BufferPool>) -> Self {
        Self {
            buffer_pool,
            directory_page_id: Mutex::new(INVALID_PAGE_ID),
            table_latch: RwLock::new(()),
            _phantom: PhantomData,
        }
    }

    /// Find all values stored under the key
    pub fn get_value(&self, key: &K) -> Result<Vec<V>, HashIndexError> {
        let _table = self.table_latch.read();
        let (_dir_guard, dir) = self.fetch_directory()?;

        let idx = Self::key_to_directory_index(key, &dir);
        let bucket_guard = PageGuard::fetch(self.buffer_pool.as_ref(), dir.bucket_page_id(idx))?;

        let page = bucket_guard.page().read();
        let bucket = BucketPage::<K, V>::from_page(&page)?;
        Ok(bucket.get_value(key))
    }

    /// Insert a (key, value) pair. Returns false for an exact duplicate, or
    /// when the bucket is full and cannot split any further.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool, HashIndexError> {
        {
            let _table = self.table_latch.read();
            let (_dir_guard, dir) = self.fetch_directory()?;

            let idx = Self::key_to_directory_index(key, &dir);
            let bucket_guard =
                PageGuard::fetch(self.buffer_pool.as_ref(), dir.bucket_page_id(idx))?;

            let mut page = bucket_guard.page().write();
            let mut bucket = BucketPage::<K, V>::from_page(&page)?;

            if !bucket.is_full() {
                let inserted = bucket.insert(key.clone(), value.clone());
                if inserted {
                    bucket.to_page(&mut page)?;
                    bucket_guard.mark_dirty();
                }
                return Ok(inserted);
            }
            // Bucket is full: release every latch and pin, then split
        }
        self.split_insert(key, value)
    }

    /// Remove a (key, value) pair. A remove that empties the bucket triggers
    /// a merge attempt.
    pub fn remove(&self, key: &K, value: &V) -> Result<bool, HashIndexError> {
        let removed;
        let became_empty;
        let bucket_idx;
        {
            let _table = self.table_latch.read();
            let (_dir_guard, dir) = self.fetch_directory()?;

            bucket_idx = Self::key_to_directory_index(key, &dir);
            let bucket_guard =
                PageGuard::fetch(self.buffer_pool.as_ref(), dir.bucket_page_id(bucket_idx))?;

            let mut page = bucket_guard.page().write();
            let mut bucket = BucketPage::<K, V>::from_page(&page)?;

            removed = bucket.remove(key, value);
            if removed {
                bucket.to_page(&mut page)?;
                bucket_guard.mark_dirty();
            }
            became_empty = removed && bucket.is_empty();
        }
        if became_empty {
            self.merge(bucket_idx)?;
        }
        Ok(removed)
    }

    /// Current global depth of the directory
    pub fn global_depth(&self) -> Result<u32, HashIndexError> {
        let _table = self.table_latch.read();
        let (_dir_guard, dir) = self.fetch_directory()?;
        Ok(dir.global_depth())
    }

    /// Number of distinct buckets the directory addresses
    pub fn num_buckets(&self) -> Result<usize, HashIndexError> {
        let _table = self.table_latch.read();
        let (_dir_guard, dir) = self.fetch_directory()?;
        let distinct: HashSet<PageId> = (0..dir.size()).map(|i| dir.bucket_page_id(i)).collect();
        Ok(distinct.len())
    }

    /// Assert every directory invariant; panics on violation
    pub fn verify_integrity(&self) -> Result<(), HashIndexError> {
        let _table = self.table_latch.read();
        let (_dir_guard, dir) = self.fetch_directory()?;
        dir.verify_integrity();
        Ok(())
    }

    /// Split the overflowing bucket the key routes to, then retry the
    /// insert. The retry may split again if the redistribution left the
    /// target bucket full.
    fn split_insert(&self, key: &K, value: &V) -> Result<bool, HashIndexError> {
        {
            let _table = self.table_latch.write();
            let (dir_guard, mut dir) = self.fetch_directory()?;

            let split_idx = Self::key_to_directory_index(key, &dir);
            let split_depth = dir.local_depth(split_idx);

            if split_depth >= MAX_BUCKET_DEPTH {
                debug!("bucket at slot {split_idx} cannot split past max depth; insert fails");
                return Ok(false);
            }

            if split_depth == dir.global_depth() {
                dir.incr_global_depth();
            }
            dir.incr_local_depth(split_idx);

            let pool = self.buffer_pool.as_ref();
            let split_page_id = dir.bucket_page_id(split_idx);
            let split_guard = PageGuard::fetch(pool, split_page_id)?;
            let new_guard = PageGuard::create(pool)?;
            let new_page_id = new_guard.page_id();

            {
                let mut split_page = split_guard.page().write();
                let mut new_page = new_guard.page().write();
                let mut split_bucket = BucketPage::<K, V>::from_page(&split_page)?;
                let mut new_bucket = BucketPage::<K, V>::new();

                let entries = split_bucket.get_array_copy();
                split_bucket.reset();

                let new_idx = dir.split_image_index(split_idx);
                let depth = dir.local_depth(split_idx) as u8;
                dir.set_local_depth(new_idx, depth);
                dir.set_bucket_page_id(new_idx, new_page_id);

                let mask = dir.local_depth_mask(split_idx);
                let split_target = split_idx as u32 & mask;
                let new_target = new_idx as u32 & mask;

                for (k, v) in entries {
                    let target = hash_key(&k) & mask;
                    debug_assert!(target == split_target || target == new_target);
                    if target == split_target {
                        split_bucket.insert(k, v);
                    } else {
                        new_bucket.insert(k, v);
                    }
                }

                // Repoint every slot aliasing either half of the split
                for j in 0..dir.size() {
                    let masked = j as u32 & mask;
                    if masked == split_target {
                        dir.set_bucket_page_id(j, split_page_id);
                        dir.set_local_depth(j, depth);
                    } else if masked == new_target {
                        dir.set_bucket_page_id(j, new_page_id);
                        dir.set_local_depth(j, depth);
                    }
                }

                split_bucket.to_page(&mut split_page)?;
                new_bucket.to_page(&mut new_page)?;
            }
            split_guard.mark_dirty();
            new_guard.mark_dirty();
            Self::write_directory(&dir_guard, &dir);
            debug!(
                "split bucket page {split_page_id} into {new_page_id} at local depth {}",
                dir.local_depth(split_idx)
            );
        }
        self.insert(key, value)
    }

    /// Fold an empty bucket into its split image. All preconditions are
    /// re-validated under the write latch; if any fails this is a no-op.
    fn merge(&self, bucket_idx: usize) -> Result<(), HashIndexError> {
        let _table = self.table_latch.write();
        let (dir_guard, mut dir) = self.fetch_directory()?;
        let pool = self.buffer_pool.as_ref();

        // The directory may have changed between the remove and this call
        if bucket_idx >= dir.size() {
            return Ok(());
        }

        let bucket_page_id = dir.bucket_page_id(bucket_idx);
        let local_depth = dir.local_depth(bucket_idx);
        if local_depth == 0 {
            return Ok(());
        }

        let split_idx = dir.split_image_index(bucket_idx);
        if dir.local_depth(split_idx) != local_depth {
            return Ok(());
        }

        {
            let bucket_guard = PageGuard::fetch(pool, bucket_page_id)?;
            let page = bucket_guard.page().read();
            let bucket = BucketPage::<K, V>::from_page(&page)?;
            if !bucket.is_empty() {
                return Ok(());
            }
        }

        let split_page_id = dir.bucket_page_id(split_idx);
        debug_assert_ne!(bucket_page_id, split_page_id);

        pool.delete_page(bucket_page_id)?;

        dir.set_bucket_page_id(bucket_idx, split_page_id);
        dir.decr_local_depth(bucket_idx);
        dir.decr_local_depth(split_idx);

        let depth = dir.local_depth(split_idx) as u8;
        for j in 0..dir.size() {
            let page_id = dir.bucket_page_id(j);
            if page_id == bucket_page_id || page_id == split_page_id {
                dir.set_bucket_page_id(j, split_page_id);
                dir.set_local_depth(j, depth);
            }
        }

        while dir.can_shrink() {
            dir.decr_global_depth();
        }

        Self::write_directory(&dir_guard, &dir);
        debug!("merged empty bucket page {bucket_page_id} into {split_page_id}");
        Ok(())
    }

    /// Pin the directory page, creating the directory and its first bucket
    /// on first access.
    fn fetch_directory(&self) -> Result<(PageGuard<'_>, DirectoryPage), HashIndexError> {
        let pool = self.buffer_pool.as_ref();
        {
            let mut directory_page_id = self.directory_page_id.lock();
            if *directory_page_id == INVALID_PAGE_ID {
                let dir_guard = PageGuard::create(pool)?;
                let bucket_guard = PageGuard::create(pool)?;

                let mut dir = DirectoryPage::new(dir_guard.page_id());
                dir.set_bucket_page_id(0, bucket_guard.page_id());
                dir.to_page(&mut dir_guard.page().write());
                BucketPage::<K, V>::new().to_page(&mut bucket_guard.page().write())?;

                *directory_page_id = dir_guard.page_id();
                debug!(
                    "initialized hash table: directory page {}, first bucket page {}",
                    dir_guard.page_id(),
                    bucket_guard.page_id()
                );
            }
        }

        let page_id = *self.directory_page_id.lock();
        let guard = PageGuard::fetch(pool, page_id)?;
        let dir = DirectoryPage::from_page(&guard.page().read());
        Ok((guard, dir))
    }

    fn write_directory(guard: &PageGuard<'_>, dir: &DirectoryPage) {
        dir.to_page(&mut guard.page().write());
        guard.mark_dirty();
    }

    fn key_to_directory_index(key: &K, dir: &DirectoryPage) -> usize {
        (hash_key(key) & dir.global_depth_mask()) as usize
    }
}
