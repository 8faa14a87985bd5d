use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;

use crate::common::types::FrameId;

/// LRU (Least Recently Used) page replacement policy.
///
/// Tracks the frames that are currently unpinned and therefore eligible for
/// eviction. The backing structure is an ordered map keyed by frame ID, with
/// the least recently used frame at the front, so every operation is O(1).
pub struct LRUReplacer {
    capacity: usize,
    lru_list: Mutex<LinkedHashMap<FrameId, ()>>,
}

impl LRUReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lru_list: Mutex::new(LinkedHashMap::with_capacity(capacity)),
        }
    }

    /// Evict the least recently used frame, if any frame is evictable.
    pub fn victim(&self) -> Option<FrameId> {
        let mut list = self.lru_list.lock();
        list.pop_front().map(|(frame_id, _)| frame_id)
    }

    /// A frame was pinned by the buffer pool; it is no longer evictable.
    pub fn pin(&self, frame_id: FrameId) {
        let mut list = self.lru_list.lock();
        list.remove(&frame_id);
    }

    /// A frame dropped to pin count zero; it becomes the most recently used
    /// evictable frame. An already-tracked frame is refreshed to that
    /// position.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut list = self.lru_list.lock();
        if list.get_refresh(&frame_id).is_some() {
            return;
        }
        if list.len() >= self.capacity {
            return;
        }
        list.insert(frame_id, ());
    }

    /// Number of frames currently evictable
    pub fn size(&self) -> usize {
        self.lru_list.lock().len()
    }
}
