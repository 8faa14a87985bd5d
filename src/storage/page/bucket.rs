use std::mem;
use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;

use crate::common::types::{Page, PAGE_SIZE};
use crate::storage::page::error::PageError;

// Headroom for the encoder's length prefixes
const BUCKET_RESERVE: usize = 64;

/// Number of (key, value) pairs a bucket page can hold.
///
/// Each slot costs the encoded pair (estimated from the in-memory size plus
/// one option tag byte) and two bits across the occupied/readable bitmaps.
/// This is an estimate in the same way the B+Tree order computation of a
/// record page is: exact for fixed-size keys and values, which is what the
/// index stores.
pub fn bucket_array_size<K, V>() -> usize {
    let entry_size = mem::size_of::<K>() + mem::size_of::<V>() + 1;
    ((PAGE_SIZE - BUCKET_RESERVE) * 8) / (8 * entry_size + 2)
}

/// Bucket page of the extendible hash table.
///
/// Slots are a fixed-capacity array with two parallel bitmaps: `occupied`
/// marks slots that were ever written, `readable` marks slots holding a live
/// entry. Removal clears only the readable bit; the slot array carries no
/// in-order meaning.
#[derive(Debug, Serialize, Deserialize)]
pub struct BucketPage<K, V> {
    slots: Vec<Option<(K, V)>>,
    occupied: Vec<u8>,
    readable: Vec<u8>,
}

impl<K, V> BucketPage<K, V>
where
    K: Eq + Clone + Serialize + DeserializeOwned,
    V: Eq + Clone + Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        let capacity = bucket_array_size::<K, V>();
        debug_assert!(capacity > 0, "key/value pair too large for a bucket page");
        let bitmap_bytes = capacity.div_ceil(8);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            occupied: vec![0; bitmap_bytes],
            readable: vec![0; bitmap_bytes],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Insert a pair. Rejects an exact (key, value) duplicate and a full
    /// bucket; otherwise the pair lands in the first non-readable slot.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let mut available = None;
        for i in 0..self.capacity() {
            if self.is_readable(i) {
                if let Some((k, v)) = &self.slots[i] {
                    if *k == key && *v == value {
                        return false;
                    }
                }
            } else if available.is_none() {
                available = Some(i);
            }
        }

        match available {
            Some(i) => {
                self.slots[i] = Some((key, value));
                self.set_occupied(i);
                self.set_readable(i);
                true
            }
            None => false,
        }
    }

    /// Remove the first readable slot matching the pair exactly
    pub fn remove(&mut self, key: &K, value: &V) -> bool {
        for i in 0..self.capacity() {
            if self.is_readable(i) {
                if let Some((k, v)) = &self.slots[i] {
                    if k == key && v == value {
                        self.remove_at(i);
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Collect every live value stored under the key
    pub fn get_value(&self, key: &K) -> Vec<V> {
        let mut result = Vec::new();
        for i in 0..self.capacity() {
            if self.is_readable(i) {
                if let Some((k, v)) = &self.slots[i] {
                    if k == key {
                        result.push(v.clone());
                    }
                }
            }
        }
        result
    }

    /// Clear the readable bit at the slot; occupied stays set
    pub fn remove_at(&mut self, idx: usize) {
        self.readable[idx / 8] &= !(1 << (idx % 8));
    }

    pub fn is_occupied(&self, idx: usize) -> bool {
        self.occupied[idx / 8] & (1 << (idx % 8)) != 0
    }

    fn set_occupied(&mut self, idx: usize) {
        self.occupied[idx / 8] |= 1 << (idx % 8);
    }

    pub fn is_readable(&self, idx: usize) -> bool {
        self.readable[idx / 8] & (1 << (idx % 8)) != 0
    }

    fn set_readable(&mut self, idx: usize) {
        self.readable[idx / 8] |= 1 << (idx % 8);
    }

    pub fn is_full(&self) -> bool {
        (0..self.capacity()).all(|i| self.is_readable(i))
    }

    pub fn is_empty(&self) -> bool {
        (0..self.capacity()).all(|i| !self.is_readable(i))
    }

    pub fn num_readable(&self) -> usize {
        (0..self.capacity()).filter(|&i| self.is_readable(i)).count()
    }

    /// Compact copy of the live entries, used while redistributing a split
    pub fn get_array_copy(&self) -> Vec<(K, V)> {
        let mut entries = Vec::with_capacity(self.num_readable());
        for i in 0..self.capacity() {
            if self.is_readable(i) {
                if let Some(pair) = &self.slots[i] {
                    entries.push(pair.clone());
                }
            }
        }
        entries
    }

    /// Zero the slot array and both bitmaps
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.occupied.fill(0);
        self.readable.fill(0);
    }

    /// Write the bucket into the page bytes
    pub fn to_page(&self, page: &mut Page) -> Result<(), PageError> {
        let bytes = bincode::serialize(self).map_err(|e| PageError::Encode(e.to_string()))?;
        if bytes.len() > PAGE_SIZE {
            return Err(PageError::Overflow(bytes.len(), PAGE_SIZE));
        }
        page.data[..bytes.len()].copy_from_slice(&bytes);
        page.data[bytes.len()..].fill(0);
        Ok(())
    }

    /// Read a bucket back out of the page bytes
    pub fn from_page(page: &Page) -> Result<Self, PageError> {
        bincode::deserialize(&page.data[..]).map_err(|e| PageError::Decode(e.to_string()))
    }
}

impl<K, V> Default for BucketPage<K, V>
where
    K: Eq + Clone + Serialize + DeserializeOwned,
    V: Eq + Clone + Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}
