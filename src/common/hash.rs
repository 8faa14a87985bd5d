use std::hash::{Hash, Hasher};
use mur3::Hasher128;

/// Hash a key down to the 32 bits the directory indexes with.
///
/// Keys are fed through MurmurHash3 (x64, 128-bit); the low 32 bits of the
/// first word are kept.
pub fn hash_key<K: Hash>(key: &K) -> u32 {
    let mut hasher = Hasher128::with_seed(0);
    key.hash(&mut hasher);
    hasher.finish() as u32
}
