// Export public modules
pub mod common;
pub mod storage;
pub mod index;
pub mod transaction;

// Re-export key items for convenient access
pub use storage::buffer::BufferPool;
pub use storage::buffer::BufferPoolManager;
pub use storage::buffer::ParallelBufferPoolManager;
pub use storage::buffer::BufferPoolError;
pub use storage::buffer::replacer::LRUReplacer;
pub use index::hash::ExtendibleHashTable;
pub use transaction::{Transaction, TransactionState, IsolationLevel};
pub use transaction::LockManager;
pub use transaction::TransactionManager;
