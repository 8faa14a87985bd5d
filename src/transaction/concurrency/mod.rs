pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

// Public exports
pub use lock_manager::{LockManager, LockMode};
pub use transaction::{Transaction, TransactionState, IsolationLevel, WriteType, IndexWriteRecord};
pub use transaction_manager::TransactionManager;
