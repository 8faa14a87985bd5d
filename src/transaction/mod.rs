// Transaction management module

pub mod concurrency;

// Public exports
pub use concurrency::{Transaction, TransactionState, IsolationLevel, WriteType, IndexWriteRecord};
pub use concurrency::lock_manager::{LockManager, LockMode};
pub use concurrency::transaction_manager::TransactionManager;
