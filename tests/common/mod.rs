use std::sync::Arc;
use anyhow::Result;
use tempfile::NamedTempFile;

use bucketdb::storage::buffer::{BufferPoolManager, ParallelBufferPoolManager};
use bucketdb::ExtendibleHashTable;

// Create a temporary database file for testing
#[allow(dead_code)]
pub fn create_temp_db_file() -> Result<(NamedTempFile, String)> {
    let file = NamedTempFile::new()?;
    let path = file.path().to_str().unwrap().to_string();
    Ok((file, path))
}

// Create a buffer pool manager with a temporary database
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolManager>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let buffer_pool = Arc::new(BufferPoolManager::new(pool_size, path)?);
    Ok((buffer_pool, file))
}

// Create a parallel buffer pool with a temporary database
#[allow(dead_code)]
pub fn create_test_parallel_pool(
    num_instances: usize,
    pool_size: usize,
) -> Result<(Arc<ParallelBufferPoolManager>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let pool = Arc::new(ParallelBufferPoolManager::new(num_instances, pool_size, path)?);
    Ok((pool, file))
}

// Create a hash table over its own buffer pool
#[allow(dead_code)]
pub fn create_test_hash_table(
    pool_size: usize,
) -> Result<(Arc<ExtendibleHashTable<i32, i32>>, NamedTempFile)> {
    let (buffer_pool, file) = create_test_buffer_pool(pool_size)?;
    let table = Arc::new(ExtendibleHashTable::new(buffer_pool));
    Ok((table, file))
}
