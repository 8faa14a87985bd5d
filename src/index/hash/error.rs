use thiserror::Error;
use crate::storage::buffer::BufferPoolError;
use crate::storage::page::PageError;

#[derive(Error, Debug)]
pub enum HashIndexError {
    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),
}
