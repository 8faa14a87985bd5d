use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Failed to encode page: {0}")]
    Encode(String),

    #[error("Failed to decode page: {0}")]
    Decode(String),

    #[error("Encoded page data is {0} bytes, exceeding the page size {1}")]
    Overflow(usize, usize),
}
