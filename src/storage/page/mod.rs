pub mod bucket;
pub mod directory;
pub mod error;

pub use bucket::{BucketPage, bucket_array_size};
pub use directory::{DirectoryPage, DIRECTORY_ARRAY_SIZE, MAX_BUCKET_DEPTH};
pub use error::PageError;
