pub mod error;
pub mod store;
pub mod types;

pub use error::BlobError;
pub use store::BlobStore;
pub use types::{BlobHandle, DeleteOutcome, SignedUrl, UploadTarget};
