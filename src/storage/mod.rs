//! Object storage used to stage CSV files before analysis.

/// Supabase Storage REST client.
pub mod supabase;

use async_trait::async_trait;

use crate::{error::StorageError, submission::StorageKey};

pub use supabase::SupabaseStorage;

/// Options for a single object write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOptions {
    /// MIME type stored with the object.
    pub content_type: String,
    /// Replace an existing object at the same key.
    pub overwrite: bool,
}

impl UploadOptions {
    /// CSV upload that must not clobber an existing object.
    pub fn csv() -> Self {
        Self {
            content_type: "text/csv".into(),
            overwrite: false,
        }
    }
}

/// Blob store accepting a payload at a caller-chosen key.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `bytes` at `bucket/key`.
    async fn upload(
        &self,
        bucket: &str,
        key: &StorageKey,
        bytes: &[u8],
        opts: &UploadOptions,
    ) -> Result<(), StorageError>;
}
