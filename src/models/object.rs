//! Represents an object written to the bucket during a run.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single uploaded object.
///
/// Only metadata is kept; the content bytes are dropped after upload.
#[derive(Serialize, Clone, Debug)]
pub struct PublishedObject {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Content type sent with the upload, if any.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: u64,

    /// Entity tag reported by the store.
    pub etag: Option<String>,

    /// Whether the public-read ACL has been applied.
    pub public: bool,

    /// When the content upload finished.
    pub uploaded_at: DateTime<Utc>,
}
