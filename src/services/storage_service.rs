//! src/services/storage_service.rs
//!
//! The `ObjectStore` seam the publisher talks to, plus the bucket-name and
//! object-key rules every backend enforces before going to the network.

use crate::{
    errors::{PublishError, PublishResult},
    models::{bucket::Bucket, object::PublishedObject},
};
use async_trait::async_trait;
use bytes::Bytes;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Remote operations needed to publish a site.
///
/// Uploading content and granting public-read are deliberately separate
/// calls; a failure between them leaves the object private.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Return the bucket, creating it if absent. Must be idempotent.
    async fn ensure_bucket(&self, name: &str) -> PublishResult<Bucket>;

    /// Write `body` under `key`, replacing any previous content.
    async fn put_object(
        &self,
        bucket: &Bucket,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> PublishResult<PublishedObject>;

    /// Grant anonymous read access to an existing object.
    async fn make_public(&self, bucket: &Bucket, key: &str) -> PublishResult<()>;

    /// URL under which a public object can be fetched anonymously.
    fn public_url(&self, bucket: &Bucket, key: &str) -> String;
}

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects empty or oversized keys, keys that begin with `/` or have a `..`
/// segment, and keys with control characters or backslashes. Dots inside a
/// file name (`jquery..min.js`) are fine.
pub fn ensure_key_safe(key: &str) -> PublishResult<()> {
    let invalid = || PublishError::InvalidObjectKey(key.to_string());
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(invalid());
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(invalid());
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(invalid());
    }
    Ok(())
}

/// Validate bucket name format.
///
/// Enforces S3 naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
pub fn ensure_bucket_name_safe(name: &str) -> PublishResult<()> {
    let reject = |reason: &str| {
        Err(PublishError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.into(),
        })
    };

    if name.trim() != name {
        return reject("cannot begin or end with whitespace");
    }

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return reject("must be between 3 and 63 characters");
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return reject("allowed characters are lowercase letters, digits, dots, and hyphens");
    }

    if name.starts_with('.') || name.ends_with('.') || name.starts_with('-') || name.ends_with('-')
    {
        return reject("must start and end with a lowercase letter or digit");
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return reject("cannot contain consecutive dots or dot-hyphen combinations");
    }

    if is_ipv4_like(name) {
        return reject("must not be formatted like an IP address");
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
