//! Local inputs of a run: what to upload, under which key, and how the
//! entry point is rewritten.

use serde::Serialize;
use std::path::PathBuf;

/// A single local file paired with the remote key it is uploaded under.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PublishTarget {
    /// Absolute (root-joined) path of the local file.
    pub local_path: PathBuf,

    /// Remote key, `/`-separated and relative to the publish root.
    pub key: String,
}

/// Outcome of classifying one bulk-list entry.
#[derive(Debug)]
pub enum PlannedEntry {
    File(PublishTarget),
    Directory { path: String, targets: Vec<PublishTarget> },
    Skipped(String),
}

/// Result of a bulk publish: what went up and what was passed over.
#[derive(Serialize, Debug, Default)]
pub struct BulkReport {
    pub objects: Vec<super::object::PublishedObject>,
    pub skipped: Vec<String>,
}

/// Literal substring replacement applied to the entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteRule {
    pub placeholder: String,
    pub replacement: String,
}

impl RewriteRule {
    pub fn new(placeholder: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            replacement: replacement.into(),
        }
    }

    /// Replace every non-overlapping occurrence of the placeholder, scanning
    /// left to right. Works on raw bytes so non-UTF-8 documents pass through.
    pub fn apply(&self, input: &[u8]) -> Vec<u8> {
        let needle = self.placeholder.as_bytes();
        if needle.is_empty() {
            return input.to_vec();
        }

        let mut out = Vec::with_capacity(input.len());
        let mut rest = input;
        while let Some(pos) = find(rest, needle) {
            out.extend_from_slice(&rest[..pos]);
            out.extend_from_slice(self.replacement.as_bytes());
            rest = &rest[pos + needle.len()..];
        }
        out.extend_from_slice(rest);
        out
    }
}

impl Default for RewriteRule {
    fn default() -> Self {
        Self::new("http://localhost:8888/", "/")
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
