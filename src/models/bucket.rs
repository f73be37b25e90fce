//! Represents the remote bucket a run publishes into.

use serde::Serialize;

/// A storage bucket resolved by `ensure_bucket`.
///
/// Read-only for the rest of the run once returned.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket name (conforms to DNS naming rules).
    pub name: String,

    /// Region the bucket lives in (e.g. "us-east-1").
    pub region: String,

    /// Whether this run created the bucket rather than finding it.
    pub created: bool,
}
