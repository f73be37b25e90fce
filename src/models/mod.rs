//! Data models for a publish run.
//!
//! `Bucket` and `PublishedObject` describe remote state; `target` holds the
//! local side (what gets uploaded under which key).

pub mod bucket;
pub mod object;
pub mod target;
