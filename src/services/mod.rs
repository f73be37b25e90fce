//! Publishing services: the store seam, its S3 backend, and the publisher
//! that drives them.

#[cfg(test)]
pub mod memory_store;
pub mod planner;
pub mod publisher;
pub mod s3_store;
pub mod storage_service;
