use std::{io, path::PathBuf};
use thiserror::Error;

/// Every way a publish run can fail. All variants are fatal to the run.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("required file `{}` does not exist", .0.display())]
    LocalFileMissing(PathBuf),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("upload of `{key}` failed: {reason}")]
    UploadFailed { key: String, reason: String },
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PublishError {
    pub fn upload_failed(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::UploadFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

pub type PublishResult<T> = Result<T, PublishError>;
