//! src/services/publisher.rs
//!
//! Publisher — the straight-line publish sequence: ensure the bucket, upload
//! the rewritten entry point, upload the bulk list, then announce the result.
//! Local paths and remote keys come from the `Planner`.

use crate::{
    errors::{PublishError, PublishResult},
    models::{
        bucket::Bucket,
        object::PublishedObject,
        target::{BulkReport, PlannedEntry, PublishTarget, RewriteRule},
    },
    services::{planner::Planner, storage_service::ObjectStore},
};
use bytes::Bytes;
use futures::{StreamExt, stream::FuturesOrdered};
use std::{fmt::Display, io::ErrorKind, path::PathBuf};
use tokio::fs;
use tracing::{info, warn};

pub const ENTRY_POINT_CONTENT_TYPE: &str = "text/html";

pub struct Publisher<S> {
    store: S,
    planner: Planner,
    concurrency: usize,
}

impl<S: ObjectStore> Publisher<S> {
    pub fn new(store: S, root: impl Into<PathBuf>) -> Self {
        Self {
            store,
            planner: Planner::new(root),
            concurrency: 1,
        }
    }

    /// Allow up to `limit` bulk uploads in flight. Results keep list order.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the named bucket, creating it if it does not exist yet.
    pub async fn ensure_bucket(&self, name: &str) -> PublishResult<Bucket> {
        let bucket = self.store.ensure_bucket(name).await?;
        if bucket.created {
            info!("Created bucket {} in {}", bucket.name, bucket.region);
        } else {
            info!("Using existing bucket {}", bucket.name);
        }
        Ok(bucket)
    }

    /// Read the entry point, apply `rule`, and upload it as public HTML.
    pub async fn publish_entry_point(
        &self,
        bucket: &Bucket,
        local_path: &str,
        key: &str,
        rule: &RewriteRule,
    ) -> PublishResult<PublishedObject> {
        let path = self.planner.root().join(local_path);
        info!("Loading {}", local_path);
        let source = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(PublishError::LocalFileMissing(path));
            }
            Err(err) => return Err(err.into()),
        };

        let rewritten = rule.apply(&source);
        info!("Uploading modified {} as {}", local_path, key);
        self.upload(
            bucket,
            key,
            Bytes::from(rewritten),
            Some(ENTRY_POINT_CONTENT_TYPE.to_string()),
        )
        .await
    }

    /// Upload every file named by `paths`, expanding directories.
    ///
    /// Paths that are neither file nor directory are skipped with a warning.
    /// The first failed upload aborts the rest of the run.
    pub async fn publish_bulk<P: AsRef<str>>(
        &self,
        bucket: &Bucket,
        paths: &[P],
    ) -> PublishResult<BulkReport> {
        let mut report = BulkReport::default();
        let mut targets = Vec::new();
        for entry in self.planner.plan(paths)? {
            match entry {
                PlannedEntry::File(target) => targets.push(target),
                PlannedEntry::Directory { targets: found, .. } => targets.extend(found),
                PlannedEntry::Skipped(path) => report.skipped.push(path),
            }
        }

        report.objects = self.upload_all(bucket, &targets).await?;
        Ok(report)
    }

    /// Upload targets with at most `concurrency` in flight, results in list
    /// order. After the first failure no new target is started, but uploads
    /// already running finish both their put and their ACL call.
    async fn upload_all(
        &self,
        bucket: &Bucket,
        targets: &[PublishTarget],
    ) -> PublishResult<Vec<PublishedObject>> {
        let mut pending = targets.iter();
        let mut in_flight = FuturesOrdered::new();
        let mut objects = Vec::with_capacity(targets.len());
        let mut first_error = None;

        loop {
            while first_error.is_none() && in_flight.len() < self.concurrency {
                match pending.next() {
                    Some(target) => in_flight.push_back(self.publish_file(bucket, target)),
                    None => break,
                }
            }

            match in_flight.next().await {
                Some(Ok(object)) => objects.push(object),
                Some(Err(err)) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
                None => break,
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(objects),
        }
    }

    /// Open `url` in the default browser. Failures are only logged.
    pub fn announce(&self, url: &str) {
        announce_with(url, |url| opener::open(url));
    }

    pub fn public_url(&self, bucket: &Bucket, key: &str) -> String {
        self.store.public_url(bucket, key)
    }

    async fn publish_file(
        &self,
        bucket: &Bucket,
        target: &PublishTarget,
    ) -> PublishResult<PublishedObject> {
        info!("Uploading {}", target.key);
        let body = fs::read(&target.local_path).await?;
        let content_type = mime_guess::from_path(&target.local_path)
            .first()
            .map(|mime| mime.to_string());
        self.upload(bucket, &target.key, Bytes::from(body), content_type)
            .await
    }

    /// Content upload followed by a separate visibility change.
    async fn upload(
        &self,
        bucket: &Bucket,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> PublishResult<PublishedObject> {
        let mut object = self
            .store
            .put_object(bucket, key, body, content_type)
            .await?;
        self.store.make_public(bucket, key).await?;
        object.public = true;
        Ok(object)
    }
}

fn announce_with<E: Display>(url: &str, open: impl FnOnce(&str) -> Result<(), E>) {
    info!("Opening {}", url);
    if let Err(err) = open(url) {
        warn!("Could not open a browser for {}: {}", url, err);
    }
}
