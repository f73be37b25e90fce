//! In-memory `ObjectStore` used by the test suites.

use crate::{
    errors::{PublishError, PublishResult},
    models::{bucket::Bucket, object::PublishedObject},
    services::storage_service::{ObjectStore, ensure_bucket_name_safe, ensure_key_safe},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
    time::Duration,
};

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub public: bool,
    pub puts: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<BTreeSet<String>>,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    calls: Mutex<usize>,
    fail_key: Option<String>,
    offline: bool,
    acl_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the network were down.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// `put_object` fails for this key.
    pub fn failing_on(key: &str) -> Self {
        Self {
            fail_key: Some(key.to_string()),
            ..Self::default()
        }
    }

    /// Sleep this long inside `make_public`, after the content is stored.
    pub fn with_acl_delay(mut self, delay: Duration) -> Self {
        self.acl_delay = Some(delay);
        self
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn record_call(&self) -> PublishResult<()> {
        *self.calls.lock().unwrap() += 1;
        if self.offline {
            return Err(PublishError::StorageUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn ensure_bucket(&self, name: &str) -> PublishResult<Bucket> {
        ensure_bucket_name_safe(name)?;
        self.record_call()?;
        let created = self.buckets.lock().unwrap().insert(name.to_string());
        Ok(Bucket {
            name: name.to_string(),
            region: "local".into(),
            created,
        })
    }

    async fn put_object(
        &self,
        _bucket: &Bucket,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> PublishResult<PublishedObject> {
        ensure_key_safe(key)?;
        self.record_call()?;
        if self.fail_key.as_deref() == Some(key) {
            return Err(PublishError::upload_failed(key, "injected failure"));
        }

        let size_bytes = body.len() as u64;
        let mut objects = self.objects.lock().unwrap();
        let puts = objects.get(key).map_or(0, |existing| existing.puts) + 1;
        objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.clone(),
                public: false,
                puts,
            },
        );

        Ok(PublishedObject {
            key: key.to_string(),
            content_type,
            size_bytes,
            etag: None,
            public: false,
            uploaded_at: Utc::now(),
        })
    }

    async fn make_public(&self, _bucket: &Bucket, key: &str) -> PublishResult<()> {
        self.record_call()?;
        if let Some(delay) = self.acl_delay {
            tokio::time::sleep(delay).await;
        }
        match self.objects.lock().unwrap().get_mut(key) {
            Some(object) => {
                object.public = true;
                Ok(())
            }
            None => Err(PublishError::upload_failed(key, "no such key")),
        }
    }

    fn public_url(&self, bucket: &Bucket, key: &str) -> String {
        format!("memory://{}/{}", bucket.name, key)
    }
}
