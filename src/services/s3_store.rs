//! `ObjectStore` backed by `aws-sdk-s3`.
//!
//! Works against AWS itself or any S3-compatible endpoint (path-style
//! addressing is forced when a custom endpoint is configured).

use crate::{
    config::StorageSettings,
    errors::{PublishError, PublishResult},
    models::{bucket::Bucket, object::PublishedObject},
    services::storage_service::{ObjectStore, ensure_bucket_name_safe, ensure_key_safe},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    operation::{create_bucket::CreateBucketError, head_bucket::HeadBucketError},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, warn};

/// Region in which `CreateBucket` must be sent without a location constraint.
const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Store {
    client: Client,
    region: String,
    endpoint: Option<String>,
}

impl S3Store {
    /// Build a client from explicit settings. Nothing is sent over the
    /// network until the first operation.
    pub async fn connect(settings: &StorageSettings) -> PublishResult<Self> {
        let creds = settings.credentials.as_ref().ok_or_else(|| {
            PublishError::StorageUnavailable(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set".into(),
            )
        })?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                None,
                None,
                "asset-publisher",
            ))
            .load()
            .await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config.build()),
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        })
    }

    async fn create_bucket(&self, name: &str) -> PublishResult<bool> {
        let mut request = self.client.create_bucket().bucket(name);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(err) if already_owned(&err) => Ok(false),
            Err(err) => Err(PublishError::StorageUnavailable(format!(
                "creating bucket `{}`: {}",
                name,
                DisplayErrorContext(&err)
            ))),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn ensure_bucket(&self, name: &str) -> PublishResult<Bucket> {
        ensure_bucket_name_safe(name)?;

        let created = match self.client.head_bucket().bucket(name).send().await {
            Ok(_) => {
                debug!("bucket {} already exists", name);
                false
            }
            Err(err) if bucket_missing(&err) => self.create_bucket(name).await?,
            Err(err) => {
                return Err(PublishError::StorageUnavailable(format!(
                    "checking bucket `{}`: {}",
                    name,
                    DisplayErrorContext(&err)
                )));
            }
        };

        Ok(Bucket {
            name: name.to_string(),
            region: self.region.clone(),
            created,
        })
    }

    async fn put_object(
        &self,
        bucket: &Bucket,
        key: &str,
        body: Bytes,
        content_type: Option<String>,
    ) -> PublishResult<PublishedObject> {
        ensure_key_safe(key)?;

        let size_bytes = body.len() as u64;
        let digest = md5::compute(&body);
        let mut request = self
            .client
            .put_object()
            .bucket(&bucket.name)
            .key(key)
            .content_md5(B64.encode(digest.0))
            .body(ByteStream::from(body));
        if let Some(content_type) = &content_type {
            request = request.content_type(content_type);
        }

        let response = request
            .send()
            .await
            .map_err(|err| PublishError::upload_failed(key, DisplayErrorContext(&err)))?;

        let etag = response.e_tag().map(|tag| tag.trim_matches('"').to_string());
        let expected = format!("{:x}", digest);
        if let Some(tag) = etag.as_deref() {
            if tag != expected {
                warn!("etag {} for {} differs from local md5 {}", tag, key, expected);
            }
        }

        Ok(PublishedObject {
            key: key.to_string(),
            content_type,
            size_bytes,
            etag,
            public: false,
            uploaded_at: Utc::now(),
        })
    }

    async fn make_public(&self, bucket: &Bucket, key: &str) -> PublishResult<()> {
        self.client
            .put_object_acl()
            .bucket(&bucket.name)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|err| PublishError::upload_failed(key, DisplayErrorContext(&err)))?;
        Ok(())
    }

    fn public_url(&self, bucket: &Bucket, key: &str) -> String {
        public_url(self.endpoint.as_deref(), &bucket.name, key)
    }
}

/// Virtual-hosted AWS URL, or path-style under a custom endpoint.
pub fn public_url(endpoint: Option<&str>, bucket: &str, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("http://{}.s3.amazonaws.com/{}", bucket, key),
    }
}

fn bucket_missing(err: &SdkError<HeadBucketError>) -> bool {
    matches!(err, SdkError::ServiceError(ctx) if ctx.err().is_not_found())
}

fn already_owned(err: &SdkError<CreateBucketError>) -> bool {
    matches!(err, SdkError::ServiceError(ctx) if ctx.err().is_bucket_already_owned_by_you())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_url_is_virtual_hosted() {
        assert_eq!(
            public_url(None, "slide-drive-demo", "examples/demo.html"),
            "http://slide-drive-demo.s3.amazonaws.com/examples/demo.html"
        );
    }

    #[test]
    fn custom_endpoint_url_is_path_style() {
        assert_eq!(
            public_url(Some("http://127.0.0.1:9000/"), "site", "index.html"),
            "http://127.0.0.1:9000/site/index.html"
        );
    }

    #[tokio::test]
    async fn connect_without_credentials_is_storage_unavailable() {
        let settings = StorageSettings {
            credentials: None,
            region: "us-east-1".into(),
            endpoint: None,
        };
        assert!(matches!(
            S3Store::connect(&settings).await,
            Err(PublishError::StorageUnavailable(_))
        ));
    }
}
