//! AWS S3 object store.
//!
//! The core pipeline is thread-based, so this store owns a small
//! current-thread tokio runtime and blocks on it for each call.

use std::path::Path;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use log::info;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::store::ObjectStore;

pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    runtime: tokio::runtime::Runtime,
}

impl S3Store {
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let client = runtime.block_on(async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(config.region.clone()));
            if let (Some(key), Some(secret)) = (&config.access_key, &config.access_secret) {
                loader = loader.credentials_provider(Credentials::new(
                    key.clone(),
                    secret.clone(),
                    None,
                    None,
                    "granary-config",
                ));
            }
            let sdk_config = loader.load().await;
            aws_sdk_s3::Client::new(&sdk_config)
        });

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            runtime,
        })
    }
}

impl ObjectStore for S3Store {
    fn put(&self, key: &str, artifact: &Path) -> Result<()> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(artifact)
                .await
                .map_err(|err| Error::Upload(format!("read {}: {err}", artifact.display())))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .acl(ObjectCannedAcl::Private)
                .body(body)
                .send()
                .await
                .map_err(|err| Error::Upload(format!("put s3://{}/{key}: {err}", self.bucket)))?;

            info!("uploaded {} to s3://{}/{key}", artifact.display(), self.bucket);
            Ok(())
        })
    }
}
