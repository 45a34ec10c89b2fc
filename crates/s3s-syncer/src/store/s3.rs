//! S3-compatible object store backed by the AWS SDK.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{ListPage, ObjectStore, RemoteObject};
use crate::config::{DEFAULT_REGION, TransportOptions};
use crate::error::{SyncError, SyncResult};

/// Object store client speaking the S3 API.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from the ambient AWS configuration plus transport overrides.
    ///
    /// The region comes from `transport.region`, then the default provider chain, then
    /// [`DEFAULT_REGION`]. A custom endpoint switches to path-style addressing.
    pub async fn connect(transport: &TransportOptions) -> Self {
        let region = RegionProviderChain::first_try(transport.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::new(DEFAULT_REGION));
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;
        let region_name = shared
            .region()
            .map_or_else(|| DEFAULT_REGION.to_string(), ToString::to_string);

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = transport.resolved_endpoint(&region_name) {
            debug!(endpoint = %endpoint, region = %region_name, "using custom object store endpoint");
            builder = builder.endpoint_url(endpoint);
        }
        if transport.force_path_style() {
            builder = builder.force_path_style(true);
        }
        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Wrap an already configured SDK client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> SyncResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(container)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|err| {
                SyncError::remote("store.list", format!("s3://{container}/{prefix}"), err)
            })?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                Some(RemoteObject {
                    key: key.to_string(),
                    etag: object.e_tag().unwrap_or_default().to_string(),
                })
            })
            .collect();
        let next = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };
        Ok(ListPage { objects, next })
    }

    async fn fetch(
        &self,
        container: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> SyncResult<u64> {
        let target = format!("s3://{container}/{key}");
        let mut output = self
            .client
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|err| SyncError::remote("store.get", target.clone(), err))?;

        let mut written = 0_u64;
        while let Some(chunk) = output
            .body
            .try_next()
            .await
            .map_err(|err| SyncError::remote("store.read_body", target.clone(), err))?
        {
            writer
                .write_all(&chunk)
                .await
                .map_err(|err| SyncError::remote("store.write_body", target.clone(), err))?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }
}
