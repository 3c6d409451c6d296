//! S3 object-storage tile fetch backend

use super::types::{FetchError, TileFetcher};
use crate::tile::{TileCoord, TileVersion, TilesetKind};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Header requesting that transfer costs be billed to the requester.
const REQUEST_PAYER_HEADER: &str = "x-amz-request-payer";

/// Fetches source tiles from an S3-style object store over its HTTP GET
/// interface.
///
/// Objects are keyed `{version}/{tileset}/{z}/{x}/{y}.png`. When
/// `requester_pays` is set, each GET carries `x-amz-request-payer:
/// requester` so buckets with requester-pays billing accept the request.
#[derive(Clone)]
pub struct S3TileFetcher {
    bucket: String,
    region: String,
    requester_pays: bool,
    client: reqwest::Client,
}

impl S3TileFetcher {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        requester_pays: bool,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            bucket: bucket.into(),
            region: region.into(),
            requester_pays,
            client,
        })
    }

    fn object_url(&self, tile: TileCoord, tileset: TilesetKind, version: &TileVersion) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}/{}/{}.png",
            self.bucket, self.region, version, tileset, tile
        )
    }
}

#[async_trait]
impl TileFetcher for S3TileFetcher {
    async fn fetch_tile(
        &self,
        tile: TileCoord,
        tileset: TilesetKind,
        version: &TileVersion,
    ) -> Result<Vec<u8>, FetchError> {
        let url = self.object_url(tile, tileset, version);

        let mut request = self.client.get(&url);
        if self.requester_pays {
            request = request.header(REQUEST_PAYER_HEADER, "requester");
        }

        let response = request.send().await.map_err(|source| FetchError::Request {
            url: url.clone(),
            source,
        })?;

        if !response.status().is_success() {
            warn!(url = %url, status = response.status().as_u16(), "object GET error status");
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        debug!(url = %url, bytes = bytes.len(), "retrieved object");
        Ok(bytes.to_vec())
    }
}
