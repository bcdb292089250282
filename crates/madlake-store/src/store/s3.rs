//! S3-compatible object-store gateway (AWS S3 or MinIO)

use std::collections::{BTreeMap, HashMap};
use std::env;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{StoreError, StoreResult};
use crate::zone::Zone;

use super::ObjectStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl S3Config {
    pub fn from_env() -> S3Config {
        S3Config {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }
    }

    pub fn for_minio(endpoint: impl Into<String>) -> S3Config {
        S3Config {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
        }
    }
}

/// Object-store gateway over an S3-compatible endpoint. One bucket per zone.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(config: S3Config) -> Self {
        debug!("Initializing S3 gateway with config: {:?}", config.endpoint);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "madlake-store",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Create the zone buckets if they do not already exist.
    pub async fn ensure_zones(&self) -> StoreResult<()> {
        for zone in Zone::ALL {
            match self
                .client
                .create_bucket()
                .bucket(zone.bucket())
                .send()
                .await
            {
                Ok(_) => info!("Created bucket {}", zone),
                Err(err) => {
                    let service = err.into_service_error();
                    if service.is_bucket_already_owned_by_you()
                        || service.is_bucket_already_exists()
                    {
                        debug!("Bucket {} already exists", zone);
                    } else {
                        return Err(StoreError::Config(format!(
                            "Failed to create bucket {}: {}",
                            zone, service
                        )));
                    }
                },
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self, data, metadata))]
    async fn put(
        &self,
        zone: Zone,
        path: &str,
        data: Vec<u8>,
        metadata: BTreeMap<String, String>,
    ) -> StoreResult<()> {
        let size = data.len();
        debug!("Uploading {} bytes to {}/{}", size, zone, path);

        self.client
            .put_object()
            .bucket(zone.bucket())
            .key(path)
            .body(ByteStream::from(data))
            .set_metadata(Some(metadata.into_iter().collect::<HashMap<_, _>>()))
            .send()
            .await
            .map_err(|e| StoreError::upload(zone, path, e))?;

        info!("Uploaded {}/{} ({} bytes)", zone, path, size);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, zone: Zone, path: &str) -> StoreResult<Vec<u8>> {
        debug!("Downloading {}/{}", zone, path);

        let response = match self
            .client
            .get_object()
            .bucket(zone.bucket())
            .key(path)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    return Err(StoreError::ObjectNotFound {
                        zone,
                        path: path.to_string(),
                    });
                }
                return Err(StoreError::download(zone, path, service));
            },
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::download(zone, path, e))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from {}/{}", data.len(), zone, path);
        Ok(data)
    }

    #[instrument(skip(self))]
    async fn list(&self, zone: Zone) -> StoreResult<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(zone.bucket())
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StoreError::list(zone, e))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(keys)
    }
}
