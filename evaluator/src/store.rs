//! The object store collaborator.
//!
//! Prefixes passed to [`ArtifactStore`] are S3 string prefixes: `models/run`
//! matches both `models/run/metrics.json` and `models/run-2/metrics.json`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
#[cfg(test)]
use mockall::automock;
use moka::sync::Cache;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, ObjectStoreExt};
use tracing::{debug, info, instrument};

use crate::config::StorageConfig;
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    /// Lists every object whose key starts with `prefix`, sorted by key.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>, StoreError>;

    /// Lists the "sub-folders" directly below the deepest `/` of `prefix`
    /// that start with `prefix`. Each is returned with a trailing `/`.
    async fn list_common_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, StoreError>;

    async fn get_text(&self, bucket: &str, key: &str) -> Result<String, StoreError>;

    /// Deletes every object whose key starts with `prefix` and returns how many were removed.
    async fn delete_by_prefix(&self, bucket: &str, prefix: &str) -> Result<usize, StoreError>;
}

/// [`ArtifactStore`] backed by `object_store`.
///
/// An S3 client is built lazily for each bucket and cached. Buckets registered
/// through [`ObjectStoreArtifactStore::with_store`] use the given store instead.
pub struct ObjectStoreArtifactStore {
    config: StorageConfig,
    stores: Cache<String, Arc<dyn ObjectStore>>,
}

impl ObjectStoreArtifactStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            stores: Cache::builder().build(),
        }
    }

    /// Serves `bucket` from `store` (e.g. `object_store::memory::InMemory`).
    pub fn with_store(self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.stores.insert(bucket.into(), store);
        self
    }

    fn store_for(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        if let Some(store) = self.stores.get(bucket) {
            return Ok(store);
        }
        let store = self.build_s3_store(bucket)?;
        self.stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    fn build_s3_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = &self.config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(allow_http) = self.config.allow_http {
            builder = builder.with_allow_http(allow_http);
        }
        let store = builder.build().map_err(|e| StoreError::Backend {
            bucket: bucket.to_string(),
            message: e.to_string(),
        })?;
        debug!(bucket, "Created S3 object store");
        Ok(Arc::new(store))
    }

    async fn list_metas(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<ObjectMeta>, StoreError> {
        let store = self.store_for(bucket)?;
        let root = listing_root(prefix)?;
        let metas: Vec<ObjectMeta> = store
            .list(root.as_ref())
            .try_collect()
            .await
            .map_err(|source| StoreError::ObjectStore {
                bucket: bucket.to_string(),
                source,
            })?;
        Ok(metas
            .into_iter()
            .filter(|meta| meta.location.as_ref().starts_with(prefix))
            .collect())
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreArtifactStore {
    #[instrument(skip(self))]
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>, StoreError> {
        let mut objects: Vec<StoredObject> = self
            .list_metas(bucket, prefix)
            .await?
            .into_iter()
            .map(|meta| StoredObject {
                key: meta.location.to_string(),
                size: meta.size,
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(count = objects.len(), "Listed objects");
        Ok(objects)
    }

    #[instrument(skip(self))]
    async fn list_common_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<String>, StoreError> {
        let store = self.store_for(bucket)?;
        let root = listing_root(prefix)?;
        let listing = store
            .list_with_delimiter(root.as_ref())
            .await
            .map_err(|source| StoreError::ObjectStore {
                bucket: bucket.to_string(),
                source,
            })?;
        let mut folders: Vec<String> = listing
            .common_prefixes
            .iter()
            .map(|path| format!("{path}/"))
            .filter(|folder| folder.starts_with(prefix))
            .collect();
        folders.sort();
        debug!(count = folders.len(), "Listed common prefixes");
        Ok(folders)
    }

    async fn get_text(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
        let store = self.store_for(bucket)?;
        let path = parse_key(key)?;
        let to_store_error = |source| StoreError::ObjectStore {
            bucket: bucket.to_string(),
            source,
        };
        let bytes = store
            .get(&path)
            .await
            .map_err(to_store_error)?
            .bytes()
            .await
            .map_err(to_store_error)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| StoreError::NotUtf8 {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn delete_by_prefix(&self, bucket: &str, prefix: &str) -> Result<usize, StoreError> {
        let store = self.store_for(bucket)?;
        let metas = self.list_metas(bucket, prefix).await?;
        info!(count = metas.len(), "Deleting all objects with prefix");
        for meta in &metas {
            store
                .delete(&meta.location)
                .await
                .map_err(|source| StoreError::ObjectStore {
                    bucket: bucket.to_string(),
                    source,
                })?;
        }
        Ok(metas.len())
    }
}

fn parse_key(key: &str) -> Result<Path, StoreError> {
    Path::parse(key).map_err(|e| StoreError::InvalidKey {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// The deepest complete folder of `prefix`, which is where a listing has to start.
fn listing_root(prefix: &str) -> Result<Option<Path>, StoreError> {
    match prefix.rsplit_once('/') {
        Some((folder, _)) if !folder.is_empty() => parse_key(folder).map(Some),
        _ => Ok(None),
    }
}
