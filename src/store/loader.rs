//! Snapshot loading from a configuration directory.
//!
//! A snapshot directory is named by its id (`<config_root>/00042/`) and holds
//! one JSON array per record kind. Missing files are treated as empty.

use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

use crate::index::IndexQueue;
use crate::store::model::{Api, Catalog, OpaqueRecord, Product, Subscription};
use crate::store::{SnapshotId, SnapshotManager, SnapshotStore, StoreError, StoreResult};

pub const CATALOGS_FILE: &str = "catalogs.json";
pub const APIS_FILE: &str = "apis.json";
pub const PRODUCTS_FILE: &str = "products.json";
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";
pub const TLS_PROFILES_FILE: &str = "tlsprofiles.json";
pub const REGISTRIES_FILE: &str = "registries.json";

/// Loads snapshot directories into the store and installs them.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    manager: Arc<SnapshotManager>,
    queue: IndexQueue,
}

impl SnapshotLoader {
    pub fn new(manager: Arc<SnapshotManager>, queue: IndexQueue) -> Self {
        Self { manager, queue }
    }

    fn store(&self) -> &SnapshotStore {
        self.manager.store()
    }

    /// Load the snapshot stored in `dir`, wait for its index, and make it current.
    pub async fn load_dir(&self, dir: &Path) -> StoreResult<SnapshotId> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidSnapshotId(dir.display().to_string()))?;
        let snapshot: SnapshotId = name.parse()?;

        if self.manager.contains(snapshot) {
            tracing::debug!(snapshot_id = %snapshot, "Snapshot already loaded");
            return Ok(snapshot);
        }

        let catalogs: Vec<Catalog> = read_records(dir, CATALOGS_FILE).await?;
        let apis: Vec<Api> = read_records(dir, APIS_FILE).await?;
        let products: Vec<Product> = read_records(dir, PRODUCTS_FILE).await?;
        let subscriptions: Vec<Subscription> = read_records(dir, SUBSCRIPTIONS_FILE).await?;
        let tls_profiles: Vec<OpaqueRecord> = read_records(dir, TLS_PROFILES_FILE).await?;
        let registries: Vec<OpaqueRecord> = read_records(dir, REGISTRIES_FILE).await?;

        tracing::info!(
            snapshot_id = %snapshot,
            catalogs = catalogs.len(),
            apis = apis.len(),
            products = products.len(),
            subscriptions = subscriptions.len(),
            "Loading snapshot"
        );

        let store = self.store();
        for catalog in catalogs {
            store.put_catalog(snapshot, catalog);
        }
        for api in apis {
            store.put_api(snapshot, api);
        }
        for profile in tls_profiles {
            store.put_tls_profile(snapshot, profile);
        }
        for registry in registries {
            store.put_registry(snapshot, registry);
        }
        for product in products {
            store.put_product(snapshot, product);
        }
        for subscription in subscriptions {
            store.put_subscription(snapshot, subscription);
        }

        self.queue.wait_idle().await;
        self.manager.install(snapshot);
        Ok(snapshot)
    }

    /// Load the highest-numbered snapshot directory under `root`, if any.
    pub async fn load_latest(&self, root: &Path) -> StoreResult<Option<SnapshotId>> {
        let mut latest: Option<SnapshotId> = None;
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<SnapshotId>().ok()) {
                latest = latest.max(Some(id));
            }
        }

        match latest {
            Some(id) => self.load_dir(&root.join(id.to_string())).await.map(Some),
            None => Ok(None),
        }
    }
}

async fn read_records<T: DeserializeOwned>(dir: &Path, file: &str) -> StoreResult<Vec<T>> {
    let content = match tokio::fs::read(dir.join(file)).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&content).map_err(|source| StoreError::Decode {
        file: file.to_string(),
        source,
    })
}
