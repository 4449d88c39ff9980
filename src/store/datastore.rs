//! In-memory datastore holding every snapshot's records.
//!
//! # Responsibilities
//! - Persist records keyed by `(snapshot-id, id)`
//! - Publish an index event for every persisted Subscription and Product
//! - Serve the Route Entries visible to a caller
//! - Expose every snapshot-scoped resource for cascade deletion

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::index::entry::DEFAULT_CLIENT_ID;
use crate::index::{IndexEvent, IndexQueue, RouteEntry};
use crate::store::collection::{Collection, SnapshotScoped};
use crate::store::model::{Api, Catalog, OpaqueRecord, Organization, Product, Subscription};
use crate::store::{SnapshotId, StoreResult};

/// On-disk configuration directories, one per snapshot id.
#[derive(Debug, Clone)]
pub struct ConfigDirectory {
    root: PathBuf,
}

impl ConfigDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_dir(&self, snapshot: SnapshotId) -> PathBuf {
        self.root.join(snapshot.to_string())
    }
}

impl SnapshotScoped for ConfigDirectory {
    fn name(&self) -> &'static str {
        "config-directory"
    }

    fn purge(&self, snapshot: SnapshotId) -> StoreResult<usize> {
        match std::fs::remove_dir_all(self.snapshot_dir(snapshot)) {
            Ok(()) => Ok(1),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// All records of all live snapshots.
#[derive(Debug)]
pub struct SnapshotStore {
    organizations: Collection<Organization>,
    catalogs: Collection<Catalog>,
    products: Collection<Product>,
    apis: Collection<Api>,
    subscriptions: Collection<Subscription>,
    route_entries: Collection<RouteEntry>,
    tls_profiles: Collection<OpaqueRecord>,
    registries: Collection<OpaqueRecord>,
    config_dir: ConfigDirectory,
    index_queue: Option<IndexQueue>,
}

impl SnapshotStore {
    /// Create an empty store whose snapshot directories live under `config_root`.
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            organizations: Collection::new("organizations"),
            catalogs: Collection::new("catalogs"),
            products: Collection::new("products"),
            apis: Collection::new("apis"),
            subscriptions: Collection::new("subscriptions"),
            route_entries: Collection::new("route-entries"),
            tls_profiles: Collection::new("tls-profiles"),
            registries: Collection::new("registries"),
            config_dir: ConfigDirectory::new(config_root),
            index_queue: None,
        }
    }

    /// Publish index events for Subscription and Product inserts to `queue`.
    pub fn with_index_queue(mut self, queue: IndexQueue) -> Self {
        self.index_queue = Some(queue);
        self
    }

    pub fn config_dir(&self) -> &ConfigDirectory {
        &self.config_dir
    }

    fn publish(&self, event: IndexEvent) {
        if let Some(queue) = &self.index_queue {
            queue.publish(event);
        }
    }

    pub fn put_organization(&self, snapshot: SnapshotId, org: Organization) -> Arc<Organization> {
        self.organizations.insert(snapshot, org.id.clone(), org)
    }

    /// Persist a catalog together with the organization it embeds.
    pub fn put_catalog(&self, snapshot: SnapshotId, catalog: Catalog) -> Arc<Catalog> {
        if self.organizations.get(snapshot, &catalog.organization.id).is_none() {
            self.put_organization(snapshot, catalog.organization.clone());
        }
        self.catalogs.insert(snapshot, catalog.id.clone(), catalog)
    }

    pub fn put_api(&self, snapshot: SnapshotId, api: Api) -> Arc<Api> {
        self.apis.insert(snapshot, api.id.clone(), api)
    }

    pub fn put_product(&self, snapshot: SnapshotId, product: Product) -> Arc<Product> {
        let id = product.id.clone();
        let stored = self.products.insert(snapshot, id.clone(), product);
        self.publish(IndexEvent::Product { snapshot, id });
        stored
    }

    pub fn put_subscription(&self, snapshot: SnapshotId, subscription: Subscription) -> Arc<Subscription> {
        let id = subscription.id.clone();
        let stored = self.subscriptions.insert(snapshot, id.clone(), subscription);
        self.publish(IndexEvent::Subscription { snapshot, id });
        stored
    }

    pub fn put_tls_profile(&self, snapshot: SnapshotId, profile: OpaqueRecord) -> Arc<OpaqueRecord> {
        self.tls_profiles.insert(snapshot, profile.id.clone(), profile)
    }

    pub fn put_registry(&self, snapshot: SnapshotId, registry: OpaqueRecord) -> Arc<OpaqueRecord> {
        self.registries.insert(snapshot, registry.id.clone(), registry)
    }

    pub fn put_route_entry(&self, entry: RouteEntry) -> Arc<RouteEntry> {
        self.route_entries.insert(entry.snapshot_id, entry.key(), entry)
    }

    pub fn organization(&self, snapshot: SnapshotId, id: &str) -> Option<Arc<Organization>> {
        self.organizations.get(snapshot, id)
    }

    pub fn catalog(&self, snapshot: SnapshotId, id: &str) -> Option<Arc<Catalog>> {
        self.catalogs.get(snapshot, id)
    }

    pub fn product(&self, snapshot: SnapshotId, id: &str) -> Option<Arc<Product>> {
        self.products.get(snapshot, id)
    }

    pub fn api(&self, snapshot: SnapshotId, id: &str) -> Option<Arc<Api>> {
        self.apis.get(snapshot, id)
    }

    pub fn subscription(&self, snapshot: SnapshotId, id: &str) -> Option<Arc<Subscription>> {
        self.subscriptions.get(snapshot, id)
    }

    /// Canonical API record matching `(x-ibm-name, info.version)`.
    pub fn find_api(&self, snapshot: SnapshotId, name: &str, version: &str) -> Option<Arc<Api>> {
        self.apis.find(snapshot, |api| {
            api.document.info.name == name && api.document.info.version == version
        })
    }

    /// Every Route Entry of `snapshot`, ordered by key.
    pub fn route_entries(&self, snapshot: SnapshotId) -> Vec<Arc<RouteEntry>> {
        self.route_entries.filter(snapshot, |_| true)
    }

    /// Route Entries a caller may match: its own credential's entries when it
    /// presents a client id, the product default entries otherwise.
    pub fn visible_entries(&self, snapshot: SnapshotId, client_id: Option<&str>) -> Vec<Arc<RouteEntry>> {
        let wanted = client_id.unwrap_or(DEFAULT_CLIENT_ID);
        self.route_entries.filter(snapshot, |entry| entry.client_id == wanted)
    }

    /// Number of records of every kind held for `snapshot`.
    pub fn record_count(&self, snapshot: SnapshotId) -> usize {
        self.organizations.count(snapshot)
            + self.catalogs.count(snapshot)
            + self.products.count(snapshot)
            + self.apis.count(snapshot)
            + self.subscriptions.count(snapshot)
            + self.route_entries.count(snapshot)
            + self.tls_profiles.count(snapshot)
            + self.registries.count(snapshot)
    }

    /// Everything that must be removed when a snapshot is deleted.
    pub fn scoped(&self) -> Vec<&dyn SnapshotScoped> {
        vec![
            &self.organizations,
            &self.catalogs,
            &self.products,
            &self.apis,
            &self.subscriptions,
            &self.route_entries,
            &self.tls_profiles,
            &self.registries,
            &self.config_dir,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::{ApiDocument, ApiInfo};

    fn api(id: &str, name: &str, version: &str) -> Api {
        Api {
            id: id.into(),
            document: ApiDocument {
                info: ApiInfo {
                    title: None,
                    version: version.into(),
                    name: name.into(),
                },
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_find_api_by_name_and_version() {
        let store = SnapshotStore::new("unused");
        let snap = SnapshotId::new(1);
        store.put_api(snap, api("a1", "climbing", "1.0.0"));
        store.put_api(snap, api("a2", "climbing", "2.0.0"));

        assert_eq!(store.find_api(snap, "climbing", "2.0.0").unwrap().id, "a2");
        assert!(store.find_api(snap, "climbing", "3.0.0").is_none());
        assert!(store.find_api(SnapshotId::new(2), "climbing", "1.0.0").is_none());
    }

    #[test]
    fn test_catalog_persists_embedded_organization() {
        let store = SnapshotStore::new("unused");
        let snap = SnapshotId::new(1);
        store.put_catalog(
            snap,
            Catalog {
                id: "c1".into(),
                name: "sandbox".into(),
                title: None,
                organization: Organization {
                    id: "o1".into(),
                    name: "acme".into(),
                },
            },
        );
        assert_eq!(store.organization(snap, "o1").unwrap().name, "acme");
    }

    #[test]
    fn test_config_directory_purge() {
        let root = tempfile::tempdir().unwrap();
        let dir = ConfigDirectory::new(root.path());
        let snap = SnapshotId::new(12);
        std::fs::create_dir_all(dir.snapshot_dir(snap)).unwrap();
        std::fs::write(dir.snapshot_dir(snap).join("apis.json"), "[]").unwrap();

        assert_eq!(dir.purge(snap).unwrap(), 1);
        assert!(!dir.snapshot_dir(snap).exists());
        assert_eq!(dir.purge(snap).unwrap(), 0);
    }
}
