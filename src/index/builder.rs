//! Route entry construction.
//!
//! # Responsibilities
//! - Join a Subscription with its product, catalog and organization
//! - Reconcile plan-registration APIs with canonical API records by
//!   `(x-ibm-name, info.version)`
//! - Emit one Route Entry per credential × API
//! - Emit unsecured default entries for a persisted Product

use std::sync::Arc;

use crate::index::entry::{MethodEntry, RouteEntry, RoutePath, DEFAULT_CLIENT_ID};
use crate::index::template::{compile_path_regex, matching_score};
use crate::index::{IndexError, IndexEvent, IndexResult};
use crate::store::model::{Api, Catalog, Credential, PlanDocument, Product, RateLimit};
use crate::store::{SnapshotId, SnapshotStore};

/// Which operations of an API make it into a Route Entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodFilter {
    All,
    UnsecuredOnly,
}

/// Plan identity shared by every entry of one build.
struct PlanScope<'a> {
    subscription_id: String,
    plan_id: String,
    plan_name: String,
    product: &'a Product,
    catalog: &'a Catalog,
    rate_limits: Vec<RateLimit>,
}

/// Builds Route Entries from persisted records.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    store: Arc<SnapshotStore>,
}

impl IndexBuilder {
    pub fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    /// Build and persist the entries triggered by `event`, returning how many were written.
    pub fn handle(&self, event: &IndexEvent) -> IndexResult<usize> {
        let written = match event {
            IndexEvent::Subscription { snapshot, id } => self.index_subscription(*snapshot, id)?,
            IndexEvent::Product { snapshot, id } => self.index_product(*snapshot, id)?,
        };
        Ok(written.len())
    }

    /// Index one subscription. Nothing is written unless every API resolves.
    pub fn index_subscription(&self, snapshot: SnapshotId, subscription_id: &str) -> IndexResult<Vec<Arc<RouteEntry>>> {
        let subscription = self
            .store
            .subscription(snapshot, subscription_id)
            .ok_or_else(|| IndexError::SubscriptionNotFound(subscription_id.to_string()))?;
        let registration = &subscription.plan_registration;

        let product = self.product(snapshot, &registration.product.id)?;
        let catalog = self.catalog(snapshot, &product)?;

        let mut apis = Vec::with_capacity(registration.apis.len());
        for api_ref in &registration.apis {
            let info = &api_ref.document.info;
            let api = self
                .store
                .find_api(snapshot, &info.name, &info.version)
                .ok_or_else(|| IndexError::ApiNotFound {
                    name: info.name.clone(),
                    version: info.version.clone(),
                })?;
            let paths = route_paths(&api, MethodFilter::All)?;
            apis.push((api, paths));
        }

        let scope = PlanScope {
            subscription_id: subscription.id.clone(),
            plan_id: registration.plan.id.clone(),
            plan_name: registration.plan.name.clone(),
            product: &product,
            catalog: &catalog,
            rate_limits: product
                .document
                .plans
                .get(&registration.plan.name)
                .map(PlanDocument::rate_limit_list)
                .unwrap_or_default(),
        };

        let mut written = Vec::new();
        for credential in &subscription.application.credentials {
            for (api, paths) in &apis {
                let entry = route_entry(snapshot, &scope, credential, api, paths.clone());
                written.push(self.store.put_route_entry(entry));
            }
        }

        tracing::debug!(
            snapshot_id = %snapshot,
            subscription_id = %subscription.id,
            entries = written.len(),
            "Indexed subscription"
        );
        Ok(written)
    }

    /// Index the unsecured operations of every plan × API of a product.
    pub fn index_product(&self, snapshot: SnapshotId, product_id: &str) -> IndexResult<Vec<Arc<RouteEntry>>> {
        let product = self.product(snapshot, product_id)?;
        let catalog = self.catalog(snapshot, &product)?;
        let credential = Credential {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: None,
        };
        let info = &product.document.info;

        let mut written = Vec::new();
        for (plan_name, plan) in &product.document.plans {
            let scope = PlanScope {
                subscription_id: format!("product:{}:{}", product.id, plan_name),
                plan_id: format!("{}:{}:{}", info.name, info.version, plan_name),
                plan_name: plan_name.clone(),
                product: &product,
                catalog: &catalog,
                rate_limits: plan.rate_limit_list(),
            };

            for (key, api_ref) in &product.document.apis {
                if let Some(plan_apis) = &plan.apis {
                    if !plan_apis.contains_key(key) {
                        continue;
                    }
                }
                let (name, version) = api_ref.name_and_version();
                let api = self
                    .store
                    .find_api(snapshot, name, version)
                    .ok_or_else(|| IndexError::ApiNotFound {
                        name: name.to_string(),
                        version: version.to_string(),
                    })?;
                let paths = route_paths(&api, MethodFilter::UnsecuredOnly)?;
                if paths.is_empty() {
                    continue;
                }
                let entry = route_entry(snapshot, &scope, &credential, &api, paths);
                written.push(self.store.put_route_entry(entry));
            }
        }

        tracing::debug!(
            snapshot_id = %snapshot,
            product_id = %product.id,
            entries = written.len(),
            "Indexed product defaults"
        );
        Ok(written)
    }

    fn product(&self, snapshot: SnapshotId, id: &str) -> IndexResult<Arc<Product>> {
        self.store
            .product(snapshot, id)
            .ok_or_else(|| IndexError::ProductNotFound(id.to_string()))
    }

    fn catalog(&self, snapshot: SnapshotId, product: &Product) -> IndexResult<Arc<Catalog>> {
        self.store
            .catalog(snapshot, &product.catalog.id)
            .ok_or_else(|| IndexError::CatalogNotFound(product.catalog.id.clone()))
    }
}

fn route_entry(
    snapshot: SnapshotId,
    scope: &PlanScope<'_>,
    credential: &Credential,
    api: &Api,
    api_paths: Vec<RoutePath>,
) -> RouteEntry {
    let organization = &scope.catalog.organization;
    RouteEntry {
        subscription_id: scope.subscription_id.clone(),
        client_id: credential.client_id.clone(),
        client_secret: credential.client_secret.clone(),
        plan_id: scope.plan_id.clone(),
        plan_name: scope.plan_name.clone(),
        product_id: scope.product.id.clone(),
        product_name: scope.product.document.info.name.clone(),
        catalog_id: scope.catalog.id.clone(),
        catalog_name: scope.catalog.name.clone(),
        organization_id: organization.id.clone(),
        organization_name: organization.name.clone(),
        api_id: api.id.clone(),
        api_name: api.document.info.name.clone(),
        api_version: api.document.info.version.clone(),
        api_base_path: api.document.base_path.clone(),
        snapshot_id: snapshot,
        cors_enabled: api.document.cors_enabled(),
        rate_limits: scope.rate_limits.clone(),
        api_paths,
    }
}

/// Compile every URL template of `api` into a scored RoutePath.
fn route_paths(api: &Api, filter: MethodFilter) -> IndexResult<Vec<RoutePath>> {
    let document = &api.document;
    let mut paths = Vec::new();

    for (template, item) in document.path_items() {
        let invalid = |source| IndexError::InvalidPathItem {
            template: template.to_string(),
            source,
        };
        let operations = item.map_err(invalid)?.operations().map_err(invalid)?;

        let methods: Vec<MethodEntry> = operations
            .into_iter()
            .map(|(method, operation)| MethodEntry {
                method,
                operation_id: operation.operation_id,
                security_defs: document.security_definitions.clone(),
                security_reqs: operation.security.or_else(|| document.security.clone()),
            })
            .filter(|m| filter == MethodFilter::All || m.is_unsecured())
            .collect();

        if filter == MethodFilter::UnsecuredOnly && methods.is_empty() {
            continue;
        }

        paths.push(RoutePath::new(
            template.to_string(),
            matching_score(template),
            compile_path_regex(&document.base_path, template),
            methods,
        ));
    }
    Ok(paths)
}
