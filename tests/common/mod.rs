//! Shared fixtures for integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use microgateway::index::{IndexBuilder, IndexQueue, IndexWorker};
use microgateway::store::{SnapshotId, SnapshotLoader, SnapshotManager, SnapshotStore};

pub const CLIENT_ID: &str = "key-a";
pub const CLIENT_SECRET: &str = "secret-a";

pub fn catalogs() -> Value {
    json!([{
        "id": "cat1",
        "name": "sandbox",
        "organization": { "id": "org1", "name": "acme" }
    }])
}

pub fn apis() -> Value {
    json!([{
        "id": "api-climbing",
        "document": {
            "swagger": "2.0",
            "info": { "title": "Climbing", "version": "1.0.0", "x-ibm-name": "climbing" },
            "basePath": "/v1",
            "consumes": ["application/json"],
            "security": [{ "clientId": [] }],
            "securityDefinitions": {
                "clientId": { "type": "apiKey", "in": "query", "name": "client_id" }
            },
            "x-ibm-configuration": {
                "properties": { "target-url": { "value": "https://climbing.backend" } },
                "assembly": { "execute": [{ "invoke": { "target-url": "$(target-url)" } }] }
            },
            "paths": {
                "/ascents": {
                    "get": {
                        "operationId": "listAscents",
                        "parameters": [
                            { "name": "limit", "in": "query", "type": "integer" },
                            { "name": "grades", "in": "query", "type": "array", "items": { "type": "string" } }
                        ]
                    },
                    "post": {
                        "operationId": "logAscent",
                        "security": [],
                        "parameters": [{ "name": "ascent", "in": "body" }]
                    }
                },
                "/ascents/{id}": {
                    "parameters": [{ "name": "id", "in": "path", "type": "integer", "required": true }],
                    "get": { "operationId": "getAscent" }
                },
                "/crags/{crag}/topo/{+rest}": {
                    "get": {
                        "operationId": "getTopo",
                        "parameters": [
                            { "name": "crag", "in": "path", "type": "string", "required": true },
                            { "name": "+rest", "in": "path", "type": "string", "required": true }
                        ]
                    }
                }
            }
        }
    }])
}

pub fn products(rate_limit: &str) -> Value {
    json!([{
        "id": "prod1",
        "catalog": { "id": "cat1", "name": "sandbox" },
        "document": {
            "info": { "name": "climbing-product", "version": "1.0.0" },
            "plans": { "gold": { "rate-limits": { "default": { "value": rate_limit } } } },
            "apis": { "climbing": { "name": "climbing:1.0.0" } }
        }
    }])
}

pub fn subscriptions() -> Value {
    json!([{
        "id": "sub1",
        "application": {
            "id": "app1",
            "title": "Crag App",
            "app-credentials": [
                { "client-id": CLIENT_ID, "client-secret": CLIENT_SECRET },
                { "client-id": "key-b" }
            ]
        },
        "plan-registration": {
            "id": "prod1:gold",
            "plan": { "id": "plan-gold", "name": "gold" },
            "product": { "id": "prod1" },
            "apis": [{ "id": "api-ref-1", "document": { "info": { "version": "1.0.0", "x-ibm-name": "climbing" } } }]
        }
    }])
}

/// Write a complete snapshot directory `<root>/<id>/`.
pub fn write_snapshot(root: &Path, id: SnapshotId, rate_limit: &str) -> PathBuf {
    let dir = root.join(id.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    let files = [
        ("catalogs.json", catalogs()),
        ("apis.json", apis()),
        ("products.json", products(rate_limit)),
        ("subscriptions.json", subscriptions()),
    ];
    for (name, value) in files {
        std::fs::write(dir.join(name), serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }
    dir
}

/// Store, manager and loader wired to a running index worker.
pub struct Harness {
    pub store: Arc<SnapshotStore>,
    pub manager: Arc<SnapshotManager>,
    pub loader: SnapshotLoader,
    pub queue: IndexQueue,
    pub shutdown: broadcast::Sender<()>,
}

impl Harness {
    pub fn new(root: &Path) -> Self {
        let (queue, rx) = IndexQueue::new();
        let store = Arc::new(SnapshotStore::new(root).with_index_queue(queue.clone()));
        let manager = Arc::new(SnapshotManager::new(Arc::clone(&store)));
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let worker = IndexWorker::new(IndexBuilder::new(Arc::clone(&store)), queue.clone(), rx);
        tokio::spawn(worker.run(shutdown_rx));
        let loader = SnapshotLoader::new(Arc::clone(&manager), queue.clone());
        Self {
            store,
            manager,
            loader,
            queue,
            shutdown,
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}
