//! Route entries: the index's unit of storage.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::store::model::RateLimit;
use crate::store::SnapshotId;

/// Client id carried by product-driven default entries.
pub const DEFAULT_CLIENT_ID: &str = "default";

/// One credential × API pairing with pre-scored URL templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteEntry {
    pub subscription_id: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub plan_id: String,
    pub plan_name: String,
    pub product_id: String,
    pub product_name: String,
    pub catalog_id: String,
    pub catalog_name: String,
    pub organization_id: String,
    pub organization_name: String,
    pub api_id: String,
    pub api_name: String,
    pub api_version: String,
    pub api_base_path: String,
    pub snapshot_id: SnapshotId,
    pub cors_enabled: bool,
    #[serde(default)]
    pub rate_limits: Vec<RateLimit>,
    pub api_paths: Vec<RoutePath>,
}

impl RouteEntry {
    /// Storage key; identical for a re-run of the same build.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.subscription_id, self.client_id, self.api_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePath {
    pub path: String,
    #[serde(rename = "matching-score")]
    pub matching_score: u32,
    #[serde(rename = "path-regex")]
    pub path_regex: String,
    #[serde(rename = "path-methods")]
    pub path_methods: Vec<MethodEntry>,
    #[serde(skip)]
    compiled: OnceLock<Option<Regex>>,
}

impl RoutePath {
    pub fn new(path: String, matching_score: u32, path_regex: String, path_methods: Vec<MethodEntry>) -> Self {
        Self {
            path,
            matching_score,
            path_regex,
            path_methods,
            compiled: OnceLock::new(),
        }
    }

    /// Test a normalized request path against `path-regex`.
    pub fn is_match(&self, path: &str) -> bool {
        self.compiled
            .get_or_init(|| match Regex::new(&self.path_regex) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    tracing::error!(path_regex = %self.path_regex, error = %e, "Invalid route regex");
                    None
                }
            })
            .as_ref()
            .map(|regex| regex.is_match(path))
            .unwrap_or(false)
    }

    pub fn method(&self, method: &str) -> Option<&MethodEntry> {
        self.path_methods.iter().find(|m| m.method == method)
    }
}

/// One declared operation under a URL template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub method: String,
    #[serde(rename = "operationId")]
    pub operation_id: Option<String>,
    #[serde(rename = "securityDefs")]
    pub security_defs: Option<Value>,
    #[serde(rename = "securityReqs")]
    pub security_reqs: Option<Vec<Value>>,
}

impl MethodEntry {
    /// True when no security requirement applies to this operation.
    pub fn is_unsecured(&self) -> bool {
        self.security_reqs
            .as_ref()
            .map(|reqs| reqs.iter().all(|req| req.as_object().map(|o| o.is_empty()).unwrap_or(false)))
            .unwrap_or(true)
    }
}
