//! The per-request variable namespace.
//!
//! `client`, `env` and `plan` are frozen once the context is built, as is
//! `request.body`. Everything else is writable through [`Context::set_variable`].

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};

use crate::context::{ParamValue, RequestBody, ResolveError, ResolveResult};
use crate::store::model::{Api, ApiProperty, RateLimit};
use crate::store::SnapshotId;

/// Root names owned by the resolver; API properties never shadow them.
const RESERVED_ROOTS: &[&str] = &[
    "_",
    "api",
    "client",
    "config-snapshot-id",
    "env",
    "message",
    "plan",
    "request",
    "test-app-enabled",
];

const FROZEN_ROOTS: &[&str] = &["client", "env", "plan"];

#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    pub id: String,
    #[serde(skip)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub app: AppInfo,
    pub org: NamedRef,
    #[serde(rename = "subscription-id")]
    pub subscription_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvInfo {
    pub path: String,
    pub catalog: NamedRef,
    pub org: NamedRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "product-id")]
    pub product_id: String,
    #[serde(rename = "product-name")]
    pub product_name: String,
    #[serde(rename = "rate-limits")]
    pub rate_limits: Vec<RateLimit>,
}

/// Endpoint address and hostname, computed on first read.
#[derive(Debug, Default)]
pub struct Endpoint {
    scheme: String,
    host: Option<String>,
    address: OnceLock<String>,
    hostname: OnceLock<Option<String>>,
}

impl Endpoint {
    pub fn new(scheme: impl Into<String>, host: Option<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host,
            ..Self::default()
        }
    }

    pub fn address(&self) -> &str {
        self.address.get_or_init(|| match &self.host {
            Some(host) => format!("{}://{}", self.scheme, host),
            None => String::new(),
        })
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname
            .get_or_init(|| {
                url::Url::parse(self.address())
                    .ok()
                    .and_then(|url| url.host_str().map(str::to_string))
            })
            .as_deref()
    }

    pub fn is_evaluated(&self) -> bool {
        self.address.get().is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationInfo {
    pub method: String,
    pub path: String,
    #[serde(rename = "operationId")]
    pub operation_id: Option<String>,
}

/// Request-scoped variables handed to the policy pipeline.
#[derive(Debug)]
pub struct Context {
    /// `_.api`: the full API record.
    pub api_record: Arc<Api>,
    pub snapshot_id: SnapshotId,
    pub test_app_enabled: bool,
    pub operation: OperationInfo,
    pub endpoint: Endpoint,
    client: Arc<ClientInfo>,
    env: Arc<EnvInfo>,
    plan: Arc<PlanInfo>,
    pub request_method: String,
    pub request_path: String,
    pub parameters: IndexMap<String, ParamValue>,
    request_body: Option<RequestBody>,
    pub message_body: Option<RequestBody>,
    variables: IndexMap<String, Value>,
}

impl Context {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api_record: Arc<Api>,
        snapshot_id: SnapshotId,
        test_app_enabled: bool,
        operation: OperationInfo,
        endpoint: Endpoint,
        client: ClientInfo,
        env: EnvInfo,
        plan: PlanInfo,
    ) -> Self {
        Self {
            request_method: operation.method.clone(),
            request_path: String::new(),
            api_record,
            snapshot_id,
            test_app_enabled,
            operation,
            endpoint,
            client: Arc::new(client),
            env: Arc::new(env),
            plan: Arc::new(plan),
            parameters: IndexMap::new(),
            request_body: None,
            message_body: None,
            variables: IndexMap::new(),
        }
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    pub fn env(&self) -> &EnvInfo {
        &self.env
    }

    pub fn plan(&self) -> &PlanInfo {
        &self.plan
    }

    /// `_.assembly` of the API.
    pub fn assembly(&self) -> Option<&Value> {
        self.api_record.document.ibm_configuration.assembly.as_ref()
    }

    pub fn request_body(&self) -> Option<&RequestBody> {
        self.request_body.as_ref()
    }

    /// Set the parsed body once and copy it into `message.body`.
    pub(crate) fn set_request_body(&mut self, body: Option<RequestBody>) {
        self.message_body = body.as_ref().map(RequestBody::detached);
        self.request_body = body;
    }

    /// Copy API properties to the root; existing root names win.
    pub fn copy_properties(&mut self, properties: &IndexMap<String, ApiProperty>) {
        for (name, property) in properties {
            if RESERVED_ROOTS.contains(&name.as_str()) || self.variables.contains_key(name) {
                tracing::debug!(property = %name, "API property already defined at root, skipping");
                continue;
            }
            self.variables.insert(name.clone(), property.value.clone());
        }
    }

    /// Write a root variable. Frozen names are rejected.
    pub fn set_variable(&mut self, name: &str, value: Value) -> ResolveResult<()> {
        let root = name.split('.').next().unwrap_or(name);
        if FROZEN_ROOTS.contains(&root) || name == "request.body" || name.starts_with("request.body.") {
            return Err(ResolveError::ReadOnly(name.to_string()));
        }
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Read a variable by dotted name, including resolver-owned ones.
    pub fn get_variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        if name == "client.app.secret" {
            return self.client.app.secret.clone().map(Value::String);
        }
        let mut current = self.to_json();
        for part in name.split('.') {
            current = current.get_mut(part)?.take();
        }
        Some(current)
    }

    pub fn to_json(&self) -> Value {
        let mut root = json!({
            "_": {
                "assembly": self.assembly(),
                "api": self.api_record.document,
            },
            "config-snapshot-id": self.snapshot_id,
            "test-app-enabled": self.test_app_enabled,
            "api": {
                "name": self.api_record.document.info.name,
                "version": self.api_record.document.info.version,
                "basePath": self.api_record.document.base_path,
                "operation": self.operation,
                "endpoint": {
                    "address": self.endpoint.address(),
                    "hostname": self.endpoint.hostname(),
                },
            },
            "client": self.client.as_ref(),
            "env": self.env.as_ref(),
            "plan": self.plan.as_ref(),
            "request": {
                "verb": self.request_method,
                "path": self.request_path,
                "parameters": self
                    .parameters
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<serde_json::Map<_, _>>(),
                "body": self.request_body.as_ref().map(RequestBody::to_json),
            },
            "message": {
                "body": self.message_body.as_ref().map(RequestBody::to_json),
            },
        });
        if let Value::Object(map) = &mut root {
            for (name, value) in &self.variables {
                map.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::ApiDocument;

    fn context() -> Context {
        let api = Api {
            id: "api-1".into(),
            document: ApiDocument::default(),
        };
        let named = |id: &str, name: &str| NamedRef {
            id: id.into(),
            name: name.into(),
        };
        Context::new(
            Arc::new(api),
            SnapshotId::new(3),
            false,
            OperationInfo {
                method: "GET".into(),
                path: "/ascents".into(),
                operation_id: Some("listAscents".into()),
            },
            Endpoint::new("http", Some("gw.example.com:8080".into())),
            ClientInfo {
                app: AppInfo {
                    id: "client-1".into(),
                    secret: Some("s3cret".into()),
                },
                org: named("org-1", "acme"),
                subscription_id: "sub-1".into(),
            },
            EnvInfo {
                path: "sandbox".into(),
                catalog: named("cat-1", "sandbox"),
                org: named("org-1", "acme"),
            },
            PlanInfo {
                id: "climbing:1.0.0:gold".into(),
                name: "gold".into(),
                product_id: "prod-1".into(),
                product_name: "climbing".into(),
                rate_limits: vec![],
            },
        )
    }

    #[test]
    fn test_frozen_fields_reject_writes() {
        let mut ctx = context();
        for name in ["client", "client.app.id", "env.path", "plan", "request.body"] {
            assert!(matches!(ctx.set_variable(name, json!(1)), Err(ResolveError::ReadOnly(_))));
        }
        ctx.set_variable("request.content-type", json!("application/json")).unwrap();
        assert_eq!(ctx.get_variable("request.content-type"), Some(json!("application/json")));
        assert_eq!(ctx.get_variable("env.path"), Some(json!("sandbox")));
    }

    #[test]
    fn test_properties_do_not_shadow_root() {
        let mut ctx = context();
        ctx.set_variable("region", json!("root")).unwrap();
        let properties: IndexMap<String, ApiProperty> = serde_json::from_value(json!({
            "region": { "value": "property" },
            "target": { "value": "https://backend" },
            "plan": { "value": "nope" }
        }))
        .unwrap();
        ctx.copy_properties(&properties);
        assert_eq!(ctx.get_variable("region"), Some(json!("root")));
        assert_eq!(ctx.get_variable("target"), Some(json!("https://backend")));
        assert_eq!(ctx.get_variable("plan.name"), Some(json!("gold")));
    }

    #[test]
    fn test_endpoint_is_lazy() {
        let ctx = context();
        assert!(!ctx.endpoint.is_evaluated());
        assert_eq!(ctx.endpoint.hostname(), Some("gw.example.com"));
        assert!(ctx.endpoint.is_evaluated());
        assert_eq!(ctx.endpoint.address(), "http://gw.example.com:8080");
    }

    #[test]
    fn test_secret_not_serialized() {
        let ctx = context();
        assert!(ctx.to_json()["client"]["app"].get("secret").is_none());
        assert_eq!(ctx.get_variable("client.app.secret"), Some(json!("s3cret")));
    }

    #[test]
    fn test_message_body_is_independent_copy() {
        let mut ctx = context();
        ctx.set_request_body(Some(RequestBody::Json(json!({"a": 1}))));
        if let Some(RequestBody::Json(v)) = ctx.message_body.as_mut() {
            v["a"] = json!(2);
        }
        assert_eq!(ctx.request_body(), Some(&RequestBody::Json(json!({"a": 1}))));
    }
}
