//! Builds a [`Context`] from a selected Candidate and the inbound request.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::context::body::parse_body;
use crate::context::params::{resolve_parameters, ParamSources};
use crate::context::variables::{AppInfo, ClientInfo, EnvInfo, NamedRef, OperationInfo, PlanInfo};
use crate::context::{Context, Endpoint, ResolveResult};
use crate::index::template::ParamPattern;
use crate::routing::{Candidate, GatewayRequest};
use crate::store::model::{Api, Operation, ParamLocation};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Compiled named-capture path patterns keyed by `basePath + template`.
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: DashMap<String, Arc<ParamPattern>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(&self, base_path: &str, template: &str) -> Result<Arc<ParamPattern>, regex::Error> {
        let key = format!("{}{}", base_path, template);
        if let Some(pattern) = self.patterns.get(&key) {
            return Ok(Arc::clone(&pattern));
        }
        let pattern = Arc::new(ParamPattern::compile(base_path, template)?);
        self.patterns.insert(key, Arc::clone(&pattern));
        Ok(pattern)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Drop every compiled pattern.
    pub fn reset(&self) {
        self.patterns.clear();
    }
}

/// Per-request overrides.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Explicit `request.content-type`; replaces the operation's `consumes`.
    pub content_type: Option<String>,
}

/// Resolves request contexts. Shared by every request of the process.
#[derive(Debug)]
pub struct ContextResolver {
    patterns: PatternCache,
    test_app_enabled: bool,
    scheme: String,
}

impl ContextResolver {
    pub fn new(test_app_enabled: bool, scheme: impl Into<String>) -> Self {
        Self {
            patterns: PatternCache::new(),
            test_app_enabled,
            scheme: scheme.into(),
        }
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    pub async fn resolve(
        &self,
        candidate: &Candidate,
        request: &GatewayRequest,
        api: Arc<Api>,
        options: &ResolveOptions,
    ) -> ResolveResult<Context> {
        let entry = &candidate.entry;
        let template = candidate.path().path.clone();
        let method = candidate
            .matched_method
            .as_ref()
            .map(|m| m.method.clone())
            .unwrap_or_else(|| request.method.clone());
        let operation = lookup_operation(&api, &template, &method);

        let mut context = Context::new(
            Arc::clone(&api),
            entry.snapshot_id,
            self.test_app_enabled,
            OperationInfo {
                method: method.clone(),
                path: template.clone(),
                operation_id: candidate.matched_method.as_ref().and_then(|m| m.operation_id.clone()),
            },
            Endpoint::new(self.scheme.clone(), request.header("host").map(str::to_string)),
            ClientInfo {
                app: AppInfo {
                    id: entry.client_id.clone(),
                    secret: entry.client_secret.clone(),
                },
                org: NamedRef {
                    id: entry.organization_id.clone(),
                    name: entry.organization_name.clone(),
                },
                subscription_id: entry.subscription_id.clone(),
            },
            EnvInfo {
                path: entry.catalog_name.clone(),
                catalog: NamedRef {
                    id: entry.catalog_id.clone(),
                    name: entry.catalog_name.clone(),
                },
                org: NamedRef {
                    id: entry.organization_id.clone(),
                    name: entry.organization_name.clone(),
                },
            },
            PlanInfo {
                id: entry.plan_id.clone(),
                name: entry.plan_name.clone(),
                product_id: entry.product_id.clone(),
                product_name: entry.product_name.clone(),
                rate_limits: entry.rate_limits.clone(),
            },
        );
        context.request_method = request.method.clone();
        context.request_path = request.path.clone();

        if let Some(content_type) = &options.content_type {
            context.set_variable("request.content-type", Value::String(content_type.clone()))?;
        }
        context.copy_properties(&api.document.ibm_configuration.properties);

        let candidates = body_content_types(options, operation.as_ref(), request);
        let body = parse_body(&request.body, &candidates, request.header("content-type"))?;
        context.set_request_body(body);

        let params = operation.map(|op| op.parameters).unwrap_or_default();
        let pattern = if params.iter().any(|p| p.location == ParamLocation::Path) {
            match self.patterns.get_or_compile(&entry.api_base_path, &template) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(template = %template, error = %e, "Failed to compile path parameter pattern");
                    None
                }
            }
        } else {
            None
        };

        let query = request.query_params();
        let sources = ParamSources {
            request,
            query: &query,
            pattern: pattern.as_deref(),
            body: context.request_body(),
        };
        let parameters = resolve_parameters(&params, &sources).await;
        context.parameters = parameters;

        Ok(context)
    }
}

fn lookup_operation(api: &Api, template: &str, method: &str) -> Option<Operation> {
    match api.document.operation(template, method) {
        Ok(operation) => operation,
        Err(e) => {
            tracing::warn!(api_id = %api.id, template = %template, method = %method, error = %e, "Invalid operation definition");
            None
        }
    }
}

fn body_content_types(options: &ResolveOptions, operation: Option<&Operation>, request: &GatewayRequest) -> Vec<String> {
    if let Some(content_type) = &options.content_type {
        return vec![content_type.clone()];
    }
    if let Some(consumes) = operation.and_then(|op| op.consumes.as_ref()).filter(|c| !c.is_empty()) {
        return consumes.clone();
    }
    vec![request
        .header("content-type")
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()]
}
