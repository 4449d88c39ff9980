//! Snapshot-scoped configuration records.
//!
//! Field names follow the management plane's JSON (kebab-case keys, Swagger 2.0
//! API documents).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// HTTP methods that may appear as keys of a Swagger path item.
pub const HTTP_METHODS: [&str; 7] = ["GET", "PUT", "POST", "DELETE", "OPTIONS", "HEAD", "PATCH"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Catalog {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub organization: Organization,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Product {
    pub id: String,
    pub catalog: CatalogRef,
    #[serde(default)]
    pub document: ProductDocument,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProductDocument {
    #[serde(default)]
    pub info: ProductInfo,
    #[serde(default)]
    pub plans: IndexMap<String, PlanDocument>,
    #[serde(default)]
    pub apis: IndexMap<String, ProductApi>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProductInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Reference from a product document to an API, `name` is `"<x-ibm-name>:<version>"`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductApi {
    pub name: String,
}

impl ProductApi {
    /// Split the reference into `(x-ibm-name, version)`.
    pub fn name_and_version(&self) -> (&str, &str) {
        self.name.rsplit_once(':').unwrap_or((self.name.as_str(), ""))
    }
}

/// A plan as nested inside a product document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlanDocument {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "rate-limits", default)]
    pub rate_limits: IndexMap<String, RateLimitValue>,
    /// Subset of the product's API keys; all product APIs when absent.
    #[serde(default)]
    pub apis: Option<IndexMap<String, Value>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitValue {
    pub value: String,
}

/// A named plan quota such as `100/1hour`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimit {
    pub name: String,
    pub value: String,
}

impl PlanDocument {
    pub fn rate_limit_list(&self) -> Vec<RateLimit> {
        self.rate_limits
            .iter()
            .map(|(name, limit)| RateLimit {
                name: name.clone(),
                value: limit.value.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub id: String,
    pub document: ApiDocument,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(rename = "x-ibm-name", default)]
    pub name: String,
}

/// Swagger 2.0 API document plus the `x-ibm-configuration` extension.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiDocument {
    #[serde(default)]
    pub info: ApiInfo,
    #[serde(rename = "basePath", default)]
    pub base_path: String,
    /// Keys containing `/` are URL templates, anything else is an extension.
    #[serde(default)]
    pub paths: IndexMap<String, Value>,
    #[serde(rename = "securityDefinitions", default)]
    pub security_definitions: Option<Value>,
    #[serde(default)]
    pub security: Option<Vec<Value>>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(rename = "x-ibm-configuration", default)]
    pub ibm_configuration: IbmConfiguration,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IbmConfiguration {
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    #[serde(default)]
    pub properties: IndexMap<String, ApiProperty>,
    #[serde(default)]
    pub assembly: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiProperty {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub description: Option<String>,
}

impl ApiDocument {
    /// CORS is on unless `x-ibm-configuration.cors.enabled` is explicitly false.
    pub fn cors_enabled(&self) -> bool {
        self.ibm_configuration
            .cors
            .as_ref()
            .map(|cors| cors.enabled)
            .unwrap_or(true)
    }

    /// URL templates with their decoded path items, in document order.
    pub fn path_items(&self) -> impl Iterator<Item = (&str, Result<PathItem, serde_json::Error>)> {
        self.paths
            .iter()
            .filter(|(template, _)| template.contains('/'))
            .map(|(template, item)| (template.as_str(), PathItem::deserialize(item)))
    }

    /// The operation declared for `method` under `template`, with path-level
    /// parameters merged in and `consumes` defaulted from the document.
    pub fn operation(&self, template: &str, method: &str) -> Result<Option<Operation>, serde_json::Error> {
        let Some(raw) = self.paths.get(template) else {
            return Ok(None);
        };
        let item = PathItem::deserialize(raw)?;
        let Some(mut operation) = item.operation(method)? else {
            return Ok(None);
        };

        for shared in item.parameters {
            let overridden = operation
                .parameters
                .iter()
                .any(|p| p.name == shared.name && p.location == shared.location);
            if !overridden {
                operation.parameters.push(shared);
            }
        }
        if operation.consumes.is_none() && !self.consumes.is_empty() {
            operation.consumes = Some(self.consumes.clone());
        }
        Ok(Some(operation))
    }
}

/// A Swagger path item: method keys plus shared `parameters`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PathItem {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(flatten)]
    pub entries: IndexMap<String, Value>,
}

impl PathItem {
    /// Declared operations in document order, method names upper-cased.
    pub fn operations(&self) -> Result<Vec<(String, Operation)>, serde_json::Error> {
        self.entries
            .iter()
            .filter_map(|(key, value)| {
                let method = key.to_ascii_uppercase();
                HTTP_METHODS
                    .contains(&method.as_str())
                    .then(|| Operation::deserialize(value).map(|op| (method, op)))
            })
            .collect()
    }

    pub fn operation(&self, method: &str) -> Result<Option<Operation>, serde_json::Error> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(method))
            .map(|(_, value)| Operation::deserialize(value))
            .transpose()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Operation {
    #[serde(rename = "operationId", default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub security: Option<Vec<Value>>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub consumes: Option<Vec<String>>,
}

/// Where a declared parameter is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Body,
    FormData,
    #[serde(other)]
    Other,
}

/// Delimiter rule for `array` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionFormat {
    #[default]
    Csv,
    Ssv,
    Tsv,
    Pipes,
    Multi,
}

impl CollectionFormat {
    /// Delimiter to split on; `None` for `multi`, which arrives pre-split.
    pub fn delimiter(&self) -> Option<char> {
        match self {
            CollectionFormat::Csv => Some(','),
            CollectionFormat::Ssv => Some(' '),
            CollectionFormat::Tsv => Some('\t'),
            CollectionFormat::Pipes => Some('|'),
            CollectionFormat::Multi => None,
        }
    }
}

/// Declared `type`/`format` of a parameter or of array `items`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TypeSchema {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(rename = "collectionFormat", default)]
    pub collection_format: Option<CollectionFormat>,
    #[serde(default)]
    pub items: Option<Box<TypeSchema>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub schema: TypeSchema,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subscription {
    pub id: String,
    pub application: Application,
    #[serde(rename = "plan-registration")]
    pub plan_registration: PlanRegistration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Application {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "app-credentials", default)]
    pub credentials: Vec<Credential>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credential {
    #[serde(rename = "client-id")]
    pub client_id: String,
    #[serde(rename = "client-secret", default)]
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlanRegistration {
    pub id: String,
    pub plan: PlanRef,
    pub product: ProductRef,
    #[serde(default)]
    pub apis: Vec<ApiRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlanRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductRef {
    pub id: String,
}

/// API as listed in a plan registration; reconciled with the canonical
/// record by `(info.version, x-ibm-name)`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiRef {
    #[serde(default)]
    pub id: Option<String>,
    pub document: ApiRefDocument,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiRefDocument {
    pub info: ApiInfo,
}

/// Records the router only stores and deletes (TLS profiles, registries).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpaqueRecord {
    pub id: String,
    #[serde(flatten)]
    pub document: Map<String, Value>,
}
