//! Normalized view of an inbound request.

use axum::http::{HeaderMap, Method, Uri};
use bytes::Bytes;
use indexmap::IndexMap;

pub const CLIENT_ID_QUERY: &str = "client_id";
pub const CLIENT_ID_HEADER: &str = "x-ibm-client-id";
pub const CLIENT_SECRET_QUERY: &str = "client_secret";
pub const CLIENT_SECRET_HEADER: &str = "x-ibm-client-secret";

/// An inbound request as seen by the matcher and the context resolver.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// Upper-cased method.
    pub method: String,
    /// Path re-assembled from its non-empty segments; root is `/`.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: &Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method: method.as_str().to_ascii_uppercase(),
            path: normalize_path(uri.path()),
            query: uri.query().map(str::to_string),
            headers,
            body,
        }
    }

    /// Query parameters in order of appearance; repeated keys collect every value.
    pub fn query_params(&self) -> IndexMap<String, Vec<String>> {
        let mut params: IndexMap<String, Vec<String>> = IndexMap::new();
        if let Some(query) = &self.query {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params.entry(key.into_owned()).or_default().push(value.into_owned());
            }
        }
        params
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Client id from the `client_id` query parameter or `X-IBM-Client-Id`.
    pub fn client_id(&self) -> Option<String> {
        self.credential(CLIENT_ID_QUERY, CLIENT_ID_HEADER)
    }

    pub fn client_secret(&self) -> Option<String> {
        self.credential(CLIENT_SECRET_QUERY, CLIENT_SECRET_HEADER)
    }

    fn credential(&self, query_key: &str, header: &str) -> Option<String> {
        self.query_params()
            .swap_remove(query_key)
            .and_then(|values| values.into_iter().next())
            .or_else(|| self.header(header).map(str::to_string))
    }
}

/// Rebuild a path from its URL segments, collapsing the root to `/`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, uri: &str) -> GatewayRequest {
        let method = Method::from_bytes(method.as_bytes()).unwrap();
        GatewayRequest::new(&method, &uri.parse().unwrap(), HeaderMap::new(), Bytes::new())
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("//v1//ascents/"), "/v1/ascents");
    }

    #[test]
    fn test_method_is_upper_cased() {
        assert_eq!(request("get", "/x").method, "GET");
    }

    #[test]
    fn test_query_params_and_client_id() {
        let req = request("GET", "/v1/ascents?client_id=abc&tag=a&tag=b%20c");
        let params = req.query_params();
        assert_eq!(params["tag"], vec!["a".to_string(), "b c".to_string()]);
        assert_eq!(req.client_id().as_deref(), Some("abc"));
        assert!(req.client_secret().is_none());
    }

    #[test]
    fn test_client_id_header_fallback() {
        let mut req = request("GET", "/v1/ascents");
        req.headers.insert(CLIENT_ID_HEADER, "from-header".parse().unwrap());
        assert_eq!(req.client_id().as_deref(), Some("from-header"));
    }
}
