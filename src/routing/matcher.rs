//! Candidate selection over Route Entries.
//!
//! # Responsibilities
//! - Test the normalized path against every RoutePath's `path-regex`
//! - Require a declared method, or an OPTIONS preflight on a CORS-enabled API
//! - Keep only the Candidates tied at the lowest matching score
//!
//! # Design Decisions
//! - Entries are scanned in store order; a better score discards earlier matches
//! - `allow_methods` is only computed when CORS is enabled

use std::sync::Arc;

use crate::index::{MethodEntry, RouteEntry, RoutePath};
use crate::routing::MatchError;

const OPTIONS: &str = "OPTIONS";

/// A Route Entry + RoutePath pair that satisfied the request.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub score: u32,
    pub entry: Arc<RouteEntry>,
    /// Index into `entry.api_paths`.
    pub path_index: usize,
    pub matched_method: Option<MethodEntry>,
    /// Comma-joined methods for CORS responses; empty when CORS is disabled.
    pub allow_methods: String,
}

impl Candidate {
    pub fn path(&self) -> &RoutePath {
        &self.entry.api_paths[self.path_index]
    }
}

/// Find every Candidate tied at the lowest score for `method` + `path`.
pub fn find_candidates(
    method: &str,
    path: &str,
    entries: &[Arc<RouteEntry>],
) -> Result<Vec<Candidate>, MatchError> {
    let method = method.to_ascii_uppercase();
    let mut best_score = u32::MAX;
    let mut matches: Vec<Candidate> = Vec::new();

    for entry in entries {
        for (path_index, route_path) in entry.api_paths.iter().enumerate() {
            if !route_path.is_match(path) {
                continue;
            }

            let matched_method = route_path.method(&method).cloned();
            if matched_method.is_none() && (method != OPTIONS || !entry.cors_enabled) {
                continue;
            }

            if route_path.matching_score > best_score {
                continue;
            }
            if route_path.matching_score < best_score {
                matches.clear();
                best_score = route_path.matching_score;
            }

            let allow_methods = if entry.cors_enabled {
                allow_methods(route_path)
            } else {
                String::new()
            };

            matches.push(Candidate {
                score: route_path.matching_score,
                entry: Arc::clone(entry),
                path_index,
                matched_method,
                allow_methods,
            });
        }
    }

    if matches.is_empty() {
        tracing::debug!(method = %method, path = %path, "No route entry matched");
        return Err(MatchError::NoMatch);
    }
    Ok(matches)
}

fn allow_methods(route_path: &RoutePath) -> String {
    let mut methods: Vec<&str> = route_path.path_methods.iter().map(|m| m.method.as_str()).collect();
    if !methods.contains(&OPTIONS) {
        methods.push(OPTIONS);
    }
    methods.join(",")
}

/// Pick among tied Candidates: the one whose secret matches `client_secret`,
/// or the first when no secret is supplied.
pub fn select_candidate(candidates: Vec<Candidate>, client_secret: Option<&str>) -> Option<Candidate> {
    match client_secret {
        Some(secret) => candidates
            .into_iter()
            .find(|c| c.entry.client_secret.as_deref() == Some(secret)),
        None => candidates.into_iter().next(),
    }
}
