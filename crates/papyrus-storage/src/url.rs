//! Minimal `scheme://authority/path?query` parsing for layer URLs.
//!
//! Papyrus only ever needs this one grammar, so a hand-rolled splitter
//! keeps the dependency list short rather than pulling in a general
//! purpose URL crate for a single `://` split and an optional query tail.

use std::collections::BTreeMap;

use crate::error::LayerError;

/// A parsed layer URL: `scheme://authority/path?k=v&...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerUrl {
    pub scheme: String,
    pub authority: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
}

impl LayerUrl {
    /// # Errors
    ///
    /// Returns [`LayerError::NotFound`] if `url` has no `scheme://` prefix.
    pub fn parse(url: &str) -> Result<Self, LayerError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| LayerError::NotFound(url.to_string()))?;

        let (without_query, query_str) = match rest.split_once('?') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };

        let (authority, path) = match without_query.split_once('/') {
            Some((authority, path)) => (authority, format!("/{path}")),
            None => (without_query, String::new()),
        };

        let mut query = BTreeMap::new();
        if let Some(query_str) = query_str {
            for pair in query_str.split('&').filter(|p| !p.is_empty()) {
                match pair.split_once('=') {
                    Some((k, v)) => {
                        query.insert(k.to_string(), v.to_string());
                    }
                    None => {
                        query.insert(pair.to_string(), String::new());
                    }
                }
            }
        }

        Ok(LayerUrl {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            path,
            query,
        })
    }

    /// The `threshold` query parameter, if present and numeric.
    #[must_use]
    pub fn threshold_override(&self) -> Option<usize> {
        self.query.get("threshold").and_then(|v| v.parse().ok())
    }

    /// `authority` and `path` concatenated, as `aol://` file paths use.
    #[must_use]
    pub fn file_path(&self) -> String {
        format!("{}{}", self.authority, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mem_url() {
        let url = LayerUrl::parse("mem://").unwrap();
        assert_eq!(url.scheme, "mem");
        assert_eq!(url.authority, "");
    }

    #[test]
    fn parses_aol_url_with_threshold() {
        let url = LayerUrl::parse("aol://data/layer-0.aol?threshold=1000").unwrap();
        assert_eq!(url.scheme, "aol");
        assert_eq!(url.file_path(), "data/layer-0.aol");
        assert_eq!(url.threshold_override(), Some(1000));
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(LayerUrl::parse("not-a-url").is_err());
    }
}
