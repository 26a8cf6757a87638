use std::collections::BTreeMap;

use conduit_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

/// Appends `path` to `base_url`, keeping every segment of the base.
///
/// Unlike [`Url::join`], `https://api/v1` + `users` yields
/// `https://api/v1/users`. Query strings in `path` are preserved.
pub(crate) fn endpoint(base_url: &str, path: &str) -> Result<Url> {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    let joined = if path.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{path}")
    };

    Url::parse(&joined).map_err(|e| Error::invalid_config(format!("invalid endpoint '{joined}': {e}")))
}

/// Converts configured header pairs into a [`HeaderMap`].
pub(crate) fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::invalid_config(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_config(format!("invalid value for header '{name}': {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = endpoint("https://api.internal/v1/", "/users/42").unwrap();
        assert_eq!(url.as_str(), "https://api.internal/v1/users/42");

        let url = endpoint("https://api.internal/v1", "users?active=true").unwrap();
        assert_eq!(url.path(), "/v1/users");
        assert_eq!(url.query(), Some("active=true"));
    }

    #[test]
    fn test_empty_path_targets_base() {
        let url = endpoint("https://api.internal/v1/", "").unwrap();
        assert_eq!(url.as_str(), "https://api.internal/v1");
    }

    #[test]
    fn test_header_map_rejects_invalid_names() {
        let mut headers = BTreeMap::new();
        headers.insert("x-tenant".to_owned(), "acme".to_owned());
        let map = header_map(&headers).unwrap();
        assert_eq!(map.get("x-tenant").unwrap(), "acme");

        headers.insert("bad header".to_owned(), "x".to_owned());
        assert!(matches!(header_map(&headers), Err(Error::InvalidConfig { .. })));
    }
}
