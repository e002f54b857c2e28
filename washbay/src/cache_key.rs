use shared::config::CacheSettings;

/// Canonical cache key for a request.
///
/// Query pairs are sorted by name then value, so `?b=2&a=1` and `?a=1&b=2`
/// share a key. Empty pairs (`&&`) are dropped.
pub fn cache_key(method: &str, path: &str, query: Option<&str>) -> String {
    let mut pairs = query_pairs(query);
    pairs.sort();

    let mut key = format!("{} {}", method.to_ascii_uppercase(), path);
    if !pairs.is_empty() {
        let query = pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&query);
    }
    key
}

/// Split a raw query string into name/value pairs, without decoding.
pub(crate) fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Decides which requests may be stored in or served from the cache
#[derive(Clone, Debug)]
pub struct CachePolicy {
    excluded_prefixes: Vec<String>,
}

impl CachePolicy {
    pub fn new<I, S>(excluded_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_prefixes: excluded_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.excluded_prefixes.iter().cloned())
    }

    pub fn is_cacheable(&self, method: &str, path: &str) -> bool {
        method.eq_ignore_ascii_case("GET")
            && !self
                .excluded_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_order_does_not_change_the_key() {
        assert_eq!(
            cache_key("GET", "/search", Some("q=foo&city=paris")),
            cache_key("get", "/search", Some("city=paris&q=foo")),
        );
        assert_eq!(
            cache_key("GET", "/search", Some("q=foo&city=paris")),
            "GET /search?city=paris&q=foo"
        );
    }

    #[test]
    fn test_different_requests_get_different_keys() {
        let base = cache_key("GET", "/search", Some("q=foo"));

        assert_ne!(base, cache_key("GET", "/search", Some("q=bar")));
        assert_ne!(base, cache_key("GET", "/search", None));
        assert_ne!(base, cache_key("POST", "/search", Some("q=foo")));
        assert_ne!(base, cache_key("GET", "/search/q=foo", None));
        assert_ne!(
            cache_key("GET", "/s", Some("a=1&a=2")),
            cache_key("GET", "/s", Some("a=1"))
        );
    }

    #[test]
    fn test_repeated_names_sort_by_value() {
        assert_eq!(
            cache_key("GET", "/s", Some("a=2&a=1")),
            cache_key("GET", "/s", Some("a=1&a=2"))
        );
    }

    #[test]
    fn test_empty_query_pairs_are_ignored() {
        assert_eq!(cache_key("GET", "/s", Some("")), "GET /s");
        assert_eq!(cache_key("GET", "/s", Some("&q=1&")), "GET /s?q=1");
    }

    #[test]
    fn test_only_get_is_cacheable() {
        let policy = CachePolicy::default();

        assert!(policy.is_cacheable("GET", "/search"));
        assert!(policy.is_cacheable("get", "/providers/42"));
        assert!(!policy.is_cacheable("POST", "/search"));
        assert!(!policy.is_cacheable("PUT", "/search"));
        assert!(!policy.is_cacheable("HEAD", "/search"));
    }

    #[test]
    fn test_default_excluded_prefixes() {
        let policy = CachePolicy::default();

        for path in [
            "/auth/profile",
            "/bookings",
            "/bookings/17",
            "/notifications/unread",
            "/admin/cache/stats",
        ] {
            assert!(!policy.is_cacheable("GET", path), "{path} must not be cached");
        }
    }

    #[test]
    fn test_custom_excluded_prefixes() {
        let policy = CachePolicy::new(["/private"]);

        assert!(!policy.is_cacheable("GET", "/private/x"));
        assert!(policy.is_cacheable("GET", "/auth/profile"));
    }
}
