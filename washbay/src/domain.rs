use bytes::Bytes;
use serde::Serialize;

/// The pipeline's view of an inbound request
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Route template the request matched, if the router knows it
    pub route: Option<String>,
    /// Header names are stored lowercase
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// Address of the connected peer, before any proxy headers are considered
    pub peer_addr: Option<String>,
}

impl RequestMeta {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = if query.is_empty() { None } else { Some(query) };
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_peer_addr(mut self, addr: impl Into<String>) -> Self {
        self.peer_addr = Some(addr.into());
        self
    }

    /// First value of the header `name` (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Client address, preferring proxy headers over the peer address
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        forwarded
            .or_else(|| self.header("x-real-ip").map(str::trim))
            .or(self.peer_addr.as_deref())
            .unwrap_or("unknown")
            .to_string()
    }

    pub fn user_agent(&self) -> String {
        self.header("user-agent").unwrap_or_default().to_string()
    }

    /// Correlation id propagated by the caller, if any
    pub fn correlation_id(&self) -> Option<&str> {
        self.header("x-correlation-id")
            .or_else(|| self.header("x-request-id"))
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// A response produced by a handler, and the unit the cache stores
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponsePayload {
    pub status: u16,
    /// Header names are stored lowercase
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponsePayload {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, body).with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Successful, carries no cookies, and was not marked private by the handler
    pub fn is_storable(&self) -> bool {
        if !self.is_success() || self.header("set-cookie").is_some() {
            return false;
        }
        match self.header("cache-control") {
            Some(directives) => !directives.split(',').map(str::trim).any(|directive| {
                directive.eq_ignore_ascii_case("no-store") || directive.eq_ignore_ascii_case("private")
            }),
            None => true,
        }
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from the cache, handler not invoked
    Hit,
    /// Cacheable request resolved by the handler, response stored
    Miss,
    /// Request or response not eligible for caching
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_first_forwarded_address() {
        let request = RequestMeta::new("get", "/search")
            .with_header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .with_peer_addr("10.0.0.1");

        assert_eq!(request.method, "GET");
        assert_eq!(request.client_ip(), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer_then_unknown() {
        let request = RequestMeta::new("GET", "/").with_peer_addr("127.0.0.1");
        assert_eq!(request.client_ip(), "127.0.0.1");

        assert_eq!(RequestMeta::new("GET", "/").client_ip(), "unknown");
    }

    #[test]
    fn test_correlation_id_is_read_from_either_header() {
        let request = RequestMeta::new("GET", "/").with_header("x-request-id", "req-1");
        assert_eq!(request.correlation_id(), Some("req-1"));

        let request = RequestMeta::new("GET", "/")
            .with_header("x-correlation-id", "corr-1")
            .with_header("x-request-id", "req-1");
        assert_eq!(request.correlation_id(), Some("corr-1"));

        let request = RequestMeta::new("GET", "/").with_header("x-correlation-id", "  ");
        assert_eq!(request.correlation_id(), None);
    }

    #[test]
    fn test_only_plain_successful_payloads_are_storable() {
        assert!(ResponsePayload::json(200, "{}").is_storable());
        assert!(ResponsePayload::new(204, "").is_storable());
        assert!(!ResponsePayload::new(404, "").is_storable());
        assert!(!ResponsePayload::new(302, "").is_storable());
        assert!(
            !ResponsePayload::json(200, "{}")
                .with_header("Set-Cookie", "sid=1")
                .is_storable()
        );
        assert!(
            !ResponsePayload::json(200, "{}")
                .with_header("cache-control", "max-age=0, no-store")
                .is_storable()
        );
        assert!(
            !ResponsePayload::json(200, "{}")
                .with_header("cache-control", "Private")
                .is_storable()
        );
        assert!(
            ResponsePayload::json(200, "{}")
                .with_header("cache-control", "public, max-age=60")
                .is_storable()
        );
    }

    #[test]
    fn test_json_payload_sets_content_type() {
        let payload = ResponsePayload::json(201, r#"{"id":1}"#);
        assert_eq!(payload.content_type(), Some("application/json"));
        assert_eq!(payload.size(), 8);
    }
}
