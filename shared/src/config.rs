use std::time::Duration;
use tracing::warn;

/// Response cache settings
#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub max_entries: usize,
    pub excluded_prefixes: Vec<String>,
    /// Zero disables the background sweeper; expired entries are then only
    /// reclaimed on lookup or when a store pushes the map over `max_entries`.
    pub sweep_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(Config::DEFAULT_CACHE_TTL_SECS),
            max_entries: Config::DEFAULT_CACHE_MAX_ENTRIES,
            excluded_prefixes: Config::DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            sweep_interval: Duration::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `WASHBAY_LOG_FORMAT` on its own, so logging can start before the
    /// rest of the configuration is parsed.
    pub fn from_env() -> Self {
        Self::parse(std::env::var("WASHBAY_LOG_FORMAT").ok().as_deref())
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub cache: CacheSettings,
    pub slow_request_threshold: Duration,
    pub development: bool,
    pub report_url: Option<String>,
    pub report_timeout: Duration,
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            http_port: Self::DEFAULT_HTTP_PORT,
            cache: CacheSettings::default(),
            slow_request_threshold: Duration::from_millis(Self::DEFAULT_SLOW_REQUEST_MS),
            development: false,
            report_url: None,
            report_timeout: Duration::from_millis(Self::DEFAULT_REPORT_TIMEOUT_MS),
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_CACHE_TTL_SECS: u64 = 60;
    const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;
    const DEFAULT_EXCLUDED_PREFIXES: [&'static str; 4] = ["/auth", "/bookings", "/notifications", "/admin"];
    const DEFAULT_SLOW_REQUEST_MS: u64 = 1000;
    const DEFAULT_REPORT_TIMEOUT_MS: u64 = 5000;
    const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let excluded_prefixes = match lookup("WASHBAY_CACHE_EXCLUDED_PREFIXES") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cache.excluded_prefixes,
        };

        let cache = CacheSettings {
            ttl: Duration::from_secs(parse_or(
                &lookup,
                "WASHBAY_CACHE_TTL_SECS",
                Self::DEFAULT_CACHE_TTL_SECS,
            )),
            max_entries: parse_or(
                &lookup,
                "WASHBAY_CACHE_MAX_ENTRIES",
                Self::DEFAULT_CACHE_MAX_ENTRIES,
            ),
            excluded_prefixes,
            sweep_interval: Duration::from_secs(parse_or(
                &lookup,
                "WASHBAY_CACHE_SWEEP_INTERVAL_SECS",
                0,
            )),
        };

        let development = lookup("WASHBAY_ENV")
            .map(|env| env.trim().eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        let log_format = LogFormat::parse(lookup("WASHBAY_LOG_FORMAT").as_deref());

        Self {
            host: lookup("WASHBAY_HOST").unwrap_or(defaults.host),
            http_port: parse_or(&lookup, "WASHBAY_HTTP_PORT", Self::DEFAULT_HTTP_PORT),
            cache,
            slow_request_threshold: Duration::from_millis(parse_or(
                &lookup,
                "WASHBAY_SLOW_REQUEST_MS",
                Self::DEFAULT_SLOW_REQUEST_MS,
            )),
            development,
            report_url: lookup("WASHBAY_REPORT_URL").filter(|url| !url.trim().is_empty()),
            report_timeout: Duration::from_millis(parse_or(
                &lookup,
                "WASHBAY_REPORT_TIMEOUT_MS",
                Self::DEFAULT_REPORT_TIMEOUT_MS,
            )),
            max_body_bytes: parse_or(
                &lookup,
                "WASHBAY_MAX_BODY_BYTES",
                Self::DEFAULT_MAX_BODY_BYTES,
            ),
            log_format,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        None => default,
    }
}
