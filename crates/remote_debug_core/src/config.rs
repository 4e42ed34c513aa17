use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:1099";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// 16 MiB of target memory held client-side per session.
pub const DEFAULT_CACHE_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
    /// Total cache budget. Zero disables the page cache.
    pub cache_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            cache_bytes: DEFAULT_CACHE_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            cache_bytes: DEFAULT_CACHE_BYTES,
        }
    }

    pub fn with_cache_bytes(mut self, cache_bytes: u64) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    pub fn from_env() -> Self {
        let endpoint =
            std::env::var("RDB_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        let timeout = std::env::var("RDB_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let cache_bytes = std::env::var("RDB_CACHE_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CACHE_BYTES);

        Self {
            endpoint,
            timeout,
            cache_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "127.0.0.1:1099");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.cache_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_new_config() {
        let config = ClientConfig::new("10.0.0.5:2000", Duration::from_secs(10)).with_cache_bytes(0);
        assert_eq!(config.endpoint, "10.0.0.5:2000");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.cache_bytes, 0);
    }

    // Env vars are process-global; both cases share one test to avoid races.
    #[test]
    fn test_from_env_defaults_and_overrides() {
        std::env::remove_var("RDB_ENDPOINT");
        std::env::remove_var("RDB_TIMEOUT_MS");
        std::env::remove_var("RDB_CACHE_BYTES");

        let config = ClientConfig::from_env();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.cache_bytes, DEFAULT_CACHE_BYTES);

        std::env::set_var("RDB_ENDPOINT", "debug-host:9999");
        std::env::set_var("RDB_TIMEOUT_MS", "5000");
        std::env::set_var("RDB_CACHE_BYTES", "65536");

        let config = ClientConfig::from_env();
        assert_eq!(config.endpoint, "debug-host:9999");
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.cache_bytes, 65536);

        std::env::remove_var("RDB_ENDPOINT");
        std::env::remove_var("RDB_TIMEOUT_MS");
        std::env::remove_var("RDB_CACHE_BYTES");
    }
}
