use std::path::PathBuf;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:1099";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: String,
    /// Core snapshot to serve.
    pub snapshot: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            snapshot: None,
        }
    }
}

impl ServerConfig {
    pub fn new(listen: impl Into<String>, snapshot: Option<PathBuf>) -> Self {
        Self {
            listen: listen.into(),
            snapshot,
        }
    }

    pub fn from_env() -> Self {
        let listen = std::env::var("RDB_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.to_string());
        let snapshot = std::env::var_os("RDB_SNAPSHOT").map(PathBuf::from);
        Self { listen, snapshot }
    }

    /// The first positional argument, if any, names the snapshot.
    pub fn with_args(mut self, mut args: impl Iterator<Item = String>) -> Self {
        if let Some(path) = args.next() {
            self.snapshot = Some(PathBuf::from(path));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen, "127.0.0.1:1099");
        assert!(config.snapshot.is_none());
    }

    #[test]
    fn test_positional_argument_overrides_snapshot() {
        let config = ServerConfig::new("0.0.0.0:2000", Some("env.json".into()))
            .with_args(vec!["arg.json".to_string()].into_iter());
        assert_eq!(config.snapshot, Some(PathBuf::from("arg.json")));

        let config = ServerConfig::new("0.0.0.0:2000", Some("env.json".into())).with_args(std::iter::empty());
        assert_eq!(config.snapshot, Some(PathBuf::from("env.json")));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("RDB_LISTEN", "127.0.0.1:4000");
        std::env::set_var("RDB_SNAPSHOT", "/tmp/core.json");

        let config = ServerConfig::from_env();
        assert_eq!(config.listen, "127.0.0.1:4000");
        assert_eq!(config.snapshot, Some(PathBuf::from("/tmp/core.json")));

        std::env::remove_var("RDB_LISTEN");
        std::env::remove_var("RDB_SNAPSHOT");

        let config = ServerConfig::from_env();
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert!(config.snapshot.is_none());
    }
}
