//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The solver API key is loaded from SOLVER_API_KEY or api_key_file,
//! never stored in the TOML directly to avoid leaking secrets.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use token_pool::{Options, RetryPolicy};

use crate::error::{Error, Result};
use crate::secret::SecretString;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub pool: PoolConfig,
    pub producer: ProducerConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// How long GET /token waits for a token before answering 503
    #[serde(default = "default_token_wait_timeout")]
    pub token_wait_timeout_secs: u64,
}

/// Token pool options
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    pub count: usize,
    #[serde(default)]
    pub refresh: bool,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

/// Remote solver settings
#[derive(Debug, Deserialize)]
pub struct ProducerConfig {
    pub url: String,
    #[serde(default = "default_producer_timeout")]
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<SecretString>,
    /// Path to a file containing the API key (alternative to SOLVER_API_KEY env var)
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,
    /// Optional proxy list, one `host:port:username:password` per line
    #[serde(default)]
    pub proxies_file: Option<PathBuf>,
}

fn default_max_connections() -> usize {
    256
}

fn default_token_wait_timeout() -> u64 {
    30
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_ttl() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_producer_timeout() -> u64 {
    120
}

impl PoolConfig {
    /// Translate to library options.
    pub fn to_options(&self) -> Options {
        let mut options = Options::new(self.count)
            .with_ttl(Duration::from_secs(self.ttl_secs))
            .with_retry(RetryPolicy {
                max_attempts: self.max_attempts,
                backoff: Duration::from_millis(self.backoff_ms),
            });
        if self.refresh {
            options = options.with_refresh(Duration::from_secs(self.refresh_interval_secs));
        }
        options
    }
}

impl ServerConfig {
    pub fn token_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.token_wait_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// API key resolution order:
    /// 1. SOLVER_API_KEY env var
    /// 2. api_key_file path from config
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Validate url is a valid URL with http(s) scheme
        if !config.producer.url.starts_with("http://")
            && !config.producer.url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "producer.url must start with http:// or https://, got: {}",
                config.producer.url
            )));
        }

        if config.producer.timeout_secs == 0 {
            return Err(Error::Config(
                "producer.timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(Error::Config(
                "server.max_connections must be greater than 0".into(),
            ));
        }

        if config.server.token_wait_timeout_secs == 0 {
            return Err(Error::Config(
                "server.token_wait_timeout_secs must be greater than 0".into(),
            ));
        }

        config
            .pool
            .to_options()
            .validate()
            .map_err(|e| Error::Config(format!("[pool] {e}")))?;

        // Resolve API key: env var takes precedence over file
        if let Ok(key) = std::env::var("SOLVER_API_KEY") {
            config.producer.api_key = Some(SecretString::new(key));
        } else if let Some(ref key_file) = config.producer.api_key_file {
            config.producer.api_key = SecretString::from_file(key_file)?;
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("token-pool.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 10
refresh = true
refresh_interval_secs = 30
ttl_secs = 60

[producer]
url = "https://solver.example/solve"
"#
    }

    /// Write `contents` to a fresh temp dir and return both.
    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token-pool.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(valid_toml());
        unsafe { remove_env("SOLVER_API_KEY") };

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.server.max_connections, 256);
        assert_eq!(config.server.token_wait_timeout(), Duration::from_secs(30));
        assert_eq!(config.pool.count, 10);
        assert_eq!(config.pool.max_attempts, 3);
        assert_eq!(config.pool.backoff_ms, 1000);
        assert_eq!(config.producer.url, "https://solver.example/solve");
        assert_eq!(config.producer.timeout_secs, 120);
        assert!(config.producer.api_key.is_none());
        assert!(config.producer.proxies_file.is_none());
    }

    #[test]
    fn test_pool_config_maps_to_options() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(valid_toml());
        unsafe { remove_env("SOLVER_API_KEY") };

        let options = Config::load(&path).unwrap().pool.to_options();
        assert_eq!(options.count, 10);
        assert!(options.refresh);
        assert_eq!(options.refresh_interval, Duration::from_secs(30));
        assert_eq!(options.ttl, Duration::from_secs(60));
        assert_eq!(options.retry.max_attempts, 3);
        assert_eq!(options.retry.backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_refresh_defaults_off() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 2

[producer]
url = "http://localhost:9000/solve"
"#,
        );
        unsafe { remove_env("SOLVER_API_KEY") };

        let options = Config::load(&path).unwrap().pool.to_options();
        assert!(!options.refresh);
        assert_eq!(options.ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let (_dir, path) = write_config("not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn test_api_key_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(valid_toml());

        unsafe { set_env("SOLVER_API_KEY", "key-from-env") };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.producer.api_key.as_ref().unwrap().expose(),
            "key-from-env"
        );
        unsafe { remove_env("SOLVER_API_KEY") };
    }

    #[test]
    fn test_api_key_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("solver_key");
        std::fs::write(&key_path, "key-from-file\n").unwrap();

        let contents = format!(
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 1

[producer]
url = "https://solver.example/solve"
api_key_file = "{}"
"#,
            key_path.display()
        );
        let (_cfg_dir, path) = write_config(&contents);

        unsafe { remove_env("SOLVER_API_KEY") };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.producer.api_key.as_ref().unwrap().expose(),
            "key-from-file"
        );
    }

    #[test]
    fn test_api_key_env_overrides_missing_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 1

[producer]
url = "https://solver.example/solve"
api_key_file = "/nonexistent/path/solver_key"
"#,
        );

        unsafe { set_env("SOLVER_API_KEY", "env-wins") };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.producer.api_key.as_ref().unwrap().expose(),
            "env-wins",
            "SOLVER_API_KEY must take precedence over api_key_file"
        );
        unsafe { remove_env("SOLVER_API_KEY") };
    }

    #[test]
    fn test_api_key_file_missing_returns_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 1

[producer]
url = "https://solver.example/solve"
api_key_file = "/nonexistent/path/solver_key"
"#,
        );

        unsafe { remove_env("SOLVER_API_KEY") };
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 1

[producer]
url = "solver.example/solve"
"#,
        );
        unsafe { remove_env("SOLVER_API_KEY") };

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(
            err.contains("producer.url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_zero_count_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 0

[producer]
url = "https://solver.example/solve"
"#,
        );
        unsafe { remove_env("SOLVER_API_KEY") };

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("[pool] invalid pool options"), "got: {err}");
    }

    #[test]
    fn test_zero_refresh_interval_rejected_when_refreshing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 1
refresh = true
refresh_interval_secs = 0

[producer]
url = "https://solver.example/solve"
"#,
        );
        unsafe { remove_env("SOLVER_API_KEY") };

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("refresh_interval"), "got: {err}");
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("SOLVER_API_KEY") };

        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"
token_wait_timeout_secs = 0

[pool]
count = 1

[producer]
url = "https://solver.example/solve"
"#,
        );
        assert!(Config::load(&path).is_err());

        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[pool]
count = 1

[producer]
url = "https://solver.example/solve"
timeout_secs = 0
"#,
        );
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let (_dir, path) = write_config(
            r#"
[server]
listen_addr = "127.0.0.1:8080"
max_connections = 0

[pool]
count = 1

[producer]
url = "https://solver.example/solve"
"#,
        );
        unsafe { remove_env("SOLVER_API_KEY") };

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("token-pool.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }
}
