//! Configuration types for wis2-downloader

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// How the MQTT connection is carried
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BrokerTransport {
    /// MQTT over TLS-secured websockets (WIS2 global brokers, port 443)
    #[default]
    Wss,
    /// MQTT over TLS (port 8883)
    Tls,
    /// Plain TCP, for local brokers only
    Tcp,
}

/// Pub/sub broker connection settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct BrokerConfig {
    /// Broker hostname (e.g. "globalbroker.meteo.fr")
    #[serde(default)]
    pub host: String,

    /// Broker port (default: 443)
    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Transport used to reach the broker (default: wss)
    #[serde(default)]
    pub transport: BrokerTransport,

    /// Websocket path, only used with the wss transport (default: "/mqtt")
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Username (default: "everyone")
    #[serde(default = "default_credential")]
    pub username: String,

    /// Password (default: "everyone")
    #[serde(default = "default_credential")]
    pub password: String,

    /// MQTT client id. A random id is generated when unset.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Subscription QoS level, 0-2 (default: 0)
    #[serde(default)]
    pub qos: u8,

    /// Keep-alive interval in seconds (default: 60)
    #[serde(default = "default_keep_alive", with = "duration_serde")]
    pub keep_alive: Duration,

    /// Capacity of the client request channel (default: 64)
    #[serde(default = "default_request_capacity")]
    pub request_capacity: usize,

    /// Delay policy between failed connection attempts
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_broker_port(),
            transport: BrokerTransport::default(),
            ws_path: default_ws_path(),
            username: default_credential(),
            password: default_credential(),
            client_id: None,
            qos: 0,
            keep_alive: default_keep_alive(),
            request_capacity: default_request_capacity(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Backoff between failed event loop polls
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconnectConfig {
    /// Delay after the first failure (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Upper bound on the delay (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied after each consecutive failure (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl ReconnectConfig {
    /// Reject settings that would make the backoff shrink or overflow
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff_multiplier must be a finite number >= 1.0 (got {})",
                    self.backoff_multiplier
                ),
                key: Some("broker.reconnect.backoff_multiplier".to_string()),
            });
        }

        if self.initial_delay > self.max_delay {
            return Err(Error::Config {
                message: format!(
                    "initial_delay ({:?}) exceeds max_delay ({:?})",
                    self.initial_delay, self.max_delay
                ),
                key: Some("broker.reconnect.initial_delay".to_string()),
            });
        }

        Ok(())
    }
}

/// Download behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Explicit download root. When set it must exist and be writable; it
    /// is used for unknown topics and for subscriptions added without a
    /// directory.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Directory used for topics with no subscription when no download
    /// root is configured (default: "downloads")
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: PathBuf,

    /// Number of download workers pulling from the job queue (default: 1)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Timeout applied to every retrieval (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Grace period for in-flight jobs on shutdown (default: 10 seconds)
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    pub shutdown_grace: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            fallback_dir: default_fallback_dir(),
            workers: default_workers(),
            request_timeout: default_request_timeout(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl DownloadConfig {
    /// Directory used for unmatched topics
    pub fn default_directory(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| self.fallback_dir.clone())
    }
}

/// API and external server integration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// Administrative REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Broker connection
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Path of the startup subscription list. Defaults to
    /// `subscriptions.json` next to the executable.
    #[serde(default)]
    pub subscriptions_path: Option<PathBuf>,

    /// API integration
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Load a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("invalid config file {}: {}", path.display(), e),
            key: None,
        })
    }

    /// Resolve the subscription list path
    pub fn subscriptions_path(&self) -> PathBuf {
        if let Some(path) = &self.subscriptions_path {
            return path.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(SUBSCRIPTIONS_FILE)))
            .unwrap_or_else(|| PathBuf::from(SUBSCRIPTIONS_FILE))
    }

    /// Check settings that would make the process unusable
    pub fn validate(&self) -> Result<()> {
        if self.broker.host.trim().is_empty() {
            return Err(Error::Config {
                message: "broker host is required".to_string(),
                key: Some("broker.host".to_string()),
            });
        }

        if self.broker.qos > 2 {
            return Err(Error::Config {
                message: format!("qos must be 0, 1 or 2 (got {})", self.broker.qos),
                key: Some("broker.qos".to_string()),
            });
        }

        if self.download.workers == 0 {
            return Err(Error::Config {
                message: "at least one download worker is required".to_string(),
                key: Some("download.workers".to_string()),
            });
        }

        self.broker.reconnect.validate()?;

        if let Some(dir) = &self.download.download_dir {
            check_writable_dir(dir)?;
        }

        Ok(())
    }
}

/// Default name of the startup subscription list
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

fn check_writable_dir(dir: &Path) -> Result<()> {
    let metadata = std::fs::metadata(dir).map_err(|e| Error::Config {
        message: format!(
            "download directory {} does not exist: {}",
            dir.display(),
            e
        ),
        key: Some("download.download_dir".to_string()),
    })?;

    if !metadata.is_dir() {
        return Err(Error::Config {
            message: format!("download directory {} is not a directory", dir.display()),
            key: Some("download.download_dir".to_string()),
        });
    }

    // Permission bits alone miss ownership and ACLs
    tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::Config {
        message: format!("download directory {} is not writable: {}", dir.display(), e),
        key: Some("download.download_dir".to_string()),
    })?;

    Ok(())
}

fn default_broker_port() -> u16 {
    443
}

fn default_ws_path() -> String {
    "/mqtt".to_string()
}

fn default_credential() -> String {
    "everyone".to_string()
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(60)
}

fn default_request_capacity() -> usize {
    64
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_fallback_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_workers() -> usize {
    1
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(10)
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.broker.host = "globalbroker.meteo.fr".to_string();
        config
    }

    #[test]
    fn defaults_match_global_broker_conventions() {
        let config = Config::default();
        assert_eq!(config.broker.port, 443);
        assert_eq!(config.broker.transport, BrokerTransport::Wss);
        assert_eq!(config.broker.username, "everyone");
        assert_eq!(config.broker.password, "everyone");
        assert_eq!(config.download.workers, 1);
        assert_eq!(
            config.download.default_directory(),
            PathBuf::from("downloads")
        );
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.broker.ws_path, "/mqtt");
        assert_eq!(config.download.request_timeout, Duration::from_secs(60));
        assert_eq!(config.server.api.bind_address.port(), 5000);
    }

    #[test]
    fn durations_are_read_as_seconds() {
        let config: Config = serde_json::from_str(
            r#"{"broker": {"host": "h", "transport": "tls", "keep_alive": 15},
                "download": {"request_timeout": 5, "workers": 4}}"#,
        )
        .unwrap();
        assert_eq!(config.broker.transport, BrokerTransport::Tls);
        assert_eq!(config.broker.keep_alive, Duration::from_secs(15));
        assert_eq!(config.download.request_timeout, Duration::from_secs(5));
        assert_eq!(config.download.workers, 4);
    }

    #[test]
    fn download_dir_overrides_fallback() {
        let mut config = Config::default();
        config.download.download_dir = Some(PathBuf::from("/srv/wis2"));
        assert_eq!(
            config.download.default_directory(),
            PathBuf::from("/srv/wis2")
        );
    }

    #[test]
    fn validate_requires_broker_host() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "broker.host"));
    }

    #[test]
    fn validate_rejects_bad_qos_and_zero_workers() {
        let mut config = valid_config();
        config.broker.qos = 3;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.download.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_missing_download_dir() {
        let temp = tempdir().unwrap();
        let mut config = valid_config();
        config.download.download_dir = Some(temp.path().join("does-not-exist"));

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn validate_accepts_existing_download_dir() {
        let temp = tempdir().unwrap();
        let mut config = valid_config();
        config.download.download_dir = Some(temp.path().to_path_buf());
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_backoff_that_would_shrink_or_overflow() {
        for multiplier in [0.5, -2.0, f64::NAN, f64::INFINITY] {
            let mut config = valid_config();
            config.broker.reconnect.backoff_multiplier = multiplier;
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, Error::Config { key: Some(ref k), .. } if k == "broker.reconnect.backoff_multiplier"),
                "multiplier {multiplier} should be rejected"
            );
        }

        let mut config = valid_config();
        config.broker.reconnect.initial_delay = Duration::from_secs(120);
        config.broker.reconnect.max_delay = Duration::from_secs(60);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "broker.reconnect.initial_delay"));
    }

    #[cfg(unix)]
    #[test]
    fn validate_rejects_download_dir_without_write_access() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let dir = temp.path().join("locked");
        std::fs::create_dir(&dir).unwrap();
        // Read and execute only
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Root ignores permission bits; nothing to check there
        let bypassed = std::fs::write(dir.join("write-check"), b"x").is_ok();
        if !bypassed {
            let mut config = valid_config();
            config.download.download_dir = Some(dir.clone());

            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("not writable"), "{err}");
        }

        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn validate_rejects_file_as_download_dir() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();

        let mut config = valid_config();
        config.download.download_dir = Some(file);
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reports_malformed_json() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("invalid config file"));
    }

    #[test]
    fn explicit_subscriptions_path_wins() {
        let mut config = Config::default();
        config.subscriptions_path = Some(PathBuf::from("/etc/wis2/subs.json"));
        assert_eq!(
            config.subscriptions_path(),
            PathBuf::from("/etc/wis2/subs.json")
        );
    }
}
