//! Application-level configuration loading.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PITCH_PULSE_CONFIG_PATH";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
const DEFAULT_MONGO_DB: &str = "pitch_pulse";

/// Which match store backend to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Process-local store; data is lost on restart.
    #[default]
    Memory,
    /// MongoDB, supervised in the background.
    Mongo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Which match store backs the service.
    pub store: StoreKind,
    /// MongoDB connection string, used with the `mongo` store.
    pub mongo_uri: String,
    /// Database name for the MongoDB store.
    pub mongo_db: String,
    /// Broker URL; the in-process bus is used when absent.
    pub redis_url: Option<String>,
    /// Interval between `ping` frames sent to each viewer.
    pub heartbeat_interval: Duration,
    /// Bound on each wait for an inbound viewer frame.
    pub receive_timeout: Duration,
    /// Consecutive receive timeouts tolerated before closing a viewer. `None` never closes.
    pub max_missed_receives: Option<u32>,
    /// Bound on every store call.
    pub store_timeout: Duration,
    /// Bound on every publish to the pub/sub transport.
    pub publish_timeout: Duration,
    /// First delay before the bridge resubscribes.
    pub bridge_initial_backoff: Duration,
    /// Cap on the bridge resubscribe delay.
    pub bridge_max_backoff: Duration,
    /// CORS allow-list; empty means permissive.
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Load the configuration from disk and apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_file(&resolve_config_path());
        config.apply_env_overrides();
        config
    }

    fn load_file(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
        {
            self.port = port;
        }
        if let Ok(uri) = env::var("MONGO_URI") {
            self.mongo_uri = uri;
            self.store = StoreKind::Mongo;
        }
        if let Ok(db) = env::var("MONGO_DB") {
            self.mongo_db = db;
        }
        if let Ok(url) = env::var("REDIS_URL") {
            self.redis_url = Some(url).filter(|url| !url.is_empty());
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    port: u16,
    store: StoreKind,
    mongo_uri: String,
    mongo_db: String,
    redis_url: Option<String>,
    heartbeat_interval_secs: u64,
    receive_timeout_secs: u64,
    max_missed_receives: Option<u32>,
    store_timeout_ms: u64,
    publish_timeout_ms: u64,
    bridge_initial_backoff_ms: u64,
    bridge_max_backoff_ms: u64,
    allowed_origins: Vec<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            store: StoreKind::Memory,
            mongo_uri: DEFAULT_MONGO_URI.into(),
            mongo_db: DEFAULT_MONGO_DB.into(),
            redis_url: None,
            heartbeat_interval_secs: 30,
            receive_timeout_secs: 60,
            max_missed_receives: None,
            store_timeout_ms: 5_000,
            publish_timeout_ms: 2_000,
            bridge_initial_backoff_ms: 500,
            bridge_max_backoff_ms: 10_000,
            allowed_origins: Vec::new(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let bridge_initial_backoff = Duration::from_millis(value.bridge_initial_backoff_ms.max(1));
        Self {
            port: value.port,
            store: value.store,
            mongo_uri: value.mongo_uri,
            mongo_db: value.mongo_db,
            redis_url: value.redis_url.filter(|url| !url.is_empty()),
            heartbeat_interval: Duration::from_secs(value.heartbeat_interval_secs.max(1)),
            receive_timeout: Duration::from_secs(value.receive_timeout_secs.max(1)),
            max_missed_receives: value.max_missed_receives.filter(|max| *max > 0),
            store_timeout: Duration::from_millis(value.store_timeout_ms.max(1)),
            publish_timeout: Duration::from_millis(value.publish_timeout_ms.max(1)),
            bridge_initial_backoff,
            bridge_max_backoff: Duration::from_millis(value.bridge_max_backoff_ms)
                .max(bridge_initial_backoff),
            allowed_origins: value.allowed_origins,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
