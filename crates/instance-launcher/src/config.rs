//! Launcher configuration, read once from the environment at startup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Instance type polled for when `INSTANCE_TYPE_NAME` is unset.
pub const DEFAULT_INSTANCE_TYPE: &str = "gpu_1x_a6000";

/// Lambda Cloud API root.
pub const DEFAULT_BASE_URL: &str = "https://cloud.lambdalabs.com/api/v1/";

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 30;
const DEFAULT_ERROR_WAIT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PORT: u16 = 5000;

/// Raw environment layout. Field names match the variable names lowercased.
#[derive(Debug, Deserialize)]
struct EnvConfig {
    #[serde(default)]
    lambda_api_key: String,
    #[serde(default = "default_instance_type")]
    instance_type_name: String,
    #[serde(default)]
    ssh_key_name: String,
    #[serde(default)]
    check_interval_seconds: u64,
    #[serde(default)]
    error_wait_seconds: u64,
    #[serde(default)]
    request_timeout_seconds: u64,
    #[serde(default)]
    launch_timeout_seconds: u64,
    #[serde(default)]
    port: u16,
    #[serde(default = "default_base_url")]
    lambda_api_base_url: String,
    #[serde(default = "default_health_server")]
    health_server: bool,
}

fn default_instance_type() -> String {
    DEFAULT_INSTANCE_TYPE.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_health_server() -> bool {
    true
}

/// Zero means "not configured".
fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

/// Immutable launcher settings.
#[derive(Clone)]
pub struct LauncherConfig {
    /// Provider API key, sent as the basic-auth username
    pub api_key: String,
    /// Instance type to wait for (e.g. `gpu_1x_a6000`)
    pub instance_type: String,
    /// Name of the SSH key registered with the provider
    pub ssh_key: String,
    /// Sleep between polls that found no capacity
    pub check_interval: Duration,
    /// Sleep after a failed fetch or launch
    pub error_wait: Duration,
    /// Timeout for the availability fetch
    pub request_timeout: Duration,
    /// Timeout for the launch call; `None` waits for the provider's answer.
    ///
    /// A launch that times out may still have provisioned an instance, so
    /// this is unset unless configured.
    pub launch_timeout: Option<Duration>,
    /// Port for the `/health` endpoint
    pub port: u16,
    /// Provider API root
    pub base_url: String,
    /// Whether to serve `/health` at all
    pub health_server: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            instance_type: default_instance_type(),
            ssh_key: String::new(),
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            error_wait: Duration::from_secs(DEFAULT_ERROR_WAIT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            launch_timeout: None,
            port: DEFAULT_PORT,
            base_url: default_base_url(),
            health_server: true,
        }
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for LauncherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LauncherConfig")
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("instance_type", &self.instance_type)
            .field("ssh_key", &self.ssh_key)
            .field("check_interval", &self.check_interval)
            .field("error_wait", &self.error_wait)
            .field("request_timeout", &self.request_timeout)
            .field("launch_timeout", &self.launch_timeout)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("health_server", &self.health_server)
            .finish()
    }
}

impl LauncherConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Build configuration from explicit key/value pairs.
    ///
    /// Values are trimmed first. Empty values are treated as unset, and so
    /// are zero intervals and a zero port.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k, v.trim().to_string()))
            .filter(|(_, v)| !v.is_empty());
        let raw: EnvConfig =
            envy::from_iter(vars).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(Self {
            api_key: raw.lambda_api_key,
            instance_type: raw.instance_type_name,
            ssh_key: raw.ssh_key_name,
            check_interval: Duration::from_secs(or_default(
                raw.check_interval_seconds,
                DEFAULT_CHECK_INTERVAL_SECS,
            )),
            error_wait: Duration::from_secs(or_default(
                raw.error_wait_seconds,
                DEFAULT_ERROR_WAIT_SECS,
            )),
            request_timeout: Duration::from_secs(or_default(
                raw.request_timeout_seconds,
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            launch_timeout: (raw.launch_timeout_seconds > 0)
                .then(|| Duration::from_secs(raw.launch_timeout_seconds)),
            port: or_default(raw.port, DEFAULT_PORT),
            base_url: raw.lambda_api_base_url,
            health_server: raw.health_server,
        })
    }

    /// Names of settings the provider needs but that were left empty.
    ///
    /// These are not enforced; a missing key surfaces as an auth error on
    /// the first poll.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_empty() {
            missing.push("LAMBDA_API_KEY");
        }
        if self.ssh_key.is_empty() {
            missing.push("SSH_KEY_NAME");
        }
        missing
    }
}

/// Load a `.env` file into the process environment.
///
/// Variables already set in the environment win. A missing default `.env`
/// is not an error; an explicitly requested file that cannot be read is.
/// Returns the path that was loaded, if any.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(ConfigError::IoError(e.to_string())),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}
