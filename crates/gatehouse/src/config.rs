//! Process configuration, read once from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use gatehouse_gate::GateConfig;
use gatehouse_snapshot::{BackupSchedule, SnapshotLayout, MAX_SNAPSHOTS};
use gatehouse_store::{RemoteError, WebDavConfig};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::warn;

pub const DEFAULT_AUTH_PASS: &str = "password";
pub const DEFAULT_BACKUP_PATH: &str = "gatehouse_backup";
pub const DEFAULT_LISTEN: &str = "0.0.0.0:7860";
pub const DEFAULT_BACKEND_ADDR: &str = "127.0.0.1:5244";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_BACKEND_ARGS: &str = "server";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is set but blank")]
    Blank { key: &'static str },

    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid WEBDAV_URL: {0}")]
    Remote(#[from] RemoteError),

    #[error("BACKEND_BIN {} does not exist or is not a file", path.display())]
    BackendMissing { path: PathBuf },
}

/// Remote target settings; present only when `WEBDAV_URL` is set.
#[derive(Debug)]
pub struct RemoteSettings {
    pub url: String,
    pub username: String,
    pub password: SecretString,
}

/// Everything the process reads from its environment.
#[derive(Debug)]
pub struct GatehouseConfig {
    pub auth_pass: SecretString,
    /// `AUTH_PASS` was unset and the well-known default is in use.
    pub auth_pass_is_default: bool,
    pub remote: Option<RemoteSettings>,
    pub backup_path: String,
    pub sync_interval: Duration,
    pub warmup: Duration,
    pub remote_timeout: Duration,
    pub listen: SocketAddr,
    pub backend_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub backend_bin: Option<PathBuf>,
    pub backend_args: Vec<String>,
}

impl GatehouseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset,
    /// except for `AUTH_PASS`, where a blank secret is refused.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let (auth_pass, auth_pass_is_default) = match lookup("AUTH_PASS") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::Blank { key: "AUTH_PASS" })
            }
            Some(raw) => (raw.trim().to_string(), false),
            None => {
                warn!("AUTH_PASS not set, using the default secret; set it before exposing the gate");
                (DEFAULT_AUTH_PASS.to_string(), true)
            }
        };

        let remote = match get("WEBDAV_URL") {
            Some(url) => {
                WebDavConfig::new(&url)?;
                Some(RemoteSettings {
                    url,
                    username: get("WEBDAV_USERNAME").unwrap_or_default(),
                    password: SecretString::from(get("WEBDAV_PASSWORD").unwrap_or_default()),
                })
            }
            None => None,
        };

        Ok(Self {
            auth_pass: SecretString::from(auth_pass),
            auth_pass_is_default,
            remote,
            backup_path: get("WEBDAV_BACKUP_PATH").unwrap_or_else(|| DEFAULT_BACKUP_PATH.into()),
            sync_interval: seconds(&get, "SYNC_INTERVAL", 600)?,
            warmup: seconds(&get, "BACKUP_WARMUP", 60)?,
            remote_timeout: positive_seconds(&get, "REMOTE_TIMEOUT", 300)?,
            listen: addr(&get, "GATE_LISTEN", DEFAULT_LISTEN)?,
            backend_addr: addr(&get, "BACKEND_ADDR", DEFAULT_BACKEND_ADDR)?,
            data_dir: get("DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.into())
                .into(),
            backend_bin: get("BACKEND_BIN").map(PathBuf::from),
            backend_args: get("BACKEND_ARGS")
                .unwrap_or_else(|| DEFAULT_BACKEND_ARGS.into())
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig::new(self.auth_pass.expose_secret(), self.backend_addr)
    }

    /// `None` when backups are disabled.
    pub fn webdav_config(&self) -> Result<Option<WebDavConfig>, RemoteError> {
        let Some(remote) = &self.remote else {
            return Ok(None);
        };
        let config = WebDavConfig::new(&remote.url)?
            .credentials(remote.username.as_str(), remote.password.expose_secret())
            .timeout(self.remote_timeout);
        Ok(Some(config))
    }

    pub fn snapshot_layout(&self) -> SnapshotLayout {
        SnapshotLayout::new(self.backup_path.as_str(), self.data_dir.as_path())
    }

    pub fn backup_schedule(&self) -> BackupSchedule {
        BackupSchedule::new()
            .warmup(self.warmup)
            .interval(self.sync_interval)
    }

    /// Effective configuration with every secret redacted.
    pub fn summary(&self) -> serde_json::Value {
        let gate = self.gate_config();
        let schedule = self.backup_schedule();
        let remote = self.remote.as_ref().map(|r| {
            let password = if r.password.expose_secret().is_empty() {
                "<unset>"
            } else {
                "<redacted>"
            };
            json!({
                "url": redact_url(&r.url),
                "username": r.username,
                "password": password,
            })
        });
        json!({
            "listen": self.listen,
            "auth_pass_is_default": self.auth_pass_is_default,
            "gate": gate.summary(),
            "backup": {
                "enabled": remote.is_some(),
                "remote": remote,
                "remote_dir": self.snapshot_layout().remote_dir(),
                "state_dir": self.data_dir.display().to_string(),
                "interval_secs": schedule.interval_duration().as_secs(),
                "warmup_secs": schedule.warmup_duration().as_secs(),
                "remote_timeout_secs": self.remote_timeout.as_secs(),
                "max_snapshots": MAX_SNAPSHOTS,
            },
            "backend_bin": self.backend_bin.as_ref().map(|p| p.display().to_string()),
            "backend_args": self.backend_args,
        })
    }
}

fn seconds<G>(get: &G, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(Duration::from_secs(default)),
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                key,
                value,
                reason: e.to_string(),
            }),
    }
}

/// Like [`seconds`], but zero is refused.
fn positive_seconds<G>(get: &G, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = seconds(get, key, default)?;
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            key,
            value: "0".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    Ok(value)
}

fn addr<G>(get: &G, key: &'static str, default: &str) -> Result<SocketAddr, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = get(key).unwrap_or_else(|| default.to_string());
    value.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

/// Drop any password embedded in the URL itself.
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("redacted"));
            }
            url.to_string()
        }
        Err(_) => raw.to_string(),
    }
}
