use std::path::{Path, PathBuf};
use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};

use crate::error::{CheckError, Result};

// ─── Instance configuration ──────────────────────────────────────

/// Connection parameters and collection options for one monitored instance.
///
/// Owned by the caller and handed to the collector per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Connect over this unix socket instead of `host:port`.
    #[serde(default)]
    pub unix_socket_path: Option<String>,

    /// Logical database, selected with `SELECT` once authenticated.
    #[serde(default)]
    pub db: i64,

    /// ACL user. Ignored unless `password` is set.
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Seconds allowed for the connect and for each command.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout: f64,

    /// Extra tags attached to every sample.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Key names or glob patterns whose length is reported.
    #[serde(default)]
    pub keys: Vec<String>,

    #[serde(default = "default_true")]
    pub warn_on_missing_keys: bool,

    /// Entries fetched with `SLOWLOG GET`; 0 turns slowlog collection off.
    #[serde(default = "default_slowlog_max_len", rename = "slowlog-max-len")]
    pub slowlog_max_len: usize,

    #[serde(default)]
    pub command_stats: bool,

    /// Requires permission to run `CLIENT LIST`.
    #[serde(default)]
    pub collect_client_metrics: bool,
}

fn default_host() -> String {
    "localhost".into()
}
fn default_port() -> u16 {
    6379
}
fn default_socket_timeout() -> f64 {
    5.0
}
fn default_true() -> bool {
    true
}
fn default_slowlog_max_len() -> usize {
    128
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            unix_socket_path: None,
            db: 0,
            username: None,
            password: None,
            socket_timeout: default_socket_timeout(),
            tags: Vec::new(),
            keys: Vec::new(),
            warn_on_missing_keys: true,
            slowlog_max_len: default_slowlog_max_len(),
            command_stats: false,
            collect_client_metrics: false,
        }
    }
}

/// How the collector authenticates, decided by which fields are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials<'a> {
    /// `AUTH <password>` against the default user.
    Password(&'a str),
    /// `AUTH <username> <password>` (Redis 6+ ACL).
    Acl { username: &'a str, password: &'a str },
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// `None` when no password, or an empty one, is configured: the
    /// connection then stays unauthenticated and the server decides.
    pub fn credentials(&self) -> Option<Credentials<'_>> {
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        match self.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => Some(Credentials::Acl { username, password }),
            None => Some(Credentials::Password(password)),
        }
    }

    /// Falls back to the default for values `validate` rejects.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.socket_timeout)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_socket_timeout()))
    }

    /// Where to connect, as db 0 and without credentials. AUTH and SELECT
    /// are sent by the collector so their replies can be classified.
    pub fn connection_info(&self) -> ConnectionInfo {
        let addr = match &self.unix_socket_path {
            Some(path) => ConnectionAddr::Unix(PathBuf::from(path)),
            None => ConnectionAddr::Tcp(self.host_name().to_owned(), self.port),
        };
        ConnectionInfo {
            addr,
            redis: RedisConnectionInfo::default(),
        }
    }

    /// `host` with IPv6 brackets removed (`[::1]` → `::1`).
    fn host_name(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Tags identifying the instance on every sample.
    pub fn instance_tags(&self) -> Vec<String> {
        let mut tags = match &self.unix_socket_path {
            Some(path) => vec![format!("unix_socket_path:{path}")],
            None => vec![
                format!("redis_host:{}", self.host),
                format!("redis_port:{}", self.port),
            ],
        };
        tags.extend(self.tags.iter().cloned());
        tags
    }

    pub fn validate(&self) -> Result<()> {
        if self.unix_socket_path.is_none() {
            if self.host.trim().is_empty() {
                return Err(CheckError::Config("host must not be empty".into()));
            }
            if self.port == 0 {
                return Err(CheckError::Config("port must be between 1 and 65535".into()));
            }
        }
        let timeout = Duration::try_from_secs_f64(self.socket_timeout);
        if self.socket_timeout <= 0.0 || timeout.is_err() {
            return Err(CheckError::Config(format!(
                "socket_timeout must be a positive number of seconds, got {}",
                self.socket_timeout
            )));
        }
        if self.db < 0 {
            return Err(CheckError::Config("db must not be negative".into()));
        }
        Ok(())
    }
}

// ─── Config file ─────────────────────────────────────────────────

/// Top-level config file: `{"instances": [ ... ]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(default)]
    pub instances: Vec<ConnectionParams>,
}

impl CheckConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| CheckError::Config(format!("cannot parse config: {e}")))?;
        for instance in &config.instances {
            instance.validate()?;
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CheckError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}
