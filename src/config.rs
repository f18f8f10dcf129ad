//! Connection settings for reaching a TiKV cluster through PD.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 2379;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which TiKV API the client talks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Raw,
    #[default]
    Txn,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(Mode::Raw),
            "txn" => Ok(Mode::Txn),
            _ => Err(format!("Invalid mode: {}. Use 'raw' or 'txn'.", s)),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Raw => write!(f, "raw"),
            Mode::Txn => write!(f, "txn"),
        }
    }
}

/// Storage API version enabled on the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ApiVersion {
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "v1ttl")]
    V1Ttl,
    #[default]
    #[serde(rename = "v2")]
    V2,
}

impl ApiVersion {
    /// `v1` clusters store raw values without a lifetime.
    pub fn supports_ttl(self) -> bool {
        !matches!(self, ApiVersion::V1)
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v1" => Ok(ApiVersion::V1),
            "v1ttl" => Ok(ApiVersion::V1Ttl),
            "v2" => Ok(ApiVersion::V2),
            _ => Err(format!(
                "Invalid API version: {}. Use 'v1', 'v1ttl' or 'v2'.",
                s
            )),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::V1 => write!(f, "v1"),
            ApiVersion::V1Ttl => write!(f, "v1ttl"),
            ApiVersion::V2 => write!(f, "v2"),
        }
    }
}

/// Certificate locations for a TLS secured cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityConfig {
    pub ca_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientConfig {
    /// PD host, or a comma separated list of hosts
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    /// Keyspace name, only meaningful with API v2
    pub keyspace: Option<String>,
    pub api_version: ApiVersion,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub security: Option<SecurityConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            mode: Mode::default(),
            keyspace: None,
            api_version: ApiVersion::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            security: None,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.split(',').all(|h| h.trim().is_empty()) {
            return Err(Error::Config("host cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be between 1 and 65535".to_string()));
        }
        if self.keyspace.is_some() && self.api_version != ApiVersion::V2 {
            return Err(Error::Config(format!(
                "keyspace requires API version v2, got {}",
                self.api_version
            )));
        }
        if self.request_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(Error::Config("timeouts must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// PD endpoints in `host:port` form.
    ///
    /// Entries that already name a port keep it.
    pub fn pd_endpoints(&self) -> Vec<String> {
        self.host
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| {
                if has_port(h) {
                    h.to_string()
                } else {
                    format!("{}:{}", h, self.port)
                }
            })
            .collect()
    }

    pub fn to_tikv_config(&self) -> tikv_client::Config {
        let mut config = tikv_client::Config::default().with_timeout(self.request_timeout);

        if let Some(security) = &self.security {
            config = config.with_security(
                security.ca_path.clone(),
                security.cert_path.clone(),
                security.key_path.clone(),
            );
        }

        config
    }

    /// How keys are scoped on the cluster: API v2 always addresses a
    /// keyspace, the default one when no name is given.
    pub fn keyspace_ref(&self) -> KeyspaceRef<'_> {
        match (self.api_version, self.keyspace.as_deref()) {
            (ApiVersion::V2, Some(name)) => KeyspaceRef::Named(name),
            (ApiVersion::V2, None) => KeyspaceRef::Default,
            _ => KeyspaceRef::Unscoped,
        }
    }
}

/// Keyspace addressing derived from `--keyspace` and `--api-version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyspaceRef<'a> {
    /// API v1/v1ttl: keys are used as given
    Unscoped,
    /// API v2 without a name
    Default,
    Named(&'a str),
}

fn has_port(host: &str) -> bool {
    // Bracketed IPv6 literals carry the port after the closing bracket.
    let tail = match host.rfind(']') {
        Some(idx) => &host[idx + 1..],
        None if host.matches(':').count() > 1 => return false,
        None => host,
    };
    tail.rsplit_once(':')
        .map(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}
