//! Client handles for a TiKV cluster.
//!
//! Every command talks to the store through [`KvClient`], so the command
//! layer does not care whether the raw or the transactional API is behind
//! it, or whether it is an in-process store used by tests.

pub mod keyspace;
pub mod memory;
pub mod pd;
pub mod rawkv;
pub mod tikv;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{ApiVersion, ClientConfig, Mode};
use crate::error::{Error, Result};

pub use memory::MemoryClient;
pub use tikv::TikvClient;

/// Upper bound on entries returned by one scan.
pub const MAX_SCAN_LIMIT: u32 = 10240;

/// A key/value pair returned by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl KvEntry {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Half-open key range `[start, end)`. An empty `end` leaves the range
/// unbounded above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl ScanRange {
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.end.is_empty()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start.as_slice() && (self.is_unbounded() || key < self.end.as_slice())
    }
}

#[async_trait]
pub trait KvClient: Send + Sync {
    fn mode(&self) -> Mode;

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store `value`; with `ttl` the key expires after that long.
    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &[u8]) -> Result<()>;

    /// Remaining lifetime of `key`. Keys without expiry report zero and
    /// missing keys fail with [`Error::KeyNotFound`].
    async fn ttl(&self, key: &[u8]) -> Result<Duration>;

    /// Up to `limit` entries of `range` in ascending key order.
    async fn scan(&self, range: ScanRange, limit: u32) -> Result<Vec<KvEntry>>;

    async fn close(&self) -> Result<()>;
}

/// Per-key lifetimes exist only in raw mode on a cluster that stores them.
pub fn check_ttl_support(
    mode: Mode,
    api_version: ApiVersion,
    operation: &'static str,
) -> Result<()> {
    match mode {
        Mode::Txn => Err(Error::Unsupported { operation, mode }),
        Mode::Raw if !api_version.supports_ttl() => Err(Error::Config(format!(
            "{} requires API version v1ttl or v2, got {}",
            operation, api_version
        ))),
        Mode::Raw => Ok(()),
    }
}

/// Open a client for `config`, giving up after `config.connect_timeout`.
pub async fn connect(config: &ClientConfig) -> Result<Box<dyn KvClient>> {
    config.validate()?;

    let endpoints = config.pd_endpoints();
    debug!(
        endpoints = ?endpoints,
        mode = %config.mode,
        api_version = %config.api_version,
        keyspace = ?config.keyspace,
        "Connecting to PD"
    );

    let client = tokio::time::timeout(config.connect_timeout, TikvClient::connect(config))
        .await
        .map_err(|_| Error::Timeout(config.connect_timeout))??;

    info!(endpoints = ?endpoints, mode = %config.mode, "Connected to cluster");
    Ok(Box::new(client))
}
