//! Backend over a live TiKV cluster.
//!
//! Raw mode goes through [`RawKvClient`]. Transactional mode uses the
//! `tikv-client` transaction API, and on API v2 keys are scoped to the
//! keyspace prefix here before they reach it.

use std::time::Duration;

use async_trait::async_trait;
use tikv_client::codec::{ApiV1TxnCodec, ApiV2TxnCodec, Codec};
use tikv_client::{
    BoundRange, Key, KvPair, SecurityManager, TransactionClient, TransactionOptions,
};
use tracing::{debug, warn};

use super::keyspace::{KeyMode, Keyspace, DEFAULT_KEYSPACE_ID};
use super::pd::PdConnection;
use super::rawkv::RawKvClient;
use super::{check_ttl_support, KvClient, KvEntry, ScanRange};
use crate::config::{ApiVersion, ClientConfig, KeyspaceRef, Mode};
use crate::error::{Error, Result};

enum Backend {
    Raw(RawKvClient),
    Txn(TxnBackend<ApiV1TxnCodec>),
    TxnV2(TxnBackend<ApiV2TxnCodec>),
}

pub struct TikvClient {
    backend: Backend,
    api_version: ApiVersion,
}

fn security_manager(config: &ClientConfig) -> Result<SecurityManager> {
    match &config.security {
        Some(security) => Ok(SecurityManager::load(
            &security.ca_path,
            &security.cert_path,
            security.key_path.clone(),
        )?),
        None => Ok(SecurityManager::default()),
    }
}

impl TikvClient {
    /// Connect to PD without a deadline. Prefer [`super::connect`].
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let security = security_manager(config)?;

        let backend = match config.mode {
            Mode::Raw => Backend::Raw(RawKvClient::connect(config, security).await?),
            Mode::Txn => Self::connect_txn(config, &security).await?,
        };

        Ok(Self {
            backend,
            api_version: config.api_version,
        })
    }

    async fn connect_txn(config: &ClientConfig, security: &SecurityManager) -> Result<Backend> {
        let endpoints = config.pd_endpoints();
        let tikv_config = config.to_tikv_config();

        let keyspace = match config.keyspace_ref() {
            KeyspaceRef::Unscoped => {
                let client = TransactionClient::new_with_config(endpoints, tikv_config).await?;
                return Ok(Backend::Txn(TxnBackend {
                    client,
                    keyspace: None,
                }));
            }
            KeyspaceRef::Default => Keyspace::new(DEFAULT_KEYSPACE_ID, KeyMode::Txn)?,
            KeyspaceRef::Named(name) => {
                let pd = PdConnection::connect(&endpoints, security, config.request_timeout)
                    .await?;
                Keyspace::new(pd.load_keyspace(name).await?, KeyMode::Txn)?
            }
        };

        debug!(keyspace = keyspace.id(), "Transactional client scoped to keyspace");
        let codec = ApiV2TxnCodec::new(keyspace.id());
        let client = TransactionClient::new_with_codec(endpoints, tikv_config, codec).await?;
        Ok(Backend::TxnV2(TxnBackend {
            client,
            keyspace: Some(keyspace),
        }))
    }
}

fn to_bound_range(start: Vec<u8>, end: Vec<u8>) -> BoundRange {
    let start = Key::from(start);
    if end.is_empty() {
        (start..).into()
    } else {
        (start..Key::from(end)).into()
    }
}

fn to_entry(pair: KvPair) -> KvEntry {
    let (key, value) = pair.into();
    KvEntry {
        key: key.into(),
        value,
    }
}

struct TxnBackend<Cod: Codec> {
    client: TransactionClient<Cod>,
    keyspace: Option<Keyspace>,
}

impl<Cod: Codec> TxnBackend<Cod> {
    fn encode_key(&self, key: &[u8]) -> Vec<u8> {
        match &self.keyspace {
            Some(keyspace) => keyspace.encode_key(key),
            None => key.to_vec(),
        }
    }

    fn encode_range(&self, range: ScanRange) -> (Vec<u8>, Vec<u8>) {
        match &self.keyspace {
            Some(keyspace) => keyspace.encode_range(&range.start, &range.end),
            None => (range.start, range.end),
        }
    }

    fn decode_entry(&self, pair: KvPair) -> Result<KvEntry> {
        let mut entry = to_entry(pair);
        if let Some(keyspace) = &self.keyspace {
            entry.key = keyspace.decode_key(entry.key)?;
        }
        Ok(entry)
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let timestamp = self.client.current_timestamp().await?;
        let mut snapshot = self
            .client
            .snapshot(timestamp, TransactionOptions::new_optimistic());
        Ok(snapshot.get(self.encode_key(key)).await?)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut txn = self.client.begin_optimistic().await?;
        if let Err(e) = txn.put(self.encode_key(key), value.to_vec()).await {
            if let Err(rollback) = txn.rollback().await {
                warn!(error = %rollback, "Rollback after failed put failed");
            }
            return Err(e.into());
        }
        let commit_ts = txn.commit().await?;
        debug!(commit_ts = ?commit_ts, "Committed put");
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        let mut txn = self.client.begin_optimistic().await?;
        if let Err(e) = txn.delete(self.encode_key(key)).await {
            if let Err(rollback) = txn.rollback().await {
                warn!(error = %rollback, "Rollback after failed delete failed");
            }
            return Err(e.into());
        }
        let commit_ts = txn.commit().await?;
        debug!(commit_ts = ?commit_ts, "Committed delete");
        Ok(())
    }

    async fn scan(&self, range: ScanRange, limit: u32) -> Result<Vec<KvEntry>> {
        let (start, end) = self.encode_range(range);
        if !end.is_empty() && start >= end {
            return Ok(Vec::new());
        }
        let timestamp = self.client.current_timestamp().await?;
        let mut snapshot = self
            .client
            .snapshot(timestamp, TransactionOptions::new_optimistic());
        let entries = snapshot
            .scan(to_bound_range(start, end), limit)
            .await?
            .map(|pair| self.decode_entry(pair))
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }
}

#[async_trait]
impl KvClient for TikvClient {
    fn mode(&self) -> Mode {
        match self.backend {
            Backend::Raw(_) => Mode::Raw,
            Backend::Txn(_) | Backend::TxnV2(_) => Mode::Txn,
        }
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match &self.backend {
            Backend::Raw(client) => client.get(key).await,
            Backend::Txn(txn) => txn.get(key).await,
            Backend::TxnV2(txn) => txn.get(key).await,
        }
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        if ttl.is_some() {
            check_ttl_support(self.mode(), self.api_version, "put with ttl")?;
        }

        match &self.backend {
            Backend::Raw(client) => {
                let ttl_secs = ttl.map_or(0, |ttl| ttl.as_secs());
                client.put(key, value, ttl_secs).await
            }
            Backend::Txn(txn) => txn.put(key, value).await,
            Backend::TxnV2(txn) => txn.put(key, value).await,
        }
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        match &self.backend {
            Backend::Raw(client) => client.delete(key).await,
            Backend::Txn(txn) => txn.delete(key).await,
            Backend::TxnV2(txn) => txn.delete(key).await,
        }
    }

    async fn ttl(&self, key: &[u8]) -> Result<Duration> {
        check_ttl_support(self.mode(), self.api_version, "ttl")?;
        let Backend::Raw(client) = &self.backend else {
            return Err(Error::Unsupported {
                operation: "ttl",
                mode: Mode::Txn,
            });
        };
        client
            .ttl_secs(key)
            .await?
            .map(Duration::from_secs)
            .ok_or_else(|| Error::not_found(key))
    }

    async fn scan(&self, range: ScanRange, limit: u32) -> Result<Vec<KvEntry>> {
        match &self.backend {
            Backend::Raw(client) => client.scan(range, limit).await,
            Backend::Txn(txn) => txn.scan(range, limit).await,
            Backend::TxnV2(txn) => txn.scan(range, limit).await,
        }
    }

    async fn close(&self) -> Result<()> {
        // gRPC channels close when the client is dropped.
        debug!(mode = %self.mode(), "Closing client");
        Ok(())
    }
}
