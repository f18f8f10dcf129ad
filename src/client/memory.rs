//! In-process ordered store implementing [`KvClient`].
//!
//! Keeps the same observable semantics as a cluster for the operations the
//! CLI issues, which makes it the test double for the command layer.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{check_ttl_support, KvClient, KvEntry, ScanRange};
use crate::config::{ApiVersion, Mode};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug)]
pub struct MemoryClient {
    mode: Mode,
    api_version: ApiVersion,
    data: Mutex<BTreeMap<Vec<u8>, StoredValue>>,
    closed: AtomicBool,
}

impl MemoryClient {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            api_version: ApiVersion::default(),
            data: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Behave like a cluster running `api_version`.
    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.lock().values().filter(|v| v.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

#[async_trait]
impl KvClient for MemoryClient {
    fn mode(&self) -> Mode {
        self.mode
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        Ok(self
            .data
            .lock()
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.value.clone()))
    }

    async fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        if ttl.is_some() {
            check_ttl_support(self.mode, self.api_version, "put with ttl")?;
        }
        let stored = StoredValue {
            value: value.to_vec(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.data.lock().insert(key.to_vec(), stored);
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<()> {
        self.data.lock().remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &[u8]) -> Result<Duration> {
        check_ttl_support(self.mode, self.api_version, "ttl")?;
        let now = Instant::now();
        let data = self.data.lock();
        match data.get(key).filter(|v| v.is_live(now)) {
            Some(StoredValue {
                expires_at: Some(at),
                ..
            }) => Ok(at.saturating_duration_since(now)),
            Some(_) => Ok(Duration::ZERO),
            None => Err(Error::not_found(key)),
        }
    }

    async fn scan(&self, range: ScanRange, limit: u32) -> Result<Vec<KvEntry>> {
        let now = Instant::now();
        let upper = if range.is_unbounded() {
            Bound::Unbounded
        } else {
            Bound::Excluded(range.end.clone())
        };
        if !range.is_unbounded() && range.start >= range.end {
            return Ok(Vec::new());
        }

        let data = self.data.lock();
        Ok(data
            .range((Bound::Included(range.start.clone()), upper))
            .filter(|(_, v)| v.is_live(now))
            .take(limit as usize)
            .map(|(k, v)| KvEntry::new(k.clone(), v.value.clone()))
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
