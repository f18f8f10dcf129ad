//! Raw key-value access over the TiKV gRPC API.
//!
//! Requests are routed through PD to the region leader and carry the
//! configured API version in their context, which is what gives raw mode
//! per-key TTLs (`v1ttl`, `v2`) and keyspace scoping (`v2`).

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tikv_client::proto::{errorpb, kvrpcpb, metapb, tikvpb};
use tikv_client::SecurityManager;
use tonic::transport::Channel;
use tracing::debug;

use super::keyspace::{decode_bytes, encode_bytes, KeyMode, Keyspace};
use super::pd::{PdConnection, RegionRoute};
use super::{KvEntry, ScanRange};
use crate::config::{ApiVersion, ClientConfig};
use crate::error::{Error, Result};

type StoreClient = tikvpb::tikv_client::TikvClient<Channel>;

/// Attempts per request before a region error is returned to the caller.
const MAX_REGION_ATTEMPTS: u32 = 4;
const REGION_BACKOFF: Duration = Duration::from_millis(100);

pub fn proto_api_version(version: ApiVersion) -> kvrpcpb::ApiVersion {
    match version {
        ApiVersion::V1 => kvrpcpb::ApiVersion::V1,
        ApiVersion::V1Ttl => kvrpcpb::ApiVersion::V1ttl,
        ApiVersion::V2 => kvrpcpb::ApiVersion::V2,
    }
}

/// Request context addressing the leader of `route`.
fn request_context(route: &RegionRoute, api_version: kvrpcpb::ApiVersion) -> kvrpcpb::Context {
    kvrpcpb::Context {
        region_id: route.region.id,
        region_epoch: route.region.region_epoch.clone(),
        peer: Some(route.leader.clone()),
        api_version: api_version as i32,
        ..Default::default()
    }
}

/// End key for a scan request inside one region; empty means unbounded.
fn clip_end(end: &[u8], region_end: &[u8]) -> Vec<u8> {
    match (end.is_empty(), region_end.is_empty()) {
        (true, _) => region_end.to_vec(),
        (false, true) => end.to_vec(),
        (false, false) => end.min(region_end).to_vec(),
    }
}

/// Whether a scan that just covered a region ending at `region_end` is done.
fn scan_exhausted(end: &[u8], region_end: &[u8]) -> bool {
    region_end.is_empty() || (!end.is_empty() && region_end >= end)
}

fn region_error_message(error: &errorpb::Error) -> String {
    if error.message.is_empty() {
        format!("{:?}", error)
    } else {
        error.message.clone()
    }
}

fn check_error(error: String) -> Result<()> {
    if error.is_empty() {
        Ok(())
    } else {
        Err(Error::Server(error))
    }
}

pub struct RawKvClient {
    pd: PdConnection,
    security: SecurityManager,
    stores: Mutex<HashMap<u64, StoreClient>>,
    api_version: kvrpcpb::ApiVersion,
    keyspace: Option<Keyspace>,
    timeout: Duration,
}

impl RawKvClient {
    pub async fn connect(config: &ClientConfig, security: SecurityManager) -> Result<Self> {
        let pd =
            PdConnection::connect(&config.pd_endpoints(), &security, config.request_timeout)
                .await?;
        let keyspace = pd
            .resolve_keyspace(config.keyspace_ref(), KeyMode::Raw)
            .await?;
        debug!(
            cluster_id = pd.cluster_id(),
            keyspace = ?keyspace.map(|k| k.id()),
            "Raw client ready"
        );

        Ok(Self {
            pd,
            security,
            stores: Mutex::new(HashMap::new()),
            api_version: proto_api_version(config.api_version),
            keyspace,
            timeout: config.request_timeout,
        })
    }

    fn encode_key(&self, key: &[u8]) -> Vec<u8> {
        match &self.keyspace {
            Some(keyspace) => keyspace.encode_key(key),
            None => key.to_vec(),
        }
    }

    fn decode_key(&self, key: Vec<u8>) -> Result<Vec<u8>> {
        match &self.keyspace {
            Some(keyspace) => keyspace.decode_key(key),
            None => Ok(key),
        }
    }

    /// PD keeps memcomparable region boundaries on API v2 clusters.
    fn encoded_regions(&self) -> bool {
        self.api_version == kvrpcpb::ApiVersion::V2
    }

    fn region_end(&self, region: &metapb::Region) -> Result<Vec<u8>> {
        if region.end_key.is_empty() || !self.encoded_regions() {
            Ok(region.end_key.clone())
        } else {
            decode_bytes(&region.end_key)
        }
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);
        request
    }

    async fn store(&self, store_id: u64) -> Result<StoreClient> {
        let cached = self.stores.lock().get(&store_id).cloned();
        if let Some(client) = cached {
            return Ok(client);
        }
        let address = self.pd.store_address(store_id).await?;
        let client = self.security.connect(&address, StoreClient::new).await?;
        debug!(store_id, address = %address, "Connected to store");
        self.stores.lock().insert(store_id, client.clone());
        Ok(client)
    }

    /// Region leader for an already encoded key.
    async fn locate(&self, key: &[u8]) -> Result<(RegionRoute, StoreClient)> {
        let region_key = if self.encoded_regions() {
            encode_bytes(key)
        } else {
            key.to_vec()
        };
        let route = self.pd.region(region_key).await?;
        let store = self.store(route.leader.store_id).await?;
        Ok((route, store))
    }

    async fn on_region_error(
        &self,
        attempt: u32,
        route: &RegionRoute,
        error: errorpb::Error,
    ) -> Result<()> {
        let message = region_error_message(&error);
        if attempt >= MAX_REGION_ATTEMPTS {
            return Err(Error::Region(message));
        }
        if error.store_not_match.is_some() {
            self.stores.lock().remove(&route.leader.store_id);
        }
        debug!(region = route.region.id, attempt, error = %message, "Retrying after region error");
        tokio::time::sleep(REGION_BACKOFF * attempt).await;
        Ok(())
    }

    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = self.encode_key(key);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (route, mut store) = self.locate(&key).await?;
            let response = store
                .raw_get(self.request(kvrpcpb::RawGetRequest {
                    context: Some(request_context(&route, self.api_version)),
                    key: key.clone(),
                    ..Default::default()
                }))
                .await?
                .into_inner();
            if let Some(error) = response.region_error {
                self.on_region_error(attempt, &route, error).await?;
                continue;
            }
            check_error(response.error)?;
            return Ok((!response.not_found).then_some(response.value));
        }
    }

    /// Store `value`; a zero `ttl_secs` writes without expiry.
    pub async fn put(&self, key: &[u8], value: &[u8], ttl_secs: u64) -> Result<()> {
        let key = self.encode_key(key);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (route, mut store) = self.locate(&key).await?;
            let response = store
                .raw_put(self.request(kvrpcpb::RawPutRequest {
                    context: Some(request_context(&route, self.api_version)),
                    key: key.clone(),
                    value: value.to_vec(),
                    ttl: ttl_secs,
                    ..Default::default()
                }))
                .await?
                .into_inner();
            if let Some(error) = response.region_error {
                self.on_region_error(attempt, &route, error).await?;
                continue;
            }
            return check_error(response.error);
        }
    }

    pub async fn delete(&self, key: &[u8]) -> Result<()> {
        let key = self.encode_key(key);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (route, mut store) = self.locate(&key).await?;
            let response = store
                .raw_delete(self.request(kvrpcpb::RawDeleteRequest {
                    context: Some(request_context(&route, self.api_version)),
                    key: key.clone(),
                    ..Default::default()
                }))
                .await?
                .into_inner();
            if let Some(error) = response.region_error {
                self.on_region_error(attempt, &route, error).await?;
                continue;
            }
            return check_error(response.error);
        }
    }

    /// Remaining lifetime in seconds, `None` for a missing key and zero for a
    /// key without expiry.
    pub async fn ttl_secs(&self, key: &[u8]) -> Result<Option<u64>> {
        let key = self.encode_key(key);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (route, mut store) = self.locate(&key).await?;
            let response = store
                .raw_get_key_ttl(self.request(kvrpcpb::RawGetKeyTtlRequest {
                    context: Some(request_context(&route, self.api_version)),
                    key: key.clone(),
                    ..Default::default()
                }))
                .await?
                .into_inner();
            if let Some(error) = response.region_error {
                self.on_region_error(attempt, &route, error).await?;
                continue;
            }
            check_error(response.error)?;
            return Ok((!response.not_found).then_some(response.ttl));
        }
    }

    /// Scan region by region until `limit` entries or the end of `range`.
    pub async fn scan(&self, range: ScanRange, limit: u32) -> Result<Vec<KvEntry>> {
        let (mut cursor, end) = match &self.keyspace {
            Some(keyspace) => keyspace.encode_range(&range.start, &range.end),
            None => (range.start, range.end),
        };
        if !end.is_empty() && cursor >= end {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut attempt = 0;
        while entries.len() < limit as usize {
            attempt += 1;
            let (route, mut store) = self.locate(&cursor).await?;
            let region_end = self.region_end(&route.region)?;
            let response = store
                .raw_scan(self.request(kvrpcpb::RawScanRequest {
                    context: Some(request_context(&route, self.api_version)),
                    start_key: cursor.clone(),
                    end_key: clip_end(&end, &region_end),
                    limit: limit - entries.len() as u32,
                    ..Default::default()
                }))
                .await?
                .into_inner();
            if let Some(error) = response.region_error {
                self.on_region_error(attempt, &route, error).await?;
                continue;
            }
            attempt = 0;

            for pair in response.kvs {
                if let Some(error) = pair.error {
                    return Err(Error::Server(format!("{:?}", error)));
                }
                entries.push(KvEntry::new(self.decode_key(pair.key)?, pair.value));
            }
            if scan_exhausted(&end, &region_end) {
                break;
            }
            cursor = region_end;
        }

        entries.truncate(limit as usize);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> RegionRoute {
        RegionRoute {
            region: metapb::Region {
                id: 9,
                region_epoch: Some(metapb::RegionEpoch {
                    conf_ver: 2,
                    version: 5,
                }),
                ..Default::default()
            },
            leader: metapb::Peer {
                id: 11,
                store_id: 3,
                role: 0,
            },
        }
    }

    #[test]
    fn test_proto_api_version() {
        assert_eq!(proto_api_version(ApiVersion::V1), kvrpcpb::ApiVersion::V1);
        assert_eq!(proto_api_version(ApiVersion::V1Ttl), kvrpcpb::ApiVersion::V1ttl);
        assert_eq!(proto_api_version(ApiVersion::V2), kvrpcpb::ApiVersion::V2);
    }

    #[test]
    fn test_request_context_targets_leader() {
        let context = request_context(&route(), kvrpcpb::ApiVersion::V2);
        assert_eq!(context.region_id, 9);
        assert_eq!(context.region_epoch.unwrap().version, 5);
        assert_eq!(context.peer.unwrap().store_id, 3);
        assert_eq!(context.api_version, kvrpcpb::ApiVersion::V2 as i32);
    }

    #[test]
    fn test_clip_end() {
        assert_eq!(clip_end(b"", b""), b"");
        assert_eq!(clip_end(b"", b"m"), b"m");
        assert_eq!(clip_end(b"z", b""), b"z");
        assert_eq!(clip_end(b"z", b"m"), b"m");
        assert_eq!(clip_end(b"c", b"m"), b"c");
    }

    #[test]
    fn test_scan_exhausted() {
        assert!(scan_exhausted(b"z", b""));
        assert!(scan_exhausted(b"", b""));
        assert!(scan_exhausted(b"m", b"m"));
        assert!(scan_exhausted(b"c", b"m"));
        assert!(!scan_exhausted(b"z", b"m"));
        assert!(!scan_exhausted(b"", b"m"));
    }

    #[test]
    fn test_check_error() {
        assert!(check_error(String::new()).is_ok());
        assert_eq!(
            check_error("TTL is not enabled".to_string())
                .unwrap_err()
                .to_string(),
            "TiKV error: TTL is not enabled"
        );
    }

    #[test]
    fn test_region_error_message() {
        let error = errorpb::Error {
            message: "epoch not match".to_string(),
            ..Default::default()
        };
        assert_eq!(region_error_message(&error), "epoch not match");
        assert!(region_error_message(&errorpb::Error::default()).contains("Error"));
    }
}
