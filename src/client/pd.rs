//! Minimal PD access: cluster id, region routing, store addresses and
//! keyspace metadata.

use std::time::Duration;

use tikv_client::proto::{metapb, pdpb};
use tikv_client::SecurityManager;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tracing::{debug, warn};

use super::keyspace::{KeyMode, Keyspace, DEFAULT_KEYSPACE_ID};
use crate::config::KeyspaceRef;
use crate::error::{Error, Result};

type PdRpcClient = pdpb::pd_client::PdClient<Channel>;

const LOAD_KEYSPACE_PATH: &str = "/keyspacepb.Keyspace/LoadKeyspace";
const KEYSPACE_ENABLED: i32 = 0;

#[derive(Clone, PartialEq, prost::Message)]
struct LoadKeyspaceRequest {
    #[prost(message, optional, tag = "1")]
    header: Option<pdpb::RequestHeader>,
    #[prost(string, tag = "2")]
    name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct LoadKeyspaceResponse {
    #[prost(message, optional, tag = "1")]
    header: Option<pdpb::ResponseHeader>,
    #[prost(message, optional, tag = "2")]
    keyspace: Option<KeyspaceMeta>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct KeyspaceMeta {
    #[prost(uint32, tag = "1")]
    id: u32,
    #[prost(string, tag = "2")]
    name: String,
    #[prost(int32, tag = "3")]
    state: i32,
}

/// A region and the peer that currently leads it.
#[derive(Debug, Clone)]
pub struct RegionRoute {
    pub region: metapb::Region,
    pub leader: metapb::Peer,
}

/// Connection to the PD leader.
pub struct PdConnection {
    channel: Channel,
    cluster_id: u64,
    timeout: Duration,
}

impl PdConnection {
    /// Try each endpoint in turn and settle on the PD leader.
    pub async fn connect(
        endpoints: &[String],
        security: &SecurityManager,
        timeout: Duration,
    ) -> Result<Self> {
        let mut last_error = None;

        for endpoint in endpoints {
            match Self::connect_member(endpoint, security, timeout).await {
                Ok((conn, leader_url)) => {
                    let Some(url) = leader_url.filter(|url| !url.ends_with(endpoint.as_str()))
                    else {
                        return Ok(conn);
                    };
                    debug!(endpoint = %endpoint, leader = %url, "Switching to PD leader");
                    return match Self::connect_member(&url, security, timeout).await {
                        Ok((leader, _)) => Ok(leader),
                        Err(e) => {
                            warn!(leader = %url, error = %e, "PD leader unreachable, staying on follower");
                            Ok(conn)
                        }
                    };
                }
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "PD endpoint unavailable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Config("no PD endpoints given".to_string())))
    }

    async fn connect_member(
        endpoint: &str,
        security: &SecurityManager,
        timeout: Duration,
    ) -> Result<(Self, Option<String>)> {
        let channel = security.connect(endpoint, |channel| channel).await?;
        let mut client = PdRpcClient::new(channel.clone());

        let mut request = tonic::Request::new(pdpb::GetMembersRequest { header: None });
        request.set_timeout(timeout);
        let members = client.get_members(request).await?.into_inner();
        let header = check_header(members.header)?;

        let leader_url = members
            .leader
            .and_then(|leader| leader.client_urls.into_iter().next());
        let conn = Self {
            channel,
            cluster_id: header.cluster_id,
            timeout,
        };
        Ok((conn, leader_url))
    }

    pub fn cluster_id(&self) -> u64 {
        self.cluster_id
    }

    fn client(&self) -> PdRpcClient {
        PdRpcClient::new(self.channel.clone())
    }

    fn header(&self) -> Option<pdpb::RequestHeader> {
        Some(pdpb::RequestHeader {
            cluster_id: self.cluster_id,
            sender_id: 0,
        })
    }

    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);
        request
    }

    /// Region containing `region_key`, which must already be in the form PD
    /// stores boundaries in.
    pub async fn region(&self, region_key: Vec<u8>) -> Result<RegionRoute> {
        let response = self
            .client()
            .get_region(self.request(pdpb::GetRegionRequest {
                header: self.header(),
                region_key,
            }))
            .await?
            .into_inner();
        check_header(response.header)?;

        let region = response
            .region
            .ok_or_else(|| Error::Region("PD returned no region".to_string()))?;
        let leader = response
            .leader
            .or_else(|| region.peers.first().cloned())
            .ok_or_else(|| Error::Region(format!("region {} has no peers", region.id)))?;
        Ok(RegionRoute { region, leader })
    }

    pub async fn store_address(&self, store_id: u64) -> Result<String> {
        let response = self
            .client()
            .get_store(self.request(pdpb::GetStoreRequest {
                header: self.header(),
                store_id,
            }))
            .await?
            .into_inner();
        check_header(response.header)?;

        response
            .store
            .map(|store| store.address)
            .filter(|address| !address.is_empty())
            .ok_or_else(|| Error::Pd(format!("store {} not found", store_id)))
    }

    /// Look up an enabled keyspace by name.
    pub async fn load_keyspace(&self, name: &str) -> Result<u32> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready().await.map_err(|e| {
            tonic::Status::new(tonic::Code::Unknown, format!("Service was not ready: {}", e))
        })?;

        let codec: ProstCodec<LoadKeyspaceRequest, LoadKeyspaceResponse> = ProstCodec::default();
        let request = self.request(LoadKeyspaceRequest {
            header: self.header(),
            name: name.to_string(),
        });
        let response = grpc
            .unary(request, PathAndQuery::from_static(LOAD_KEYSPACE_PATH), codec)
            .await?
            .into_inner();
        check_header(response.header)?;

        let meta = response
            .keyspace
            .ok_or_else(|| Error::Config(format!("keyspace {} not found", name)))?;
        if meta.state != KEYSPACE_ENABLED {
            return Err(Error::Config(format!("keyspace {} is not enabled", meta.name)));
        }
        debug!(keyspace = %meta.name, id = meta.id, "Loaded keyspace");
        Ok(meta.id)
    }

    /// Resolve the keyspace a client of `mode` should address.
    pub async fn resolve_keyspace(
        &self,
        keyspace: KeyspaceRef<'_>,
        mode: KeyMode,
    ) -> Result<Option<Keyspace>> {
        match keyspace {
            KeyspaceRef::Unscoped => Ok(None),
            KeyspaceRef::Default => Keyspace::new(DEFAULT_KEYSPACE_ID, mode).map(Some),
            KeyspaceRef::Named(name) => {
                let id = self.load_keyspace(name).await?;
                Keyspace::new(id, mode).map(Some)
            }
        }
    }
}

fn check_header(header: Option<pdpb::ResponseHeader>) -> Result<pdpb::ResponseHeader> {
    let header = header.unwrap_or_default();
    match &header.error {
        Some(error) if error.r#type != pdpb::ErrorType::Ok as i32 => {
            Err(Error::Pd(error.message.clone()))
        }
        _ => Ok(header),
    }
}
