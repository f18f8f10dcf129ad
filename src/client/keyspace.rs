//! Keyspace addressing for API v2 clusters.
//!
//! Every key of an API v2 cluster starts with a four byte prefix: a mode
//! byte (`r` for raw, `x` for transactional data) followed by the 24-bit
//! keyspace id in big-endian order. Region boundaries reported by PD are
//! memcomparable encoded on such clusters.

use crate::error::{Error, Result};

/// Id of the keyspace used when API v2 is selected without a name.
pub const DEFAULT_KEYSPACE_ID: u32 = 0;

const MAX_KEYSPACE_ID: u32 = 0x00FF_FFFF;
const PREFIX_LEN: usize = 4;

const ENC_GROUP_SIZE: usize = 8;
const ENC_MARKER: u8 = 0xFF;

/// Which half of the keyspace a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Raw,
    Txn,
}

impl KeyMode {
    fn prefix_byte(self) -> u8 {
        match self {
            KeyMode::Raw => b'r',
            KeyMode::Txn => b'x',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keyspace {
    id: u32,
    mode: KeyMode,
}

impl Keyspace {
    pub fn new(id: u32, mode: KeyMode) -> Result<Self> {
        if id > MAX_KEYSPACE_ID {
            return Err(Error::Config(format!("keyspace id {} out of range", id)));
        }
        Ok(Self { id, mode })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn prefix(&self) -> [u8; PREFIX_LEN] {
        let id = self.id.to_be_bytes();
        [self.mode.prefix_byte(), id[1], id[2], id[3]]
    }

    /// First key after this keyspace; the upper bound of an unbounded scan.
    pub fn end(&self) -> Vec<u8> {
        if self.id == MAX_KEYSPACE_ID {
            vec![self.mode.prefix_byte() + 1, 0, 0, 0]
        } else {
            let id = (self.id + 1).to_be_bytes();
            vec![self.mode.prefix_byte(), id[1], id[2], id[3]]
        }
    }

    pub fn encode_key(&self, key: &[u8]) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(PREFIX_LEN + key.len());
        encoded.extend_from_slice(&self.prefix());
        encoded.extend_from_slice(key);
        encoded
    }

    pub fn decode_key(&self, mut key: Vec<u8>) -> Result<Vec<u8>> {
        if !key.starts_with(&self.prefix()) {
            return Err(Error::Server(format!(
                "key {:?} is outside keyspace {}",
                String::from_utf8_lossy(&key),
                self.id
            )));
        }
        key.drain(..PREFIX_LEN);
        Ok(key)
    }

    /// Encode a half-open range; an empty `end` stops at the keyspace end.
    pub fn encode_range(&self, start: &[u8], end: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let end = if end.is_empty() {
            self.end()
        } else {
            self.encode_key(end)
        };
        (self.encode_key(start), end)
    }
}

/// Memcomparable byte encoding: groups of eight bytes, each followed by a
/// marker saying how many bytes of the group are padding.
pub fn encode_bytes(key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity((key.len() / ENC_GROUP_SIZE + 1) * (ENC_GROUP_SIZE + 1));
    let mut chunks = key.chunks_exact(ENC_GROUP_SIZE);
    for chunk in &mut chunks {
        out.extend_from_slice(chunk);
        out.push(ENC_MARKER);
    }
    let rest = chunks.remainder();
    let pad = ENC_GROUP_SIZE - rest.len();
    out.extend_from_slice(rest);
    out.resize(out.len() + pad, 0);
    out.push(ENC_MARKER - pad as u8);
    out
}

pub fn decode_bytes(encoded: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len());
    for group in encoded.chunks(ENC_GROUP_SIZE + 1) {
        if group.len() != ENC_GROUP_SIZE + 1 {
            return Err(Error::Server("truncated memcomparable key".to_string()));
        }
        let pad = (ENC_MARKER - group[ENC_GROUP_SIZE]) as usize;
        if pad == 0 {
            out.extend_from_slice(&group[..ENC_GROUP_SIZE]);
            continue;
        }
        if pad > ENC_GROUP_SIZE {
            return Err(Error::Server("invalid memcomparable marker".to_string()));
        }
        let (data, padding) = group[..ENC_GROUP_SIZE].split_at(ENC_GROUP_SIZE - pad);
        if padding.iter().any(|&b| b != 0) {
            return Err(Error::Server("invalid memcomparable padding".to_string()));
        }
        out.extend_from_slice(data);
        return Ok(out);
    }
    Err(Error::Server("memcomparable key without terminator".to_string()))
}
