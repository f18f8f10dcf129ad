//! CLI command modules
//!
//! - kv: Key-value operations (get, put, delete, ttl, scan)
//! - version: Build information

pub mod kv;
pub mod version;
