//! tikv-cli: a command-line client for a TiKV cluster reached through PD.
//!
//! The library holds everything except `main`: connection settings
//! ([`config`]), the store abstraction with its TiKV and in-memory
//! implementations ([`client`]), the command layer ([`cli`]) and the
//! interactive shell ([`repl`]).

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod repl;

pub use client::{connect, KvClient, KvEntry, MemoryClient, ScanRange, TikvClient};
pub use config::{ApiVersion, ClientConfig, Mode, SecurityConfig};
pub use error::{Error, Result};
