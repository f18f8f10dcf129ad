//! Input validation utilities for CLI commands
//!
//! Provides consistent validation across all CLI commands with clear error messages.

use crate::cli::utils::CliResult;
use crate::client::MAX_SCAN_LIMIT;

/// Validation limits for CLI operations
pub mod limits {
    /// Maximum key size (64KB)
    pub const MAX_KEY_SIZE: usize = 64 * 1024;
    /// Maximum value size (8MB, the default raft entry limit)
    pub const MAX_VALUE_SIZE: usize = 8 * 1024 * 1024;
    /// Default number of entries returned by scan
    pub const DEFAULT_SCAN_LIMIT: u32 = 100;
}

/// Validate that a key is not empty and within size limits
pub fn validate_key(key: &str) -> CliResult<()> {
    if key.is_empty() {
        return Err("key cannot be empty".into());
    }
    if key.len() > limits::MAX_KEY_SIZE {
        return Err(format!(
            "key length ({} bytes) exceeds maximum ({} bytes)",
            key.len(),
            limits::MAX_KEY_SIZE
        )
        .into());
    }
    Ok(())
}

/// Validate that a value is within size limits
pub fn validate_value(value: &str) -> CliResult<()> {
    if value.len() > limits::MAX_VALUE_SIZE {
        return Err(format!(
            "value length ({} bytes) exceeds maximum ({} bytes)",
            value.len(),
            limits::MAX_VALUE_SIZE
        )
        .into());
    }
    Ok(())
}

/// Validate scan limit
pub fn validate_scan_limit(limit: u32) -> CliResult<()> {
    if limit == 0 {
        return Err("limit must be at least 1".into());
    }
    if limit > MAX_SCAN_LIMIT {
        return Err(format!("limit cannot exceed {}", MAX_SCAN_LIMIT).into());
    }
    Ok(())
}

/// Validate a scan range; an empty end means "to the last key"
pub fn validate_scan_range(start: &str, end: &str) -> CliResult<()> {
    if !end.is_empty() && start >= end {
        return Err(format!(
            "start key [{}] must sort before end key [{}]",
            start, end
        )
        .into());
    }
    Ok(())
}

/// Parse a positive u32 from string with a descriptive error
pub fn parse_positive_u32(value: &str, name: &str) -> CliResult<u32> {
    value
        .parse::<u32>()
        .map_err(|_| format!("{} must be a positive number", name).into())
}

/// Parse a positive u64 from string with a descriptive error
pub fn parse_positive_u64(value: &str, name: &str) -> CliResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| format!("{} must be a positive number", name).into())
}
