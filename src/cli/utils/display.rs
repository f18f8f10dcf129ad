//! Display and output utilities for CLI commands
//!
//! Provides formatting and output helpers for consistent CLI presentation.
//! Supports both text and JSON output formats. Everything is written to a
//! caller supplied writer so the interactive shell and tests can capture it.

use std::io::{self, Write};
use std::str::FromStr;
use std::time::Duration;

/// How values are rendered in text output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueFormat {
    #[default]
    Text,
    Hex,
}

impl FromStr for ValueFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ValueFormat::Text),
            "hex" => Ok(ValueFormat::Hex),
            _ => Err(format!("Invalid value format: {}. Use 'text' or 'hex'.", s)),
        }
    }
}

/// Encode binary data as hex string
pub fn hex_encode(data: &[u8]) -> String {
    use std::fmt::Write;
    data.iter().fold(String::new(), |mut output, b| {
        let _ = write!(output, "{:02x}", b);
        output
    })
}

/// Format value based on output format
pub fn format_value(value: &[u8], format: ValueFormat) -> String {
    match format {
        ValueFormat::Hex => hex_encode(value),
        // Fallback to hex if not valid UTF-8
        ValueFormat::Text => match std::str::from_utf8(value) {
            Ok(s) => s.to_string(),
            Err(_) => format!("<binary: {}>", hex_encode(value)),
        },
    }
}

/// Format a key-value pair for display
pub fn format_kv(key: &[u8], value: &[u8], format: ValueFormat) -> (String, String) {
    let key_str = String::from_utf8_lossy(key).to_string();
    (key_str, format_value(value, format))
}

/// Value as a JSON string: UTF-8 text, or `hex:` prefixed bytes
pub fn json_value(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(s) => s.to_string(),
        Err(_) => format!("hex:{}", hex_encode(value)),
    }
}

/// Format a TTL the way durations usually read on a terminal, e.g. `1h2m3s`.
/// Sub-second remainders are dropped.
pub fn format_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Message printed for a key that is not in the store
pub fn not_exist_message(key: &str) -> String {
    format!("key [{}] not exist", key)
}

/// Write success message
pub fn write_success(out: &mut dyn Write, message: &str) -> io::Result<()> {
    writeln!(out, "[OK] {}", message)
}

// ============================================================================
// JSON Output Support
// ============================================================================

/// JSON output builder for structured CLI output
#[derive(Debug, Clone, Default)]
pub struct JsonOutput {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl JsonOutput {
    /// Create a new JSON output builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string field
    pub fn add_str(&mut self, key: &str, value: &str) -> &mut Self {
        self.fields
            .insert(key.to_string(), serde_json::Value::String(value.to_string()));
        self
    }

    /// Add an unsigned integer field
    pub fn add_uint(&mut self, key: &str, value: u64) -> &mut Self {
        self.fields.insert(
            key.to_string(),
            serde_json::Value::Number(serde_json::Number::from(value)),
        );
        self
    }

    /// Add a boolean field
    pub fn add_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.fields
            .insert(key.to_string(), serde_json::Value::Bool(value));
        self
    }

    /// Add an array of key-value pairs
    pub fn add_kv_array(&mut self, key: &str, pairs: &[(String, String)]) -> &mut Self {
        let array: Vec<serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| serde_json::json!({ "key": k, "value": v }))
            .collect();
        self.fields
            .insert(key.to_string(), serde_json::Value::Array(array));
        self
    }

    /// Set the status field (common for all responses)
    pub fn status(&mut self, success: bool) -> &mut Self {
        self.add_str("status", if success { "success" } else { "error" })
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.fields).unwrap_or_else(|_| "{}".to_string())
    }

    /// Write JSON output followed by a newline
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.to_json())
    }
}

/// Create a success JSON response
pub fn json_success() -> JsonOutput {
    let mut output = JsonOutput::new();
    output.status(true);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[]), "");
        assert_eq!(hex_encode(&[0x00]), "00");
        assert_eq!(hex_encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }

    #[test]
    fn test_format_kv_utf8() {
        let (key, value) = format_kv(b"test_key", b"test_value", ValueFormat::Text);
        assert_eq!(key, "test_key");
        assert_eq!(value, "test_value");
    }

    #[test]
    fn test_format_kv_binary() {
        let (key, value) = format_kv(b"key", &[0x80, 0x81, 0x82], ValueFormat::Text);
        assert_eq!(key, "key");
        assert!(value.contains("binary"));
        assert!(value.contains("808182"));
    }

    #[test]
    fn test_format_value_hex() {
        assert_eq!(format_value(&[0xca, 0xfe], ValueFormat::Hex), "cafe");
        assert_eq!(format_value(b"hello", ValueFormat::Text), "hello");
    }

    #[test]
    fn test_value_format_parse() {
        assert_eq!("HEX".parse::<ValueFormat>().unwrap(), ValueFormat::Hex);
        assert!("base64".parse::<ValueFormat>().is_err());
    }

    #[test]
    fn test_json_value_binary() {
        assert_eq!(json_value(b"plain"), "plain");
        assert_eq!(json_value(&[0xff, 0x00]), "hex:ff00");
    }

    #[test]
    fn test_format_ttl() {
        assert_eq!(format_ttl(Duration::ZERO), "0s");
        assert_eq!(format_ttl(Duration::from_millis(1500)), "1s");
        assert_eq!(format_ttl(Duration::from_secs(59)), "59s");
        assert_eq!(format_ttl(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_ttl(Duration::from_secs(7205)), "2h0m5s");
    }

    #[test]
    fn test_write_success() {
        let mut buf = Vec::new();
        write_success(&mut buf, "Stored key: a").unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "[OK] Stored key: a\n");
    }

    // JSON output tests
    #[test]
    fn test_json_output_basic() {
        let mut output = JsonOutput::new();
        output.add_str("key", "value");
        output.add_uint("count", 42);
        output.add_bool("enabled", true);

        let json = output.to_json();
        assert!(json.contains("\"key\": \"value\""));
        assert!(json.contains("\"count\": 42"));
        assert!(json.contains("\"enabled\": true"));
    }

    #[test]
    fn test_json_output_status() {
        let json = json_success().to_json();
        assert!(json.contains("\"status\": \"success\""));

        let mut output = JsonOutput::new();
        output.status(false);
        assert!(output.to_json().contains("\"status\": \"error\""));
    }

    #[test]
    fn test_json_kv_array() {
        let mut output = JsonOutput::new();
        output.add_kv_array("entries", &[("a".to_string(), "1".to_string())]);
        let parsed: serde_json::Value = serde_json::from_str(&output.to_json()).unwrap();
        assert_eq!(parsed["entries"][0]["key"], "a");
        assert_eq!(parsed["entries"][0]["value"], "1");
    }

    fn parse_ttl(text: &str) -> u64 {
        let mut total = 0;
        let mut digits = String::new();
        for c in text.chars() {
            match c {
                '0'..='9' => digits.push(c),
                unit => {
                    let n: u64 = digits.parse().unwrap();
                    digits.clear();
                    total += n * match unit {
                        'h' => 3600,
                        'm' => 60,
                        _ => 1,
                    };
                }
            }
        }
        total
    }

    proptest! {
        #[test]
        fn prop_format_ttl_keeps_whole_seconds(secs in 0u64..1_000_000, millis in 0u32..1000) {
            let ttl = Duration::from_secs(secs) + Duration::from_millis(millis as u64);
            let text = format_ttl(ttl);
            prop_assert!(text.ends_with('s'));
            prop_assert_eq!(parse_ttl(&text), secs);
        }
    }
}
