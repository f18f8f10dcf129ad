//! Key-value operation commands

use std::io::Write;
use std::time::Duration;

use clap::{Arg, ArgMatches, Command};
use tracing::debug;

use crate::cli::utils::{
    format_kv, format_ttl, format_value, json_success, json_value, limits, not_exist_message,
    parse_positive_u32, parse_positive_u64, validate_key, validate_scan_limit,
    validate_scan_range, validate_value, write_success, CliError, CliResult, ValueFormat,
};
use crate::cli::GlobalOptions;
use crate::client::{KvClient, ScanRange};
use crate::error::Error;

fn required<'a>(matches: &'a ArgMatches, id: &str) -> CliResult<&'a String> {
    matches
        .get_one::<String>(id)
        .ok_or_else(|| CliError::Validation(format!("{} argument is required", id)))
}

fn value_format(matches: &ArgMatches) -> CliResult<ValueFormat> {
    match matches.get_one::<String>("format") {
        Some(format) => Ok(format.parse()?),
        None => Ok(ValueFormat::default()),
    }
}

fn key_arg() -> Arg {
    Arg::new("key").help("Key").required(true).index(1)
}

fn format_arg() -> Arg {
    Arg::new("format")
        .help("Value format (text, hex)")
        .long("format")
        .value_parser(["text", "hex"])
        .default_value("text")
}

/// Build the 'get' subcommand
pub fn get_command() -> Command {
    Command::new("get")
        .about("Get the value of a key")
        .arg(key_arg())
        .arg(format_arg())
}

/// Execute the 'get' command
pub async fn run_get(
    matches: &ArgMatches,
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
) -> CliResult<()> {
    let key = required(matches, "key")?;
    let format = value_format(matches)?;
    validate_key(key)?;

    let value = client
        .get(key.as_bytes())
        .await
        .map_err(CliError::operation("get"))?
        .ok_or_else(|| CliError::operation("get")(Error::KeyNotFound(key.clone())))?;

    if global.is_json() {
        let mut output = json_success();
        output.add_str("key", key);
        output.add_str("value", &json_value(&value));
        output.add_uint("size", value.len() as u64);
        output.write_to(out)?;
    } else {
        writeln!(out, "{}", format_value(&value, format))?;
    }
    Ok(())
}

/// Build the 'put' subcommand
pub fn put_command() -> Command {
    Command::new("put")
        .about("Put a key-value pair")
        .arg(key_arg())
        .arg(Arg::new("value").help("Value").required(true).index(2))
        .arg(
            Arg::new("ttl")
                .help("Expire the key after this many seconds (raw mode)")
                .long("ttl")
                .value_name("SECONDS"),
        )
}

/// Execute the 'put' command
pub async fn run_put(
    matches: &ArgMatches,
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
) -> CliResult<()> {
    let key = required(matches, "key")?;
    let value = required(matches, "value")?;
    let ttl = match matches.get_one::<String>("ttl") {
        Some(secs) => match parse_positive_u64(secs, "ttl")? {
            0 => return Err("ttl must be at least 1 second".into()),
            secs => Some(Duration::from_secs(secs)),
        },
        None => None,
    };

    validate_key(key)?;
    validate_value(value)?;

    client
        .put(key.as_bytes(), value.as_bytes(), ttl)
        .await
        .map_err(CliError::operation("put"))?;
    debug!(key = %key, size = value.len(), ttl = ?ttl, "Stored key");

    if global.is_json() {
        let mut output = json_success();
        output.add_str("operation", "put");
        output.add_str("key", key);
        output.add_uint("value_size", value.len() as u64);
        if let Some(ttl) = ttl {
            output.add_uint("ttl_secs", ttl.as_secs());
        }
        output.write_to(out)?;
    } else if !global.quiet {
        write_success(out, &format!("Stored key: {}", key))?;
    }
    Ok(())
}

/// Build the 'delete' subcommand
pub fn delete_command() -> Command {
    Command::new("delete").about("Delete a key").arg(key_arg())
}

/// Execute the 'delete' command
pub async fn run_delete(
    matches: &ArgMatches,
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
) -> CliResult<()> {
    let key = required(matches, "key")?;
    validate_key(key)?;

    client
        .delete(key.as_bytes())
        .await
        .map_err(CliError::operation("delete"))?;

    if global.is_json() {
        let mut output = json_success();
        output.add_str("operation", "delete");
        output.add_str("key", key);
        output.write_to(out)?;
    } else if !global.quiet {
        write_success(out, &format!("Deleted key: {}", key))?;
    }
    Ok(())
}

/// Build the 'ttl' subcommand
pub fn ttl_command() -> Command {
    Command::new("ttl").about("Get the TTL of a key").arg(key_arg())
}

/// Execute the 'ttl' command. A missing key is reported, not failed.
pub async fn run_ttl(
    matches: &ArgMatches,
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
) -> CliResult<()> {
    let key = required(matches, "key")?;
    validate_key(key)?;

    match client.ttl(key.as_bytes()).await {
        Ok(ttl) => {
            if global.is_json() {
                let mut output = json_success();
                output.add_str("key", key);
                output.add_bool("exists", true);
                output.add_uint("ttl_secs", ttl.as_secs());
                output.write_to(out)?;
            } else {
                writeln!(out, "{}", format_ttl(ttl))?;
            }
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            if global.is_json() {
                let mut output = json_success();
                output.add_str("key", key);
                output.add_bool("exists", false);
                output.write_to(out)?;
            } else {
                writeln!(out, "{}", not_exist_message(key))?;
            }
            Ok(())
        }
        Err(e) => Err(CliError::operation("ttl")(e)),
    }
}

/// Build the 'scan' subcommand
pub fn scan_command() -> Command {
    Command::new("scan")
        .about("Scan keys in range [start, end)")
        .arg(
            Arg::new("start")
                .help("Start key (inclusive)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("end")
                .help("End key (exclusive), empty for no upper bound")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("limit")
                .help("Maximum number of results (1-10240)")
                .index(3),
        )
        .arg(format_arg())
}

/// Execute the 'scan' command
pub async fn run_scan(
    matches: &ArgMatches,
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
) -> CliResult<()> {
    let start = required(matches, "start")?;
    let end = required(matches, "end")?;
    let limit = match matches.get_one::<String>("limit") {
        Some(limit) => parse_positive_u32(limit, "limit")?,
        None => limits::DEFAULT_SCAN_LIMIT,
    };
    let format = value_format(matches)?;

    validate_scan_limit(limit)?;
    validate_scan_range(start, end)?;

    let entries = client
        .scan(ScanRange::new(start.as_bytes(), end.as_bytes()), limit)
        .await
        .map_err(CliError::operation("scan"))?;

    if global.is_json() {
        let pairs: Vec<(String, String)> = entries
            .iter()
            .map(|e| {
                (
                    String::from_utf8_lossy(&e.key).to_string(),
                    json_value(&e.value),
                )
            })
            .collect();

        let mut output = json_success();
        output.add_str("operation", "scan");
        output.add_uint("count", entries.len() as u64);
        output.add_uint("limit", limit as u64);
        output.add_kv_array("entries", &pairs);
        output.write_to(out)?;
    } else {
        for entry in &entries {
            let (key_str, value_str) = format_kv(&entry.key, &entry.value, format);
            writeln!(out, "{}: {}", key_str, value_str)?;
        }
        if !global.quiet {
            writeln!(out, "\nTotal entries found: {}", entries.len())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::config::Mode;

    fn matches(cmd: Command, args: &[&str]) -> ArgMatches {
        cmd.try_get_matches_from(args).unwrap()
    }

    #[tokio::test]
    async fn test_get_hex_format() {
        let client = MemoryClient::new(Mode::Raw);
        client.put(b"k", &[0xca, 0xfe], None).await.unwrap();

        let m = matches(get_command(), &["get", "k", "--format", "hex"]);
        let mut out = Vec::new();
        run_get(&m, &client, &GlobalOptions::default(), &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "cafe\n");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_error() {
        let client = MemoryClient::default();
        let m = matches(get_command(), &["get", "nope"]);
        let mut out = Vec::new();
        let err = run_get(&m, &client, &GlobalOptions::default(), &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "get: key [nope] not exist");
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_put_rejects_zero_ttl() {
        let client = MemoryClient::new(Mode::Raw);
        let m = matches(put_command(), &["put", "k", "v", "--ttl", "0"]);
        let mut out = Vec::new();
        let err = run_put(&m, &client, &GlobalOptions::default(), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Validation(_)));
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_put_quiet() {
        let client = MemoryClient::default();
        let m = matches(put_command(), &["put", "k", "v"]);
        let global = GlobalOptions {
            quiet: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        run_put(&m, &client, &global, &mut out).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(client.get(b"k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_ttl_error_other_than_not_found_fails() {
        let client = MemoryClient::new(Mode::Txn);
        let m = matches(ttl_command(), &["ttl", "k"]);
        let mut out = Vec::new();
        let err = run_ttl(&m, &client, &GlobalOptions::default(), &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ttl: ttl is not supported in txn mode");
    }

    #[tokio::test]
    async fn test_scan_rejects_inverted_range() {
        let client = MemoryClient::default();
        let m = matches(scan_command(), &["scan", "z", "a"]);
        let mut out = Vec::new();
        let err = run_scan(&m, &client, &GlobalOptions::default(), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Validation(_)));
    }

    #[tokio::test]
    async fn test_scan_rejects_bad_limit() {
        let client = MemoryClient::default();
        for limit in ["0", "abc", "10241"] {
            let m = matches(scan_command(), &["scan", "a", "z", limit]);
            let mut out = Vec::new();
            assert!(run_scan(&m, &client, &GlobalOptions::default(), &mut out)
                .await
                .is_err());
        }
    }
}
