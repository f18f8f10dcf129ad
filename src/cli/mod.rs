//! tikv-cli command-line interface
//!
//! Parses the global connection flags, builds one client for the whole
//! invocation and dispatches to a subcommand, or to the interactive shell
//! when no subcommand is given.
//!
//! # Output Formats
//!
//! - `text` (default): Human-readable output
//! - `json`: Machine-readable JSON output for scripting and automation
//!
//! Use the `--output` or `-o` flag to specify the format.
//! Use `--quiet` or `-q` to suppress informational messages.
//!
//! Errors always go to stderr as text and the process exits with status 1.

pub mod commands;
pub mod utils;

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, warn};

use crate::client::{self, KvClient};
use crate::config::{ApiVersion, ClientConfig, Mode, SecurityConfig};
use crate::logging;
use crate::repl;
use utils::{exit_codes, parse_positive_u64, CliError, CliResult};

pub const BIN_NAME: &str = "tikv-cli";

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}. Use 'text' or 'json'.", s)),
        }
    }
}

/// Global CLI options that apply to all commands
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub debug: bool,
}

impl GlobalOptions {
    /// Extract global options from argument matches
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let output_format = matches
            .get_one::<String>("output")
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default();

        GlobalOptions {
            output_format,
            quiet: matches.get_flag("quiet"),
            debug: matches.get_flag("debug"),
        }
    }

    /// Check if output should be JSON
    pub fn is_json(&self) -> bool {
        self.output_format == OutputFormat::Json
    }
}

/// Collect the connection flags into a [`ClientConfig`]
pub fn client_config_from_matches(matches: &ArgMatches) -> CliResult<ClientConfig> {
    let defaults = ClientConfig::default();

    let host = matches
        .get_one::<String>("host")
        .cloned()
        .unwrap_or(defaults.host);
    let port = match matches.get_one::<String>("port") {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| format!("port must be a number between 1 and 65535, got '{}'", port))?,
        None => defaults.port,
    };
    let mode = match matches.get_one::<String>("mode") {
        Some(mode) => mode.parse::<Mode>()?,
        None => defaults.mode,
    };
    let api_version = match matches.get_one::<String>("api-version") {
        Some(version) => version.parse::<ApiVersion>()?,
        None => defaults.api_version,
    };
    let keyspace = matches
        .get_one::<String>("keyspace")
        .filter(|k| !k.is_empty())
        .cloned();
    let request_timeout = match matches.get_one::<String>("timeout") {
        Some(secs) => Duration::from_secs(parse_positive_u64(secs, "timeout")?),
        None => defaults.request_timeout,
    };
    let connect_timeout = match matches.get_one::<String>("connect-timeout") {
        Some(secs) => Duration::from_secs(parse_positive_u64(secs, "connect-timeout")?),
        None => defaults.connect_timeout,
    };

    let tls = (
        matches.get_one::<String>("ca-path"),
        matches.get_one::<String>("cert-path"),
        matches.get_one::<String>("key-path"),
    );
    let security = match tls {
        (Some(ca), Some(cert), Some(key)) => Some(SecurityConfig {
            ca_path: PathBuf::from(ca),
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None, None) => None,
        _ => {
            return Err("--ca-path, --cert-path and --key-path must be given together".into());
        }
    };

    Ok(ClientConfig {
        host,
        port,
        mode,
        keyspace,
        api_version,
        request_timeout,
        connect_timeout,
        security,
    })
}

fn global_arg(id: &'static str) -> Arg {
    Arg::new(id).long(id).global(true)
}

/// Build the CLI command structure
pub fn build_cli() -> Command {
    Command::new(BIN_NAME)
        .about("Interact with TiKV cluster through PD")
        .long_about(
            "A CLI for TiKV cluster through PD. \
             You can enter the interactive shell by root command.",
        )
        // -h is the host flag, so help is long-only
        .disable_help_flag(true)
        .disable_help_subcommand(true)
        .arg(
            global_arg("help")
                .help("Help for tikv-cli")
                .action(ArgAction::Help),
        )
        .arg(
            global_arg("host")
                .help("PD host address")
                .short('h')
                .default_value(crate::config::DEFAULT_HOST),
        )
        .arg(
            global_arg("port")
                .help("PD port")
                .short('p')
                .default_value("2379"),
        )
        .arg(
            global_arg("mode")
                .help("Client mode. raw/txn")
                .short('m')
                .value_parser(["raw", "txn"])
                .default_value("txn"),
        )
        .arg(
            global_arg("keyspace")
                .help("Tikv keyspace, default is empty")
                .short('k')
                .default_value(""),
        )
        .arg(
            global_arg("api-version")
                .help("API version. v1/v1ttl/v2")
                .short('a')
                .value_parser(["v1", "v1ttl", "v2"])
                .default_value("v2"),
        )
        .arg(
            global_arg("debug")
                .help("Enable logging in the TiKV client library")
                .action(ArgAction::SetTrue),
        )
        .arg(
            global_arg("timeout")
                .help("Request timeout in seconds")
                .value_name("SECONDS")
                .default_value("2"),
        )
        .arg(
            global_arg("connect-timeout")
                .help("Give up connecting to PD after this many seconds")
                .value_name("SECONDS")
                .default_value("10"),
        )
        .arg(global_arg("ca-path").help("CA certificate for TLS").value_name("PATH"))
        .arg(global_arg("cert-path").help("Client certificate for TLS").value_name("PATH"))
        .arg(global_arg("key-path").help("Client key for TLS").value_name("PATH"))
        .arg(
            global_arg("output")
                .help("Output format: text (default) or json")
                .short('o')
                .value_parser(["text", "json"])
                .default_value("text"),
        )
        .arg(
            global_arg("quiet")
                .help("Suppress informational output (errors still shown)")
                .short('q')
                .action(ArgAction::SetTrue),
        )
        .subcommands(subcommands())
}

/// Subcommands shared by the root command and the interactive shell
pub fn subcommands() -> Vec<Command> {
    vec![
        commands::version::version_command(),
        commands::kv::put_command(),
        commands::kv::get_command(),
        commands::kv::delete_command(),
        commands::kv::ttl_command(),
        commands::kv::scan_command(),
    ]
    .into_iter()
    .map(|cmd| cmd.disable_help_flag(true))
    .collect()
}

/// Dispatch to appropriate command handler
pub async fn execute(
    matches: &ArgMatches,
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
) -> CliResult<()> {
    match matches.subcommand() {
        Some(("get", sub)) => commands::kv::run_get(sub, client, global, out).await,
        Some(("put", sub)) => commands::kv::run_put(sub, client, global, out).await,
        Some(("delete", sub)) => commands::kv::run_delete(sub, client, global, out).await,
        Some(("ttl", sub)) => commands::kv::run_ttl(sub, client, global, out).await,
        Some(("scan", sub)) => commands::kv::run_scan(sub, client, global, out).await,
        Some(("version", _)) => commands::version::run_version(global, out),
        Some((name, _)) => Err(format!("unknown command: {}", name).into()),
        None => Err("no command given. Use --help for available commands.".into()),
    }
}

/// Run the whole program for `args` and return the process exit status.
///
/// The client is closed on every path once it has been built.
pub async fn run<I, T>(args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match build_cli().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = write!(out, "{}", e.render());
                    exit_codes::SUCCESS
                }
                _ => {
                    let _ = write!(err, "{}", e.render());
                    exit_codes::FAILURE
                }
            };
            return code;
        }
    };

    let global = GlobalOptions::from_matches(&matches);
    logging::init_logging(global.debug);

    // version does not need a cluster
    if let Some(("version", _)) = matches.subcommand() {
        return report(commands::version::run_version(&global, out), err);
    }

    let config = match client_config_from_matches(&matches) {
        Ok(config) => config,
        Err(e) => return report(Err(e), err),
    };
    match serde_json::to_string(&config) {
        Ok(json) => debug!(config = %json, "Resolved client configuration"),
        Err(e) => warn!(error = %e, "Could not serialize client configuration"),
    }

    let client = match client::connect(&config).await {
        Ok(client) => client,
        Err(e) => return report(Err(CliError::Connect(e)), err),
    };

    let result = if matches.subcommand().is_some() {
        execute(&matches, client.as_ref(), &global, out).await
    } else {
        repl::run_shell(client.as_ref(), &global, out, err).await
    };

    if let Err(e) = client.close().await {
        warn!(error = %e, "Failed to close client");
    }

    report(result, err)
}

fn report(result: CliResult<()>, err: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            debug!(category = e.category(), "Command failed");
            let _ = writeln!(err, "{}", e);
            e.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        build_cli().try_get_matches_from(args).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let matches = parse(&["tikv-cli", "get", "k"]);
        let config = client_config_from_matches(&matches).unwrap();
        assert_eq!(config, ClientConfig::default());

        let global = GlobalOptions::from_matches(&matches);
        assert!(!global.is_json());
        assert!(!global.quiet);
        assert!(!global.debug);
    }

    #[test]
    fn test_short_flags() {
        let matches = parse(&[
            "tikv-cli", "-h", "pd.local", "-p", "2381", "-m", "raw", "-k", "tenant", "-a", "v2",
            "get", "k",
        ]);
        let config = client_config_from_matches(&matches).unwrap();
        assert_eq!(config.host, "pd.local");
        assert_eq!(config.port, 2381);
        assert_eq!(config.mode, Mode::Raw);
        assert_eq!(config.keyspace.as_deref(), Some("tenant"));
        assert_eq!(config.api_version, ApiVersion::V2);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = parse(&["tikv-cli", "get", "k", "--mode", "raw", "--debug", "-o", "json"]);
        let config = client_config_from_matches(&matches).unwrap();
        assert_eq!(config.mode, Mode::Raw);
        let global = GlobalOptions::from_matches(&matches);
        assert!(global.debug);
        assert!(global.is_json());
    }

    #[test]
    fn test_invalid_port() {
        let matches = parse(&["tikv-cli", "-p", "port", "get", "k"]);
        assert!(matches!(
            client_config_from_matches(&matches),
            Err(CliError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_mode_is_usage_error() {
        assert!(build_cli()
            .try_get_matches_from(["tikv-cli", "-m", "kv", "get", "k"])
            .is_err());
    }

    #[test]
    fn test_partial_tls_flags_rejected() {
        let matches = parse(&["tikv-cli", "--ca-path", "ca.pem", "get", "k"]);
        assert!(client_config_from_matches(&matches).is_err());

        let matches = parse(&[
            "tikv-cli",
            "--ca-path",
            "ca.pem",
            "--cert-path",
            "client.pem",
            "--key-path",
            "client-key.pem",
            "get",
            "k",
        ]);
        let config = client_config_from_matches(&matches).unwrap();
        assert_eq!(
            config.security.unwrap().ca_path,
            PathBuf::from("ca.pem")
        );
    }

    #[test]
    fn test_timeouts() {
        let matches = parse(&["tikv-cli", "--timeout", "5", "--connect-timeout", "1", "get", "k"]);
        let config = client_config_from_matches(&matches).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_root_without_subcommand_is_allowed() {
        let matches = parse(&["tikv-cli"]);
        assert!(matches.subcommand().is_none());
    }
}
