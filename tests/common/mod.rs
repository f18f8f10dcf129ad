#![allow(dead_code)]

use tikv_cli::cli::utils::CliResult;
use tikv_cli::cli::{self, build_cli, GlobalOptions};
use tikv_cli::{KvClient, MemoryClient, Mode};

/// Outcome of one command run against an in-memory store
pub struct CmdOutput {
    pub result: CliResult<()>,
    pub stdout: String,
}

impl CmdOutput {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> String {
        match &self.result {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        }
    }
}

pub fn raw_client() -> MemoryClient {
    MemoryClient::new(Mode::Raw)
}

pub fn txn_client() -> MemoryClient {
    MemoryClient::new(Mode::Txn)
}

/// Parse `args` like the binary does (without the program name) and execute
/// the subcommand against `client`.
pub async fn run_cmd(client: &dyn KvClient, args: &[&str]) -> CmdOutput {
    let argv = std::iter::once("tikv-cli").chain(args.iter().copied());
    let matches = build_cli()
        .try_get_matches_from(argv)
        .expect("arguments should parse");
    let global = GlobalOptions::from_matches(&matches);

    let mut out = Vec::new();
    let result = cli::execute(&matches, client, &global, &mut out).await;
    CmdOutput {
        result,
        stdout: String::from_utf8(out).expect("output is utf-8"),
    }
}

/// Seed `client` with `pairs` through the put command.
pub async fn seed(client: &dyn KvClient, pairs: &[(&str, &str)]) {
    for (key, value) in pairs {
        let output = run_cmd(client, &["-q", "put", key, value]).await;
        assert!(output.is_ok(), "seeding {} failed: {}", key, output.error());
    }
}
