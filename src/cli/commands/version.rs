//! Build information command

use std::io::Write;

use clap::Command;

use crate::cli::utils::{json_success, CliResult};
use crate::cli::GlobalOptions;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const RUSTC_VERSION: &str = env!("RUSTC_VERSION");

/// Build the 'version' subcommand
pub fn version_command() -> Command {
    Command::new("version").about("Print version information")
}

/// Execute the 'version' command; never touches the cluster
pub fn run_version(global: &GlobalOptions, out: &mut dyn Write) -> CliResult<()> {
    if global.is_json() {
        let mut output = json_success();
        output.add_str("version", VERSION);
        output.add_str("git_commit", GIT_COMMIT);
        output.add_str("build_time", BUILD_TIME);
        output.add_str("rustc_version", RUSTC_VERSION);
        output.write_to(out)?;
    } else {
        writeln!(out, "{} {}", crate::cli::BIN_NAME, VERSION)?;
        writeln!(out, "Git Commit: {}", GIT_COMMIT)?;
        writeln!(out, "Build Time: {}", BUILD_TIME)?;
        writeln!(out, "Rustc: {}", RUSTC_VERSION)?;
    }
    Ok(())
}
