//! Interactive shell for tikv-cli
//!
//! Entered when the root command is invoked without a subcommand. Every line
//! is parsed as one subcommand and executed against the client that was
//! built from the global flags, so the connection is made once per session.
//!
//! With a terminal the shell offers line editing and persistent history;
//! with piped input it executes each line in turn (pipe mode).

pub mod parse;

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};

use crate::cli::utils::{CliError, CliResult};
use crate::cli::{self, GlobalOptions};
use crate::client::KvClient;
use parse::{build_shell_cmd, check_meta_command, tokenize, MetaCommand};

pub const PROMPT: &str = "tikv-cli> ";
pub const HISTORY_FILE: &str = ".tikv_cli_history";

/// What happened to one input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Executed,
    Failed,
    Skipped,
    Quit,
}

/// Run the shell on stdin, interactive when stdin is a terminal.
pub async fn run_shell(
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> CliResult<()> {
    if io::stdin().is_terminal() {
        run_interactive(client, global, out, err, history_file()).await
    } else {
        let stdin = io::stdin();
        let failed = run_pipe(stdin.lock(), client, global, out, err).await;
        if failed > 0 {
            return Err(CliError::Shell { failed });
        }
        Ok(())
    }
}

/// Interactive mode: prompt, meta commands, history.
pub async fn run_interactive(
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
    err: &mut dyn Write,
    history: Option<PathBuf>,
) -> CliResult<()> {
    let mut rl = DefaultEditor::new().map_err(readline_error)?;
    if let Some(path) = &history {
        if let Err(e) = rl.load_history(path) {
            debug!(path = %path.display(), error = %e, "No shell history loaded");
        }
    }

    if !global.quiet {
        writeln!(
            out,
            "Connected in {} mode. Type 'help' for commands, 'exit' to quit.",
            client.mode()
        )?;
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                if execute_line(trimmed, client, global, out, err).await == LineOutcome::Quit {
                    break;
                }
                out.flush()?;
            }
            // Ctrl-C: fresh prompt
            Err(ReadlineError::Interrupted) => continue,
            // Ctrl-D
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(readline_error(e)),
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            warn!(path = %path.display(), error = %e, "Failed to save shell history");
        }
    }
    Ok(())
}

/// Pipe mode: execute each line of `input`, skipping blanks and `#`
/// comments. Returns the number of lines that failed.
pub async fn run_pipe<R: BufRead>(
    input: R,
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> usize {
    let mut failed = 0;

    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                let _ = writeln!(err, "(error) {}", e);
                failed += 1;
                break;
            }
        };

        match execute_line(&line, client, global, out, err).await {
            LineOutcome::Quit => break,
            LineOutcome::Failed => failed += 1,
            LineOutcome::Executed | LineOutcome::Skipped => {}
        }
    }

    failed
}

/// Execute one shell line. Errors are written to `err`.
pub async fn execute_line(
    line: &str,
    client: &dyn KvClient,
    global: &GlobalOptions,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return LineOutcome::Skipped;
    }

    if let Some(meta) = check_meta_command(trimmed) {
        return match meta {
            MetaCommand::Quit => LineOutcome::Quit,
            MetaCommand::Clear => {
                // ANSI clear screen
                let _ = write!(out, "\x1B[2J\x1B[1;1H");
                LineOutcome::Executed
            }
            MetaCommand::Help { command } => write_help(command.as_deref(), out, err),
        };
    }

    let tokens = match tokenize(trimmed) {
        Some(tokens) if !tokens.is_empty() => tokens,
        Some(_) => return LineOutcome::Skipped,
        None => {
            let _ = writeln!(err, "(error) Invalid quoting: {}", trimmed);
            return LineOutcome::Failed;
        }
    };

    let matches = match build_shell_cmd().try_get_matches_from(tokens) {
        Ok(matches) => matches,
        Err(e) => {
            let _ = write!(err, "{}", e.render());
            return LineOutcome::Failed;
        }
    };

    match cli::execute(&matches, client, global, out).await {
        Ok(()) => LineOutcome::Executed,
        Err(e) => {
            let _ = writeln!(err, "{}", e);
            LineOutcome::Failed
        }
    }
}

fn write_help(command: Option<&str>, out: &mut dyn Write, err: &mut dyn Write) -> LineOutcome {
    let mut shell = build_shell_cmd();
    let written = match command {
        Some(name) => match shell.find_subcommand_mut(name) {
            Some(sub) => write!(out, "{}", sub.render_help()),
            None => {
                let _ = writeln!(err, "(error) Unknown command: {}", name);
                return LineOutcome::Failed;
            }
        },
        None => write!(out, "{}", shell.render_help()).and_then(|_| {
            writeln!(
                out,
                "\nShell commands:\n  help [COMMAND]  Show help\n  clear           Clear the screen\n  exit            Leave the shell"
            )
        }),
    };
    match written {
        Ok(()) => LineOutcome::Executed,
        Err(_) => LineOutcome::Failed,
    }
}

fn history_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE))
}

fn readline_error(e: ReadlineError) -> CliError {
    match e {
        ReadlineError::Io(e) => CliError::Io(e),
        other => CliError::Io(io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::config::Mode;
    use std::io::Cursor;

    async fn line(client: &MemoryClient, input: &str) -> (LineOutcome, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let outcome = execute_line(input, client, &GlobalOptions::default(), &mut out, &mut err).await;
        (
            outcome,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_execute_line_put_get() {
        let client = MemoryClient::default();
        let (outcome, _, _) = line(&client, "put greeting 'hello world'").await;
        assert_eq!(outcome, LineOutcome::Executed);

        let (outcome, out, _) = line(&client, "get greeting").await;
        assert_eq!(outcome, LineOutcome::Executed);
        assert_eq!(out, "hello world\n");
    }

    #[tokio::test]
    async fn test_execute_line_error_goes_to_stderr() {
        let client = MemoryClient::default();
        let (outcome, out, err) = line(&client, "get missing").await;
        assert_eq!(outcome, LineOutcome::Failed);
        assert!(out.is_empty());
        assert_eq!(err, "get: key [missing] not exist\n");
    }

    #[tokio::test]
    async fn test_execute_line_meta_and_comments() {
        let client = MemoryClient::default();
        assert_eq!(line(&client, "   ").await.0, LineOutcome::Skipped);
        assert_eq!(line(&client, "# comment").await.0, LineOutcome::Skipped);
        assert_eq!(line(&client, "quit").await.0, LineOutcome::Quit);

        let (outcome, out, _) = line(&client, "help").await;
        assert_eq!(outcome, LineOutcome::Executed);
        assert!(out.contains("scan"));
        assert!(out.contains("exit"));

        let (outcome, out, _) = line(&client, "help ttl").await;
        assert_eq!(outcome, LineOutcome::Executed);
        assert!(out.contains("TTL"));

        assert_eq!(line(&client, "help nothing").await.0, LineOutcome::Failed);
    }

    #[tokio::test]
    async fn test_execute_line_usage_errors() {
        let client = MemoryClient::default();
        assert_eq!(line(&client, "frobnicate").await.0, LineOutcome::Failed);
        assert_eq!(line(&client, "put only-key").await.0, LineOutcome::Failed);
        assert_eq!(line(&client, "put 'open").await.0, LineOutcome::Failed);
    }

    #[tokio::test]
    async fn test_run_pipe_counts_failures_and_stops_at_quit() {
        let client = MemoryClient::new(Mode::Raw);
        let script = "\
# seed
put a 1
put b 2
get missing
scan a z
exit
put c 3
";
        let mut out = Vec::new();
        let mut err = Vec::new();
        let failed = run_pipe(
            Cursor::new(script),
            &client,
            &GlobalOptions::default(),
            &mut out,
            &mut err,
        )
        .await;

        assert_eq!(failed, 1);
        assert_eq!(client.len(), 2);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("a: 1\nb: 2\n"));
        assert!(String::from_utf8(err).unwrap().contains("not exist"));
    }
}
