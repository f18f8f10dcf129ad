//! Shell line parsing.

use clap::Command;

use crate::cli;

/// Commands handled by the shell itself rather than the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    Quit,
    Clear,
    Help { command: Option<String> },
}

pub fn check_meta_command(line: &str) -> Option<MetaCommand> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;

    match cmd {
        "quit" | "exit" | "\\q" => Some(MetaCommand::Quit),
        "clear" | "\\c" => Some(MetaCommand::Clear),
        "help" | "\\?" => Some(MetaCommand::Help {
            command: parts.next().map(str::to_string),
        }),
        _ => None,
    }
}

/// Split a line into arguments, honouring shell quoting.
///
/// Returns `None` for unbalanced quotes.
pub fn tokenize(line: &str) -> Option<Vec<String>> {
    shlex::split(line)
}

/// Command tree accepted inside the shell: the subcommands without the
/// connection flags, which are fixed for the session.
pub fn build_shell_cmd() -> Command {
    Command::new(cli::BIN_NAME)
        .no_binary_name(true)
        .subcommand_required(true)
        .disable_help_flag(true)
        .disable_help_subcommand(true)
        .subcommands(cli::subcommands())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_meta_commands() {
        assert_eq!(check_meta_command("exit"), Some(MetaCommand::Quit));
        assert_eq!(check_meta_command("  \\q  "), Some(MetaCommand::Quit));
        assert_eq!(check_meta_command("\\c"), Some(MetaCommand::Clear));
        assert_eq!(
            check_meta_command("help scan"),
            Some(MetaCommand::Help {
                command: Some("scan".to_string())
            })
        );
        assert_eq!(check_meta_command("get exit"), None);
        assert_eq!(check_meta_command(""), None);
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize(r#"put "user 1" 'hello world'"#).unwrap(),
            vec!["put", "user 1", "hello world"]
        );
        assert_eq!(tokenize(r#"scan a """#).unwrap(), vec!["scan", "a", ""]);
        assert!(tokenize(r#"put "unterminated"#).is_none());
    }

    #[test]
    fn test_shell_cmd_parses_subcommands() {
        build_shell_cmd().debug_assert();
        let matches = build_shell_cmd()
            .try_get_matches_from(["scan", "a", "z", "10"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "scan");
        assert_eq!(sub.get_one::<String>("limit").unwrap(), "10");
    }

    #[test]
    fn test_shell_cmd_rejects_global_flags() {
        assert!(build_shell_cmd()
            .try_get_matches_from(["--host", "other", "get", "k"])
            .is_err());
    }

    proptest! {
        #[test]
        fn prop_plain_words_tokenize_to_themselves(
            words in prop::collection::vec("[a-zA-Z0-9_:.-]{1,12}", 1..6)
        ) {
            let line = words.join(" ");
            prop_assert_eq!(tokenize(&line).unwrap(), words);
        }

        #[test]
        fn prop_quoted_argument_survives(value in "[a-zA-Z0-9 _:.-]{0,20}") {
            let line = format!("put key '{}'", value);
            let tokens = tokenize(&line).unwrap();
            prop_assert_eq!(tokens.len(), 3);
            prop_assert_eq!(&tokens[2], &value);
        }
    }
}
