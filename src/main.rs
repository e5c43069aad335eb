//! argline - grammar-driven command line parsing.

use anyhow::{bail, Context, Result};
use argline::{generate_help, generate_overview, parse_line, Grammar, ParseOutcome};
use clap::{Args, Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Parse command lines against a JSON grammar.
#[derive(Parser, Debug)]
#[command(name = "argline", version, about, disable_help_subcommand = true)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a line and print the result as JSON
    Parse {
        #[command(flatten)]
        grammar: GrammarSource,

        /// Line to parse; lines are read from stdin when omitted
        line: Option<String>,
    },

    /// Print help for a command, or the list of commands
    Help {
        #[command(flatten)]
        grammar: GrammarSource,

        /// Command to describe
        command: Option<String>,
    },
}

/// Where the grammar comes from.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct GrammarSource {
    /// JSON grammar
    #[arg(long)]
    grammar: Option<String>,

    /// Path to a JSON grammar file
    #[arg(long)]
    grammar_file: Option<PathBuf>,
}

impl GrammarSource {
    fn load(&self) -> Result<Grammar> {
        let grammar = match (&self.grammar, &self.grammar_file) {
            (Some(json), _) => Grammar::from_json(json).context("failed to parse grammar JSON")?,
            (None, Some(path)) => Grammar::from_file(path)
                .with_context(|| format!("failed to load grammar from {}", path.display()))?,
            (None, None) => bail!("no grammar given"),
        };
        grammar.validate().context("invalid grammar")?;
        debug!(commands = grammar.commands.len(), "loaded grammar");
        Ok(grammar)
    }
}

fn setup_logging(debug: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}

/// Parse one line, printing the parsed input as JSON or the requested help.
fn run_line(grammar: &Grammar, line: &str) -> Result<()> {
    match parse_line(grammar, line)? {
        ParseOutcome::Success(parsed) => {
            println!("{}", serde_json::to_string(&parsed)?);
        }
        ParseOutcome::Help(command) => {
            let help = generate_help(grammar, &command)
                .with_context(|| format!("no help for command {}", command))?;
            print!("{}", help);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.debug)?;

    match cli.command {
        Commands::Parse { grammar, line } => {
            let grammar = grammar.load()?;

            match line {
                Some(line) => run_line(&grammar, &line).context("failed to parse input")?,
                None => {
                    let stdin = std::io::stdin();
                    for (number, line) in stdin.lock().lines().enumerate() {
                        let line = line.context("failed to read stdin")?;
                        if line.trim().is_empty() {
                            continue;
                        }
                        run_line(&grammar, &line)
                            .with_context(|| format!("failed to parse line {}", number + 1))?;
                    }
                }
            }
        }
        Commands::Help { grammar, command } => {
            let grammar = grammar.load()?;

            match command {
                Some(command) => match generate_help(&grammar, &command) {
                    Some(help) => print!("{}", help),
                    None => bail!("unrecognized command: {}", command),
                },
                None => print!("{}", generate_overview(&grammar)),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const GRAMMAR: &str = r#"{"commands":[{"name":"status"}]}"#;

    #[test]
    fn test_parse_subcommand_parses_grammar() {
        let cli = Cli::try_parse_from(["argline", "parse", "--grammar", GRAMMAR, "status"]).unwrap();

        match cli.command {
            Commands::Parse { grammar, line } => {
                assert_eq!(grammar.grammar.as_deref(), Some(GRAMMAR));
                assert!(grammar.grammar_file.is_none());
                assert_eq!(line.as_deref(), Some("status"));
            }
            _ => panic!("Expected Parse command"),
        }
    }

    #[test]
    fn test_parse_subcommand_line_is_optional() {
        let cli = Cli::try_parse_from(["argline", "parse", "--grammar", GRAMMAR]).unwrap();

        match cli.command {
            Commands::Parse { line, .. } => assert!(line.is_none()),
            _ => panic!("Expected Parse command"),
        }
    }

    #[test]
    fn test_parse_subcommand_grammar_file() {
        let cli = Cli::try_parse_from([
            "argline",
            "parse",
            "--grammar-file",
            "grammar.json",
            "status -v",
        ])
        .unwrap();

        match cli.command {
            Commands::Parse { grammar, line } => {
                assert_eq!(grammar.grammar_file, Some(PathBuf::from("grammar.json")));
                assert_eq!(line.as_deref(), Some("status -v"));
            }
            _ => panic!("Expected Parse command"),
        }
    }

    #[test]
    fn test_grammar_source_is_required() {
        let result = Cli::try_parse_from(["argline", "parse", "status"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_grammar_sources_conflict() {
        let result = Cli::try_parse_from([
            "argline",
            "parse",
            "--grammar",
            GRAMMAR,
            "--grammar-file",
            "grammar.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_help_subcommand() {
        let cli =
            Cli::try_parse_from(["argline", "help", "--grammar", GRAMMAR, "status"]).unwrap();

        match cli.command {
            Commands::Help { command, .. } => assert_eq!(command.as_deref(), Some("status")),
            _ => panic!("Expected Help command"),
        }
    }

    #[test]
    fn test_debug_flag_is_global() {
        let cli =
            Cli::try_parse_from(["argline", "help", "--grammar", GRAMMAR, "--debug"]).unwrap();
        assert!(cli.debug);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let result = Cli::try_parse_from(["argline"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help() {
        // Verify the command can generate help without panicking
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_rejects_invalid_grammar() {
        let source = GrammarSource {
            grammar: Some(r#"{"commands":[{"name":"a"},{"name":"a"}]}"#.to_string()),
            grammar_file: None,
        };
        let err = source.load().unwrap_err();
        assert!(err.to_string().contains("invalid grammar"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, GRAMMAR.as_bytes()).unwrap();

        let source = GrammarSource {
            grammar: None,
            grammar_file: Some(file.path().to_path_buf()),
        };
        let grammar = source.load().unwrap();
        assert_eq!(grammar.commands[0].name, "status");
    }
}
