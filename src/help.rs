//! Help text generation for grammars using Clap.

use crate::config::{Accepts, CommandSpec, FlagSpec, Grammar, ValueSpec};
use clap::{Arg, ArgAction, Command};

/// Build a Clap Command listing every command of a grammar.
fn build_overview(grammar: &Grammar) -> Command {
    let mut cmd = Command::new(grammar.effective_name().to_string())
        .disable_help_subcommand(true);

    if let Some(ref version) = grammar.version {
        cmd = cmd.version(version.clone());
    }

    if let Some(ref description) = grammar.description {
        cmd = cmd.about(description.clone());
    }

    for spec in &grammar.commands {
        let mut subcmd = Command::new(spec.name.clone());
        if let Some(ref description) = spec.description {
            subcmd = subcmd.about(description.clone());
        }
        if let Some(ref alias) = spec.alias {
            subcmd = subcmd.visible_alias(alias.clone());
        }
        cmd = cmd.subcommand(subcmd);
    }

    cmd
}

/// Build a Clap Command for a single command spec.
fn build_command(spec: &CommandSpec) -> Command {
    let mut cmd = Command::new(spec.name.clone());

    if let Some(ref description) = spec.description {
        cmd = cmd.about(description.clone());
    }

    for flag in &spec.flags {
        cmd = cmd.arg(build_flag(flag));
    }

    for (index, value) in spec.values.iter().enumerate() {
        cmd = cmd.arg(build_value(value, index));
    }

    let mut after_help = Vec::new();
    if let Some(ref alias) = spec.alias {
        after_help.push(format!("Alias: {}", alias));
    }
    if !spec.examples.is_empty() {
        after_help.push(String::from("Examples:"));
        after_help.extend(spec.examples.iter().map(|e| format!("  {}", e)));
    }
    if !after_help.is_empty() {
        cmd = cmd.after_help(after_help.join("\n"));
    }

    cmd
}

/// Build a Clap Arg from a FlagSpec.
fn build_flag(flag: &FlagSpec) -> Arg {
    let mut arg = Arg::new(format!("flag-{}", flag.long))
        .short(flag.short)
        .long(flag.long.clone());

    if let Some(ref description) = flag.description {
        arg = arg.help(description.clone());
    }

    match flag.value {
        None => {
            arg = arg.action(ArgAction::SetTrue);
        }
        Some(ref value) => {
            let value_name = value
                .name
                .as_deref()
                .unwrap_or("VALUE")
                .to_uppercase();
            arg = arg.action(ArgAction::Set).value_name(value_name);
            arg = apply_accepts(arg, value);
        }
    }

    arg
}

/// Build a Clap Arg for the positional slot at `index`.
fn build_value(value: &ValueSpec, index: usize) -> Arg {
    let value_name = value
        .name
        .clone()
        .unwrap_or_else(|| format!("value{}", index + 1))
        .to_uppercase();

    let mut arg = Arg::new(format!("value-{}", index))
        .index(index + 1)
        .value_name(value_name);

    if value.array {
        arg = arg.action(ArgAction::Append);
    }

    if let Some(ref description) = value.description {
        arg = arg.help(description.clone());
    }

    apply_accepts(arg, value)
}

/// Describe the acceptance rule: enumerated values as possible values,
/// patterns through their description (or the pattern itself).
fn apply_accepts(arg: Arg, value: &ValueSpec) -> Arg {
    match value.accepts {
        Accepts::OneOf(ref choices) => {
            arg.value_parser(clap::builder::PossibleValuesParser::new(choices.clone()))
        }
        Accepts::Pattern(ref pattern) => {
            let shown = value
                .accepts_description
                .clone()
                .unwrap_or_else(|| format!("/{}/", pattern.as_str()));
            let help = match arg.get_help() {
                Some(help) => format!("{} [accepts: {}]", help, shown),
                None => format!("[accepts: {}]", shown),
            };
            arg.help(help)
        }
    }
}

/// Generate the help text for one command, looked up by name or alias.
///
/// Returns `None` when the grammar has no such command.
pub fn generate_help(grammar: &Grammar, command: &str) -> Option<String> {
    let spec = grammar.find_command(command)?;
    let mut cmd = build_command(spec);
    Some(cmd.render_help().to_string())
}

/// Generate the overview listing all commands of the grammar.
pub fn generate_overview(grammar: &Grammar) -> String {
    let mut cmd = build_overview(grammar);
    cmd.render_help().to_string()
}
