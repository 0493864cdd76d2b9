use crate::cli::commands::usage_error;
use crate::cli::context::{CommandResult, ShellContext};
use crate::cli::output;
use crate::cli::registry::CommandEntry;

const USAGE: &str = "config [show|set <key> <value>]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "config",
        "View or change engine preferences",
        USAGE,
        cmd_config,
    )]
}

fn cmd_config(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    match args.first().map(|arg| arg.to_lowercase()).as_deref() {
        None | Some("show") => {
            show(context);
            Ok(())
        }
        Some("set") if args.len() >= 2 => {
            let key = args[1];
            let value = args[2..].join(" ");
            context.ledger.set_config(key, &value)?;
            output::success(format!("Updated `{}`.", key));
            Ok(())
        }
        _ => Err(usage_error(USAGE)),
    }
}

fn show(context: &ShellContext) {
    output::section("Configuration");
    for (key, value) in context.ledger.config().entries() {
        let value = match key {
            "data_root" => context.ledger.data_root().display().to_string(),
            _ => value,
        };
        output::info(format!("  {:<22} {}", key, value));
    }
}
