//! Shell context, dispatch, and error reporting.

use std::io;

use fee_core::CoreError;
use fee_domain::{School, Student};

use crate::cli::{commands, output, registry::CommandRegistry};
use crate::engine::FeeLedger;
use crate::errors::{CliError, FeeLedgerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

pub type CommandResult = Result<(), CommandError>;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Ledger(#[from] FeeLedgerError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("exit requested")]
    ExitRequested,
}

impl From<CoreError> for CommandError {
    fn from(err: CoreError) -> Self {
        CommandError::Ledger(err.into())
    }
}

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Ledger(inner) => CliError::Ledger(inner),
            CommandError::InvalidArguments(message) => CliError::Input(message),
            other => CliError::Command(other.to_string()),
        }
    }
}

pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub ledger: FeeLedger,
    pub last_command: Option<String>,
    pub running: bool,
}

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        let ledger = FeeLedger::open_default()?;
        Ok(Self::with_ledger(mode, ledger))
    }

    pub fn with_ledger(mode: CliMode, ledger: FeeLedger) -> Self {
        crate::init_with_filter(ledger.config().log_filter.as_deref());
        let color = ledger.config().ui_color_enabled && mode == CliMode::Interactive;
        output::configure(color, mode == CliMode::Script);

        let mut registry = CommandRegistry::new();
        commands::register_all(&mut registry);

        Self {
            mode,
            registry,
            ledger,
            last_command: None,
            running: true,
        }
    }

    pub fn prompt(&self) -> String {
        "fee-ledger> ".to_string()
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.registry.names().collect()
    }

    pub fn currency(&self) -> &str {
        &self.ledger.config().currency
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        let Some(handler) = self.registry.handler(command) else {
            self.suggest_command(raw);
            return Ok(LoopControl::Continue);
        };
        match handler(self, args) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));
        if let Some(best) = self.registry.suggest(input) {
            output::hint(format!("Did you mean `{}`?", best));
        }
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested => {}
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            CommandError::Ledger(err) if err.is_precondition() => {
                output::error(&err);
                output::hint("Use `schools` and `students <school>` to list valid references.");
            }
            other => output::error(other),
        }
    }

    /// Resolves the leading `<school> <student>` arguments.
    pub(crate) fn school_and_student(
        &self,
        args: &[&str],
        usage: &str,
    ) -> Result<(School, Student), CommandError> {
        let (Some(school_ref), Some(student_ref)) = (args.first(), args.get(1)) else {
            return Err(CommandError::InvalidArguments(format!("usage: {}", usage)));
        };
        let school = self.ledger.find_school(school_ref)?;
        let student = self.ledger.find_student(&school, student_ref)?;
        Ok((school, student))
    }
}
