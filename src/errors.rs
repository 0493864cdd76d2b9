use fee_config::ConfigError;
use fee_core::CoreError;
use thiserror::Error;

/// Unified error for the facade: engine, storage, and configuration failures.
#[derive(Debug, Error)]
pub enum FeeLedgerError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("No school matches `{0}`")]
    UnknownSchool(String),
    #[error("No student matches `{reference}` in {school}")]
    UnknownStudent { reference: String, school: String },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FeeLedgerError {
    /// True when the request named something that does not exist or is incomplete.
    pub fn is_precondition(&self) -> bool {
        match self {
            FeeLedgerError::Core(err) => err.is_precondition(),
            FeeLedgerError::UnknownSchool(_) | FeeLedgerError::UnknownStudent { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FeeLedgerError>;

/// User-facing shell error wrapper.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Ledger(#[from] FeeLedgerError),
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Command failed: {0}")]
    Command(String),
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Command(err.to_string())
    }
}

impl From<rustyline::error::ReadlineError> for CliError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        CliError::Command(err.to_string())
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        CliError::Ledger(err.into())
    }
}
