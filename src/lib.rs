#![doc(test(attr(deny(warnings))))]

//! Fee Ledger computes per-student school fee statements: term charges,
//! payments, running balances, carry-forward between terms and years, and
//! arrears. The facade wires configuration, JSON storage, and the engine
//! services from `fee-core`.

pub mod cli;
pub mod engine;
pub mod errors;
pub mod utils;

pub use engine::FeeLedger;
pub use errors::{CliError, FeeLedgerError};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter.
pub fn init() {
    init_with_filter(None);
}

/// Initializes global tracing once, honouring a configured filter directive.
pub fn init_with_filter(filter: Option<&str>) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(filter);
        tracing::debug!("fee ledger tracing initialized");
    });
}
