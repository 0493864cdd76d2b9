//! fee-core
//!
//! Fee ledger engine: fee-structure resolution, transaction assembly, term
//! balance and carry-forward calculation, arrears aggregation, and statements.
//! Depends on fee-domain. No CLI, no terminal I/O, no direct file access.

pub mod arrears_service;
pub mod balance_service;
pub mod default_fee_table;
pub mod error;
pub mod fee_structure_service;
pub mod memory;
pub mod statement_service;
pub mod storage;
pub mod time;
pub mod transaction_service;

pub use arrears_service::*;
pub use balance_service::*;
pub use default_fee_table::*;
pub use error::CoreError;
pub use fee_structure_service::*;
pub use memory::InMemoryStore;
pub use statement_service::*;
pub use storage::*;
pub use time::*;
pub use transaction_service::*;

#[cfg(test)]
mod tests;
