//! fee-domain
//!
//! Pure domain models for school fee ledgers (schools, calendars, students,
//! fee structures, payments, arrears, and derived ledger views).
//! No I/O, no CLI, no storage. Only data types and core enums.

pub mod calendar;
pub mod common;
pub mod dataset;
pub mod fee;
pub mod ledger;
pub mod payment;
pub mod school;

pub use calendar::*;
pub use common::*;
pub use dataset::*;
pub use fee::*;
pub use ledger::*;
pub use payment::*;
pub use school::*;
