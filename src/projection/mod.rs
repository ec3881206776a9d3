//! Projection module
//!
//! Derived, read-only views over the transaction log and customer accounts.
//! Projections own no mutation rights.

mod service;

pub use service::{
    default_dues_threshold, BalanceCheck, DueEntry, OrderLedgerEntry, ProjectionService,
};
