//! retail_ledger Library
//!
//! Transaction ledger core for a multi-salesman retail operation: records
//! sales, orders, payments and credit notes while keeping stock quantities and
//! customer balances in lockstep.

pub mod access;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod handlers;
pub mod projection;
pub mod store;

mod error;

pub use access::{AccessPolicy, Actor, OwnershipPolicy, Role};
pub use config::Config;
pub use domain::{Amount, AmountError, DomainError, OperationContext};
pub use error::{AppError, ErrorResponse};
pub use handlers::LedgerEngine;
