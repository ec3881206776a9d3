//! Command Handlers module
//!
//! Ledger Engine operations. Each handler runs its whole operation inside one
//! store unit and consults the injected access policy before touching data.

mod commands;
mod delete_handler;
mod engine;
mod payment_handler;
mod transaction_handler;
mod update_handler;


pub use commands::*;
pub use delete_handler::DeleteTransactionHandler;
pub use engine::LedgerEngine;
pub use payment_handler::ApplyPaymentHandler;
pub use transaction_handler::CreateTransactionHandler;
pub use update_handler::UpdateTransactionHandler;
