//! Command Handlers module
//!
//! Handlers orchestrate ledger operations: idempotency guard, validation,
//! existence checks and the store's atomic units, all bounded by the
//! caller's deadline.

mod account_handler;
mod commands;
mod deposit_handler;
mod history_handler;
mod transfer_handler;


pub use account_handler::GetAccountHandler;
pub use commands::*;
pub use deposit_handler::DepositHandler;
pub use history_handler::ListOperationsHandler;
pub use transfer_handler::TransferHandler;
