//! Command definitions
//!
//! Commands represent intentions to change the ledger; queries read it.
//! Amounts stay `Decimal` here and are converted to minor units by the
//! handler that executes the command.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, IdempotencyKey};

// =========================================================================
// DepositCommand
// =========================================================================

/// Command to credit an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCommand {
    pub account_id: AccountId,
    pub amount: Decimal,
    pub idempotency_key: IdempotencyKey,
}

impl DepositCommand {
    pub fn new(account_id: AccountId, amount: Decimal, idempotency_key: IdempotencyKey) -> Self {
        Self {
            account_id,
            amount,
            idempotency_key,
        }
    }
}

// =========================================================================
// TransferCommand
// =========================================================================

/// Command to move funds between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
    pub idempotency_key: IdempotencyKey,
}

impl TransferCommand {
    pub fn new(
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Decimal,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        Self {
            sender_id,
            receiver_id,
            amount,
            idempotency_key,
        }
    }
}

// =========================================================================
// ListOperationsQuery
// =========================================================================

/// Query for one page of an account's history
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListOperationsQuery {
    pub account_id: AccountId,
    pub limit: i64,
    pub offset: Option<i64>,
}

impl ListOperationsQuery {
    pub fn new(account_id: AccountId, limit: i64) -> Self {
        Self {
            account_id,
            limit,
            offset: None,
        }
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}
