//! Ledger records
//!
//! Accounts, transactions and the history page returned to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{Amount, Balance, LedgerError};

/// Account identifier
pub type AccountId = i64;

/// Hard cap for a single history page
pub const MAX_PAGE_LIMIT: i64 = 1000;

// =========================================================================
// IdempotencyKey
// =========================================================================

/// Client-supplied token that makes a mutating request safe to retry.
///
/// Only the canonical hyphenated form (8-4-4-4-12 hex digits) is accepted.
/// Braced, URN and un-hyphenated spellings are rejected even though they
/// denote valid UUIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(Uuid);

impl IdempotencyKey {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse and validate the canonical textual form
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        if s.is_empty() {
            return Err(LedgerError::validation("idempotency key is empty"));
        }

        let groups: Vec<&str> = s.split('-').collect();
        let canonical = groups.len() == Self::GROUPS.len()
            && groups
                .iter()
                .zip(Self::GROUPS)
                .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()));

        if !canonical {
            return Err(LedgerError::validation(format!(
                "idempotency key '{}' is not a canonical UUID",
                s
            )));
        }

        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| LedgerError::validation(format!("invalid idempotency key: {}", e)))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for IdempotencyKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =========================================================================
// TransactionType
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "transfer" => Ok(TransactionType::Transfer),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

// =========================================================================
// Account
// =========================================================================

/// Pre-existing account; the ledger only reads and mutates its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub balance: Balance,
}

// =========================================================================
// TransactionDraft / Transaction
// =========================================================================

/// Everything needed to create a pending transaction record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub idempotency_key: IdempotencyKey,
    pub kind: TransactionType,
    /// Credited account for a deposit, debited account for a transfer
    pub sender_id: AccountId,
    pub receiver_id: Option<AccountId>,
    pub amount: Amount,
}

impl TransactionDraft {
    pub fn deposit(idempotency_key: IdempotencyKey, account_id: AccountId, amount: Amount) -> Self {
        Self {
            idempotency_key,
            kind: TransactionType::Deposit,
            sender_id: account_id,
            receiver_id: None,
            amount,
        }
    }

    pub fn transfer(
        idempotency_key: IdempotencyKey,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Amount,
    ) -> Self {
        Self {
            idempotency_key,
            kind: TransactionType::Transfer,
            sender_id,
            receiver_id: Some(receiver_id),
            amount,
        }
    }

    /// Accounts touched by this draft, in lock order (ascending id)
    pub fn lock_order(&self) -> Vec<AccountId> {
        let mut ids = vec![self.sender_id];
        if let Some(receiver_id) = self.receiver_id {
            ids.push(receiver_id);
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Immutable record of one financial operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub idempotency_key: IdempotencyKey,
    pub kind: TransactionType,
    pub sender_id: AccountId,
    pub receiver_id: Option<AccountId>,
    pub amount: Amount,
    pub success: bool,
    pub sender_name: Option<String>,
    pub receiver_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build the pending record for a draft
    pub fn pending(draft: &TransactionDraft, id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            idempotency_key: draft.idempotency_key,
            kind: draft.kind,
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            amount: draft.amount,
            success: false,
            sender_name: None,
            receiver_name: None,
            created_at,
        }
    }

    /// Whether `account_id` is on either side of this transaction
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.sender_id == account_id || self.receiver_id == Some(account_id)
    }
}

// =========================================================================
// Paging
// =========================================================================

/// Window over an account's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    /// Validate limit (> 0, clamped to `MAX_PAGE_LIMIT`) and offset (>= 0)
    pub fn new(limit: i64, offset: Option<i64>) -> Result<Self, LedgerError> {
        if limit <= 0 {
            return Err(LedgerError::validation(format!(
                "limit must be a positive integer (got {})",
                limit
            )));
        }

        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(LedgerError::validation(format!(
                "offset must not be negative (got {})",
                offset
            )));
        }

        Ok(Self {
            limit: limit.min(MAX_PAGE_LIMIT),
            offset,
        })
    }
}

/// Ordered view of an account's operations, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationPage {
    pub account_id: AccountId,
    pub limit: i64,
    pub offset: i64,
    pub operations: Vec<Transaction>,
}

impl OperationPage {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
