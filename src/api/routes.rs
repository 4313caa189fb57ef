//! API Routes
//!
//! HTTP endpoint definitions. Handlers translate requests into commands,
//! run them against the shared store and shape the responses.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, IdempotencyKey, OperationContext, Transaction, TransactionType};
use crate::error::{AppError, AppResult};
use crate::handlers::{
    DepositCommand, DepositHandler, GetAccountHandler, ListOperationsHandler,
    ListOperationsQuery, TransferCommand, TransferHandler,
};
use crate::store::LedgerStore;

/// Header carrying the client's idempotency key
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    /// Deadline applied to each request by the context middleware
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, request_timeout: Duration) -> Self {
        Self {
            store,
            request_timeout,
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub id: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct OperationsParams {
    pub limit: i64,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Public view of a transaction
#[derive(Debug, Serialize)]
pub struct OperationView {
    pub transaction_id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    pub type_operation: TransactionType,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

impl From<Transaction> for OperationView {
    fn from(tx: Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            success: tx.success,
            sender: tx.sender_name,
            receiver: tx.receiver_name,
            type_operation: tx.kind,
            amount: tx.amount.to_decimal(),
            date: tx.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub message: String,
    pub operation: OperationView,
}

#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    pub message: String,
    pub account_id: AccountId,
    pub limit: i64,
    pub offset: i64,
    pub operations: Vec<OperationView>,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: AccountId,
    pub name: String,
    pub balance: Decimal,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/deposit", post(deposit))
        .route("/transfer", post(transfer))
        .route("/operations/:id", get(list_operations))
        .route("/accounts/:id", get(get_account))
}

/// Read and validate the mandatory `Idempotency-Key` header
fn idempotency_key(headers: &HeaderMap) -> AppResult<IdempotencyKey> {
    let value = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .ok_or_else(|| AppError::MissingHeader(IDEMPOTENCY_KEY_HEADER.to_string()))?;

    let value = value.to_str().map_err(|_| {
        AppError::InvalidRequest(format!("{} is not valid ASCII", IDEMPOTENCY_KEY_HEADER))
    })?;

    Ok(IdempotencyKey::parse(value.trim())?)
}

// =========================================================================
// POST /deposit
// =========================================================================

/// Credit an account
async fn deposit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    headers: HeaderMap,
    request: Result<Json<DepositRequest>, JsonRejection>,
) -> AppResult<Json<OperationResponse>> {
    let Json(request) = request.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let key = idempotency_key(&headers)?;

    let handler = DepositHandler::new(state.store);
    let command = DepositCommand::new(request.id, request.amount, key);

    let tx = handler.execute(command, &context).await?;

    Ok(Json(OperationResponse {
        message: "deposit successfully".to_string(),
        operation: tx.into(),
    }))
}

// =========================================================================
// POST /transfer
// =========================================================================

/// Move funds between two accounts
async fn transfer(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    headers: HeaderMap,
    request: Result<Json<TransferRequest>, JsonRejection>,
) -> AppResult<Json<OperationResponse>> {
    let Json(request) = request.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let key = idempotency_key(&headers)?;

    let handler = TransferHandler::new(state.store);
    let command = TransferCommand::new(request.sender_id, request.receiver_id, request.amount, key);

    let tx = handler.execute(command, &context).await?;

    Ok(Json(OperationResponse {
        message: "transfer successfully".to_string(),
        operation: tx.into(),
    }))
}

// =========================================================================
// GET /operations/:id
// =========================================================================

/// Page through an account's history, newest first
async fn list_operations(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    account_id: Result<Path<AccountId>, PathRejection>,
    params: Result<Query<OperationsParams>, QueryRejection>,
) -> AppResult<Json<OperationsResponse>> {
    let Path(account_id) = account_id.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let Query(params) = params.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let handler = ListOperationsHandler::new(state.store);
    let mut query = ListOperationsQuery::new(account_id, params.limit);
    if let Some(offset) = params.offset {
        query = query.with_offset(offset);
    }

    let page = handler.execute(query, &context).await?;

    Ok(Json(OperationsResponse {
        message: "transactions have been successfully received".to_string(),
        account_id: page.account_id,
        limit: page.limit,
        offset: page.offset,
        operations: page.operations.into_iter().map(OperationView::from).collect(),
    }))
}

// =========================================================================
// GET /accounts/:id
// =========================================================================

/// Current balance of an account
async fn get_account(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    account_id: Result<Path<AccountId>, PathRejection>,
) -> AppResult<Json<AccountResponse>> {
    let Path(account_id) = account_id.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let account = GetAccountHandler::new(state.store)
        .execute(account_id, &context)
        .await?;

    Ok(Json(AccountResponse {
        id: account.id,
        name: account.name,
        balance: account.balance.to_decimal(),
    }))
}
