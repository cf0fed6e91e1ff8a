use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::{DateTime, Utc};
use ledger::types::{CoinPackage, Transaction, TransactionReason, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::ApiResult,
    middleware::AuthUser,
    websocket::{NotificationType, send_notification_to_user},
};

// Purchase request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub package_id: String, // e.g. "coins_350"
}

// Purchase response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub success: bool,
    pub new_balance: i64,
    pub coins_credited: i64,
    pub transaction_id: u64,
}

// Package response model
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageResponse {
    pub id: String,
    pub name: String,
    pub coins: i64,
    pub bonus_percent: u32,
    pub total_coins: i64,
    pub price_usd: String,
}

impl From<&CoinPackage> for PackageResponse {
    fn from(package: &CoinPackage) -> Self {
        PackageResponse {
            id: package.id.to_string(),
            name: package.name.to_string(),
            coins: package.coins,
            bonus_percent: package.bonus_percent,
            total_coins: package.total_coins(),
            price_usd: package.price_usd(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub success: bool,
    pub balance: i64,
}

// Transaction response model
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: u64,
    pub delta: i64,
    pub reason: TransactionReason,
    pub balance_after: i64,
    pub counterparty: Option<UserId>,
    pub gift_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(transaction: &Transaction) -> Self {
        TransactionResponse {
            id: transaction.id,
            delta: transaction.delta,
            reason: transaction.reason,
            balance_after: transaction.balance_after,
            counterparty: transaction.counterparty,
            gift_id: transaction.gift_id.clone(),
            timestamp: transaction.timestamp,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsResponse {
    pub success: bool,
    pub transactions: Vec<TransactionResponse>,
}

pub async fn list_packages(State(state): State<AppState>) -> Json<Vec<PackageResponse>> {
    Json(
        state
            .packages
            .packages()
            .iter()
            .map(PackageResponse::from)
            .collect(),
    )
}

// Purchase coins endpoint. Payment capture happens upstream.
pub async fn purchase_coins(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> ApiResult<Json<PurchaseResponse>> {
    let Json(payload) = payload?;

    let package = state.packages.resolve(&payload.package_id).inspect_err(|e| {
        tracing::warn!("User {} purchase rejected: {}", user.user_id, e);
    })?;

    let receipt = state.ledger.purchase(user.user_id, package)?;

    tracing::info!(
        "User {} bought {} ({} coins), balance {}",
        user.user_id,
        package.id,
        receipt.coins_credited,
        receipt.new_balance
    );

    send_notification_to_user(
        &state.notification_manager,
        user.user_id,
        NotificationType::CoinsPurchased {
            package_id: package.id.to_string(),
            coins: receipt.coins_credited,
            new_balance: receipt.new_balance,
        },
    );

    Ok(Json(PurchaseResponse {
        success: true,
        new_balance: receipt.new_balance,
        coins_credited: receipt.coins_credited,
        transaction_id: receipt.transaction_id,
    }))
}

pub async fn get_balance(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        success: true,
        balance: state.ledger.balance(user.user_id),
    })
}

pub async fn get_transactions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<TransactionsResponse> {
    let transactions = state.ledger.transactions(user.user_id);
    Json(TransactionsResponse {
        success: true,
        transactions: transactions.iter().map(TransactionResponse::from).collect(),
    })
}
