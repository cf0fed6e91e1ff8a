use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use ledger::types::{Gift, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    websocket::{NotificationType, send_notification_to_user},
};

// Send gift request: either a catalog gift or a raw coin amount
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGiftRequest {
    pub recipient_user_id: UserId,
    pub gift_id: Option<String>,
    pub quantity: Option<i64>,
    pub amount: Option<i64>,
}

// Send gift response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendGiftResponse {
    pub success: bool,
    pub new_balance: i64,
    pub coins_spent: i64,
    pub coins_received: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftResponse {
    pub id: String,
    pub name: String,
    pub price: i64,
}

impl From<&Gift> for GiftResponse {
    fn from(gift: &Gift) -> Self {
        GiftResponse {
            id: gift.id.to_string(),
            name: gift.name.to_string(),
            price: gift.price,
        }
    }
}

pub async fn list_gifts(State(state): State<AppState>) -> Json<Vec<GiftResponse>> {
    Json(state.gifts.gifts().iter().map(GiftResponse::from).collect())
}

/// Coin cost of the request and the catalog gift id, if any
fn gift_cost(state: &AppState, payload: &SendGiftRequest) -> ApiResult<(i64, Option<String>)> {
    match (&payload.gift_id, payload.amount) {
        (Some(gift_id), None) => {
            let gift = state.gifts.resolve(gift_id)?;
            let quantity = payload.quantity.unwrap_or(1);
            if quantity < 1 {
                return Err(ApiError::InvalidRequest(
                    "quantity must be at least 1".to_string(),
                ));
            }
            let cost = gift
                .price
                .checked_mul(quantity)
                .ok_or_else(|| ApiError::InvalidRequest("quantity is too large".to_string()))?;
            Ok((cost, Some(gift.id.to_string())))
        }
        (None, Some(amount)) => {
            if payload.quantity.is_some() {
                return Err(ApiError::InvalidRequest(
                    "quantity only applies to giftId".to_string(),
                ));
            }
            Ok((amount, None))
        }
        _ => Err(ApiError::InvalidRequest(
            "exactly one of giftId or amount is required".to_string(),
        )),
    }
}

// Send gift endpoint
pub async fn send_gift(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<SendGiftRequest>, JsonRejection>,
) -> ApiResult<Json<SendGiftResponse>> {
    let Json(payload) = payload?;
    let (cost, gift_id) = gift_cost(&state, &payload)?;

    if state.storage.get_user_by_id(payload.recipient_user_id).is_none() {
        return Err(ApiError::UnknownRecipient(payload.recipient_user_id));
    }

    let receipt = state
        .ledger
        .send_gift(
            user.user_id,
            payload.recipient_user_id,
            cost,
            gift_id.as_deref(),
        )
        .inspect_err(|e| {
            tracing::warn!(
                "Gift from {} to {} rejected: {}",
                user.user_id,
                payload.recipient_user_id,
                e
            );
        })?;

    tracing::info!(
        "User {} sent {} coins to {} ({} received)",
        user.user_id,
        receipt.coins_spent,
        payload.recipient_user_id,
        receipt.coins_received
    );

    if receipt.coins_received > 0 {
        send_notification_to_user(
            &state.notification_manager,
            payload.recipient_user_id,
            NotificationType::GiftReceived {
                from_user_id: user.user_id,
                gift_id,
                coins: receipt.coins_received,
                new_balance: receipt.recipient_balance,
            },
        );
    }

    Ok(Json(SendGiftResponse {
        success: true,
        new_balance: receipt.sender_balance,
        coins_spent: receipt.coins_spent,
        coins_received: receipt.coins_received,
    }))
}
