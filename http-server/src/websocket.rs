use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use ledger::types::UserId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::AppState;

// Notification types that can be sent to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum NotificationType {
    #[serde(rename = "gift_received")]
    GiftReceived {
        from_user_id: UserId,
        gift_id: Option<String>,
        coins: i64,
        new_balance: i64,
    },
    #[serde(rename = "coins_purchased")]
    CoinsPurchased {
        package_id: String,
        coins: i64,
        new_balance: i64,
    },
    #[serde(rename = "connection_established")]
    ConnectionEstablished { user_id: UserId, message: String },
    #[serde(rename = "auth_failed")]
    AuthFailed { message: String },
}

// Global notification manager
pub type NotificationManager = Arc<Mutex<HashMap<UserId, broadcast::Sender<NotificationType>>>>;

// Create a new notification manager
pub fn create_notification_manager() -> NotificationManager {
    Arc::new(Mutex::new(HashMap::new()))
}

// WebSocket handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket_with_auth(socket, state))
}

// Authentication message structure
#[derive(Debug, Deserialize)]
struct AuthMessage {
    #[serde(rename = "sessionId")]
    session_id: String,
}

// Handle socket with authentication via first message
async fn handle_socket_with_auth(socket: WebSocket, state: AppState) {
    tracing::info!("WebSocket connection established, awaiting authentication");

    let (mut sender, mut receiver) = socket.split();

    // Wait for authentication message
    let text = match receiver.next().await {
        Some(Ok(Message::Text(text))) => text,
        Some(Ok(Message::Close(_))) | None => {
            tracing::info!("WebSocket connection closed before authentication");
            return;
        }
        Some(Err(e)) => {
            tracing::error!("WebSocket error during authentication: {}", e);
            return;
        }
        Some(Ok(_)) => {
            tracing::warn!("Unexpected message type during WebSocket authentication");
            return;
        }
    };

    let user = serde_json::from_str::<AuthMessage>(&text)
        .ok()
        .and_then(|auth_msg| state.storage.get_user_by_session_id(&auth_msg.session_id));

    let user_id = match user {
        Some(user) => {
            tracing::info!("User {} authenticated via WebSocket", user.user_id);
            user.user_id
        }
        None => {
            tracing::warn!("WebSocket authentication failed");
            let failure = NotificationType::AuthFailed {
                message: "Authentication failed: invalid session ID".to_string(),
            };
            if let Ok(msg_text) = serde_json::to_string(&failure) {
                let _ = sender.send(Message::Text(msg_text.into())).await;
            }
            return;
        }
    };

    handle_authenticated_socket(sender, receiver, user_id, state).await;
}

async fn handle_authenticated_socket(
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    user_id: UserId,
    state: AppState,
) {
    let (tx, mut rx) = subscribe(
        &state.notification_manager,
        user_id,
        state.notification_buffer,
    );

    let connection_msg = NotificationType::ConnectionEstablished {
        user_id,
        message: "Successfully connected to notifications".to_string(),
    };

    if let Ok(msg_text) = serde_json::to_string(&connection_msg) {
        if sender.send(Message::Text(msg_text.into())).await.is_err() {
            tracing::warn!("Failed to send connection message to user {}", user_id);
        }
    }

    let mut incoming_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    tracing::debug!("Received message from user {}: {}", user_id, text);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("WebSocket connection closed by user {}", user_id);
                    break;
                }
                Err(e) => {
                    tracing::error!("WebSocket error for user {}: {}", user_id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    let mut outgoing_task = tokio::spawn(async move {
        while let Ok(notification) = rx.recv().await {
            match serde_json::to_string(&notification) {
                Ok(msg_text) => {
                    if sender.send(Message::Text(msg_text.into())).await.is_err() {
                        tracing::warn!("Failed to send notification to user {}", user_id);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to serialize notification for user {}: {}",
                        user_id,
                        e
                    );
                }
            }
        }
    });

    // Wait for either side to finish
    tokio::select! {
        _ = &mut incoming_task => {
            tracing::info!("Incoming task completed for user {}", user_id);
            outgoing_task.abort();
        }
        _ = &mut outgoing_task => {
            tracing::info!("Outgoing task completed for user {}", user_id);
            incoming_task.abort();
        }
    }

    unsubscribe(&state.notification_manager, user_id, &tx);

    tracing::info!("WebSocket connection closed for user {}", user_id);
}

/// Registers a channel for `user_id`, replacing any previous connection.
/// The returned sender identifies this connection for `unsubscribe`.
pub fn subscribe(
    notification_manager: &NotificationManager,
    user_id: UserId,
    buffer: usize,
) -> (
    broadcast::Sender<NotificationType>,
    broadcast::Receiver<NotificationType>,
) {
    let (tx, rx) = broadcast::channel(buffer);
    notification_manager.lock().insert(user_id, tx.clone());
    (tx, rx)
}

/// Drops the user's entry only if it still belongs to the connection owning `tx`
pub fn unsubscribe(
    notification_manager: &NotificationManager,
    user_id: UserId,
    tx: &broadcast::Sender<NotificationType>,
) {
    let mut manager = notification_manager.lock();
    if manager
        .get(&user_id)
        .is_some_and(|current| current.same_channel(tx))
    {
        manager.remove(&user_id);
    }
}

pub fn send_notification_to_user(
    notification_manager: &NotificationManager,
    user_id: UserId,
    notification: NotificationType,
) {
    let manager = notification_manager.lock();
    if let Some(tx) = manager.get(&user_id) {
        if let Err(e) = tx.send(notification) {
            tracing::warn!("Failed to send notification to user {}: {}", user_id, e);
        }
    }
}
