use academy::social::{Activity, FriendRequest};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::AppState;
use crate::models::Outgoing;

// Notification types that can be sent to users
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationType {
    #[serde(rename = "friend_activity")]
    FriendActivity { activity: Activity },
    #[serde(rename = "friend_request")]
    FriendRequest {
        request: FriendRequest,
        from_username: String,
    },
    #[serde(rename = "connection_established")]
    ConnectionEstablished {
        user_id: Option<Uuid>,
        message: String,
    },
}

// Global notification manager, one broadcast channel per connected user
pub type NotificationManager = Arc<Mutex<HashMap<Uuid, broadcast::Sender<NotificationType>>>>;

pub fn create_notification_manager() -> NotificationManager {
    Arc::new(Mutex::new(HashMap::new()))
}

fn lock(
    manager: &NotificationManager,
) -> MutexGuard<'_, HashMap<Uuid, broadcast::Sender<NotificationType>>> {
    manager.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovered from poisoned notification mutex");
        poisoned.into_inner()
    })
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

async fn send_json(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    notification: &NotificationType,
) -> bool {
    match serde_json::to_string(notification) {
        Ok(text) => sender.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize notification: {}", e);
            true
        }
    }
}

// Handle socket with authentication via first message
async fn handle_socket_with_auth(socket: WebSocket, state: AppState) {
    tracing::info!("WebSocket connection established, awaiting authentication");

    let (mut sender, mut receiver) = socket.split();

    let user_id = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<AuthMessage>(&text) {
            Ok(auth_msg) => {
                let user_id = state
                    .storage
                    .read(|t| t.session_user(&auth_msg.session_id).map(|u| u.user_id));
                match user_id {
                    Some(user_id) => {
                        tracing::info!("User {} authenticated via WebSocket", user_id);
                        user_id
                    }
                    None => {
                        tracing::warn!("Invalid session ID in WebSocket auth");
                        let failed = NotificationType::ConnectionEstablished {
                            user_id: None,
                            message: "Authentication failed: invalid session ID".to_string(),
                        };
                        send_json(&mut sender, &failed).await;
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to parse WebSocket auth message: {}", e);
                let _ = sender
                    .send(Message::Text(
                        "Authentication failed: invalid message format"
                            .to_string()
                            .into(),
                    ))
                    .await;
                return;
            }
        },
        Some(Ok(Message::Close(_))) | None => {
            tracing::info!("WebSocket connection closed before authentication");
            return;
        }
        Some(Err(e)) => {
            tracing::error!("WebSocket error during authentication: {}", e);
            return;
        }
        _ => {
            tracing::warn!("Unexpected message type during WebSocket authentication");
            return;
        }
    };

    handle_authenticated_socket(sender, receiver, user_id, state).await;
}

async fn handle_authenticated_socket(
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    user_id: Uuid,
    state: AppState,
) {
    // Several tabs of one user share a channel
    let mut rx = lock(&state.notification_manager)
        .entry(user_id)
        .or_insert_with(|| broadcast::channel(100).0)
        .subscribe();

    let connection_msg = NotificationType::ConnectionEstablished {
        user_id: Some(user_id),
        message: "Successfully connected to notifications".to_string(),
    };
    if !send_json(&mut sender, &connection_msg).await {
        tracing::warn!("Failed to send connection message to user {}", user_id);
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

    // Forward notifications until the client goes away
    loop {
        tokio::select! {
            _ = &mut incoming_task => break,
            received = rx.recv() => match received {
                Ok(notification) => {
                    if !send_json(&mut sender, &notification).await {
                        tracing::warn!("Failed to send notification to user {}", user_id);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("User {} missed {} notifications", user_id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    incoming_task.abort();
    drop(rx);

    // Drop the channel once the last connection for this user is gone
    {
        let mut manager = lock(&state.notification_manager);
        if manager
            .get(&user_id)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            manager.remove(&user_id);
        }
    }

    tracing::info!("WebSocket connection closed for user {}", user_id);
}

pub fn send_notification_to_user(
    notification_manager: &NotificationManager,
    user_id: Uuid,
    notification: NotificationType,
) {
    let manager = lock(notification_manager);
    if let Some(tx) = manager.get(&user_id) {
        if let Err(e) = tx.send(notification) {
            tracing::warn!("Failed to send notification to user {}: {}", user_id, e);
        }
    }
}

/// Pushes queued storage notifications to whoever is connected
pub fn deliver(notification_manager: &NotificationManager, outbox: Vec<Outgoing>) {
    for outgoing in outbox {
        match outgoing {
            Outgoing::Activity { activity, audience } => {
                for friend_id in audience {
                    send_notification_to_user(
                        notification_manager,
                        friend_id,
                        NotificationType::FriendActivity {
                            activity: activity.clone(),
                        },
                    );
                }
            }
            Outgoing::FriendRequest {
                request,
                from_username,
            } => {
                let to = request.to_user_id;
                send_notification_to_user(
                    notification_manager,
                    to,
                    NotificationType::FriendRequest {
                        request,
                        from_username,
                    },
                );
            }
        }
    }
}
