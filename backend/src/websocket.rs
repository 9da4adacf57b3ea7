use crate::error::{AppError, AppResult};
use crate::models::{DisputeCategory, LedgerEntry, Settlement, SettlementDispute};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// WebSocket message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "subscribe")]
    Subscribe {
        channel: String, // "game:{id}", "user:{id}"
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        channel: String,
    },
    #[serde(rename = "settlement_ready")]
    SettlementReady {
        game_id: Uuid,
        version: i32,
        has_discrepancy: bool,
        digest: String,
    },
    #[serde(rename = "dispute_filed")]
    DisputeFiled {
        game_id: Uuid,
        dispute_id: Uuid,
        category: DisputeCategory,
    },
    #[serde(rename = "dispute_resolved")]
    DisputeResolved {
        game_id: Uuid,
        dispute_id: Uuid,
        recomputed: bool,
    },
    #[serde(rename = "ledger_updated")]
    LedgerUpdated {
        ledger_ids: Vec<Uuid>,
        paid: bool,
    },
    #[serde(rename = "error")]
    Error {
        message: String,
    },
}

/// A message addressed to one channel
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: String,
    pub message: WsMessage,
}

/// Channel name for a game's participants
pub fn game_channel(game_id: Uuid) -> String {
    format!("game:{}", game_id)
}

/// Channel name for one user's personal updates
pub fn user_channel(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

/// WebSocket server for real-time updates
pub struct WebSocketServer {
    /// Broadcast sender for sending messages to all clients
    tx: broadcast::Sender<ChannelMessage>,
    /// Active subscriptions: channel -> set of client IDs
    subscriptions: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
    /// Client subscriptions: client_id -> set of channels
    client_channels: Arc<RwLock<HashMap<Uuid, Vec<String>>>>,
}

impl WebSocketServer {
    /// Create a new WebSocket server
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000); // Buffer up to 1000 messages

        Self {
            tx,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get broadcast sender
    pub fn sender(&self) -> broadcast::Sender<ChannelMessage> {
        self.tx.clone()
    }

    /// Broadcast a message to all subscribers of a channel
    pub async fn broadcast_to_channel(&self, channel: &str, message: WsMessage) {
        let subscriptions = self.subscriptions.read().await;
        
        if let Some(subscribers) = subscriptions.get(channel) {
            let count = subscribers.len();
            if count > 0 {
                debug!("Broadcasting to {} subscribers on channel {}", count, channel);
                let envelope = ChannelMessage {
                    channel: channel.to_string(),
                    message,
                };
                if let Err(e) = self.tx.send(envelope) {
                    warn!("Failed to broadcast message: {}", e);
                }
            }
        }
    }

    /// Subscribe a client to a channel
    pub async fn subscribe(&self, client_id: Uuid, channel: String) {
        let channel_clone = channel.clone();
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        // Add client to channel
        let subscribers = subscriptions.entry(channel.clone()).or_insert_with(Vec::new);
        if subscribers.contains(&client_id) {
            return;
        }
        subscribers.push(client_id);

        // Track channel for client
        client_channels
            .entry(client_id)
            .or_insert_with(Vec::new)
            .push(channel.clone());

        info!("Client {} subscribed to {}", client_id, channel_clone);
    }

    /// Unsubscribe a client from a channel
    pub async fn unsubscribe(&self, client_id: Uuid, channel: &str) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        // Remove client from channel
        if let Some(subscribers) = subscriptions.get_mut(channel) {
            subscribers.retain(|&id| id != client_id);
            if subscribers.is_empty() {
                subscriptions.remove(channel);
            }
        }

        // Remove channel from client's list
        if let Some(channels) = client_channels.get_mut(&client_id) {
            channels.retain(|c| c != channel);
        }

        info!("Client {} unsubscribed from {}", client_id, channel);
    }

    /// Get all channels a client is subscribed to
    pub async fn get_client_channels(&self, client_id: Uuid) -> Vec<String> {
        let client_channels = self.client_channels.read().await;
        client_channels.get(&client_id).cloned().unwrap_or_default()
    }

    /// Handle a new WebSocket connection
    pub async fn handle_connection(
        &self,
        stream: tokio::net::TcpStream,
    ) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let mut rx = self.tx.subscribe();
        let client_id = Uuid::new_v4();

        info!("New WebSocket connection: {}", client_id);

        // Spawn task to handle incoming messages
        let ws_server_for_receiver = self.clone();

        // Send welcome message
        let welcome = serde_json::json!({
            "type": "connected",
            "client_id": client_id.to_string(),
            "message": "Connected to Kvitt settlement updates"
        });
        if let Err(e) = ws_sender.send(Message::Text(welcome.to_string())).await {
            warn!("Failed to send welcome message: {}", e);
        }

        // Need to wrap sender in Arc<Mutex> to share between tasks
        let ws_sender = std::sync::Arc::new(tokio::sync::Mutex::new(ws_sender));
        let ws_sender_for_receiver = ws_sender.clone();
        
        tokio::spawn(async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        // Parse subscription message
                        if let Ok(sub_msg) = serde_json::from_str::<WsMessage>(&text) {
                            match sub_msg {
                                WsMessage::Subscribe { channel } => {
                                    ws_server_for_receiver.subscribe(client_id, channel.clone()).await;
                                    // Send acknowledgment
                                    let ack = serde_json::json!({
                                        "type": "subscribed",
                                        "channel": channel
                                    });
                                    let mut sender = ws_sender_for_receiver.lock().await;
                                    if let Err(e) = sender.send(Message::Text(ack.to_string())).await {
                                        warn!("Failed to send ack: {}", e);
                                    }
                                }
                                WsMessage::Unsubscribe { channel } => {
                                    ws_server_for_receiver.unsubscribe(client_id, &channel).await;
                                    // Send acknowledgment
                                    let ack = serde_json::json!({
                                        "type": "unsubscribed",
                                        "channel": channel
                                    });
                                    let mut sender = ws_sender_for_receiver.lock().await;
                                    if let Err(e) = sender.send(Message::Text(ack.to_string())).await {
                                        warn!("Failed to send ack: {}", e);
                                    }
                                }
                                _ => {
                                    warn!("Unexpected message type from client {}", client_id);
                                }
                            }
                        } else {
                            warn!("Failed to parse message from client {}: {}", client_id, text);
                            // Send error response
                            let err = serde_json::json!({
                                "type": "error",
                                "message": "Invalid message format"
                            });
                            let mut sender = ws_sender_for_receiver.lock().await;
                            let _ = sender.send(Message::Text(err.to_string())).await;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket connection closed: {}", client_id);
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            // Clean up all subscriptions for this client
            let channels = ws_server_for_receiver.get_client_channels(client_id).await;
            for channel in channels {
                ws_server_for_receiver.unsubscribe(client_id, &channel).await;
            }
        });

        // Spawn task to send broadcast messages to client
        let ws_server_clone = self.clone();
        let ws_sender_for_broadcast = ws_sender.clone();
        tokio::spawn(async move {
            loop {
                let msg = match rx.recv().await {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, {} updates dropped", client_id, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                // Only forward messages for channels this client follows
                if !ws_server_clone.is_client_subscribed(client_id, &msg.channel).await {
                    continue;
                }

                let json = match serde_json::to_string(&msg.message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        continue;
                    }
                };

                let mut sender = ws_sender_for_broadcast.lock().await;
                if let Err(e) = sender.send(Message::Text(json)).await {
                    error!("Failed to send message to client {}: {}", client_id, e);
                    break;
                }
            }
        });

        Ok(())
    }

    /// Check if client is subscribed to a channel
    async fn is_client_subscribed(&self, client_id: Uuid, channel: &str) -> bool {
        let subscriptions = self.subscriptions.read().await;
        if let Some(subscribers) = subscriptions.get(channel) {
            subscribers.contains(&client_id)
        } else {
            false
        }
    }

    /// Announce a new or regenerated settlement to the game's channel
    pub async fn broadcast_settlement_ready(&self, settlement: &Settlement) {
        let message = WsMessage::SettlementReady {
            game_id: settlement.game_id,
            version: settlement.version,
            has_discrepancy: settlement.has_discrepancy,
            digest: settlement.digest.clone(),
        };
        self.broadcast_to_channel(&game_channel(settlement.game_id), message)
            .await;
    }

    /// Announce a filed dispute; payments on the game are now paused
    pub async fn broadcast_dispute_filed(&self, dispute: &SettlementDispute) {
        let message = WsMessage::DisputeFiled {
            game_id: dispute.game_id,
            dispute_id: dispute.id,
            category: dispute.category,
        };
        self.broadcast_to_channel(&game_channel(dispute.game_id), message)
            .await;
    }

    pub async fn broadcast_dispute_resolved(&self, dispute: &SettlementDispute, recomputed: bool) {
        let message = WsMessage::DisputeResolved {
            game_id: dispute.game_id,
            dispute_id: dispute.id,
            recomputed,
        };
        self.broadcast_to_channel(&game_channel(dispute.game_id), message)
            .await;
    }

    /// Tell both parties of each row that its paid flag changed
    pub async fn broadcast_ledger_updated(&self, entries: &[LedgerEntry]) {
        let Some(first) = entries.first() else {
            return;
        };
        let paid = first.paid;

        let mut users: Vec<Uuid> = Vec::new();
        for entry in entries {
            for user_id in [entry.from_user_id, entry.to_user_id] {
                if !users.contains(&user_id) {
                    users.push(user_id);
                }
            }
        }

        let message = WsMessage::LedgerUpdated {
            ledger_ids: entries.iter().map(|e| e.id).collect(),
            paid,
        };
        for user_id in users {
            self.broadcast_to_channel(&user_channel(user_id), message.clone())
                .await;
        }
    }
}

impl Clone for WebSocketServer {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            client_channels: Arc::clone(&self.client_channels),
        }
    }
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new()
    }
}
