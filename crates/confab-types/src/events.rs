use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

/// Events pushed to clients over the WebSocket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// The full set of currently-online user ids. Broadcast to every
    /// connected client on each connect and disconnect.
    OnlineUsers { user_ids: Vec<Uuid> },

    /// A newly stored message, delivered to the receiver's connection only.
    MessageCreate { message: Message },
}
