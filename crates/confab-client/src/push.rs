use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::warn;
use uuid::Uuid;

use confab_types::events::GatewayEvent;

use crate::http::ClientError;

/// One live push connection to the server's `/ws` endpoint.
pub struct PushChannel {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl PushChannel {
    /// Open the push channel for a user. `base_url` is the server's HTTP
    /// address; the scheme is rewritten for the socket.
    pub async fn connect(base_url: &str, user_id: Uuid) -> Result<Self, ClientError> {
        let ws_base = base_url
            .replace("http://", "ws://")
            .replace("https://", "wss://");
        let url = format!("{}/ws?user_id={}", ws_base.trim_end_matches('/'), user_id);

        let (stream, _) = tokio_tungstenite::connect_async(&url).await?;
        Ok(Self { stream })
    }

    /// Wait for the next event. Returns None once the server closes the
    /// connection.
    ///
    /// The server's heartbeat pings are answered by the transport while
    /// this is being polled, so a caller that stops polling for longer
    /// than the heartbeat window gets dropped server-side.
    pub async fn next_event(&mut self) -> Result<Option<GatewayEvent>, ClientError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                WsMessage::Text(text) => match serde_json::from_str(&text) {
                    Ok(event) => return Ok(Some(event)),
                    Err(error) => warn!("Discarding undecodable push frame: {}", error),
                },
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Close the channel. The server notices and broadcasts the shrunk
    /// online set to the remaining connections.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
