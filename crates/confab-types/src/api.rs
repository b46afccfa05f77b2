use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, User};

// -- JWT Claims --

/// JWT claims shared between token minting (auth handlers) and the REST
/// middleware. Canonical definition lives here in confab-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Auth --

/// Request fields are optional at the decoding layer: an absent key must
/// read like a blank value, so the handlers' validation owns the error and
/// a short body cannot fail before it gets there. Unknown keys pass
/// through ignored.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Returned by both signup and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: User,
    pub token: String,
    pub message: String,
}

/// Returned by the auth check and profile update endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub fullname: Option<String>,
    pub bio: Option<String>,
    /// New profile image as a base64 data URI. Only the asset-store URL it
    /// resolves to is ever persisted.
    pub avatar: Option<String>,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    /// Attached image as a base64 data URI, if any.
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeersResponse {
    pub success: bool,
    pub users: Vec<User>,
    /// Peer id -> number of messages from that peer not yet seen.
    /// Peers with nothing unseen are absent from the map.
    #[serde(rename = "unseenMessages")]
    pub unseen_messages: HashMap<Uuid, u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub success: bool,
    pub messages: Vec<Message>,
}

/// The stored record of a just-sent message. The `message` field carries the
/// record itself; an error body's `message` is a plain string, so clients
/// branch on `success` (or the status code), never on field shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: Message,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

/// Failure envelope every endpoint uses: `{"success": false, "message": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
}
