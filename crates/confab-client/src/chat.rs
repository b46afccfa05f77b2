use std::collections::HashMap;

use uuid::Uuid;

use confab_types::api::{ConversationResponse, PeersResponse};
use confab_types::models::{Message, User};

/// Chat state: the peer sidebar, per-peer unseen tallies, and the open
/// conversation's messages.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub peers: Vec<User>,
    pub unseen: HashMap<Uuid, u32>,
    pub selected_peer: Option<Uuid>,
    pub messages: Vec<Message>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sidebar with a fresh listing.
    pub fn apply_peers(&mut self, response: PeersResponse) {
        self.peers = response.users;
        self.unseen = response.unseen_messages;
    }

    /// Open a conversation: remember the peer and replace the message list.
    /// The server marked these messages seen as a side effect of the fetch,
    /// so the next sidebar refresh reflects that.
    pub fn apply_conversation(&mut self, peer_id: Uuid, response: ConversationResponse) {
        self.selected_peer = Some(peer_id);
        self.messages = response.messages;
    }

    /// Append a message this client just sent.
    pub fn apply_sent(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Fold in a message pushed over the gateway.
    ///
    /// A message from the open conversation's peer is appended already
    /// seen, and its id is returned so the caller can acknowledge it with a
    /// mark-seen call. Anything else only bumps the sender's unseen tally.
    pub fn apply_incoming(&mut self, mut message: Message) -> Option<Uuid> {
        if self.selected_peer == Some(message.sender_id) {
            message.seen = true;
            let id = message.id;
            self.messages.push(message);
            Some(id)
        } else {
            *self.unseen.entry(message.sender_id).or_insert(0) += 1;
            None
        }
    }

    pub fn unseen_from(&self, peer_id: Uuid) -> u32 {
        self.unseen.get(&peer_id).copied().unwrap_or(0)
    }
}
