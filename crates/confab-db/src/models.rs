//! Database row types, mapping directly to SQLite rows.
//! Distinct from the confab-types API models to keep the DB layer
//! independent; conversions below are the only bridge.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use confab_types::models::{Message, User};

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub fullname: String,
    pub bio: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub seen: bool,
    pub created_at: String,
}

/// One sidebar tally: how many unseen messages a given sender has waiting.
pub struct UnseenRow {
    pub sender_id: String,
    pub count: u32,
}

impl UserRow {
    /// Convert to the public model, dropping the password hash. Corrupt ids
    /// or timestamps are logged and defaulted rather than failing the whole
    /// request.
    pub fn into_user(self) -> User {
        let created_at = parse_timestamp(&self.created_at, &self.id);
        User {
            id: parse_uuid(&self.id, "user id"),
            email: self.email,
            fullname: self.fullname,
            bio: self.bio,
            avatar_url: self.avatar_url,
            created_at,
        }
    }
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        let created_at = parse_timestamp(&self.created_at, &self.id);
        Message {
            id: parse_uuid(&self.id, "message id"),
            sender_id: parse_uuid(&self.sender_id, "sender id"),
            receiver_id: parse_uuid(&self.receiver_id, "receiver id"),
            text: self.text,
            image_url: self.image_url,
            seen: self.seen,
            created_at,
        }
    }
}

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, row_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') format carries no timezone; rows
            // written by other tooling parse as naive UTC.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on row '{}': {}", raw, row_id, e);
            DateTime::default()
        })
}
