use crate::Database;
use crate::models::{MessageRow, UnseenRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        fullname: &str,
        bio: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, fullname, bio, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, email, password_hash, fullname, bio, created_at],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Merge the supplied fields into the user record; `None` leaves a field
    /// untouched. Returns the updated row, or `None` for an unknown id.
    pub fn update_user_profile(
        &self,
        id: &str,
        fullname: Option<&str>,
        bio: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET
                     fullname   = COALESCE(?2, fullname),
                     bio        = COALESCE(?3, bio),
                     avatar_url = COALESCE(?4, avatar_url)
                 WHERE id = ?1",
                rusqlite::params![id, fullname, bio, avatar_url],
            )?;
            query_user_by_id(conn, id)
        })
    }

    /// Every user except the given one, for the sidebar.
    pub fn list_users_except(&self, id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, password, fullname, bio, avatar_url, created_at
                 FROM users WHERE id != ?1
                 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        text: Option<&str>,
        image_url: Option<&str>,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, text, image_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, sender_id, receiver_id, text, image_url, created_at],
            )?;
            Ok(())
        })
    }

    /// All messages between the two users, in either direction, oldest first.
    /// Timestamps have microsecond grain, so ties fall back to the id to keep
    /// repeated reads stable.
    pub fn conversation(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, text, image_url, seen, created_at
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2)
                    OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([user_a, user_b], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip every unseen sender -> receiver message to seen.
    /// Returns the number of rows changed.
    pub fn mark_conversation_seen(&self, sender_id: &str, receiver_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET seen = 1
                 WHERE sender_id = ?1 AND receiver_id = ?2 AND seen = 0",
                [sender_id, receiver_id],
            )?;
            Ok(changed)
        })
    }

    /// Idempotent: marking an already-seen or unknown message is a no-op.
    pub fn mark_message_seen(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE messages SET seen = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Unseen-message tallies for a receiver, grouped by sender. Senders with
    /// nothing unseen do not appear.
    pub fn unseen_counts(&self, receiver_id: &str) -> Result<Vec<UnseenRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sender_id, COUNT(*) FROM messages
                 WHERE receiver_id = ?1 AND seen = 0
                 GROUP BY sender_id",
            )?;
            let rows = stmt
                .query_map([receiver_id], |row| {
                    Ok(UnseenRow {
                        sender_id: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, password, fullname, bio, avatar_url, created_at
         FROM users WHERE email = ?1",
    )?;

    let row = stmt.query_row([email], user_from_row).optional()?;
    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, password, fullname, bio, avatar_url, created_at
         FROM users WHERE id = ?1",
    )?;

    let row = stmt.query_row([id], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &rusqlite::Row) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        fullname: row.get(3)?,
        bio: row.get(4)?,
        avatar_url: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn message_from_row(row: &rusqlite::Row) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        text: row.get(3)?,
        image_url: row.get(4)?,
        seen: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, is_constraint_violation};

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, id: &str, email: &str, at: &str) {
        db.create_user(id, email, "hash", "Test User", "hi", at)
            .unwrap();
    }

    #[test]
    fn duplicate_email_hits_unique_index() {
        let db = test_db();
        add_user(&db, "u1", "a@x.com", "2026-01-01T00:00:00.000000Z");

        let err = db
            .create_user("u2", "a@x.com", "hash", "Other", "yo", "2026-01-01T00:00:01.000000Z")
            .unwrap_err();
        assert!(is_constraint_violation(&err));
    }

    #[test]
    fn profile_update_merges_only_supplied_fields() {
        let db = test_db();
        add_user(&db, "u1", "a@x.com", "2026-01-01T00:00:00.000000Z");

        let row = db
            .update_user_profile("u1", None, Some("new bio"), Some("/media/abc.png"))
            .unwrap()
            .unwrap();
        assert_eq!(row.fullname, "Test User");
        assert_eq!(row.bio, "new bio");
        assert_eq!(row.avatar_url.as_deref(), Some("/media/abc.png"));

        // A later update without an avatar keeps the stored one
        let row = db
            .update_user_profile("u1", Some("Renamed"), None, None)
            .unwrap()
            .unwrap();
        assert_eq!(row.fullname, "Renamed");
        assert_eq!(row.bio, "new bio");
        assert_eq!(row.avatar_url.as_deref(), Some("/media/abc.png"));

        assert!(db.update_user_profile("ghost", None, None, None).unwrap().is_none());
    }

    #[test]
    fn conversation_spans_both_directions_in_creation_order() {
        let db = test_db();
        add_user(&db, "alice", "alice@x.com", "2026-01-01T00:00:00.000000Z");
        add_user(&db, "bob", "bob@x.com", "2026-01-01T00:00:01.000000Z");
        add_user(&db, "carol", "carol@x.com", "2026-01-01T00:00:02.000000Z");

        db.insert_message("m1", "alice", "bob", Some("hey"), None, "2026-01-02T10:00:00.000000Z")
            .unwrap();
        db.insert_message("m2", "bob", "alice", Some("hi"), None, "2026-01-02T10:00:01.000000Z")
            .unwrap();
        db.insert_message("m3", "alice", "bob", Some("how are you"), None, "2026-01-02T10:00:02.000000Z")
            .unwrap();
        // A third party's message must not leak into the conversation
        db.insert_message("m4", "carol", "alice", Some("psst"), None, "2026-01-02T10:00:03.000000Z")
            .unwrap();

        let msgs = db.conversation("alice", "bob").unwrap();
        let ids: Vec<&str> = msgs.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
        assert!(msgs.iter().all(|m| !m.seen));
    }

    #[test]
    fn mark_conversation_seen_only_flips_peer_to_user() {
        let db = test_db();
        add_user(&db, "alice", "alice@x.com", "2026-01-01T00:00:00.000000Z");
        add_user(&db, "bob", "bob@x.com", "2026-01-01T00:00:01.000000Z");

        db.insert_message("m1", "bob", "alice", Some("one"), None, "2026-01-02T10:00:00.000000Z")
            .unwrap();
        db.insert_message("m2", "bob", "alice", Some("two"), None, "2026-01-02T10:00:01.000000Z")
            .unwrap();
        db.insert_message("m3", "alice", "bob", Some("reply"), None, "2026-01-02T10:00:02.000000Z")
            .unwrap();

        let changed = db.mark_conversation_seen("bob", "alice").unwrap();
        assert_eq!(changed, 2);

        let msgs = db.conversation("alice", "bob").unwrap();
        for m in &msgs {
            if m.sender_id == "bob" {
                assert!(m.seen, "bob -> alice should be seen");
            } else {
                assert!(!m.seen, "alice -> bob must stay unseen");
            }
        }

        // Nothing left to flip
        assert_eq!(db.mark_conversation_seen("bob", "alice").unwrap(), 0);
    }

    #[test]
    fn unseen_counts_group_by_sender_and_skip_seen() {
        let db = test_db();
        add_user(&db, "alice", "alice@x.com", "2026-01-01T00:00:00.000000Z");
        add_user(&db, "bob", "bob@x.com", "2026-01-01T00:00:01.000000Z");
        add_user(&db, "carol", "carol@x.com", "2026-01-01T00:00:02.000000Z");

        db.insert_message("m1", "bob", "alice", Some("a"), None, "2026-01-02T10:00:00.000000Z")
            .unwrap();
        db.insert_message("m2", "bob", "alice", Some("b"), None, "2026-01-02T10:00:01.000000Z")
            .unwrap();
        db.insert_message("m3", "carol", "alice", Some("c"), None, "2026-01-02T10:00:02.000000Z")
            .unwrap();
        // Outbound message must not count against alice
        db.insert_message("m4", "alice", "bob", Some("d"), None, "2026-01-02T10:00:03.000000Z")
            .unwrap();

        let mut counts = db.unseen_counts("alice").unwrap();
        counts.sort_by(|a, b| a.sender_id.cmp(&b.sender_id));
        assert_eq!(counts.len(), 2);
        assert_eq!((counts[0].sender_id.as_str(), counts[0].count), ("bob", 2));
        assert_eq!((counts[1].sender_id.as_str(), counts[1].count), ("carol", 1));

        db.mark_message_seen("m1").unwrap();
        db.mark_message_seen("m3").unwrap();

        let counts = db.unseen_counts("alice").unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!((counts[0].sender_id.as_str(), counts[0].count), ("bob", 1));
    }

    #[test]
    fn same_instant_messages_keep_a_stable_order() {
        let db = test_db();
        add_user(&db, "alice", "alice@x.com", "2026-01-01T00:00:00.000000Z");
        add_user(&db, "bob", "bob@x.com", "2026-01-01T00:00:01.000000Z");

        // Identical timestamps, inserted out of id order
        let at = "2026-01-02T10:00:00.000000Z";
        db.insert_message("m2", "alice", "bob", Some("two"), None, at)
            .unwrap();
        db.insert_message("m1", "bob", "alice", Some("one"), None, at)
            .unwrap();
        db.insert_message("m3", "alice", "bob", Some("three"), None, at)
            .unwrap();

        let ids: Vec<String> = db
            .conversation("alice", "bob")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);

        // Same read twice returns the same order
        let again: Vec<String> = db
            .conversation("alice", "bob")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn mark_message_seen_is_idempotent() {
        let db = test_db();
        add_user(&db, "alice", "alice@x.com", "2026-01-01T00:00:00.000000Z");
        add_user(&db, "bob", "bob@x.com", "2026-01-01T00:00:01.000000Z");
        db.insert_message("m1", "bob", "alice", Some("a"), None, "2026-01-02T10:00:00.000000Z")
            .unwrap();

        db.mark_message_seen("m1").unwrap();
        db.mark_message_seen("m1").unwrap();
        db.mark_message_seen("no-such-message").unwrap();

        let msgs = db.conversation("alice", "bob").unwrap();
        assert!(msgs[0].seen);
    }
}
