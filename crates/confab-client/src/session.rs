use uuid::Uuid;

use confab_types::api::AuthResponse;
use confab_types::models::User;

/// Session state: the token, the signed-in user, and the online set the
/// gateway pushes. A UI renders straight from this.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub token: Option<String>,
    pub user: Option<User>,
    pub online_users: Vec<Uuid>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Adopt a signup or login result.
    pub fn apply_auth_response(&mut self, response: AuthResponse) {
        self.token = Some(response.token);
        self.user = Some(response.user);
    }

    /// Replace the user record, e.g. after an auth check or profile update.
    pub fn apply_user(&mut self, user: User) {
        self.user = Some(user);
    }

    /// Replace the online set with a fresh gateway snapshot.
    pub fn set_online_users(&mut self, user_ids: Vec<Uuid>) {
        self.online_users = user_ids;
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.online_users.contains(&user_id)
    }

    /// Drop the session. The caller closes its push channel alongside.
    pub fn logout(&mut self) {
        self.token = None;
        self.user = None;
        self.online_users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixture_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            fullname: "A".into(),
            bio: "hello".into(),
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn auth_response_signs_the_session_in() {
        let mut state = AuthState::new();
        assert!(!state.is_authenticated());

        let user = fixture_user();
        let user_id = user.id;
        state.apply_auth_response(AuthResponse {
            success: true,
            user,
            token: "jwt".into(),
            message: "Logged in successfully".into(),
        });

        assert!(state.is_authenticated());
        assert_eq!(state.token.as_deref(), Some("jwt"));
        assert_eq!(state.user.as_ref().unwrap().id, user_id);
    }

    #[test]
    fn logout_clears_everything() {
        let mut state = AuthState::new();
        state.apply_auth_response(AuthResponse {
            success: true,
            user: fixture_user(),
            token: "jwt".into(),
            message: "Logged in successfully".into(),
        });
        state.set_online_users(vec![Uuid::new_v4()]);

        state.logout();
        assert!(!state.is_authenticated());
        assert!(state.token.is_none());
        assert!(state.online_users.is_empty());
    }

    #[test]
    fn online_set_is_replaced_not_merged() {
        let mut state = AuthState::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        state.set_online_users(vec![first]);
        assert!(state.is_online(first));

        state.set_online_users(vec![second]);
        assert!(!state.is_online(first));
        assert!(state.is_online(second));
    }
}
