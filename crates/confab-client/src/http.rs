use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use confab_types::api::{
    AckResponse, AuthResponse, ConversationResponse, ErrorBody, LoginRequest, PeersResponse,
    SendMessageRequest, SendMessageResponse, SignupRequest, UpdateProfileRequest, UserResponse,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("push channel error: {0}")]
    Push(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server answered with its failure envelope. Carries the
    /// envelope's `message` verbatim.
    #[error("{0}")]
    Server(String),
}

/// Typed REST client for the Confab HTTP surface.
///
/// Holds the session token once one is set and attaches it to every
/// request as the bare `token` header.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: Client::new(),
            token: None,
        }
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/api/auth/signup"))
            .json(request)
            .send()
            .await?;
        handle(response).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(request)
            .send()
            .await?;
        handle(response).await
    }

    /// Validate the stored token and fetch the signed-in user.
    pub async fn check(&self) -> Result<UserResponse, ClientError> {
        let response = self
            .authed(self.http.get(self.url("/api/auth/check")))
            .send()
            .await?;
        handle(response).await
    }

    pub async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> Result<UserResponse, ClientError> {
        let response = self
            .authed(self.http.put(self.url("/api/auth/updateprofile")))
            .json(request)
            .send()
            .await?;
        handle(response).await
    }

    /// Every other user, plus this user's unseen tallies.
    pub async fn list_peers(&self) -> Result<PeersResponse, ClientError> {
        let response = self
            .authed(self.http.get(self.url("/api/messages/users")))
            .send()
            .await?;
        handle(response).await
    }

    /// The full conversation with a peer. The server marks the peer's
    /// messages seen as a side effect of this fetch.
    pub async fn conversation(&self, peer_id: Uuid) -> Result<ConversationResponse, ClientError> {
        let response = self
            .authed(
                self.http
                    .get(self.url(&format!("/api/messages/{}", peer_id))),
            )
            .send()
            .await?;
        handle(response).await
    }

    pub async fn send_message(
        &self,
        receiver_id: Uuid,
        request: &SendMessageRequest,
    ) -> Result<SendMessageResponse, ClientError> {
        let response = self
            .authed(
                self.http
                    .post(self.url(&format!("/api/messages/send/{}", receiver_id))),
            )
            .json(request)
            .send()
            .await?;
        handle(response).await
    }

    pub async fn mark_seen(&self, message_id: Uuid) -> Result<AckResponse, ClientError> {
        let response = self
            .authed(
                self.http
                    .put(self.url(&format!("/api/messages/mark/{}", message_id))),
            )
            .send()
            .await?;
        handle(response).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header("token", token),
            None => builder,
        }
    }
}

/// Decode a success body, or surface the failure envelope's message.
async fn handle<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    if response.status().is_success() {
        Ok(response.json::<T>().await?)
    } else {
        let status = response.status();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(ClientError::Server(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:3000/");
        assert_eq!(client.url("/api/auth/check"), "http://localhost:3000/api/auth/check");
    }

    #[test]
    fn token_is_held_until_cleared() {
        let mut client = ApiClient::new("http://localhost:3000");
        assert!(client.token().is_none());

        client.set_token("abc");
        assert_eq!(client.token(), Some("abc"));

        client.clear_token();
        assert!(client.token().is_none());
    }
}
