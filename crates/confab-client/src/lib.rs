//! Headless client for a Confab server: a typed REST client, a reader for
//! the push channel, and plain state holders mirroring what a UI renders.

pub mod chat;
pub mod http;
pub mod push;
pub mod session;

pub use chat::ChatState;
pub use http::{ApiClient, ClientError};
pub use push::PushChannel;
pub use session::AuthState;
