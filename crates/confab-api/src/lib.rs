pub mod assets;
pub mod auth;
pub mod error;
pub mod extract;
pub mod messages;
pub mod middleware;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// The REST surface: public signup/login plus the JWT-guarded profile and
/// messaging routes, all sharing one state.
pub fn routes(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/auth/check", get(auth::check))
        .route("/api/auth/updateprofile", put(auth::update_profile))
        .route("/api/messages/users", get(messages::list_peers))
        .route("/api/messages/send/{id}", post(messages::send_message))
        .route("/api/messages/mark/{id}", put(messages::mark_seen))
        .route("/api/messages/{id}", get(messages::get_conversation))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}
