use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use confab_api::assets::AssetStore;
use confab_api::auth::{AppState, AppStateInner};
use confab_db::Database;
use confab_gateway::connection;
use confab_gateway::presence::PresenceTable;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "confab=debug,confab_api=debug,confab_db=debug,confab_gateway=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("CONFAB_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("CONFAB_DB_PATH").unwrap_or_else(|_| "confab.db".into());
    let host = std::env::var("CONFAB_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CONFAB_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let media_dir: PathBuf = std::env::var("CONFAB_MEDIA_DIR")
        .unwrap_or_else(|_| "./media".into())
        .into();

    // Init database and media storage
    let db = Database::open(&PathBuf::from(&db_path))?;
    let assets = AssetStore::new(media_dir.clone()).await?;

    // Shared state
    let presence = PresenceTable::new();
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        presence: presence.clone(),
        assets,
    });

    // Routes
    let ws_route = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(presence);

    let app = confab_api::routes(state)
        .merge(ws_route)
        .route("/health", get(health))
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Confab server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Identifies the connecting user on the push channel.
#[derive(Deserialize)]
struct WsQuery {
    user_id: Uuid,
}

async fn ws_upgrade(
    State(presence): State<PresenceTable>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_socket(socket, presence, query.user_id))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
