use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use lobby_api::middleware::require_auth;
use lobby_api::{AppState, AppStateInner, categories, channels, docs, rooms};
use lobby_media::MediaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lobby=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("LOBBY_DB_PATH").unwrap_or_else(|_| "lobby.db".into());
    let media_root = std::env::var("LOBBY_MEDIA_ROOT").unwrap_or_else(|_| "media".into());
    let host = std::env::var("LOBBY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("LOBBY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database and media storage
    let db = lobby_db::Database::open(&PathBuf::from(&db_path))?;
    let media = MediaStore::new(PathBuf::from(&media_root)).await?;

    let state: AppState = Arc::new(AppStateInner { db, media });

    // Routes
    let public_routes = Router::new()
        .route("/api/room/select", get(rooms::list_rooms))
        .route("/api/room/select/", get(rooms::list_rooms))
        .route("/api/docs/schema", get(docs::schema))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/category", post(categories::create_category))
        .route(
            "/api/category/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route("/api/room", post(rooms::create_room))
        .route(
            "/api/room/{id}",
            put(rooms::update_room).delete(rooms::delete_room),
        )
        .route(
            "/api/room/{id}/members",
            put(rooms::join_room).delete(rooms::leave_room),
        )
        .route("/api/channel", post(channels::create_channel))
        .route(
            "/api/channel/{id}",
            put(channels::update_channel).delete(channels::delete_channel),
        )
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Lobby server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
