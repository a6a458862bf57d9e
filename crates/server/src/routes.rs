//! API route definitions

use crate::alerts::{alert_session, dismiss_alert, list_alerts};
use crate::auth::require_auth;
use crate::handlers::{self, accounts, chat, documents, notes};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Room for several files at the per-file limit plus multipart framing.
const UPLOAD_FILES_PER_REQUEST: usize = 10;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = usize::try_from(state.uploads.max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_mul(UPLOAD_FILES_PER_REQUEST)
        .saturating_add(1024 * 1024);

    let protected = Router::new()
        // Documents
        .route("/documents/", get(documents::list_documents))
        .route(
            "/documents/upload/",
            post(documents::upload_documents).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/documents/delete/:id/", post(documents::delete_document))
        // Chat
        .route("/chat/", get(chat::chat_page))
        .route("/chat/api/send/", post(chat::send_message))
        .route("/chat/api/stream/", post(chat::stream_message))
        .route("/chat/api/clear/", post(chat::clear_history))
        // Notes
        .route("/notes/", get(notes::list_notes))
        .route("/notes/create/", post(notes::create_note))
        .route("/notes/:id/", get(notes::note_detail))
        .route("/notes/:id/edit/", post(notes::update_note))
        .route("/notes/:id/delete/", post(notes::delete_note))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::home))
        // Accounts
        .route("/accounts/register/", post(accounts::register))
        .route("/accounts/login/", post(accounts::login))
        .route(
            "/accounts/logout/",
            get(accounts::logout).post(accounts::logout),
        )
        // Alerts
        .route("/alerts/", get(list_alerts))
        .route("/alerts/:id/dismiss", post(dismiss_alert))
        .merge(protected);

    if state.config.server.debug {
        router = router.nest_service("/media", ServeDir::new(state.media_root()));
    }

    router
        .layer(from_fn(alert_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
