//! Server library - espone i moduli principali per i test

pub mod activity;
pub mod core;
pub mod dtos;
pub mod entities;
pub mod repositories;
pub mod services;
pub mod sms;
pub mod storage;

// Re-export dei tipi principali per facilitare l'import
pub use core::{AppError, AppState, auth, config};
pub use services::root;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Margine per i campi del form oltre al file
const MULTIPART_BODY_LIMIT: usize = services::MAX_UPLOAD_BYTES + 1024 * 1024;

/// Crea il router principale dell'applicazione
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .nest("/auth", configure_auth_routes())
        .nest("/users", configure_user_routes(state.clone()))
        .nest("/posts", configure_post_routes(state.clone()))
        .nest("/comments", configure_comment_routes(state.clone()))
        .nest("/conversations", configure_conversation_routes(state.clone()))
        .nest("/messages", configure_message_routes(state.clone()))
        .nest("/wallet", configure_wallet_routes(state.clone()))
        .nest("/devices", configure_device_routes(state.clone()))
        .nest("/voice", configure_voice_routes(state.clone()))
        .nest("/facegate", configure_facegate_routes(state.clone()))
        .nest("/admin", configure_admin_routes(state.clone()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Configura le routes di autenticazione (pubbliche)
fn configure_auth_routes() -> Router<Arc<AppState>> {
    use services::*;
    Router::new()
        .route("/send-sms", post(send_sms))
        .route("/verify-sms", post(verify_sms))
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .route("/logout", post(logout_user))
}

/// Configura le routes per profili, follow e impostazioni
fn configure_user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/", get(list_users))
        .route("/me", get(get_me))
        .route("/me/tts-settings", put(update_tts_settings))
        .route(
            "/me/photo",
            post(upload_photo).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .route("/balance", get(get_balance))
        .route("/by-username/{username}", get(get_user_by_username))
        .route("/{user_id}", get(get_user_by_id).patch(update_user))
        .route("/{user_id}/password", patch(change_password))
        .route("/{user_id}/activity", get(get_user_activity))
        .route("/{user_id}/posts", get(list_user_posts))
        .route("/{user_id}/following", post(follow_user))
        .route("/{user_id}/following/{target_id}", delete(unfollow_user))
        .route("/{user_id}/punked-followers", get(get_punked_followers))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Configura le routes del feed, dei task, dei like e dei commenti ai post
fn configure_post_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/", get(list_feed).post(create_post))
        .route(
            "/media",
            post(upload_post_media).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .route("/{post_id}", get(get_post).delete(delete_post))
        .route("/{post_id}/accept-task", post(accept_task))
        .route("/{post_id}/request-completion", post(request_completion))
        .route("/{post_id}/confirm-completion", post(confirm_completion))
        .route("/{post_id}/handle-completion", post(handle_completion))
        .route("/{post_id}/handle-task-outcome", post(handle_task_outcome))
        .route("/{post_id}/like", post(like_post).delete(unlike_post))
        .route(
            "/{post_id}/comments",
            get(list_comments).post(create_comment),
        )
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

fn configure_comment_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/{comment_id}", delete(delete_comment))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Configura le routes delle conversazioni private
fn configure_conversation_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/", get(list_conversations).post(create_conversation))
        .route(
            "/{conversation_id}/messages",
            get(list_messages).post(send_message),
        )
        .route(
            "/{conversation_id}/messages/read",
            patch(mark_messages_read),
        )
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

fn configure_message_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/search", get(search_messages))
        .route(
            "/upload-image",
            post(upload_message_image).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

fn configure_wallet_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/", get(get_wallet))
        .route("/transactions", get(list_transactions))
        .route("/red-packets", post(send_red_packet))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Configura le routes dei dispositivi vocali
fn configure_device_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/", get(list_devices).post(create_device))
        .route(
            "/{device_id}",
            get(get_device).put(update_device).delete(delete_device),
        )
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Configura le routes delle sessioni vocali e dei loro messaggi
fn configure_voice_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/sessions", get(list_sessions).post(start_session))
        .route(
            "/sessions/{session_id}",
            get(get_session).put(end_session).delete(delete_session),
        )
        .route("/roles", get(list_voice_roles).post(create_voice_role))
        .route("/messages", post(create_voice_message))
        .route(
            "/messages/audio",
            post(upload_voice_audio).layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT)),
        )
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Configura le routes dei varchi facegate
fn configure_facegate_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use services::*;

    // stesso nome di parametro sullo stesso segmento: `{device}` è l'id numerico
    // per la DELETE e il device_id testuale per l'heartbeat
    Router::new()
        .route(
            "/devices",
            get(list_facegate_devices).post(create_facegate_device),
        )
        .route("/devices/{device}", delete(delete_facegate_device))
        .route("/devices/{device}/heartbeat", post(facegate_heartbeat))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Configura le routes del backoffice (autenticazione + controllo admin)
fn configure_admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::{admin_middleware, authentication_middleware};
    use services::*;

    // i layer vengono eseguiti dall'ultimo aggiunto: prima l'autenticazione
    Router::new()
        .route("/users", get(admin_list_users).post(admin_create_user))
        .route(
            "/users/{user_id}",
            patch(admin_update_user).delete(admin_delete_user),
        )
        .route(
            "/voice-mappings",
            get(admin_list_voice_mappings).post(admin_batch_voice_mappings),
        )
        .route(
            "/voice-mappings/{user_id}",
            put(admin_update_voice_mapping).delete(admin_clear_voice_mapping),
        )
        .route("/tasks/expire-unclaimed", post(expire_unclaimed_tasks))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}
