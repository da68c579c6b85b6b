//! Services module - Handler HTTP
//!
//! Ogni sotto-modulo gestisce gli endpoint di una funzionalità.

pub mod auth;
pub mod conversation;
pub mod message;
pub mod user;

// Re-exports per facilitare l'import
pub use auth::{login_user, register_user};
pub use conversation::list_conversations;
pub use message::{
    delete_message, get_conversation, mark_read, send_message, unread_count,
};
pub use user::{get_user_by_id, list_users_directory};

use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::sync::Arc;

/// Root endpoint - health check
pub async fn root(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, "Server is running!")
}
