//! Query DTOs - Parametri di query string

use crate::entities::UserRole;
use serde::Deserialize;

/// Paginazione di GET /messages/conversation/{user_id}
#[derive(Deserialize, Debug, Default)]
pub struct ConversationPageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Filtro della directory utenti (GET /users)
#[derive(Deserialize, Debug, Default)]
pub struct UserDirectoryQuery {
    pub role: Option<UserRole>,
}
