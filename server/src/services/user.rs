//! User services - Directory utenti
//!
//! Espone le proiezioni pubbliche usate dal client per aprire nuovi thread.

use crate::core::{AppError, AppState};
use crate::dtos::{UserDirectoryQuery, UserPublicDTO};
use crate::entities::{User, UserRole};
use crate::repositories::Read;
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
};
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Proiezione pubblica decorata: per i medici aggiunge la specialty dal
/// profilo Doctor (default assente per gli altri ruoli).
pub(crate) async fn decorated_projection(
    state: &AppState,
    user: User,
) -> Result<UserPublicDTO, AppError> {
    let specialty = match user.role {
        UserRole::Doctor => state.doctor.specialty_of(&user.user_id).await?,
        _ => None,
    };
    Ok(UserPublicDTO::from(user).with_specialty(specialty))
}

#[instrument(skip(state), fields(user_id = %user_id))]
pub async fn get_user_by_id(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserPublicDTO>, AppError> {
    let user = state
        .user
        .read(&user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(decorated_projection(&state, user).await?))
}

/// GET /users - elenco delle possibili controparti per un nuovo thread.
/// Esclude sempre il chiamante; filtro opzionale per ruolo.
#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_users_directory(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Query(params): Query<UserDirectoryQuery>,
) -> Result<Json<Vec<UserPublicDTO>>, AppError> {
    let users = state
        .user
        .find_many_directory(params.role, &current_user.user_id)
        .await?;

    debug!(count = users.len(), "directory users loaded");

    let projections = try_join_all(
        users
            .into_iter()
            .map(|user| decorated_projection(&state, user)),
    )
    .await?;

    Ok(Json(projections))
}
