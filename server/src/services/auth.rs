//! Auth services - Registrazione e login

use crate::core::{AppError, AppState, encode_jwt};
use crate::dtos::{CreateUserDTO, UserPublicDTO};
use crate::entities::{User, UserRole};
use crate::repositories::Create;
use crate::repositories::doctor::CreateDoctorDTO;
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

/// Body del login (solo email e password)
#[derive(serde::Deserialize)]
pub struct LoginDTO {
    pub email: String,
    pub password: String,
}

/// Risposta del login: token bearer più la proiezione del chiamante
#[derive(serde::Serialize)]
pub struct LoginResponseDTO {
    pub token: String,
    pub user: UserPublicDTO,
}

#[instrument(skip(state, body))]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserDTO>,
) -> Result<(StatusCode, Json<UserPublicDTO>), AppError> {
    body.validate()?;

    if state.user.find_by_email(&body.email).await?.is_some() {
        return Err(AppError::conflict("Email already registered"));
    }

    // I medici devono dichiarare la specializzazione in fase di
    // registrazione: l'elenco conversazioni la usa per decorare le voci.
    let specialty = match body.role {
        UserRole::Doctor => match &body.specialty {
            Some(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => {
                warn!("doctor registration without specialty");
                return Err(AppError::bad_request("Doctors must declare a specialty"));
            }
        },
        _ => None,
    };

    let password_hash = User::hash_password(&body.password)?;

    let new_user = CreateUserDTO {
        password: password_hash,
        ..body
    };

    let created = state.user.create(&new_user).await?;

    if let Some(specialty) = specialty {
        state
            .doctor
            .create(&CreateDoctorDTO {
                user_id: created.user_id,
                specialty: specialty.clone(),
            })
            .await?;
        info!(user_id = created.user_id, "doctor profile created");
        let projection = UserPublicDTO::from(created).with_specialty(Some(specialty));
        return Ok((StatusCode::CREATED, Json(projection)));
    }

    Ok((StatusCode::CREATED, Json(UserPublicDTO::from(created))))
}

#[instrument(skip(state, body))]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginDTO>,
) -> Result<Json<LoginResponseDTO>, AppError> {
    let user = match state.user.find_by_email(&body.email).await? {
        Some(user) => user,
        None => return Err(AppError::unauthorized("Invalid email or password")),
    };

    if !user.verify_password(&body.password) {
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let token = encode_jwt(user.email.clone(), user.user_id, &state.jwt_secret)?;
    info!(user_id = user.user_id, "user logged in");

    let projection = super::user::decorated_projection(&state, user).await?;

    Ok(Json(LoginResponseDTO {
        token,
        user: projection,
    }))
}
