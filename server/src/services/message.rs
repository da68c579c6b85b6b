//! Message services - Invio, thread, stato di lettura, eliminazione
//!
//! POST /messages/send accetta sia JSON sia multipart/form-data (con parte
//! `file` per gli allegati). La risposta torna appena la persistenza riesce:
//! il fan-out real-time parte su un task separato e non è mai atteso.

use crate::core::{AppError, AppState};
use crate::dtos::{
    ConversationPageDTO, ConversationPageQuery, CreateMessageDTO, MessageDTO, SendMessageDTO,
    SendMessageResponseDTO, UnreadCountDTO,
};
use crate::entities::{Message, MessageKind, User};
use crate::repositories::{Create, Delete, Read};
use crate::services::user::decorated_projection;
use crate::ws::notify_message;
use axum::{
    Extension, RequestExt,
    extract::{Json, Multipart, Path, Query, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Allegato salvato su disco durante il parsing multipart.
struct StoredUpload {
    file_url: String,
    file_name: String,
    file_size: i64,
    /// Tipo dedotto dal content type della parte (image/* -> Image)
    inferred_kind: MessageKind,
}

#[instrument(skip(state, current_user, req), fields(sender_id = %current_user.user_id))]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    req: Request,
) -> Result<(StatusCode, Json<SendMessageResponseDTO>), AppError> {
    // 1. Estrarre il body (JSON o multipart, con eventuale salvataggio file)
    // 2. Validare: destinatario diverso dal mittente, lunghezza contenuto,
    //    contenuto presente se non c'è allegato
    // 3. Verificare che il destinatario esista (404 altrimenti)
    // 4. Persistere il messaggio con read=false
    // 5. Arricchire con le proiezioni dei due partecipanti
    // 6. Spawn del fan-out e risposta 201 immediata
    let is_multipart = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (body, upload) = if is_multipart {
        let multipart = req
            .extract::<Multipart, _>()
            .await
            .map_err(|e| AppError::bad_request("Malformed multipart body").with_details(e.to_string()))?;
        parse_multipart(multipart, &state.upload_dir).await?
    } else {
        let Json(body) = req
            .extract::<Json<SendMessageDTO>, _>()
            .await
            .map_err(|e| AppError::bad_request("Invalid request body").with_details(e.to_string()))?;
        (body, None)
    };

    body.validate()?;

    if body.receiver_id == current_user.user_id {
        return Err(AppError::bad_request("Cannot send a message to yourself"));
    }

    // contenuto obbligatorio, a meno che non ci sia un allegato
    if body.content.trim().is_empty() && upload.is_none() {
        return Err(AppError::bad_request("Message content is required"));
    }

    let receiver = state
        .user
        .read(&body.receiver_id)
        .await?
        .ok_or_else(|| AppError::not_found("Receiver not found"))?;

    // il tipo esplicito audio vince sull'inferenza dal content type
    let message_kind = match &upload {
        Some(u) if body.message_kind != MessageKind::Audio => u.inferred_kind,
        _ => body.message_kind,
    };

    let new_message = CreateMessageDTO {
        sender_id: current_user.user_id,
        receiver_id: body.receiver_id,
        content: body.content,
        message_kind,
        file_url: upload.as_ref().map(|u| u.file_url.clone()),
        file_name: upload.as_ref().map(|u| u.file_name.clone()),
        file_size: upload.as_ref().map(|u| u.file_size),
        appointment_id: body.appointment_id,
        created_at: Utc::now(),
    };

    let message = state.msg.create(&new_message).await?;
    info!(message_id = message.message_id, "message persisted");

    let sender_projection = decorated_projection(&state, current_user).await?;
    let receiver_projection = decorated_projection(&state, receiver).await?;
    let message_dto = MessageDTO::enriched(message, sender_projection, receiver_projection);

    // fan-out best-effort, mai sul percorso critico della risposta
    {
        let state = state.clone();
        let message_dto = message_dto.clone();
        tokio::spawn(async move {
            notify_message(&state, &message_dto);
        });
    }

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponseDTO {
            message: message_dto,
            success: true,
        }),
    ))
}

/// Estrae i campi del form e salva l'eventuale parte `file` su disco.
async fn parse_multipart(
    mut multipart: Multipart,
    upload_dir: &str,
) -> Result<(SendMessageDTO, Option<StoredUpload>), AppError> {
    let mut receiver_id: Option<i64> = None;
    let mut content = String::new();
    let mut message_kind = MessageKind::default();
    let mut appointment_id: Option<i64> = None;
    let mut upload: Option<StoredUpload> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "receiver_id" => {
                receiver_id = field.text().await?.trim().parse::<i64>().ok();
            }
            "content" => {
                content = field.text().await?;
            }
            "message_kind" => {
                let raw = field.text().await?;
                message_kind = serde_json::from_value(serde_json::Value::String(raw.clone()))
                    .map_err(|_| {
                        AppError::bad_request("Unknown message kind").with_details(raw)
                    })?;
            }
            "appointment_id" => {
                appointment_id = field.text().await?.trim().parse::<i64>().ok();
            }
            "file" => {
                let original_name = field.file_name().unwrap_or("attachment").to_string();
                let inferred_kind = match field.content_type() {
                    Some(ct) if ct.starts_with("image/") => MessageKind::Image,
                    _ => MessageKind::File,
                };
                let bytes = field.bytes().await?;

                fs::create_dir_all(upload_dir).await.map_err(|e| {
                    AppError::internal_server_error("Failed to store attachment")
                        .with_details(e.to_string())
                })?;

                let stored_name =
                    format!("{}-{}", Utc::now().timestamp_millis(), sanitize_filename(&original_name));
                let path = std::path::Path::new(upload_dir).join(&stored_name);
                fs::write(&path, &bytes).await.map_err(|e| {
                    AppError::internal_server_error("Failed to store attachment")
                        .with_details(e.to_string())
                })?;

                debug!(file = %stored_name, size = bytes.len(), "attachment stored");

                upload = Some(StoredUpload {
                    file_url: format!("/uploads/{}", stored_name),
                    file_name: original_name,
                    file_size: bytes.len() as i64,
                    inferred_kind,
                });
            }
            other => {
                warn!(field = other, "unexpected multipart field ignored");
            }
        }
    }

    let receiver_id =
        receiver_id.ok_or_else(|| AppError::bad_request("receiver_id is required"))?;

    Ok((
        SendMessageDTO {
            receiver_id,
            content,
            message_kind,
            appointment_id,
        },
        upload,
    ))
}

/// Solo caratteri sicuri nel nome salvato su disco.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id, other_user_id = %other_user_id))]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(other_user_id): Path<i64>,
    Query(params): Query<ConversationPageQuery>,
    Extension(current_user): Extension<User>,
) -> Result<Json<ConversationPageDTO>, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * limit;

    // pagina presa dalla più recente, poi rovesciata per la visualizzazione
    let mut messages = state
        .msg
        .find_conversation_page(
            &current_user.user_id,
            &other_user_id,
            limit as i64,
            offset as i64,
        )
        .await?;
    messages.reverse();

    let total = state
        .msg
        .count_conversation(&current_user.user_id, &other_user_id)
        .await?;

    let messages = enrich_pair_messages(&state, current_user, other_user_id, messages).await?;

    Ok(Json(ConversationPageDTO {
        messages,
        total_pages: ((total + limit as i64 - 1) / limit as i64) as u32,
        current_page: page,
        total,
    }))
}

/// Arricchisce i messaggi di una coppia con le due proiezioni (sono sempre
/// e solo due utenti, una fetch a testa).
async fn enrich_pair_messages(
    state: &AppState,
    current_user: User,
    other_user_id: i64,
    messages: Vec<Message>,
) -> Result<Vec<MessageDTO>, AppError> {
    if messages.is_empty() {
        return Ok(Vec::new());
    }

    let other = state
        .user
        .read(&other_user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let me_id = current_user.user_id;
    let me_projection = decorated_projection(state, current_user).await?;
    let other_projection = decorated_projection(state, other).await?;

    Ok(messages
        .into_iter()
        .map(|m| {
            let (sender, receiver) = if m.sender_id == me_id {
                (me_projection.clone(), other_projection.clone())
            } else {
                (other_projection.clone(), me_projection.clone())
            };
            MessageDTO::enriched(m, sender, receiver)
        })
        .collect())
}

/// PUT /messages/read/{sender_id} - marca come letti tutti i non letti che
/// sender ha inviato al chiamante. Idempotente.
#[instrument(skip(state, current_user), fields(receiver_id = %current_user.user_id, sender_id = %sender_id))]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(sender_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = state
        .msg
        .mark_read(&sender_id, &current_user.user_id)
        .await?;

    debug!(updated, "messages marked as read");

    Ok(Json(serde_json::json!({
        "message": "Messages marked as read",
        "updated": updated,
    })))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<UnreadCountDTO>, AppError> {
    let unread_count = state.msg.count_unread(&current_user.user_id).await?;
    Ok(Json(UnreadCountDTO { unread_count }))
}

/// DELETE /messages/{id} - consentita solo al mittente.
#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id, message_id = %message_id))]
pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Path(message_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<StatusCode, AppError> {
    let message = state
        .msg
        .read(&message_id)
        .await?
        .ok_or_else(|| AppError::not_found("Message not found"))?;

    if message.sender_id != current_user.user_id {
        warn!("delete attempted by non-sender");
        return Err(AppError::forbidden("Not authorized"));
    }

    state.msg.delete(&message_id).await?;
    info!("message deleted");

    Ok(StatusCode::NO_CONTENT)
}
