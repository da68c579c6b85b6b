//! Conversation services - Indice derivato delle conversazioni
//!
//! L'indice è calcolato a lettura dall'aggregazione del Message Store:
//! niente tabella riassuntiva da tenere allineata, il costo è una scansione
//! aggregata per chiamata. A questi volumi va bene così.

use crate::core::{AppError, AppState};
use crate::dtos::{ConversationDTO, ConversationsDTO, MessageDTO, conversation_key};
use crate::entities::User;
use crate::repositories::{ConversationSummary, Read};
use crate::services::user::decorated_projection;
use axum::{
    Extension,
    extract::{Json, State},
};
use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// GET /messages/conversations - una voce per controparte, con ultimo
/// messaggio e conteggio non letti, ordinate dal thread più recente.
/// Lista vuota (non errore) per chi non ha ancora messaggi.
#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<ConversationsDTO>, AppError> {
    let summaries = state.msg.conversation_summaries(&current_user.user_id).await?;
    debug!(count = summaries.len(), "conversation summaries loaded");

    let me_id = current_user.user_id;
    let me_projection = decorated_projection(&state, current_user).await?;

    // una lookup per controparte (profilo + ultimo messaggio), in parallelo;
    // try_join_all preserva l'ordinamento per ultimo messaggio della query
    let entries = try_join_all(summaries.into_iter().map(|summary| {
        build_entry(&state, me_id, &me_projection, summary)
    }))
    .await?;

    let conversations: Vec<ConversationDTO> = entries.into_iter().flatten().collect();
    info!(count = conversations.len(), "conversations listed");

    Ok(Json(ConversationsDTO { conversations }))
}

async fn build_entry(
    state: &AppState,
    me_id: i64,
    me_projection: &crate::dtos::UserPublicDTO,
    summary: ConversationSummary,
) -> Result<Option<ConversationDTO>, AppError> {
    // controparte sparita dalla directory: la voce non è più mostrabile
    let other = match state.user.read(&summary.other_id).await? {
        Some(user) => user,
        None => return Ok(None),
    };
    let other_projection = decorated_projection(state, other).await?;

    // invariante dell'indice: last_message è il massimo persistito della
    // coppia, riletto adesso dallo store
    let last = match state.msg.last_in_pair(&me_id, &summary.other_id).await? {
        Some(message) => message,
        None => return Ok(None), // svuotata tra le due query
    };

    let (sender, receiver) = if last.sender_id == me_id {
        (me_projection.clone(), other_projection.clone())
    } else {
        (other_projection.clone(), me_projection.clone())
    };

    Ok(Some(ConversationDTO {
        conversation_id: conversation_key(me_id, summary.other_id),
        user: other_projection,
        last_message: MessageDTO::enriched(last, sender, receiver),
        unread_count: summary.unread_count,
    }))
}
