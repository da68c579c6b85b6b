//! Message DTOs - Data Transfer Objects per messaggi

use crate::dtos::UserPublicDTO;
use crate::entities::{Message, MessageKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Messaggio arricchito con le proiezioni pubbliche di mittente e
/// destinatario, così come viaggia verso il client (HTTP e WebSocket).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageDTO {
    pub message_id: i64,
    pub sender: UserPublicDTO,
    pub receiver: UserPublicDTO,
    pub content: String,
    pub message_kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<i64>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MessageDTO {
    /// Combina l'entity con le proiezioni dei due partecipanti.
    pub fn enriched(message: Message, sender: UserPublicDTO, receiver: UserPublicDTO) -> Self {
        Self {
            message_id: message.message_id,
            sender,
            receiver,
            content: message.content,
            message_kind: message.message_kind,
            file_url: message.file_url,
            file_name: message.file_name,
            file_size: message.file_size,
            appointment_id: message.appointment_id,
            is_read: message.is_read,
            read_at: message.read_at,
            created_at: message.created_at,
        }
    }
}

/// Body JSON di POST /messages/send (la variante multipart trasporta gli
/// stessi campi come parti del form, più il file).
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct SendMessageDTO {
    pub receiver_id: i64,

    #[serde(default)]
    #[validate(length(max = 1000, message = "Message content must be at most 1000 characters"))]
    pub content: String,

    #[serde(default)]
    pub message_kind: MessageKind,

    pub appointment_id: Option<i64>,
}

/// DTO interno per l'inserimento di un nuovo messaggio (senza message_id)
#[derive(Debug, Clone)]
pub struct CreateMessageDTO {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub message_kind: MessageKind,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub appointment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Risposta di POST /messages/send
#[derive(Serialize, Deserialize, Debug)]
pub struct SendMessageResponseDTO {
    pub message: MessageDTO,
    pub success: bool,
}

/// Pagina di conversazione: messaggi in ordine crescente di creazione
/// più i metadati di paginazione.
#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationPageDTO {
    pub messages: Vec<MessageDTO>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total: i64,
}

/// Risposta di GET /messages/unread/count
#[derive(Serialize, Deserialize, Debug)]
pub struct UnreadCountDTO {
    pub unread_count: i64,
}
