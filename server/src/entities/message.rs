//! Message entity - Messaggio diretto tra due utenti
//!
//! sender/receiver/content sono immutabili dopo la creazione; l'unico campo
//! che muta è lo stato di lettura (is_read, read_at), in modo monotono:
//! da non letto a letto, mai il contrario.

use super::MessageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub message_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub message_kind: MessageKind,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub appointment_id: Option<i64>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
