//! WebSocket Event DTOs - Eventi del canale real-time
//!
//! Tagged union serializzata come { "type": "...", "data": { ... } } con i
//! nomi evento in kebab-case, es:
//! { "type": "message-received", "data": { "message": ..., "conversation_id": "1-2" } }

use crate::dtos::MessageDTO;
use serde::{Deserialize, Serialize};

/// Eventi che il client invia al server.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEventDTO {
    /// Lega la connessione all'identità: deve coincidere con il token JWT
    /// usato per l'upgrade.
    Authenticate { user_id: i64 },
    JoinConversation { conversation_id: String },
    LeaveConversation { conversation_id: String },
    /// Relay effimero verso la room, senza persistenza (il percorso
    /// autorevole per creare un messaggio resta POST /messages/send).
    NewMessage {
        conversation_id: String,
        message: MessageDTO,
    },
    Typing {
        conversation_id: String,
        user_id: i64,
        is_typing: bool,
    },
}

/// Eventi che il server spinge verso il client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEventDTO {
    MessageReceived {
        message: MessageDTO,
        conversation_id: String,
    },
    MessageSent { message: MessageDTO },
    UserTyping { user_id: i64, is_typing: bool },
    Error { code: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_kebab_case_tags() {
        let event = ClientEventDTO::JoinConversation {
            conversation_id: "1-2".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "join-conversation");
        assert_eq!(json["data"]["conversation_id"], "1-2");
    }

    #[test]
    fn authenticate_round_trips() {
        let raw = r#"{"type":"authenticate","data":{"user_id":42}}"#;
        let event: ClientEventDTO = serde_json::from_str(raw).unwrap();
        match event {
            ClientEventDTO::Authenticate { user_id } => assert_eq!(user_id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
