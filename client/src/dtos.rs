//! Wire types - Specchi client dei DTO del server
//!
//! Il client definisce le proprie struct di linea invece di importare il
//! crate del server: il contratto è il JSON, non i tipi interni.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chiave canonica della coppia: i due id ordinati e uniti da '-'.
pub fn conversation_key(a: i64, b: i64) -> String {
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}

/// Proiezione pubblica di un utente come arriva dal server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

/// Messaggio arricchito con le proiezioni dei due partecipanti.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    pub message_id: i64,
    pub sender: UserProfile,
    pub receiver: UserProfile,
    pub content: String,
    pub message_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<i64>,
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Voce dell'elenco conversazioni.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Conversation {
    pub conversation_id: String,
    pub user: UserProfile,
    pub last_message: Message,
    pub unread_count: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Conversations {
    pub conversations: Vec<Conversation>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationPage {
    pub messages: Vec<Message>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SendMessageResponse {
    pub message: Message,
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UnreadCount {
    pub unread_count: i64,
}

/// Eventi client -> server sul canale real-time.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Authenticate { user_id: i64 },
    JoinConversation { conversation_id: String },
    LeaveConversation { conversation_id: String },
    NewMessage {
        conversation_id: String,
        message: Message,
    },
    Typing {
        conversation_id: String,
        user_id: i64,
        is_typing: bool,
    },
}

/// Eventi server -> client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    MessageReceived {
        message: Message,
        conversation_id: String,
    },
    MessageSent { message: Message },
    UserTyping { user_id: i64, is_typing: bool },
    Error { code: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_event_parses_from_wire_format() {
        let raw = r#"{
            "type": "message-received",
            "data": {
                "message": {
                    "message_id": 9,
                    "sender": {"user_id": 2, "name": "Dr. K", "email": "k@x.it", "role": "doctor", "specialty": "Cardiology"},
                    "receiver": {"user_id": 1, "name": "A", "email": "a@x.it", "role": "patient"},
                    "content": "ciao",
                    "message_kind": "text",
                    "is_read": false,
                    "read_at": null,
                    "created_at": "2026-01-01T10:00:00Z"
                },
                "conversation_id": "1-2"
            }
        }"#;

        match serde_json::from_str::<ServerEvent>(raw).unwrap() {
            ServerEvent::MessageReceived {
                message,
                conversation_id,
            } => {
                assert_eq!(conversation_id, "1-2");
                assert_eq!(message.message_id, 9);
                assert_eq!(message.sender.specialty.as_deref(), Some("Cardiology"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn conversation_key_matches_server_convention() {
        assert_eq!(conversation_key(5, 2), "2-5");
        assert_eq!(conversation_key(2, 5), conversation_key(5, 2));
    }
}
