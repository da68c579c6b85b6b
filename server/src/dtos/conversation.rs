//! Conversation DTOs - Vista derivata "elenco conversazioni"
//!
//! Una conversazione non è persistita: è la coppia non ordinata di utenti,
//! materializzata a lettura raggruppando i messaggi per controparte.

use crate::dtos::{MessageDTO, UserPublicDTO};
use serde::{Deserialize, Serialize};

/// Chiave canonica della coppia: i due id ordinati e uniti da '-'.
/// Indipendente dall'ordine degli argomenti, quindi la vista del mittente e
/// quella del destinatario collassano sulla stessa identità.
pub fn conversation_key(a: i64, b: i64) -> String {
    if a <= b {
        format!("{}-{}", a, b)
    } else {
        format!("{}-{}", b, a)
    }
}

/// True se l'utente è uno dei due partecipanti codificati nella chiave.
pub fn key_involves(key: &str, user_id: i64) -> bool {
    match key.split_once('-') {
        Some((a, b)) => {
            a.parse::<i64>() == Ok(user_id) || b.parse::<i64>() == Ok(user_id)
        }
        None => false,
    }
}

/// Voce dell'elenco conversazioni per l'utente chiamante.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConversationDTO {
    pub conversation_id: String,
    pub user: UserPublicDTO,
    pub last_message: MessageDTO,
    pub unread_count: i64,
}

/// Risposta di GET /messages/conversations
#[derive(Serialize, Deserialize, Debug)]
pub struct ConversationsDTO {
    pub conversations: Vec<ConversationDTO>,
}

#[cfg(test)]
mod tests {
    use super::conversation_key;

    #[test]
    fn conversation_key_is_order_independent() {
        assert_eq!(conversation_key(7, 3), conversation_key(3, 7));
        assert_eq!(conversation_key(3, 7), "3-7");
    }

    #[test]
    fn conversation_key_sorts_numerically() {
        // con id numerici 10 viene dopo 2, non prima come in ordine lessicale
        assert_eq!(conversation_key(10, 2), "2-10");
    }

    #[test]
    fn key_involves_matches_only_participants() {
        let key = super::conversation_key(3, 7);
        assert!(super::key_involves(&key, 3));
        assert!(super::key_involves(&key, 7));
        assert!(!super::key_involves(&key, 37));
        assert!(!super::key_involves("not-a-key", 3));
    }
}
