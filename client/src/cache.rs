//! ConversationCache - Stato locale riconciliato
//!
//! Tre sorgenti di aggiornamento indipendenti corrono tra loro: la fetch
//! esplicita, il polling periodico e i push del canale real-time. La cache
//! deve restare corretta con qualunque interleaving, quindi ogni messaggio
//! viene applicato come upsert con chiave message_id, mai come append cieco:
//! una consegna duplicata (push + poll sulla stessa riga) è un no-op sia per
//! le liste che per i contatori non letti.

use crate::dtos::{Conversation, Message, UserProfile, conversation_key};
use std::collections::HashSet;

/// Esito dell'applicazione di un push alla cache.
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// message_id già visto: nessuna modifica.
    Duplicate,
    /// Il thread era aperto: messaggio accodato e marcato letto in locale.
    /// Il chiamante deve propagare il mark-read remoto.
    OpenThreadAppended { counterparty_id: i64 },
    /// Thread non aperto: aggiornata (o sintetizzata) la voce di elenco.
    ConversationUpdated {
        counterparty_id: i64,
        /// true se la voce non esisteva ed è stata creata dal push
        provisional: bool,
    },
}

struct OpenThread {
    other: UserProfile,
    messages: Vec<Message>,
}

pub struct ConversationCache {
    me: i64,
    conversations: Vec<Conversation>,
    open: Option<OpenThread>,
    /// Marker di notifica per controparte (pallino sull'elenco).
    notifications: HashSet<i64>,
    /// Controparti che stanno scrivendo in questo momento.
    typing: HashSet<i64>,
    /// Tutti i message_id mai assorbiti, da qualunque sorgente.
    seen_ids: HashSet<i64>,
}

impl ConversationCache {
    pub fn new(me: i64) -> Self {
        Self {
            me,
            conversations: Vec::new(),
            open: None,
            notifications: HashSet::new(),
            typing: HashSet::new(),
            seen_ids: HashSet::new(),
        }
    }

    pub fn me(&self) -> i64 {
        self.me
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn open_counterparty(&self) -> Option<&UserProfile> {
        self.open.as_ref().map(|t| &t.other)
    }

    pub fn open_messages(&self) -> &[Message] {
        self.open.as_ref().map(|t| t.messages.as_slice()).unwrap_or(&[])
    }

    pub fn is_notified(&self, counterparty_id: i64) -> bool {
        self.notifications.contains(&counterparty_id)
    }

    pub fn typing_users(&self) -> &HashSet<i64> {
        &self.typing
    }

    /// Somma dei non letti su tutte le voci.
    pub fn unread_total(&self) -> i64 {
        self.conversations.iter().map(|c| c.unread_count).sum()
    }

    /// Merge autorevole dall'indice del server (fetch o poll). Gli id degli
    /// ultimi messaggi vengono assorbiti in seen_ids: un push in ritardo
    /// sulla stessa riga non deve ricontare un non letto già conteggiato.
    pub fn replace_conversations(&mut self, conversations: Vec<Conversation>) {
        for conversation in &conversations {
            self.seen_ids.insert(conversation.last_message.message_id);
        }
        self.conversations = conversations;
        self.sort_conversations();
    }

    /// Applica un messaggio arrivato dal canale push (o la risposta di un
    /// invio proprio). Upsert con chiave message_id.
    pub fn apply_push(&mut self, mut message: Message) -> PushOutcome {
        if !self.seen_ids.insert(message.message_id) {
            return PushOutcome::Duplicate;
        }

        let incoming = message.sender.user_id != self.me;
        let other = if incoming {
            message.sender.clone()
        } else {
            message.receiver.clone()
        };

        let thread_is_open = self
            .open
            .as_ref()
            .is_some_and(|t| t.other.user_id == other.user_id);

        if thread_is_open {
            // letto subito: niente incremento non letti, niente marker
            if incoming {
                message.is_read = true;
            }
            self.upsert_entry(&other, &message, false);
            self.insert_into_open_thread(message);
            if incoming {
                return PushOutcome::OpenThreadAppended {
                    counterparty_id: other.user_id,
                };
            }
            return PushOutcome::ConversationUpdated {
                counterparty_id: other.user_id,
                provisional: false,
            };
        }

        let provisional = self.upsert_entry(&other, &message, incoming);
        if incoming {
            self.notifications.insert(other.user_id);
        }
        PushOutcome::ConversationUpdated {
            counterparty_id: other.user_id,
            provisional,
        }
    }

    /// Apre il thread con la controparte: azzera il marker di notifica e
    /// prepara la lista messaggi vuota in attesa della fetch.
    /// Ritorna la chiave di conversazione da joinare sul canale real-time.
    pub fn open_thread(&mut self, other: UserProfile) -> String {
        self.notifications.remove(&other.user_id);
        let key = conversation_key(self.me, other.user_id);
        self.open = Some(OpenThread {
            other,
            messages: Vec::new(),
        });
        key
    }

    pub fn close_thread(&mut self) {
        self.open = None;
    }

    /// Merge idempotente della pagina fetchata nel thread aperto. La fetch
    /// viaggia insieme al mark-read remoto, quindi il conteggio locale della
    /// controparte si azzera qui.
    pub fn thread_loaded(&mut self, messages: Vec<Message>) {
        let Some(other_id) = self.open.as_ref().map(|t| t.other.user_id) else {
            return;
        };

        for message in messages {
            // un push può essere arrivato prima della risposta della fetch:
            // la riga già vista non va duplicata
            if self.seen_ids.insert(message.message_id)
                || !self.open_contains(message.message_id)
            {
                self.insert_into_open_thread(message);
            }
        }

        self.mark_thread_read_local(other_id);
    }

    /// Azzeramento locale dei non letti di una controparte (dopo il
    /// mark-read remoto, o in attesa che vada a buon fine: best effort).
    pub fn mark_thread_read_local(&mut self, counterparty_id: i64) {
        self.notifications.remove(&counterparty_id);
        if let Some(entry) = self
            .conversations
            .iter_mut()
            .find(|c| c.user.user_id == counterparty_id)
        {
            entry.unread_count = 0;
        }
    }

    pub fn set_typing(&mut self, user_id: i64, is_typing: bool) {
        if is_typing {
            self.typing.insert(user_id);
        } else {
            self.typing.remove(&user_id);
        }
    }

    /// Controparti disponibili per aprire un thread nuovo: mai il chiamante,
    /// mai chi ha già una voce in elenco (eviterebbe due ingressi verso lo
    /// stesso thread), filtro opzionale su nome/email.
    pub fn filter_new_counterparties(
        &self,
        all_users: &[UserProfile],
        search: &str,
    ) -> Vec<UserProfile> {
        let needle = search.trim().to_lowercase();
        all_users
            .iter()
            .filter(|u| u.user_id != self.me)
            .filter(|u| {
                needle.is_empty()
                    || u.name.to_lowercase().contains(&needle)
                    || u.email.to_lowercase().contains(&needle)
            })
            .filter(|u| {
                !self
                    .conversations
                    .iter()
                    .any(|c| c.user.user_id == u.user_id)
            })
            .cloned()
            .collect()
    }

    fn open_contains(&self, message_id: i64) -> bool {
        self.open
            .as_ref()
            .is_some_and(|t| t.messages.iter().any(|m| m.message_id == message_id))
    }

    /// Inserimento ordinato per (created_at, message_id) nel thread aperto.
    fn insert_into_open_thread(&mut self, message: Message) {
        let Some(thread) = self.open.as_mut() else {
            return;
        };
        if thread.messages.iter().any(|m| m.message_id == message.message_id) {
            return;
        }
        let key = (message.created_at, message.message_id);
        let position = thread
            .messages
            .partition_point(|m| (m.created_at, m.message_id) <= key);
        thread.messages.insert(position, message);
    }

    /// Aggiorna la voce della controparte o la sintetizza se assente.
    /// Ritorna true quando la voce è nuova (provvisoria fino al prossimo
    /// merge autorevole dal server).
    fn upsert_entry(&mut self, other: &UserProfile, message: &Message, count_unread: bool) -> bool {
        let provisional = match self
            .conversations
            .iter_mut()
            .find(|c| c.user.user_id == other.user_id)
        {
            Some(entry) => {
                // mai regredire: il last-message resta il massimo visto
                let newer = (message.created_at, message.message_id)
                    >= (entry.last_message.created_at, entry.last_message.message_id);
                if newer {
                    entry.last_message = message.clone();
                }
                if count_unread {
                    entry.unread_count += 1;
                }
                false
            }
            None => {
                self.conversations.push(Conversation {
                    conversation_id: conversation_key(self.me, other.user_id),
                    user: other.clone(),
                    last_message: message.clone(),
                    unread_count: if count_unread { 1 } else { 0 },
                });
                true
            }
        };
        self.sort_conversations();
        provisional
    }

    fn sort_conversations(&mut self) {
        self.conversations
            .sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn profile(id: i64, name: &str) -> UserProfile {
        UserProfile {
            user_id: id,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            profile_image: None,
            role: if id == 2 { "doctor" } else { "patient" }.to_string(),
            specialty: if id == 2 {
                Some("Cardiology".to_string())
            } else {
                None
            },
        }
    }

    fn message(id: i64, from: i64, to: i64, minutes: i64) -> Message {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        Message {
            message_id: id,
            sender: profile(from, &format!("User{}", from)),
            receiver: profile(to, &format!("User{}", to)),
            content: format!("messaggio {}", id),
            message_kind: "text".to_string(),
            file_url: None,
            file_name: None,
            file_size: None,
            appointment_id: None,
            is_read: false,
            read_at: None,
            created_at: base + Duration::minutes(minutes),
        }
    }

    fn entry_for(cache: &ConversationCache, other: i64) -> &Conversation {
        cache
            .conversations()
            .iter()
            .find(|c| c.user.user_id == other)
            .expect("missing conversation entry")
    }

    #[test]
    fn push_for_unknown_counterparty_synthesizes_entry() {
        let mut cache = ConversationCache::new(1);

        let outcome = cache.apply_push(message(10, 2, 1, 0));
        assert_eq!(
            outcome,
            PushOutcome::ConversationUpdated {
                counterparty_id: 2,
                provisional: true
            }
        );

        let entry = entry_for(&cache, 2);
        assert_eq!(entry.unread_count, 1);
        assert_eq!(entry.conversation_id, "1-2");
        assert_eq!(entry.last_message.message_id, 10);
        assert!(cache.is_notified(2), "marker di notifica atteso");
    }

    #[test]
    fn duplicate_push_is_a_complete_noop() {
        let mut cache = ConversationCache::new(1);

        cache.apply_push(message(10, 2, 1, 0));
        let before_unread = cache.unread_total();
        let before_len = cache.conversations().len();

        // push + poll che riconsegnano la stessa riga
        let outcome = cache.apply_push(message(10, 2, 1, 0));
        assert_eq!(outcome, PushOutcome::Duplicate);
        assert_eq!(cache.unread_total(), before_unread);
        assert_eq!(cache.conversations().len(), before_len);
    }

    #[test]
    fn push_while_thread_open_appends_and_requests_remote_mark_read() {
        let mut cache = ConversationCache::new(1);
        cache.open_thread(profile(2, "Bruno"));

        let outcome = cache.apply_push(message(10, 2, 1, 0));
        assert_eq!(
            outcome,
            PushOutcome::OpenThreadAppended { counterparty_id: 2 }
        );

        assert_eq!(cache.open_messages().len(), 1);
        assert!(cache.open_messages()[0].is_read, "letto subito in locale");
        assert_eq!(entry_for(&cache, 2).unread_count, 0);
        assert!(!cache.is_notified(2), "niente marker col thread aperto");
    }

    #[test]
    fn push_for_other_thread_does_not_touch_open_messages() {
        let mut cache = ConversationCache::new(1);
        cache.open_thread(profile(2, "Bruno"));
        cache.apply_push(message(10, 2, 1, 0));

        // arriva un push da un terzo utente: la lista del thread aperto
        // non va toccata, la voce del terzo sì
        let outcome = cache.apply_push(message(11, 3, 1, 1));
        assert_eq!(
            outcome,
            PushOutcome::ConversationUpdated {
                counterparty_id: 3,
                provisional: true
            }
        );
        assert_eq!(cache.open_messages().len(), 1);
        assert_eq!(entry_for(&cache, 3).unread_count, 1);
        assert!(cache.is_notified(3));
    }

    #[test]
    fn own_sent_message_never_counts_as_unread() {
        let mut cache = ConversationCache::new(1);

        let outcome = cache.apply_push(message(10, 1, 2, 0));
        assert_eq!(
            outcome,
            PushOutcome::ConversationUpdated {
                counterparty_id: 2,
                provisional: true
            }
        );
        assert_eq!(entry_for(&cache, 2).unread_count, 0);
        assert!(!cache.is_notified(2));
    }

    #[test]
    fn open_thread_clears_notification_marker() {
        let mut cache = ConversationCache::new(1);
        cache.apply_push(message(10, 2, 1, 0));
        assert!(cache.is_notified(2));

        let key = cache.open_thread(profile(2, "Bruno"));
        assert_eq!(key, "1-2");
        assert!(!cache.is_notified(2));
    }

    #[test]
    fn thread_loaded_merges_idempotently_with_early_push() {
        let mut cache = ConversationCache::new(1);
        cache.open_thread(profile(2, "Bruno"));

        // il push vince la corsa con la risposta della fetch
        cache.apply_push(message(12, 2, 1, 2));

        // la fetch riporta anche la riga già pushata
        cache.thread_loaded(vec![
            message(10, 1, 2, 0),
            message(11, 2, 1, 1),
            message(12, 2, 1, 2),
        ]);

        let ids: Vec<i64> = cache.open_messages().iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![10, 11, 12], "ordinati e senza duplicati");
        assert_eq!(entry_for(&cache, 2).unread_count, 0);
    }

    #[test]
    fn poll_then_late_push_does_not_double_count() {
        let mut cache = ConversationCache::new(1);

        // il poll arriva per primo con la voce già conteggiata dal server
        cache.replace_conversations(vec![Conversation {
            conversation_id: "1-2".to_string(),
            user: profile(2, "Bruno"),
            last_message: message(10, 2, 1, 0),
            unread_count: 1,
        }]);
        assert_eq!(cache.unread_total(), 1);

        // lo stesso messaggio arriva poi dal push: già visto
        let outcome = cache.apply_push(message(10, 2, 1, 0));
        assert_eq!(outcome, PushOutcome::Duplicate);
        assert_eq!(cache.unread_total(), 1);
    }

    #[test]
    fn conversations_stay_sorted_by_last_message() {
        let mut cache = ConversationCache::new(1);
        cache.apply_push(message(10, 2, 1, 0));
        cache.apply_push(message(11, 3, 1, 5));
        cache.apply_push(message(12, 4, 1, 2));

        let order: Vec<i64> = cache
            .conversations()
            .iter()
            .map(|c| c.user.user_id)
            .collect();
        assert_eq!(order, vec![3, 4, 2], "thread più recente per primo");

        // un messaggio nuovo riporta in cima la controparte
        cache.apply_push(message(13, 2, 1, 9));
        let order: Vec<i64> = cache
            .conversations()
            .iter()
            .map(|c| c.user.user_id)
            .collect();
        assert_eq!(order, vec![2, 3, 4]);
    }

    #[test]
    fn last_message_never_regresses() {
        let mut cache = ConversationCache::new(1);
        cache.apply_push(message(11, 2, 1, 5));

        // arriva in ritardo una riga più vecchia della stessa coppia
        cache.apply_push(message(10, 2, 1, 0));

        assert_eq!(entry_for(&cache, 2).last_message.message_id, 11);
        // ma il non letto viene comunque conteggiato una volta
        assert_eq!(entry_for(&cache, 2).unread_count, 2);
    }

    #[test]
    fn authoritative_merge_replaces_provisional_state() {
        let mut cache = ConversationCache::new(1);
        cache.apply_push(message(10, 2, 1, 0));
        cache.apply_push(message(11, 3, 1, 1));

        cache.replace_conversations(vec![Conversation {
            conversation_id: "1-2".to_string(),
            user: profile(2, "Bruno"),
            last_message: message(10, 2, 1, 0),
            unread_count: 1,
        }]);

        assert_eq!(cache.conversations().len(), 1);
        assert_eq!(cache.unread_total(), 1);
    }

    #[test]
    fn filter_excludes_self_and_existing_counterparties() {
        let mut cache = ConversationCache::new(1);
        cache.apply_push(message(10, 2, 1, 0));

        let directory = vec![
            profile(1, "Me"),
            profile(2, "Bruno"),
            profile(3, "Carla"),
            profile(4, "Elena"),
        ];

        let available = cache.filter_new_counterparties(&directory, "");
        let ids: Vec<i64> = available.iter().map(|u| u.user_id).collect();
        assert_eq!(ids, vec![3, 4], "mai il chiamante né chi è già in elenco");

        let searched = cache.filter_new_counterparties(&directory, "carla");
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].user_id, 3);
    }

    #[test]
    fn unread_total_matches_sum_of_entries() {
        let mut cache = ConversationCache::new(1);
        cache.apply_push(message(10, 2, 1, 0));
        cache.apply_push(message(11, 2, 1, 1));
        cache.apply_push(message(12, 3, 1, 2));

        assert_eq!(cache.unread_total(), 3);

        cache.mark_thread_read_local(2);
        assert_eq!(cache.unread_total(), 1);
    }

    #[test]
    fn typing_markers_follow_events() {
        let mut cache = ConversationCache::new(1);
        cache.set_typing(2, true);
        assert!(cache.typing_users().contains(&2));
        cache.set_typing(2, false);
        assert!(!cache.typing_users().contains(&2));
    }
}
