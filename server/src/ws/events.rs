//! WebSocket Event Handlers - Gestione degli eventi del client
//!
//! Stati della connessione: Connecting (upgrade riuscito) -> Authenticated
//! (evento authenticate con id coerente col token) -> iscritta a zero o più
//! room. Join e relay sono ammessi solo da autenticati.

use crate::AppState;
use crate::dtos::conversation::key_involves;
use crate::dtos::{ClientEventDTO, ServerEventDTO};
use crate::ws::registry::InternalSignal;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

#[instrument(skip(state, internal_tx, event), fields(user_id))]
pub async fn process_event(
    state: &Arc<AppState>,
    user_id: i64,
    bound_epoch: &mut Option<u64>,
    internal_tx: &UnboundedSender<InternalSignal>,
    event: ClientEventDTO,
) {
    match event {
        ClientEventDTO::Authenticate { user_id: claimed } => {
            // l'id dichiarato deve coincidere con l'identità del token
            if claimed != user_id {
                warn!(claimed, "authenticate with mismatched user id");
                deliver_error(internal_tx, 403, "Authenticate user id does not match token");
                return;
            }
            let epoch = state.sessions.bind(user_id, internal_tx.clone());
            *bound_epoch = Some(epoch);
            info!("connection authenticated");
        }

        ClientEventDTO::JoinConversation { conversation_id } => {
            if bound_epoch.is_none() {
                deliver_error(internal_tx, 401, "Authenticate before joining a conversation");
                return;
            }
            if !key_involves(&conversation_id, user_id) {
                warn!(conversation_id, "join for a conversation of other users");
                deliver_error(internal_tx, 403, "Not a participant of this conversation");
                return;
            }
            let _ = internal_tx.send(InternalSignal::JoinRoom(conversation_id));
        }

        ClientEventDTO::LeaveConversation { conversation_id } => {
            // idempotente: lasciare una room mai joinata è un no-op
            let _ = internal_tx.send(InternalSignal::LeaveRoom(conversation_id));
        }

        ClientEventDTO::NewMessage {
            conversation_id,
            message,
        } => {
            // relay effimero verso la room, nessuna persistenza qui
            if bound_epoch.is_none() || !key_involves(&conversation_id, user_id) {
                deliver_error(internal_tx, 403, "Cannot relay to this conversation");
                return;
            }
            let event = Arc::new(ServerEventDTO::MessageReceived {
                message,
                conversation_id: conversation_id.clone(),
            });
            if state.rooms.send(&conversation_id, event).is_err() {
                debug!(conversation_id, "relay to empty room dropped");
            }
        }

        ClientEventDTO::Typing {
            conversation_id,
            is_typing,
            ..
        } => {
            if bound_epoch.is_none() || !key_involves(&conversation_id, user_id) {
                return;
            }
            // l'origine è sempre l'identità della sessione, non il campo
            // dichiarato dal client
            let event = Arc::new(ServerEventDTO::UserTyping { user_id, is_typing });
            if state.rooms.send(&conversation_id, event).is_err() {
                debug!(conversation_id, "typing for empty room dropped");
            }
        }
    }
}

fn deliver_error(internal_tx: &UnboundedSender<InternalSignal>, code: u16, message: &str) {
    let _ = internal_tx.send(InternalSignal::Deliver(Arc::new(ServerEventDTO::Error {
        code,
        message: message.to_string(),
    })));
}
