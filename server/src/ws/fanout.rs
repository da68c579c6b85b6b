//! Fan-Out Router - Consegna di un messaggio appena persistito
//!
//! Chiamato fuori dal percorso critico della richiesta HTTP: la risposta di
//! POST /messages/send torna appena la persistenza riesce, il push è solo un
//! tentativo. Nessun retry: chi non è raggiungibile riconcilia via fetch.

use crate::AppState;
use crate::dtos::{MessageDTO, ServerEventDTO, conversation_key};
use crate::ws::registry::InternalSignal;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Emette il messaggio (a) sulla room della coppia, per i client col thread
/// aperto, e (b) direttamente sulla sessione di ciascun partecipante se
/// connesso, per i client fermi sull'elenco conversazioni.
#[instrument(skip(state, message), fields(message_id = message.message_id))]
pub fn notify_message(state: &AppState, message: &MessageDTO) {
    let conversation_id = conversation_key(message.sender.user_id, message.receiver.user_id);

    let room_event = Arc::new(ServerEventDTO::MessageReceived {
        message: message.clone(),
        conversation_id: conversation_id.clone(),
    });
    if state.rooms.send(&conversation_id, room_event).is_err() {
        debug!(conversation_id, "no open room for conversation");
    }

    state.sessions.send_if_online(
        &message.sender.user_id,
        InternalSignal::Deliver(Arc::new(ServerEventDTO::MessageSent {
            message: message.clone(),
        })),
    );
    state.sessions.send_if_online(
        &message.receiver.user_id,
        InternalSignal::Deliver(Arc::new(ServerEventDTO::MessageReceived {
            message: message.clone(),
            conversation_id,
        })),
    );
}
