//! WebSocket Module - Canale real-time best-effort
//!
//! Il canale push è solo un'ottimizzazione di latenza: la correttezza non
//! dipende mai dalla consegna di un evento, perché ogni aggiornamento spinto
//! è riconciliabile dal client con una fetch o col polling periodico.
//! Include:
//! - Upgrade HTTP -> WebSocket (autenticato dal middleware JWT)
//! - Registro di presenza (bind/unbind/lookup con epoch per connessione)
//! - Room broadcast per conversazione
//! - Fan-out dei messaggi appena persistiti

pub mod connection;
pub mod events;
pub mod fanout;
pub mod registry;
pub mod rooms;

// Re-exports pubblici
pub use connection::handle_socket;
pub use fanout::notify_message;

use crate::{AppState, entities::User};
use axum::{
    Extension,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;

/// Capacità dei canali broadcast delle room.
pub const BROADCAST_CHANNEL_CAPACITY: usize = 64;

/// Intervallo minimo tra due messaggi in ingresso sulla stessa connessione.
pub const RATE_LIMITER_MILLIS: u64 = 50;

/// Una connessione senza traffico oltre questa soglia viene chiusa.
pub const IDLE_TIMEOUT_SECONDS: u64 = 300;

/// Entry point per le richieste di upgrade WebSocket.
/// L'identità arriva dal middleware JWT; il binding nel registro di
/// presenza avviene solo all'evento `authenticate` esplicito.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Response {
    let user_id = current_user.user_id;
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}
