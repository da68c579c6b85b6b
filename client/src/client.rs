//! MessagingClient - Orchestrazione di cache, REST e canale real-time
//!
//! Tiene insieme le tre sorgenti di aggiornamento: fetch esplicite su azione
//! dell'utente, polling periodico dell'indice conversazioni e push del
//! socket. Tutte convergono sulla stessa ConversationCache, che garantisce
//! il merge idempotente per message_id qualunque sia l'ordine di arrivo.

use crate::api::{ApiClient, ApiError};
use crate::cache::{ConversationCache, PushOutcome};
use crate::dtos::{Message, ServerEvent, UserProfile, conversation_key};
use crate::socket::{self, SocketError, SocketHandle};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};
use tracing::{debug, warn};

/// Intervallo del polling di riconciliazione sull'indice conversazioni.
pub const POLL_INTERVAL_SECS: u64 = 10;

pub struct MessagingClient {
    me: UserProfile,
    token: String,
    api: ApiClient,
    cache: Arc<Mutex<ConversationCache>>,
    socket: Option<SocketHandle>,
    poller: Option<JoinHandle<()>>,
    event_pump: Option<JoinHandle<()>>,
}

impl MessagingClient {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        me: UserProfile,
    ) -> Result<Self, ApiError> {
        let token = token.into();
        let api = ApiClient::new(base_url, token.clone())?;
        let cache = Arc::new(Mutex::new(ConversationCache::new(me.user_id)));
        Ok(Self {
            me,
            token,
            api,
            cache,
            socket: None,
            poller: None,
            event_pump: None,
        })
    }

    /// Stato locale condiviso, per chi deve renderizzarlo.
    pub fn cache(&self) -> Arc<Mutex<ConversationCache>> {
        self.cache.clone()
    }

    pub fn profile(&self) -> &UserProfile {
        &self.me
    }

    /// Fetch esplicita dell'indice conversazioni (merge autorevole).
    pub async fn refresh_conversations(&self) -> Result<(), ApiError> {
        let conversations = self.api.list_conversations().await?;
        self.cache.lock().await.replace_conversations(conversations);
        Ok(())
    }

    /// Apre la sessione real-time e avvia il pump degli eventi verso la
    /// cache. Il push è un'ottimizzazione: se la connect fallisce il client
    /// resta funzionante col solo polling.
    pub async fn connect_realtime(&mut self, ws_url: &str) -> Result<(), SocketError> {
        let (handle, mut events) = socket::connect(ws_url, &self.token, self.me.user_id).await?;
        self.socket = Some(handle);

        let cache = self.cache.clone();
        let api = self.api.clone();
        self.event_pump = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handle_server_event(event, &cache, &api).await;
            }
            debug!("event pump terminated");
        }));

        Ok(())
    }

    /// Avvia il polling periodico. Gira fino al teardown del client.
    pub fn start_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let cache = self.cache.clone();
        let api = self.api.clone();
        self.poller = Some(tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(POLL_INTERVAL_SECS));
            loop {
                tick.tick().await;
                match api.list_conversations().await {
                    Ok(conversations) => {
                        cache.lock().await.replace_conversations(conversations);
                    }
                    Err(e) => warn!("conversation poll failed: {}", e),
                }
            }
        }));
    }

    /// Apre il thread con una controparte: marker azzerato, join della room,
    /// fetch della pagina e mark-read remoto.
    pub async fn select_counterparty(&self, user: UserProfile) -> Result<(), ApiError> {
        let other_id = user.user_id;

        let key = {
            let mut cache = self.cache.lock().await;
            if let (Some(socket), Some(previous)) = (&self.socket, cache.open_counterparty()) {
                socket.leave_conversation(&conversation_key(
                    self.me.user_id,
                    previous.user_id,
                ));
            }
            cache.open_thread(user)
        };

        if let Some(socket) = &self.socket {
            socket.join_conversation(&key);
        }

        let page = self.api.get_conversation(other_id, 1, 50).await?;

        // best effort: un mark-read fallito non è mai un errore utente
        if let Err(e) = self.api.mark_read(other_id).await {
            warn!("remote mark-read failed: {}", e);
        }

        self.cache.lock().await.thread_loaded(page.messages);
        Ok(())
    }

    /// Chiude il thread aperto lasciando la room.
    pub async fn close_thread(&self) {
        let mut cache = self.cache.lock().await;
        if let (Some(socket), Some(previous)) = (&self.socket, cache.open_counterparty()) {
            socket.leave_conversation(&conversation_key(self.me.user_id, previous.user_id));
        }
        cache.close_thread();
    }

    /// Invia e applica subito la risposta alla cache; poi riconcilia
    /// l'elenco come dopo ogni receive.
    pub async fn send_to(&self, receiver_id: i64, content: &str) -> Result<Message, ApiError> {
        let response = self.api.send_message(receiver_id, content, None).await?;

        self.cache.lock().await.apply_push(response.message.clone());

        if let Err(e) = self.refresh_conversations().await {
            warn!("post-send refresh failed: {}", e);
        }

        Ok(response.message)
    }

    /// Indicatore di digitazione, effimero e senza garanzie.
    pub fn notify_typing(&self, receiver_id: i64, is_typing: bool) {
        if let Some(socket) = &self.socket {
            let key = conversation_key(self.me.user_id, receiver_id);
            socket.send_typing(&key, self.me.user_id, is_typing);
        }
    }

    /// Controparti con cui aprire un thread nuovo: la directory del server
    /// meno chi ha già una voce in elenco.
    pub async fn available_counterparties(
        &self,
        role: Option<&str>,
        search: &str,
    ) -> Result<Vec<UserProfile>, ApiError> {
        let users = self.api.list_users(role).await?;
        Ok(self
            .cache
            .lock()
            .await
            .filter_new_counterparties(&users, search))
    }

    pub async fn unread_total(&self) -> i64 {
        self.cache.lock().await.unread_total()
    }
}

impl Drop for MessagingClient {
    fn drop(&mut self) {
        // il polling e il pump si fermano solo al teardown del componente
        if let Some(poller) = &self.poller {
            poller.abort();
        }
        if let Some(pump) = &self.event_pump {
            pump.abort();
        }
    }
}

async fn handle_server_event(
    event: ServerEvent,
    cache: &Arc<Mutex<ConversationCache>>,
    api: &ApiClient,
) {
    match event {
        ServerEvent::MessageReceived { message, .. } | ServerEvent::MessageSent { message } => {
            let outcome = cache.lock().await.apply_push(message);
            if let PushOutcome::OpenThreadAppended { counterparty_id } = outcome {
                // il thread è a video: letto subito anche lato server
                if let Err(e) = api.mark_read(counterparty_id).await {
                    warn!("remote mark-read failed: {}", e);
                }
            }
        }
        ServerEvent::UserTyping { user_id, is_typing } => {
            cache.lock().await.set_typing(user_id, is_typing);
        }
        ServerEvent::Error { code, message } => {
            warn!(code, "server error event: {}", message);
        }
    }
}
