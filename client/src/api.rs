//! ApiClient - Client REST autenticato col bearer token
//!
//! Copre le sei operazioni sui messaggi più la directory utenti. Gli errori
//! applicativi (4xx) arrivano col messaggio del server; tutto il resto è un
//! problema di trasporto.

use crate::dtos::{
    Conversation, ConversationPage, Conversations, SendMessageResponse, UnreadCount, UserProfile,
};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Timeout di ogni richiesta HTTP.
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub enum ApiError {
    /// Risposta non 2xx: status e messaggio del server.
    Status { status: u16, message: String },
    /// Errore di rete o di decodifica.
    Transport(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Status { status, message } => write!(f, "HTTP {}: {}", status, message),
            ApiError::Transport(detail) => write!(f, "transport error: {}", detail),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    receiver_id: i64,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    appointment_id: Option<i64>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub async fn send_message(
        &self,
        receiver_id: i64,
        content: &str,
        appointment_id: Option<i64>,
    ) -> Result<SendMessageResponse, ApiError> {
        let response = self
            .http
            .post(format!("{}/messages/send", self.base_url))
            .bearer_auth(&self.token)
            .json(&SendMessageBody {
                receiver_id,
                content,
                appointment_id,
            })
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn get_conversation(
        &self,
        other_user_id: i64,
        page: u32,
        limit: u32,
    ) -> Result<ConversationPage, ApiError> {
        let response = self
            .http
            .get(format!(
                "{}/messages/conversation/{}",
                self.base_url, other_user_id
            ))
            .query(&[("page", page), ("limit", limit)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let response = self
            .http
            .get(format!("{}/messages/conversations", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let conversations: Conversations = Self::decode(response).await?;
        Ok(conversations.conversations)
    }

    /// Best effort per contratto: chi chiama può ignorare l'errore.
    pub async fn mark_read(&self, sender_id: i64) -> Result<(), ApiError> {
        let response = self
            .http
            .put(format!("{}/messages/read/{}", self.base_url, sender_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn unread_count(&self) -> Result<i64, ApiError> {
        let response = self
            .http
            .get(format!("{}/messages/unread/count", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let count: UnreadCount = Self::decode(response).await?;
        Ok(count.unread_count)
    }

    pub async fn delete_message(&self, message_id: i64) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(format!("{}/messages/{}", self.base_url, message_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: i64) -> Result<UserProfile, ApiError> {
        let response = self
            .http
            .get(format!("{}/users/{}", self.base_url, user_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// Directory delle possibili controparti, con filtro ruolo opzionale.
    pub async fn list_users(&self, role: Option<&str>) -> Result<Vec<UserProfile>, ApiError> {
        let mut request = self
            .http
            .get(format!("{}/users", self.base_url))
            .bearer_auth(&self.token);
        if let Some(role) = role {
            request = request.query(&[("role", role)]);
        }
        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // il server risponde { "message": ..., "details": ... }
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| status.to_string());

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }
}
