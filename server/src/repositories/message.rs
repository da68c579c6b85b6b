//! MessageRepository - Repository per i messaggi diretti
//!
//! Serve sia il thread tra due utenti (paginato) sia le aggregazioni da cui
//! deriva l'elenco conversazioni. L'unica mutazione ammessa su un messaggio
//! esistente è il passaggio non letto -> letto.

use super::{Create, Delete, Read};
use crate::dtos::CreateMessageDTO;
use crate::entities::Message;
use chrono::{DateTime, Utc};
use sqlx::{Error, SqlitePool};

/// Riga aggregata per controparte: base dell'elenco conversazioni.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationSummary {
    pub other_id: i64,
    pub unread_count: i64,
    pub last_at: DateTime<Utc>,
}

pub struct MessageRepository {
    connection_pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Pagina del thread tra due utenti, dalla più recente alla più vecchia.
    /// Il chiamante la rovescia per la visualizzazione in ordine crescente.
    pub async fn find_conversation_page(
        &self,
        user_a: &i64,
        user_b: &i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2)
               OR (sender_id = ?2 AND receiver_id = ?1)
            ORDER BY created_at DESC, message_id DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.connection_pool)
        .await
    }

    /// Totale dei messaggi nella coppia, per i metadati di paginazione.
    pub async fn count_conversation(&self, user_a: &i64, user_b: &i64) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2)
               OR (sender_id = ?2 AND receiver_id = ?1)
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_one(&self.connection_pool)
        .await
    }

    /// Marca come letti tutti i messaggi non letti da sender verso receiver.
    /// Idempotente: il filtro is_read = 0 rende nulla una seconda chiamata.
    pub async fn mark_read(&self, sender_id: &i64, receiver_id: &i64) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = 1, read_at = ?
            WHERE sender_id = ? AND receiver_id = ? AND is_read = 0
            "#,
        )
        .bind(Utc::now())
        .bind(sender_id)
        .bind(receiver_id)
        .execute(&self.connection_pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Messaggi non letti destinati all'utente, su tutte le conversazioni.
    pub async fn count_unread(&self, receiver_id: &i64) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND is_read = 0",
        )
        .bind(receiver_id)
        .fetch_one(&self.connection_pool)
        .await
    }

    /// Aggregazione per controparte: conteggio non letti e timestamp
    /// dell'ultimo messaggio, ordinati dal thread più recente.
    pub async fn conversation_summaries(
        &self,
        user_id: &i64,
    ) -> Result<Vec<ConversationSummary>, Error> {
        sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT
                CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS other_id,
                SUM(CASE WHEN receiver_id = ?1 AND is_read = 0 THEN 1 ELSE 0 END) AS unread_count,
                MAX(created_at) AS last_at
            FROM messages
            WHERE sender_id = ?1 OR receiver_id = ?1
            GROUP BY other_id
            ORDER BY last_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.connection_pool)
        .await
    }

    /// Il messaggio più recente della coppia (l'invariante dell'indice:
    /// mai mostrare un last-message più vecchio del massimo persistito).
    pub async fn last_in_pair(&self, user_a: &i64, user_b: &i64) -> Result<Option<Message>, Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2)
               OR (sender_id = ?2 AND receiver_id = ?1)
            ORDER BY created_at DESC, message_id DESC
            LIMIT 1
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Create<Message, CreateMessageDTO> for MessageRepository {
    async fn create(&self, data: &CreateMessageDTO) -> Result<Message, Error> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (sender_id, receiver_id, content, message_kind,
                 file_url, file_name, file_size, appointment_id,
                 is_read, read_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, ?)
            RETURNING *
            "#,
        )
        .bind(data.sender_id)
        .bind(data.receiver_id)
        .bind(&data.content)
        .bind(data.message_kind)
        .bind(&data.file_url)
        .bind(&data.file_name)
        .bind(data.file_size)
        .bind(data.appointment_id)
        .bind(data.created_at)
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl Read<Message, i64> for MessageRepository {
    async fn read(&self, id: &i64) -> Result<Option<Message>, Error> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE message_id = ?")
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Delete<i64> for MessageRepository {
    async fn delete(&self, id: &i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM messages WHERE message_id = ?")
            .bind(id)
            .execute(&self.connection_pool)
            .await?;

        Ok(())
    }
}
