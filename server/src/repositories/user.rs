//! UserRepository - Repository per la directory utenti

use super::{Create, Read};
use crate::dtos::CreateUserDTO;
use crate::entities::{User, UserRole};
use chrono::Utc;
use sqlx::{Error, SqlitePool};

pub struct UserRepository {
    connection_pool: SqlitePool,
}

impl UserRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Directory per "nuova conversazione": tutti gli utenti tranne il
    /// chiamante, eventualmente filtrati per ruolo.
    pub async fn find_many_directory(
        &self,
        role: Option<UserRole>,
        exclude_user_id: &i64,
    ) -> Result<Vec<User>, Error> {
        match role {
            Some(role) => {
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users WHERE user_id <> ? AND role = ? ORDER BY name ASC",
                )
                .bind(exclude_user_id)
                .bind(role)
                .fetch_all(&self.connection_pool)
                .await
            }
            None => {
                sqlx::query_as::<_, User>(
                    "SELECT * FROM users WHERE user_id <> ? ORDER BY name ASC",
                )
                .bind(exclude_user_id)
                .fetch_all(&self.connection_pool)
                .await
            }
        }
    }
}

impl Create<User, CreateUserDTO> for UserRepository {
    /// Nota: `data.password` deve essere già l'hash bcrypt, mai il testo in
    /// chiaro (la responsabilità è del service di registrazione).
    async fn create(&self, data: &CreateUserDTO) -> Result<User, Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.password)
        .bind(data.role)
        .bind(Utc::now())
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl Read<User, i64> for UserRepository {
    async fn read(&self, id: &i64) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}
