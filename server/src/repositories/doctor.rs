//! DoctorRepository - Profili medici, usati solo per decorare le proiezioni

use super::Create;
use crate::entities::Doctor;
use sqlx::{Error, SqlitePool};

/// Dati per creare un profilo medico
#[derive(Debug, Clone)]
pub struct CreateDoctorDTO {
    pub user_id: i64,
    pub specialty: String,
}

pub struct DoctorRepository {
    connection_pool: SqlitePool,
}

impl DoctorRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    pub async fn find_by_user_id(&self, user_id: &i64) -> Result<Option<Doctor>, Error> {
        sqlx::query_as::<_, Doctor>("SELECT * FROM doctors WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Specialty di un medico, o None se l'utente non ha un profilo medico.
    pub async fn specialty_of(&self, user_id: &i64) -> Result<Option<String>, Error> {
        Ok(self.find_by_user_id(user_id).await?.map(|d| d.specialty))
    }
}

impl Create<Doctor, CreateDoctorDTO> for DoctorRepository {
    async fn create(&self, data: &CreateDoctorDTO) -> Result<Doctor, Error> {
        sqlx::query_as::<_, Doctor>(
            "INSERT INTO doctors (user_id, specialty) VALUES (?, ?) RETURNING *",
        )
        .bind(data.user_id)
        .bind(&data.specialty)
        .fetch_one(&self.connection_pool)
        .await
    }
}
