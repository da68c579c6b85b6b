//! Integration tests per l'indice derivato delle conversazioni

mod common;

#[cfg(test)]
mod conversation_tests {
    use super::common::*;
    use axum_test::http::HeaderName;
    use serde_json::json;
    use sqlx::SqlitePool;

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "doctors", "messages")))]
    async fn test_list_conversations_for_patient(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let token = create_test_jwt(1, "alice@example.com");

        let response = server
            .get("/messages/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let conversations = body["conversations"].as_array().unwrap();
        assert_eq!(conversations.len(), 1, "alice ha una sola controparte");

        let entry = &conversations[0];
        assert_eq!(entry["conversation_id"], "1-2");
        assert_eq!(entry["user"]["user_id"], 2);
        // la controparte è un medico: la voce porta la specialty
        assert_eq!(entry["user"]["specialty"], "Cardiology");
        assert_eq!(entry["unread_count"], 2);
        assert_eq!(entry["last_message"]["message_id"], 3);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "doctors", "messages")))]
    async fn test_list_conversations_sorted_by_last_message(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let token = create_test_jwt(2, "bruno.keller@example.com");

        let response = server
            .get("/messages/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let conversations = body["conversations"].as_array().unwrap();
        assert_eq!(conversations.len(), 2);

        // il thread con elena ha l'ultimo messaggio più recente
        assert_eq!(conversations[0]["user"]["user_id"], 4);
        assert_eq!(conversations[0]["unread_count"], 1);
        assert_eq!(conversations[1]["user"]["user_id"], 1);
        // l'unico messaggio di alice verso bruno è già letto
        assert_eq!(conversations[1]["unread_count"], 0);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "doctors", "messages")))]
    async fn test_unread_scalar_equals_sum_of_entries(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);

        for (user_id, email) in [
            (1, "alice@example.com"),
            (2, "bruno.keller@example.com"),
            (3, "carla.ferri@example.com"),
            (4, "elena@example.com"),
        ] {
            let token = create_test_jwt(user_id, email);

            let conversations = server
                .get("/messages/conversations")
                .add_header(
                    HeaderName::from_static("authorization"),
                    format!("Bearer {}", token),
                )
                .await;
            let conversations: serde_json::Value = conversations.json();
            let sum: i64 = conversations["conversations"]
                .as_array()
                .unwrap()
                .iter()
                .map(|c| c["unread_count"].as_i64().unwrap())
                .sum();

            let scalar = server
                .get("/messages/unread/count")
                .add_header(
                    HeaderName::from_static("authorization"),
                    format!("Bearer {}", token),
                )
                .await;
            let scalar: serde_json::Value = scalar.json();

            assert_eq!(
                scalar["unread_count"].as_i64().unwrap(),
                sum,
                "scalar e somma divergono per l'utente {}",
                user_id
            );
        }

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "doctors")))]
    async fn test_list_conversations_empty_is_not_an_error(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let token = create_test_jwt(3, "carla.ferri@example.com");

        let response = server
            .get("/messages/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["conversations"].as_array().unwrap().len(), 0);

        Ok(())
    }

    /// Scenario della prima conversazione: elena scrive a carla, la voce
    /// appare da entrambe le parti con i conteggi giusti.
    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "doctors")))]
    async fn test_first_message_materializes_conversation(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let elena = create_test_jwt(4, "elena@example.com");
        let carla = create_test_jwt(3, "carla.ferri@example.com");

        let response = server
            .post("/messages/send")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", elena),
            )
            .json(&json!({
                "receiver_id": 3,
                "content": "Hello Dr. Ferri"
            }))
            .await;
        response.assert_status(axum_test::http::StatusCode::CREATED);

        // lato mittente: unread 0
        let mine = server
            .get("/messages/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", elena),
            )
            .await;
        let mine: serde_json::Value = mine.json();
        let mine = mine["conversations"].as_array().unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0]["user"]["user_id"], 3);
        assert_eq!(mine[0]["unread_count"], 0);
        assert_eq!(mine[0]["last_message"]["content"], "Hello Dr. Ferri");

        // lato destinatario: unread 1
        let theirs = server
            .get("/messages/conversations")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", carla),
            )
            .await;
        let theirs: serde_json::Value = theirs.json();
        let theirs = theirs["conversations"].as_array().unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0]["user"]["user_id"], 4);
        assert_eq!(theirs[0]["unread_count"], 1);

        // dopo il mark read il conteggio torna a zero
        let read = server
            .put("/messages/read/4")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", carla),
            )
            .await;
        read.assert_status_ok();

        let after = server
            .get("/messages/unread/count")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", carla),
            )
            .await;
        let after: serde_json::Value = after.json();
        assert_eq!(after["unread_count"], 0);

        Ok(())
    }

    /// Due invii concorrenti nella stessa coppia: entrambi persistiti ed
    /// entrambi nel thread in ordine di creazione.
    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "doctors")))]
    async fn test_concurrent_sends_both_persisted(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let alice = create_test_jwt(1, "alice@example.com");
        let bruno = create_test_jwt(2, "bruno.keller@example.com");

        let send_a = server
            .post("/messages/send")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", alice),
            )
            .json(&json!({ "receiver_id": 2, "content": "from alice" }));
        let send_b = server
            .post("/messages/send")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", bruno),
            )
            .json(&json!({ "receiver_id": 1, "content": "from bruno" }));

        let (resp_a, resp_b) = tokio::join!(send_a, send_b);
        resp_a.assert_status(axum_test::http::StatusCode::CREATED);
        resp_b.assert_status(axum_test::http::StatusCode::CREATED);

        let thread = server
            .get("/messages/conversation/2")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", alice),
            )
            .await;
        let thread: serde_json::Value = thread.json();
        let messages = thread["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);

        // ordine di creazione come registrato dallo store
        let created: Vec<String> = messages
            .iter()
            .map(|m| m["created_at"].as_str().unwrap().to_string())
            .collect();
        let mut sorted = created.clone();
        sorted.sort();
        assert_eq!(created, sorted);

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "doctors")))]
    async fn test_users_directory_excludes_caller(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);
        let token = create_test_jwt(1, "alice@example.com");

        let response = server
            .get("/users?role=doctor")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;

        response.assert_status_ok();
        let users: Vec<serde_json::Value> = response.json();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u["role"] == "doctor"));
        assert!(users.iter().any(|u| u["specialty"] == "Dermatology"));

        let everyone = server
            .get("/users")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;
        let everyone: Vec<serde_json::Value> = everyone.json();
        assert!(everyone.iter().all(|u| u["user_id"] != 1), "mai il chiamante");

        Ok(())
    }

    #[sqlx::test(fixtures(path = "../fixtures", scripts("users", "doctors")))]
    async fn test_register_and_login_round_trip(pool: SqlitePool) -> sqlx::Result<()> {
        let state = create_test_state(pool);
        let server = create_test_server(state);

        let registered = server
            .post("/auth/register")
            .json(&json!({
                "name": "Marta Bianchi",
                "email": "marta@example.com",
                "password": "una password valida",
                "role": "doctor",
                "specialty": "Neurology"
            }))
            .await;
        registered.assert_status(axum_test::http::StatusCode::CREATED);
        let registered: serde_json::Value = registered.json();
        assert_eq!(registered["specialty"], "Neurology");

        // email duplicata rifiutata
        let duplicate = server
            .post("/auth/register")
            .json(&json!({
                "name": "Marta Bianchi",
                "email": "marta@example.com",
                "password": "una password valida",
            }))
            .await;
        duplicate.assert_status(axum_test::http::StatusCode::CONFLICT);

        let login = server
            .post("/auth/login")
            .json(&json!({
                "email": "marta@example.com",
                "password": "una password valida"
            }))
            .await;
        login.assert_status_ok();
        let login: serde_json::Value = login.json();
        let token = login["token"].as_str().unwrap().to_string();
        assert_eq!(login["user"]["specialty"], "Neurology");

        // il token emesso autentica davvero
        let me = server
            .get("/messages/unread/count")
            .add_header(
                HeaderName::from_static("authorization"),
                format!("Bearer {}", token),
            )
            .await;
        me.assert_status_ok();

        let wrong = server
            .post("/auth/login")
            .json(&json!({
                "email": "marta@example.com",
                "password": "password sbagliata"
            }))
            .await;
        wrong.assert_status_unauthorized();

        Ok(())
    }
}
