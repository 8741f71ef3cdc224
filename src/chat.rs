//! Conversation synchronizer. One conversation per client, a message log
//! ordered by server-assigned creation time, and two independent unread
//! flags. Sending sets the recipient's flag; opening marks the owner's flag
//! read. Every write publishes a broadcast event for the live streams.

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::{
    auth::new_id,
    models::{ConversationRow, MessageRow, SENDER_ADMIN, SENDER_CLIENT},
    normalize,
    state::ServerEvent,
};

/// Append a message to a client's conversation. The creation timestamp is
/// assigned here, not by the caller, so concurrent sends from both parties
/// order by arrival. The recipient's unread flag is raised; the sender's is
/// left untouched.
pub async fn send_message(
    pool: &SqlitePool,
    events: &broadcast::Sender<ServerEvent>,
    client_id: &str,
    client_name: &str,
    sender_type: &str,
    sender_name: &str,
    body: &str,
) -> Result<MessageRow, sqlx::Error> {
    let message = MessageRow {
        id: new_id(),
        client_id: client_id.to_string(),
        sender_type: sender_type.to_string(),
        sender_name: sender_name.to_string(),
        body: body.to_string(),
        created_at: Utc::now().to_rfc3339(),
    };

    let unread_by_admin = i64::from(sender_type == SENDER_CLIENT);
    let unread_by_client = i64::from(sender_type == SENDER_ADMIN);

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"INSERT INTO messages (id, client_id, sender_type, sender_name, body, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&message.id)
    .bind(&message.client_id)
    .bind(&message.sender_type)
    .bind(&message.sender_name)
    .bind(&message.body)
    .bind(&message.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"INSERT INTO conversations
               (client_id, client_name, last_message, last_message_at, unread_by_admin, unread_by_client)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT(client_id) DO UPDATE SET
               client_name = excluded.client_name,
               last_message = excluded.last_message,
               last_message_at = excluded.last_message_at,
               unread_by_admin = MAX(conversations.unread_by_admin, excluded.unread_by_admin),
               unread_by_client = MAX(conversations.unread_by_client, excluded.unread_by_client)"#,
    )
    .bind(&message.client_id)
    .bind(client_name)
    .bind(&message.body)
    .bind(&message.created_at)
    .bind(unread_by_admin)
    .bind(unread_by_client)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let _ = events.send(ServerEvent::message(
        &message.client_id,
        &message.body,
        &message.created_at,
    ));

    Ok(message)
}

pub async fn mark_read_by_client(pool: &SqlitePool, client_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE conversations SET unread_by_client = 0 WHERE client_id = ?")
        .bind(client_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_read_by_admin(pool: &SqlitePool, client_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE conversations SET unread_by_admin = 0 WHERE client_id = ?")
        .bind(client_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Full thread for one client, ascending by creation time. Insertion order
/// breaks timestamp ties.
pub async fn conversation_messages(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MessageRow>(
        r#"SELECT id, client_id, sender_type, sender_name, body, created_at
           FROM messages
           WHERE client_id = ?
           ORDER BY created_at ASC, rowid ASC"#,
    )
    .bind(client_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(normalize::normalize_message).collect())
}

/// Admin inbox: every conversation, most recently active first.
pub async fn list_conversations(pool: &SqlitePool) -> Result<Vec<ConversationRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ConversationRow>(
        r#"SELECT client_id, client_name, last_message, last_message_at, unread_by_admin, unread_by_client
           FROM conversations
           ORDER BY last_message_at DESC"#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(normalize::normalize_conversation)
        .collect())
}

pub async fn get_conversation(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<Option<ConversationRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, ConversationRow>(
        r#"SELECT client_id, client_name, last_message, last_message_at, unread_by_admin, unread_by_client
           FROM conversations
           WHERE client_id = ?
           LIMIT 1"#,
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(normalize::normalize_conversation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory database");
        crate::db::run_migrations(&pool).await.expect("migrations");
        pool
    }

    async fn insert_client(pool: &SqlitePool, id: &str, name: &str) {
        sqlx::query(
            r#"INSERT INTO clients (id, name, email, phone, stamps_earned, mimos_redeemed, created_at, updated_at)
               VALUES (?, ?, ?, '11 90000-0000', 0, 0, '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')"#,
        )
        .bind(id)
        .bind(name)
        .bind(format!("{id}@example.com"))
        .execute(pool)
        .await
        .expect("insert client");
    }

    fn channel() -> broadcast::Sender<ServerEvent> {
        broadcast::channel(8).0
    }

    #[tokio::test]
    async fn send_raises_only_the_recipients_unread_flag() {
        let pool = test_pool().await;
        insert_client(&pool, "c1", "Ana").await;
        let events = channel();

        send_message(&pool, &events, "c1", "Ana", SENDER_CLIENT, "Ana", "Oi!")
            .await
            .unwrap();

        let conversation = get_conversation(&pool, "c1").await.unwrap().unwrap();
        assert_eq!(conversation.unread_by_admin, 1);
        assert_eq!(conversation.unread_by_client, 0);
        assert_eq!(conversation.last_message, "Oi!");
    }

    #[tokio::test]
    async fn resending_from_the_same_party_does_not_flag_the_sender() {
        let pool = test_pool().await;
        insert_client(&pool, "c1", "Ana").await;
        let events = channel();

        send_message(&pool, &events, "c1", "Ana", SENDER_CLIENT, "Ana", "um")
            .await
            .unwrap();
        mark_read_by_admin(&pool, "c1").await.unwrap();
        send_message(&pool, &events, "c1", "Ana", SENDER_CLIENT, "Ana", "dois")
            .await
            .unwrap();

        let conversation = get_conversation(&pool, "c1").await.unwrap().unwrap();
        // The client's own flag stays down; only the admin side is flagged again.
        assert_eq!(conversation.unread_by_client, 0);
        assert_eq!(conversation.unread_by_admin, 1);
    }

    #[tokio::test]
    async fn mark_read_resets_until_the_other_party_writes() {
        let pool = test_pool().await;
        insert_client(&pool, "c1", "Ana").await;
        let events = channel();

        send_message(&pool, &events, "c1", "Ana", SENDER_ADMIN, "Equipe", "Olá")
            .await
            .unwrap();
        let conversation = get_conversation(&pool, "c1").await.unwrap().unwrap();
        assert_eq!(conversation.unread_by_client, 1);

        mark_read_by_client(&pool, "c1").await.unwrap();
        let conversation = get_conversation(&pool, "c1").await.unwrap().unwrap();
        assert_eq!(conversation.unread_by_client, 0);

        send_message(&pool, &events, "c1", "Ana", SENDER_ADMIN, "Equipe", "Tudo certo?")
            .await
            .unwrap();
        let conversation = get_conversation(&pool, "c1").await.unwrap().unwrap();
        assert_eq!(conversation.unread_by_client, 1);
    }

    #[tokio::test]
    async fn thread_is_ordered_by_creation_ascending() {
        let pool = test_pool().await;
        insert_client(&pool, "c1", "Ana").await;
        let events = channel();

        for body in ["primeira", "segunda", "terceira"] {
            send_message(&pool, &events, "c1", "Ana", SENDER_CLIENT, "Ana", body)
                .await
                .unwrap();
        }

        let thread = conversation_messages(&pool, "c1").await.unwrap();
        let bodies: Vec<&str> = thread.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["primeira", "segunda", "terceira"]);
    }

    #[tokio::test]
    async fn send_publishes_a_broadcast_event() {
        let pool = test_pool().await;
        insert_client(&pool, "c1", "Ana").await;
        let events = channel();
        let mut rx = events.subscribe();

        send_message(&pool, &events, "c1", "Ana", SENDER_CLIENT, "Ana", "Oi!")
            .await
            .unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, "message");
        assert_eq!(event.client_id.as_deref(), Some("c1"));
    }
}
