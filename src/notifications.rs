//! Per-client notification feed. System events write rows here and publish a
//! broadcast event carrying the fresh unread count; the portal stream decides
//! whether that count warrants an audible alert.

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::{
    auth::new_id,
    models::ClientNotificationRow,
    normalize,
    state::ServerEvent,
};

/// Store a notification for a client and publish it to live listeners.
pub async fn notify_client(
    pool: &SqlitePool,
    events: &broadcast::Sender<ServerEvent>,
    client_id: &str,
    kind: &str,
    title: &str,
    description: &str,
    link: Option<&str>,
) -> Result<(), sqlx::Error> {
    let created_at = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO client_notifications (id, client_id, title, description, kind, link, read, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 0, ?)"#,
    )
    .bind(new_id())
    .bind(client_id)
    .bind(title)
    .bind(description)
    .bind(kind)
    .bind(link)
    .bind(&created_at)
    .execute(pool)
    .await?;

    let unread = unread_count(pool, client_id).await?;
    let _ = events.send(ServerEvent::notification(client_id, title, unread, &created_at));

    Ok(())
}

/// Every notification for a client, newest first.
pub async fn notifications_for_client(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<Vec<ClientNotificationRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ClientNotificationRow>(
        r#"SELECT id, client_id, title, description, kind, link, read, created_at
           FROM client_notifications
           WHERE client_id = ?
           ORDER BY created_at DESC, rowid DESC"#,
    )
    .bind(client_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(normalize::normalize_notification)
        .collect())
}

pub async fn mark_read(
    pool: &SqlitePool,
    client_id: &str,
    notification_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE client_notifications SET read = 1 WHERE id = ? AND client_id = ?")
        .bind(notification_id)
        .bind(client_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove every read notification for a client. Callers re-fetch the feed
/// afterwards; no incremental update is promised.
pub async fn clear_read(pool: &SqlitePool, client_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM client_notifications WHERE client_id = ? AND read = 1")
        .bind(client_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn unread_count(pool: &SqlitePool, client_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM client_notifications WHERE client_id = ? AND read = 0",
    )
    .bind(client_id)
    .fetch_one(pool)
    .await
}

/// Decides when an unread-count snapshot should trigger a user-facing alert:
/// only on a strict increase over the previously observed count. Repeated
/// delivery of the same count, or a drop, stays silent.
#[derive(Debug, Default)]
pub struct UnreadAlertTracker {
    last_seen: i64,
}

impl UnreadAlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, count: i64) -> bool {
        let alert = count > self.last_seen;
        self.last_seen = count;
        alert
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory database");
        crate::db::run_migrations(&pool).await.expect("migrations");
        sqlx::query(
            r#"INSERT INTO clients (id, name, email, phone, stamps_earned, mimos_redeemed, created_at, updated_at)
               VALUES ('c1', 'Ana', 'ana@example.com', '11 90000-0000', 0, 0,
                       '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')"#,
        )
        .execute(&pool)
        .await
        .expect("insert client");
        pool
    }

    fn channel() -> broadcast::Sender<ServerEvent> {
        broadcast::channel(8).0
    }

    #[tokio::test]
    async fn notify_stores_unread_and_publishes_count() {
        let pool = test_pool().await;
        let events = channel();
        let mut rx = events.subscribe();

        notify_client(&pool, &events, "c1", "general", "Bem-vinda!", "Seu cadastro está pronto.", None)
            .await
            .unwrap();

        assert_eq!(unread_count(&pool, "c1").await.unwrap(), 1);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, "notification");
        assert_eq!(event.unread_notifications, Some(1));
    }

    #[tokio::test]
    async fn clear_read_removes_only_read_rows() {
        let pool = test_pool().await;
        let events = channel();

        notify_client(&pool, &events, "c1", "general", "um", "primeiro", None)
            .await
            .unwrap();
        notify_client(&pool, &events, "c1", "general", "dois", "segundo", None)
            .await
            .unwrap();

        let feed = notifications_for_client(&pool, "c1").await.unwrap();
        assert_eq!(feed.len(), 2);

        mark_read(&pool, "c1", &feed[0].id).await.unwrap();
        let removed = clear_read(&pool, "c1").await.unwrap();
        assert_eq!(removed, 1);

        let feed = notifications_for_client(&pool, "c1").await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].read, 0);
        assert_eq!(unread_count(&pool, "c1").await.unwrap(), 1);
    }

    #[test]
    fn tracker_alerts_only_on_strict_increase() {
        let mut tracker = UnreadAlertTracker::new();
        assert!(tracker.observe(1)); // 0 → 1 fires
        assert!(!tracker.observe(1)); // repeated snapshot stays silent
        assert!(tracker.observe(2)); // 1 → 2 fires
        assert!(!tracker.observe(0)); // clearing stays silent
        assert!(tracker.observe(1)); // 0 → 1 fires again
    }

    #[test]
    fn tracker_initial_zero_is_silent() {
        let mut tracker = UnreadAlertTracker::new();
        assert!(!tracker.observe(0));
    }
}
