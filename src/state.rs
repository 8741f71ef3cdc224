use std::env;

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub events: broadcast::Sender<ServerEvent>,
    pub ai: AiConfig,
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
}

impl AiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("AI_API_KEY").unwrap_or_default(),
            api_url: env::var("AI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        }
    }

    pub fn enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Payload pushed over the broadcast channel and re-framed as SSE for live
/// consumers (admin inbox, client portal).
#[derive(Clone, Debug, Serialize)]
pub struct ServerEvent {
    pub kind: String,
    pub client_id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub appointment_id: Option<String>,
    pub status: Option<String>,
    pub unread_notifications: Option<i64>,
    pub created_at: Option<String>,
}

impl ServerEvent {
    fn base(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            client_id: None,
            title: None,
            body: None,
            appointment_id: None,
            status: None,
            unread_notifications: None,
            created_at: None,
        }
    }

    pub fn message(client_id: &str, preview: &str, created_at: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            body: Some(preview.to_string()),
            created_at: Some(created_at.to_string()),
            ..Self::base("message")
        }
    }

    pub fn notification(client_id: &str, title: &str, unread: i64, created_at: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            title: Some(title.to_string()),
            unread_notifications: Some(unread),
            created_at: Some(created_at.to_string()),
            ..Self::base("notification")
        }
    }

    pub fn appointment(client_id: &str, appointment_id: &str, status: &str) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            appointment_id: Some(appointment_id.to_string()),
            status: Some(status.to_string()),
            ..Self::base("appointment")
        }
    }
}
