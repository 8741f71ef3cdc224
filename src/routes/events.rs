use actix_web::{http::header, middleware::from_fn, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{
    auth::{admin_validator, client_validator, logout_guard, ClientAccount},
    notifications::UnreadAlertTracker,
    state::{AppState, ServerEvent},
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/events/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .wrap(from_fn(logout_guard))
            .route(web::get().to(stream_admin_events)),
    )
    .service(
        web::resource("/events/portal")
            .wrap(HttpAuthentication::basic(client_validator))
            .wrap(from_fn(logout_guard))
            .route(web::get().to(stream_portal_events)),
    );
}

/// Firehose for the admin area: every conversation, notification, and
/// appointment event.
async fn stream_admin_events(state: web::Data<AppState>) -> HttpResponse {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes(&event))),
        Err(_) => None,
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

fn event_to_bytes(event: &ServerEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: update\ndata: {}\n\n", payload))
}

#[derive(serde::Serialize)]
struct PortalEvent {
    kind: String,
    title: Option<String>,
    body: Option<String>,
    status: Option<String>,
    unread_notifications: Option<i64>,
    /// True only when the unread count strictly increased; the page plays its
    /// alert sound on this flag, not on every snapshot.
    alert: bool,
    created_at: Option<String>,
}

/// Per-client stream for the portal, filtered to the signed-in client. The
/// stream stays open for the lifetime of the page and drops with the
/// connection, tearing the broadcast subscription down with it.
async fn stream_portal_events(
    state: web::Data<AppState>,
    account: web::ReqData<ClientAccount>,
) -> HttpResponse {
    let client_id = account.client_id.clone();
    let rx = state.events.subscribe();
    let mut tracker = UnreadAlertTracker::new();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let event = match result {
            Ok(event) => event,
            Err(_) => return None,
        };
        if event.client_id.as_deref() != Some(&client_id) {
            return None;
        }
        let alert = match event.unread_notifications {
            Some(count) => tracker.observe(count),
            None => false,
        };
        let portal = PortalEvent {
            kind: event.kind,
            title: event.title,
            body: event.body,
            status: event.status,
            unread_notifications: event.unread_notifications,
            alert,
            created_at: event.created_at,
        };
        Some(Ok::<web::Bytes, actix_web::Error>(portal_event_to_bytes(&portal)))
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

fn portal_event_to_bytes(event: &PortalEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: update\ndata: {}\n\n", payload))
}
