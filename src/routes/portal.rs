use std::collections::HashMap;

use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{client_validator, logout_guard, ClientAccount},
    chat, db,
    filters,
    models::{SENDER_CLIENT, STATUS_CANCELLED, STAMPS_PER_MIMO},
    notifications,
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct PortalAppointmentView {
    date: String,
    start_time: String,
    services: String,
    professional: String,
    status: String,
}

#[derive(Clone, Debug)]
struct PackageView {
    name: String,
    sessions_label: String,
    purchase_date: String,
    expiry_date: String,
    has_expiry: bool,
}

#[derive(Template)]
#[template(path = "portal_dashboard.html")]
struct PortalDashboardTemplate {
    client_name: String,
    stamps_earned: i64,
    stamps_goal: i64,
    mimos_redeemed: i64,
    packages: Vec<PackageView>,
    upcoming: Vec<PortalAppointmentView>,
    unread_notifications: i64,
    has_unread_messages: bool,
}

#[derive(Clone, Debug)]
struct MessageView {
    sender_name: String,
    body: String,
    created_at: String,
    is_mine: bool,
}

#[derive(Template)]
#[template(path = "portal_messages.html")]
struct PortalMessagesTemplate {
    client_name: String,
    messages: Vec<MessageView>,
    draft: String,
    error: String,
    has_error: bool,
}

#[derive(Clone, Debug)]
struct NotificationView {
    id: String,
    title: String,
    description: String,
    kind: String,
    created_at: String,
    link: String,
    has_link: bool,
    is_read: bool,
}

#[derive(Template)]
#[template(path = "portal_notifications.html")]
struct PortalNotificationsTemplate {
    client_name: String,
    notifications: Vec<NotificationView>,
    unread: i64,
    has_read_items: bool,
}

#[derive(Deserialize)]
struct SendMessageForm {
    body: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/portal")
            .wrap(HttpAuthentication::basic(client_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(
                web::resource("/messages")
                    .route(web::get().to(show_messages))
                    .route(web::post().to(send_message)),
            )
            .service(web::resource("/notifications").route(web::get().to(show_notifications)))
            .service(
                web::resource("/notifications/{id}/read").route(web::post().to(mark_notification)),
            )
            .service(
                web::resource("/notifications/clear-read").route(web::post().to(clear_read)),
            ),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/portal/dashboard"))
        .finish()
}

async fn dashboard(
    state: web::Data<AppState>,
    account: web::ReqData<ClientAccount>,
) -> Result<HttpResponse> {
    let client = db::fetch_client(&state.db, &account.client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?
        .ok_or_else(|| actix_web::error::ErrorNotFound("Client not found"))?;

    let (appointments, services) = tokio::try_join!(
        db::fetch_appointments(&state.db),
        db::fetch_services(&state.db)
    )
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let service_names: HashMap<&str, &str> = services
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();

    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let mut upcoming: Vec<PortalAppointmentView> = appointments
        .iter()
        .filter(|a| {
            a.client_id == client.id && a.status != STATUS_CANCELLED && a.date.as_str() >= today.as_str()
        })
        .map(|a| PortalAppointmentView {
            date: a.date.clone(),
            start_time: a.start_time.clone(),
            services: a
                .service_ids
                .iter()
                .filter_map(|id| service_names.get(id.as_str()).copied())
                .collect::<Vec<_>>()
                .join(", "),
            professional: a
                .professional_name
                .clone()
                .unwrap_or_else(|| "A definir".to_string()),
            status: a.status.clone(),
        })
        .collect();
    upcoming.sort_by(|a, b| (a.date.as_str(), a.start_time.as_str()).cmp(&(b.date.as_str(), b.start_time.as_str())));

    let unread_notifications = notifications::unread_count(&state.db, &client.id)
        .await
        .unwrap_or(0);
    let has_unread_messages = chat::get_conversation(&state.db, &client.id)
        .await
        .ok()
        .flatten()
        .map(|c| c.unread_by_client == 1)
        .unwrap_or(false);

    let packages = client
        .packages
        .iter()
        .map(|p| PackageView {
            name: p.name.clone(),
            sessions_label: format!("{} de {} sessões usadas", p.used_sessions, p.total_sessions),
            purchase_date: p.purchase_date.clone(),
            expiry_date: p.expiry_date.clone().unwrap_or_default(),
            has_expiry: p.expiry_date.is_some(),
        })
        .collect();

    Ok(render(PortalDashboardTemplate {
        client_name: client.name,
        stamps_earned: client.stamps_earned,
        stamps_goal: STAMPS_PER_MIMO,
        mimos_redeemed: client.mimos_redeemed,
        packages,
        upcoming,
        unread_notifications,
        has_unread_messages,
    }))
}

async fn show_messages(
    state: web::Data<AppState>,
    account: web::ReqData<ClientAccount>,
) -> Result<HttpResponse> {
    // Opening the thread is what marks it read on the client side.
    chat::mark_read_by_client(&state.db, &account.client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let template = messages_template(&state, &account, String::new(), String::new()).await?;
    Ok(render(template))
}

async fn send_message(
    state: web::Data<AppState>,
    account: web::ReqData<ClientAccount>,
    form: web::Form<SendMessageForm>,
) -> Result<HttpResponse> {
    let body = form.into_inner().body;
    if body.trim().is_empty() {
        let template = messages_template(
            &state,
            &account,
            String::new(),
            "Write a message before sending.".to_string(),
        )
        .await?;
        return Ok(render(template));
    }

    match chat::send_message(
        &state.db,
        &state.events,
        &account.client_id,
        &account.client_name,
        SENDER_CLIENT,
        &account.client_name,
        body.trim(),
    )
    .await
    {
        Ok(_) => Ok(HttpResponse::SeeOther()
            .append_header((header::LOCATION, "/portal/messages"))
            .finish()),
        Err(err) => {
            // The send failed; put the draft back so nothing typed is lost.
            log::warn!("portal message send failed: {err}");
            let template = messages_template(
                &state,
                &account,
                body,
                "Your message could not be sent. It was kept below so you can try again."
                    .to_string(),
            )
            .await?;
            Ok(render(template))
        }
    }
}

async fn messages_template(
    state: &web::Data<AppState>,
    account: &ClientAccount,
    draft: String,
    error: String,
) -> Result<PortalMessagesTemplate> {
    let thread = chat::conversation_messages(&state.db, &account.client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let messages = thread
        .into_iter()
        .map(|m| MessageView {
            is_mine: m.sender_type == SENDER_CLIENT,
            sender_name: m.sender_name,
            body: m.body,
            created_at: m.created_at,
        })
        .collect();

    Ok(PortalMessagesTemplate {
        client_name: account.client_name.clone(),
        messages,
        draft,
        has_error: !error.is_empty(),
        error,
    })
}

async fn show_notifications(
    state: web::Data<AppState>,
    account: web::ReqData<ClientAccount>,
) -> Result<HttpResponse> {
    let feed = notifications::notifications_for_client(&state.db, &account.client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let unread = notifications::unread_count(&state.db, &account.client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let has_read_items = feed.iter().any(|n| n.read == 1);
    let notifications = feed
        .into_iter()
        .map(|n| NotificationView {
            id: n.id,
            title: n.title,
            description: n.description,
            kind: n.kind,
            created_at: n.created_at,
            has_link: n.link.is_some(),
            link: n.link.unwrap_or_default(),
            is_read: n.read == 1,
        })
        .collect();

    Ok(render(PortalNotificationsTemplate {
        client_name: account.client_name.clone(),
        notifications,
        unread,
        has_read_items,
    }))
}

async fn mark_notification(
    state: web::Data<AppState>,
    account: web::ReqData<ClientAccount>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let notification_id = path.into_inner();
    notifications::mark_read(&state.db, &account.client_id, &notification_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/portal/notifications"))
        .finish())
}

async fn clear_read(
    state: web::Data<AppState>,
    account: web::ReqData<ClientAccount>,
) -> Result<HttpResponse> {
    notifications::clear_read(&state.db, &account.client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    // The redirect re-fetches the feed; nothing is patched in place.
    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/portal/notifications"))
        .finish())
}
