use std::collections::HashMap;

use actix_web::{http::header, middleware::from_fn, web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    ai,
    auth::{admin_validator, logout_guard, new_id, AuthUser},
    chat, db, filters,
    models::{
        ActivityRow, Appointment, Client, SalonService, APPOINTMENT_STATUSES, NOTIFY_APPOINTMENT,
        NOTIFY_GENERAL, NOTIFY_LOYALTY, SENDER_ADMIN, STAMPS_PER_MIMO, STATUS_SCHEDULED,
        TX_EXPENSE, TX_INCOME,
    },
    money, notifications, reports,
    state::{AppState, ServerEvent},
    templates::render,
};

#[derive(Clone, Debug)]
struct StatCard {
    label: String,
    value: String,
}

#[derive(Clone, Debug)]
struct AppointmentView {
    id: String,
    client_name: String,
    professional: String,
    date: String,
    start_time: String,
    end_time: String,
    services: String,
    status: String,
    total_display: String,
}

#[derive(Clone, Debug)]
struct ActivityView {
    message: String,
    created_at: String,
}

#[derive(Clone, Debug)]
struct StatusOption {
    value: &'static str,
    selected: bool,
}

#[derive(Clone, Debug)]
struct OptionView {
    id: String,
    label: String,
    selected: bool,
}

#[derive(Template)]
#[template(path = "admin_dashboard.html")]
struct AdminDashboardTemplate {
    admin_name: String,
    stats: Vec<StatCard>,
    agenda: Vec<AppointmentView>,
    activities: Vec<ActivityView>,
}

#[derive(Template)]
#[template(path = "admin_appointments.html")]
struct AdminAppointmentsTemplate {
    appointments: Vec<AppointmentView>,
    date_filter: String,
    statuses: Vec<StatusOption>,
}

#[derive(Clone, Debug)]
struct ServiceOptionView {
    id: String,
    name: String,
    price_display: String,
}

#[derive(Template)]
#[template(path = "admin_appointment_new.html")]
struct AdminAppointmentNewTemplate {
    clients: Vec<OptionView>,
    professionals: Vec<OptionView>,
    services: Vec<ServiceOptionView>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "admin_appointment_detail.html")]
struct AdminAppointmentDetailTemplate {
    id: String,
    client_id: String,
    client_name: String,
    services: String,
    date: String,
    start_time: String,
    end_time: String,
    discount: String,
    extra_amount: String,
    total_amount: String,
    payment_method: String,
    notes: String,
    statuses: Vec<StatusOption>,
    professionals: Vec<OptionView>,
}

#[derive(Clone, Debug)]
struct ClientView {
    id: String,
    name: String,
    email: String,
    phone: String,
    stamps_earned: i64,
    mimos_redeemed: i64,
    package_count: usize,
    is_loyalty: bool,
}

#[derive(Template)]
#[template(path = "admin_clients.html")]
struct AdminClientsTemplate {
    clients: Vec<ClientView>,
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
#[template(path = "admin_client_detail.html")]
struct AdminClientDetailTemplate {
    client: ClientView,
    can_redeem: bool,
    stamps_goal: i64,
    packages: Vec<PackageView>,
    history: Vec<AppointmentView>,
}

#[derive(Clone, Debug)]
struct ServiceView {
    name: String,
    duration: String,
    price_display: String,
    category: String,
    description: String,
}

#[derive(Template)]
#[template(path = "admin_services.html")]
struct AdminServicesTemplate {
    services: Vec<ServiceView>,
    errors: Vec<String>,
}

#[derive(Clone, Debug)]
struct ProfessionalView {
    name: String,
    specialty: String,
    commission_display: String,
}

#[derive(Template)]
#[template(path = "admin_professionals.html")]
struct AdminProfessionalsTemplate {
    professionals: Vec<ProfessionalView>,
    errors: Vec<String>,
}

#[derive(Clone, Debug)]
struct TransactionView {
    description: String,
    amount_display: String,
    date: String,
    category: String,
    is_income: bool,
}

#[derive(Template)]
#[template(path = "admin_finance.html")]
struct AdminFinanceTemplate {
    transactions: Vec<TransactionView>,
    income_total: Decimal,
    expense_total: Decimal,
    errors: Vec<String>,
}

#[derive(Clone, Debug)]
struct ReportRowView {
    date: String,
    client_name: String,
    services: String,
    amount: Decimal,
}

#[derive(Template)]
#[template(path = "admin_reports.html")]
struct AdminReportsTemplate {
    professionals: Vec<OptionView>,
    selected_year: String,
    selected_month: String,
    no_selection: bool,
    has_report: bool,
    professional_name: String,
    rows: Vec<ReportRowView>,
    total: Decimal,
}

#[derive(Clone, Debug)]
struct ConversationView {
    client_id: String,
    client_name: String,
    last_message: String,
    last_message_at: String,
    unread: bool,
}

#[derive(Template)]
#[template(path = "admin_messages.html")]
struct AdminMessagesTemplate {
    conversations: Vec<ConversationView>,
}

#[derive(Clone, Debug)]
struct MessageView {
    sender_name: String,
    body: String,
    created_at: String,
    is_admin: bool,
}

#[derive(Template)]
#[template(path = "admin_conversation.html")]
struct AdminConversationTemplate {
    client_id: String,
    client_name: String,
    messages: Vec<MessageView>,
    draft: String,
    error: String,
    has_error: bool,
}

#[derive(Clone, Debug)]
struct KindOption {
    value: &'static str,
    label: &'static str,
}

#[derive(Template)]
#[template(path = "admin_notify.html")]
struct AdminNotifyTemplate {
    clients: Vec<OptionView>,
    kinds: Vec<KindOption>,
    errors: Vec<String>,
    success: bool,
}

#[derive(Clone, Debug)]
struct SettingView {
    key: String,
    label: String,
    value: String,
}

#[derive(Template)]
#[template(path = "admin_settings.html")]
struct AdminSettingsTemplate {
    settings: Vec<SettingView>,
}

#[derive(Template)]
#[template(path = "admin_ai.html")]
struct AdminAiTemplate {
    salon_name: String,
    ai_enabled: bool,
}

#[derive(Deserialize)]
struct AppointmentFilter {
    date: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
struct AppointmentUpdateForm {
    status: String,
    professional_id: Option<String>,
    date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    discount: Option<String>,
    extra_amount: Option<String>,
    total_amount: Option<String>,
    payment_method: Option<String>,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct ServiceCreateForm {
    name: String,
    duration: String,
    price: String,
    category: String,
    description: Option<String>,
}

#[derive(Deserialize)]
struct ProfessionalCreateForm {
    name: String,
    specialty: String,
    commission_rate: Option<String>,
}

#[derive(Deserialize)]
struct TransactionCreateForm {
    description: String,
    amount: String,
    date: Option<String>,
    category: String,
    tx_type: String,
    payment_method: Option<String>,
}

#[derive(Deserialize)]
struct ReportQuery {
    professional_id: Option<String>,
    year: Option<String>,
    month: Option<String>,
}

#[derive(Deserialize)]
struct SendMessageForm {
    body: String,
}

#[derive(Deserialize)]
struct NotifyForm {
    client_id: String,
    kind: String,
    title: String,
    description: String,
    link: Option<String>,
}

#[derive(Deserialize)]
struct PackageCreateForm {
    name: String,
    total_sessions: String,
    expiry_date: Option<String>,
}

#[derive(Deserialize)]
struct SettingSavePayload {
    key: String,
    value: String,
}

#[derive(Deserialize)]
struct InstagramPayload {
    service_name: String,
    promo_details: String,
    tone: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .wrap(from_fn(logout_guard))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/appointments/new").route(web::get().to(new_appointment)))
            .service(
                web::resource("/appointments")
                    .route(web::get().to(list_appointments))
                    .route(web::post().to(create_appointment)),
            )
            .service(
                web::resource("/appointments/{id}")
                    .route(web::get().to(appointment_detail))
                    .route(web::post().to(update_appointment)),
            )
            .service(web::resource("/clients").route(web::get().to(list_clients)))
            .service(web::resource("/clients/{id}").route(web::get().to(client_detail)))
            .service(web::resource("/clients/{id}/stamp").route(web::post().to(add_stamp)))
            .service(web::resource("/clients/{id}/redeem").route(web::post().to(redeem_mimo)))
            .service(web::resource("/clients/{id}/packages").route(web::post().to(add_package)))
            .service(web::resource("/clients/{id}/insights").route(web::post().to(client_insights)))
            .service(
                web::resource("/services")
                    .route(web::get().to(list_services))
                    .route(web::post().to(create_service)),
            )
            .service(
                web::resource("/professionals")
                    .route(web::get().to(list_professionals))
                    .route(web::post().to(create_professional)),
            )
            .service(
                web::resource("/finance")
                    .route(web::get().to(list_transactions))
                    .route(web::post().to(create_transaction)),
            )
            .service(web::resource("/reports").route(web::get().to(report_page)))
            .service(web::resource("/messages").route(web::get().to(inbox)))
            .service(
                web::resource("/messages/{client_id}")
                    .route(web::get().to(conversation))
                    .route(web::post().to(send_message)),
            )
            .service(
                web::resource("/notifications")
                    .route(web::get().to(notify_page))
                    .route(web::post().to(send_notification)),
            )
            .service(web::resource("/settings").route(web::get().to(settings_page)))
            .service(web::resource("/settings/save").route(web::post().to(save_setting)))
            .service(web::resource("/ai").route(web::get().to(ai_page)))
            .service(web::resource("/ai/instagram").route(web::post().to(instagram_post))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/admin/dashboard"))
        .finish()
}

fn service_name_map(services: &[SalonService]) -> HashMap<&str, &str> {
    services
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect()
}

fn to_view(appointment: &Appointment, service_names: &HashMap<&str, &str>) -> AppointmentView {
    let services = appointment
        .service_ids
        .iter()
        .filter_map(|id| service_names.get(id.as_str()).copied())
        .collect::<Vec<_>>()
        .join(", ");
    let total_display = appointment
        .total_amount
        .as_deref()
        .map(|raw| {
            money::parse_brl(raw)
                .map(money::format_brl)
                .unwrap_or_else(|| raw.to_string())
        })
        .unwrap_or_else(|| "—".to_string());

    AppointmentView {
        id: appointment.id.clone(),
        client_name: appointment.client_name.clone(),
        professional: appointment
            .professional_name
            .clone()
            .unwrap_or_else(|| "A definir".to_string()),
        date: appointment.date.clone(),
        start_time: appointment.start_time.clone(),
        end_time: appointment.end_time.clone(),
        services,
        status: appointment.status.clone(),
        total_display,
    }
}

async fn dashboard(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let (appointments, clients, transactions, services) = tokio::try_join!(
        db::fetch_appointments(&state.db),
        db::fetch_clients(&state.db),
        db::fetch_transactions(&state.db),
        db::fetch_services(&state.db),
    )
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let today = Local::now().format("%Y-%m-%d").to_string();
    let metrics = reports::dashboard_metrics(&appointments, &clients, &transactions, &today);

    let stats = vec![
        StatCard {
            label: "Appointments today".to_string(),
            value: metrics.appointments_today.to_string(),
        },
        StatCard {
            label: "Confirmed today".to_string(),
            value: metrics.confirmed_today.to_string(),
        },
        StatCard {
            label: "Clients".to_string(),
            value: metrics.total_clients.to_string(),
        },
        StatCard {
            label: "Revenue this month".to_string(),
            value: money::format_brl(metrics.monthly_revenue),
        },
        StatCard {
            label: "Loyalty clients".to_string(),
            value: metrics.loyalty_clients.to_string(),
        },
    ];

    let service_names = service_name_map(&services);
    let agenda = reports::daily_agenda(&appointments, &today)
        .into_iter()
        .map(|a| to_view(a, &service_names))
        .collect();

    let activity_rows = sqlx::query_as::<_, ActivityRow>(
        "SELECT message, created_at FROM activities ORDER BY created_at DESC LIMIT 10",
    )
    .fetch_all(&state.db)
    .await
    .unwrap_or_default();

    let activities = activity_rows
        .into_iter()
        .map(|row| ActivityView {
            message: row.message,
            created_at: row.created_at,
        })
        .collect();

    Ok(render(AdminDashboardTemplate {
        admin_name: auth.display_name.clone(),
        stats,
        agenda,
        activities,
    }))
}

async fn list_appointments(
    state: web::Data<AppState>,
    query: web::Query<AppointmentFilter>,
) -> Result<HttpResponse> {
    let (appointments, services) = tokio::try_join!(
        db::fetch_appointments(&state.db),
        db::fetch_services(&state.db)
    )
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let date_filter = query.date.clone().unwrap_or_default();
    let status_filter = query.status.clone().unwrap_or_default();

    let filtered: Vec<&Appointment> = if date_filter.is_empty() {
        appointments.iter().collect()
    } else {
        reports::daily_agenda(&appointments, &date_filter)
    };

    let service_names = service_name_map(&services);
    let views = filtered
        .into_iter()
        .filter(|a| status_filter.is_empty() || a.status == status_filter)
        .map(|a| to_view(a, &service_names))
        .collect();

    let statuses = APPOINTMENT_STATUSES
        .iter()
        .copied()
        .map(|value| StatusOption {
            value,
            selected: value == status_filter,
        })
        .collect();

    Ok(render(AdminAppointmentsTemplate {
        appointments: views,
        date_filter,
        statuses,
    }))
}

async fn new_appointment(state: web::Data<AppState>) -> Result<HttpResponse> {
    let template = new_appointment_template(&state, Vec::new()).await?;
    Ok(render(template))
}

async fn new_appointment_template(
    state: &web::Data<AppState>,
    errors: Vec<String>,
) -> Result<AdminAppointmentNewTemplate> {
    let (clients, professionals, services) = tokio::try_join!(
        db::fetch_clients(&state.db),
        db::fetch_professionals(&state.db),
        db::fetch_services(&state.db)
    )
    .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(AdminAppointmentNewTemplate {
        clients: clients
            .into_iter()
            .map(|c| OptionView {
                id: c.id,
                label: c.name,
                selected: false,
            })
            .collect(),
        professionals: professionals
            .into_iter()
            .map(|p| OptionView {
                id: p.id,
                label: p.name,
                selected: false,
            })
            .collect(),
        services: services
            .into_iter()
            .map(|s| ServiceOptionView {
                price_display: money::parse_brl(&s.price)
                    .map(money::format_brl)
                    .unwrap_or_else(|| s.price.clone()),
                id: s.id,
                name: s.name,
            })
            .collect(),
        errors,
    })
}

async fn create_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<Vec<(String, String)>>,
) -> Result<HttpResponse> {
    let mut client_id = String::new();
    let mut professional_id = String::new();
    let mut date = String::new();
    let mut start_time = String::new();
    let mut end_time = String::new();
    let mut total_amount = String::new();
    let mut notes = String::new();
    let mut service_ids: Vec<String> = Vec::new();

    // Checkbox groups repeat the key, so the form arrives as raw pairs.
    for (key, value) in form.into_inner() {
        match key.as_str() {
            "client_id" => client_id = value,
            "professional_id" => professional_id = value,
            "date" => date = value,
            "start_time" => start_time = value,
            "end_time" => end_time = value,
            "total_amount" => total_amount = value,
            "notes" => notes = value,
            "service_ids" => service_ids.push(value),
            _ => {}
        }
    }

    let mut errors = Vec::new();
    if client_id.trim().is_empty() {
        errors.push("Select a client.".to_string());
    }
    if NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").is_err() {
        errors.push("Pick a valid date.".to_string());
    }
    if start_time.trim().is_empty() || end_time.trim().is_empty() {
        errors.push("Start and end times are required.".to_string());
    }
    if service_ids.is_empty() {
        errors.push("Select at least one service.".to_string());
    }

    if !errors.is_empty() {
        let template = new_appointment_template(&state, errors).await?;
        return Ok(render(template));
    }

    let services = db::fetch_services(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let total = if total_amount.trim().is_empty() {
        let sum: Decimal = services
            .iter()
            .filter(|s| service_ids.contains(&s.id))
            .filter_map(|s| money::parse_brl(&s.price))
            .sum();
        money::format_amount(sum)
    } else {
        total_amount.trim().to_string()
    };

    let appointment_id = new_id();
    let now = chrono::Utc::now().to_rfc3339();
    let professional = if professional_id.trim().is_empty() {
        None
    } else {
        Some(professional_id.trim().to_string())
    };
    let notes = if notes.trim().is_empty() {
        None
    } else {
        Some(notes.trim().to_string())
    };

    sqlx::query(
        r#"INSERT INTO appointments
           (id, client_id, professional_id, date, start_time, end_time, status, discount, extra_amount, total_amount, payment_method, notes, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, NULL, ?, ?)"#,
    )
    .bind(&appointment_id)
    .bind(client_id.trim())
    .bind(&professional)
    .bind(date.trim())
    .bind(start_time.trim())
    .bind(end_time.trim())
    .bind(STATUS_SCHEDULED)
    .bind(&total)
    .bind(&notes)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    for service_id in &service_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO appointment_services (appointment_id, service_id) VALUES (?, ?)",
        )
        .bind(&appointment_id)
        .bind(service_id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    }

    db::log_activity(
        &state.db,
        "appointment_created",
        &format!("{} scheduled an appointment.", auth.display_name),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;

    if let Err(err) = notifications::notify_client(
        &state.db,
        &state.events,
        client_id.trim(),
        NOTIFY_APPOINTMENT,
        "Novo agendamento",
        &format!("Você tem um horário marcado para {} às {}.", date.trim(), start_time.trim()),
        Some("/portal/dashboard"),
    )
    .await
    {
        log::warn!("appointment notification failed: {err}");
    }

    let _ = state.events.send(ServerEvent::appointment(
        client_id.trim(),
        &appointment_id,
        STATUS_SCHEDULED,
    ));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/admin/appointments/{appointment_id}")))
        .finish())
}

async fn appointment_detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let appointment = db::fetch_appointment(&state.db, &appointment_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(appointment) = appointment else {
        return Ok(HttpResponse::NotFound().body("Appointment not found"));
    };

    let (professionals, services) = tokio::try_join!(
        db::fetch_professionals(&state.db),
        db::fetch_services(&state.db)
    )
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let service_names = service_name_map(&services);
    let joined_services = appointment
        .service_ids
        .iter()
        .filter_map(|id| service_names.get(id.as_str()).copied())
        .collect::<Vec<_>>()
        .join(", ");

    let statuses = APPOINTMENT_STATUSES
        .iter()
        .copied()
        .map(|value| StatusOption {
            value,
            selected: value == appointment.status,
        })
        .collect();

    let professionals = professionals
        .into_iter()
        .map(|p| OptionView {
            selected: appointment.professional_id.as_deref() == Some(p.id.as_str()),
            id: p.id,
            label: p.name,
        })
        .collect();

    Ok(render(AdminAppointmentDetailTemplate {
        id: appointment.id,
        client_id: appointment.client_id,
        client_name: appointment.client_name,
        services: joined_services,
        date: appointment.date,
        start_time: appointment.start_time,
        end_time: appointment.end_time,
        discount: appointment.discount.unwrap_or_default(),
        extra_amount: appointment.extra_amount.unwrap_or_default(),
        total_amount: appointment.total_amount.unwrap_or_default(),
        payment_method: appointment.payment_method.unwrap_or_default(),
        notes: appointment.notes.unwrap_or_default(),
        statuses,
        professionals,
    }))
}

async fn update_appointment(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<AppointmentUpdateForm>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let form = form.into_inner();

    if !APPOINTMENT_STATUSES.contains(&form.status.as_str()) {
        return Ok(HttpResponse::BadRequest().body("Invalid status"));
    }

    let existing = db::fetch_appointment(&state.db, &appointment_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let Some(existing) = existing else {
        return Ok(HttpResponse::NotFound().body("Appointment not found"));
    };

    let professional_id = form.professional_id.as_ref().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        }
    });
    let optional = |value: Option<String>| {
        value.and_then(|v| {
            let trimmed = v.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        })
    };

    let date = form
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(&existing.date)
        .to_string();
    let start_time = form
        .start_time
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&existing.start_time)
        .to_string();
    let end_time = form
        .end_time
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&existing.end_time)
        .to_string();

    sqlx::query(
        r#"UPDATE appointments
           SET status = ?, professional_id = ?, date = ?, start_time = ?, end_time = ?,
               discount = ?, extra_amount = ?, total_amount = ?, payment_method = ?, notes = ?
           WHERE id = ?"#,
    )
    .bind(&form.status)
    .bind(&professional_id)
    .bind(&date)
    .bind(&start_time)
    .bind(&end_time)
    .bind(optional(form.discount))
    .bind(optional(form.extra_amount))
    .bind(optional(form.total_amount))
    .bind(optional(form.payment_method))
    .bind(optional(form.notes))
    .bind(&appointment_id)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "appointment_updated",
        &format!("{} updated appointment {}.", auth.display_name, appointment_id),
        Some(&auth.id),
        Some(&appointment_id),
    )
    .await;

    if let Err(err) = notifications::notify_client(
        &state.db,
        &state.events,
        &existing.client_id,
        NOTIFY_APPOINTMENT,
        "Agendamento atualizado",
        &format!("Seu horário de {} agora está {}.", date, form.status),
        Some("/portal/dashboard"),
    )
    .await
    {
        log::warn!("appointment notification failed: {err}");
    }

    let _ = state.events.send(ServerEvent::appointment(
        &existing.client_id,
        &appointment_id,
        &form.status,
    ));

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/admin/appointments/{appointment_id}")))
        .finish())
}

fn client_view(client: &Client) -> ClientView {
    ClientView {
        id: client.id.clone(),
        name: client.name.clone(),
        email: client.email.clone(),
        phone: client.phone.clone(),
        stamps_earned: client.stamps_earned,
        mimos_redeemed: client.mimos_redeemed,
        package_count: client.packages.len(),
        is_loyalty: client.stamps_earned > 0 || !client.packages.is_empty(),
    }
}

async fn list_clients(state: web::Data<AppState>) -> Result<HttpResponse> {
    let clients = db::fetch_clients(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(render(AdminClientsTemplate {
        clients: clients.iter().map(client_view).collect(),
    }))
}

async fn client_detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let client = db::fetch_client(&state.db, &client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let Some(client) = client else {
        return Ok(HttpResponse::NotFound().body("Client not found"));
    };

    let (appointments, services) = tokio::try_join!(
        db::fetch_appointments(&state.db),
        db::fetch_services(&state.db)
    )
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let service_names = service_name_map(&services);
    let mut history: Vec<AppointmentView> = appointments
        .iter()
        .filter(|a| a.client_id == client.id)
        .map(|a| to_view(a, &service_names))
        .collect();
    history.sort_by(|a, b| b.date.cmp(&a.date));

    let packages = client
        .packages
        .iter()
        .map(|p| PackageView {
            name: p.name.clone(),
            sessions_label: format!("{}/{} sessões", p.used_sessions, p.total_sessions),
            purchase_date: p.purchase_date.clone(),
            expiry_date: p.expiry_date.clone().unwrap_or_default(),
            has_expiry: p.expiry_date.is_some(),
        })
        .collect();

    Ok(render(AdminClientDetailTemplate {
        can_redeem: client.stamps_earned >= STAMPS_PER_MIMO,
        stamps_goal: STAMPS_PER_MIMO,
        client: client_view(&client),
        packages,
        history,
    }))
}

async fn add_stamp(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("UPDATE clients SET stamps_earned = stamps_earned + 1, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&client_id)
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "stamp_added",
        &format!("{} added a loyalty stamp.", auth.display_name),
        Some(&auth.id),
        None,
    )
    .await;

    if let Err(err) = notifications::notify_client(
        &state.db,
        &state.events,
        &client_id,
        NOTIFY_LOYALTY,
        "Novo selo de fidelidade",
        "Você ganhou mais um selo. Continue colecionando para trocar por um mimo!",
        Some("/portal/dashboard"),
    )
    .await
    {
        log::warn!("loyalty notification failed: {err}");
    }

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/admin/clients/{client_id}")))
        .finish())
}

async fn redeem_mimo(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let now = chrono::Utc::now().to_rfc3339();

    // Guarded update: redeeming below the stamp threshold is a no-op.
    let result = sqlx::query(
        r#"UPDATE clients
           SET stamps_earned = stamps_earned - ?, mimos_redeemed = COALESCE(mimos_redeemed, 0) + 1, updated_at = ?
           WHERE id = ? AND stamps_earned >= ?"#,
    )
    .bind(STAMPS_PER_MIMO)
    .bind(&now)
    .bind(&client_id)
    .bind(STAMPS_PER_MIMO)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        log::warn!("mimo redeem skipped for client {client_id}: not enough stamps");
    } else {
        db::log_activity(
            &state.db,
            "mimo_redeemed",
            &format!("{} redeemed a mimo.", auth.display_name),
            Some(&auth.id),
            None,
        )
        .await;

        if let Err(err) = notifications::notify_client(
            &state.db,
            &state.events,
            &client_id,
            NOTIFY_LOYALTY,
            "Mimo resgatado",
            "Seus selos viraram um mimo. Aproveite!",
            Some("/portal/dashboard"),
        )
        .await
        {
            log::warn!("loyalty notification failed: {err}");
        }
    }

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/admin/clients/{client_id}")))
        .finish())
}

async fn add_package(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<PackageCreateForm>,
) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let form = form.into_inner();

    let total_sessions: i64 = form.total_sessions.trim().parse().unwrap_or(0);
    if form.name.trim().is_empty() || total_sessions <= 0 {
        return Ok(HttpResponse::SeeOther()
            .append_header((header::LOCATION, format!("/admin/clients/{client_id}")))
            .finish());
    }

    let expiry = form.expiry_date.and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    });
    let today = Local::now().format("%Y-%m-%d").to_string();

    sqlx::query(
        r#"INSERT INTO purchased_packages (id, client_id, name, total_sessions, used_sessions, purchase_date, expiry_date)
           VALUES (?, ?, ?, ?, 0, ?, ?)"#,
    )
    .bind(new_id())
    .bind(&client_id)
    .bind(form.name.trim())
    .bind(total_sessions)
    .bind(&today)
    .bind(&expiry)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "package_added",
        &format!("{} registered a package purchase.", auth.display_name),
        Some(&auth.id),
        None,
    )
    .await;

    if let Err(err) = notifications::notify_client(
        &state.db,
        &state.events,
        &client_id,
        NOTIFY_LOYALTY,
        "Pacote ativado",
        &format!("Seu pacote \"{}\" está ativo.", form.name.trim()),
        Some("/portal/dashboard"),
    )
    .await
    {
        log::warn!("package notification failed: {err}");
    }

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, format!("/admin/clients/{client_id}")))
        .finish())
}

async fn client_insights(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let client = db::fetch_client(&state.db, &client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let Some(client) = client else {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({ "error": "Client not found" })));
    };

    let (appointments, services) = tokio::try_join!(
        db::fetch_appointments(&state.db),
        db::fetch_services(&state.db)
    )
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let service_names = service_name_map(&services);
    let history: Vec<&Appointment> = appointments
        .iter()
        .filter(|a| a.client_id == client.id)
        .collect();

    let visit_summary = match history.last() {
        Some(last) => format!("{} visitas registradas, última em {}", history.len(), last.date),
        None => "Nenhuma visita registrada ainda".to_string(),
    };

    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for appointment in &history {
        for id in &appointment.service_ids {
            if let Some(name) = service_names.get(id.as_str()).copied() {
                *frequency.entry(name).or_default() += 1;
            }
        }
    }
    let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let favorite_services = if ranked.is_empty() {
        "Ainda sem serviços favoritos".to_string()
    } else {
        ranked
            .into_iter()
            .take(3)
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let input = ai::ClientInsightsInput {
        client_name: client.name.clone(),
        visit_summary,
        favorite_services,
        stamps_earned: client.stamps_earned.to_string(),
    };

    match ai::generate_client_insights(&state.ai, &input).await {
        Ok(insights) => Ok(HttpResponse::Ok().json(serde_json::json!({ "insights": insights }))),
        Err(err) => Ok(ai_error_response(err)),
    }
}

fn ai_error_response(err: ai::AiError) -> HttpResponse {
    let message = err.to_string();
    match err {
        ai::AiError::Disabled => HttpResponse::ServiceUnavailable()
            .json(serde_json::json!({ "error": message })),
        ai::AiError::MissingField(_) => {
            HttpResponse::UnprocessableEntity().json(serde_json::json!({ "error": message }))
        }
        _ => HttpResponse::BadGateway().json(serde_json::json!({ "error": message })),
    }
}

async fn list_services(state: web::Data<AppState>) -> Result<HttpResponse> {
    let template = services_template(&state, Vec::new()).await?;
    Ok(render(template))
}

async fn services_template(
    state: &web::Data<AppState>,
    errors: Vec<String>,
) -> Result<AdminServicesTemplate> {
    let services = db::fetch_services(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(AdminServicesTemplate {
        services: services
            .into_iter()
            .map(|s| ServiceView {
                price_display: money::parse_brl(&s.price)
                    .map(money::format_brl)
                    .unwrap_or_else(|| s.price.clone()),
                name: s.name,
                duration: s.duration,
                category: s.category,
                description: s.description.unwrap_or_default(),
            })
            .collect(),
        errors,
    })
}

async fn create_service(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ServiceCreateForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();
    if form.name.trim().is_empty() {
        errors.push("Service name is required.".to_string());
    }
    if form.duration.trim().is_empty() {
        errors.push("Duration is required.".to_string());
    }
    if money::parse_brl(&form.price).is_none() {
        errors.push("Price must be a valid amount, e.g. 120,00.".to_string());
    }
    if form.category.trim().is_empty() {
        errors.push("Category is required.".to_string());
    }

    if !errors.is_empty() {
        let template = services_template(&state, errors).await?;
        return Ok(render(template));
    }

    let description = form.description.and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    });

    sqlx::query(
        "INSERT INTO services (id, name, duration, price, category, description) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(new_id())
    .bind(form.name.trim())
    .bind(form.duration.trim())
    .bind(form.price.trim())
    .bind(form.category.trim())
    .bind(&description)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "service_created",
        &format!("{} added service {}.", auth.display_name, form.name.trim()),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/admin/services"))
        .finish())
}

async fn list_professionals(state: web::Data<AppState>) -> Result<HttpResponse> {
    let template = professionals_template(&state, Vec::new()).await?;
    Ok(render(template))
}

async fn professionals_template(
    state: &web::Data<AppState>,
    errors: Vec<String>,
) -> Result<AdminProfessionalsTemplate> {
    let professionals = db::fetch_professionals(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(AdminProfessionalsTemplate {
        professionals: professionals
            .into_iter()
            .map(|p| ProfessionalView {
                commission_display: p
                    .commission_rate
                    .map(|rate| format!("{rate:.0}%"))
                    .unwrap_or_else(|| "—".to_string()),
                name: p.name,
                specialty: p.specialty,
            })
            .collect(),
        errors,
    })
}

async fn create_professional(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<ProfessionalCreateForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();
    if form.name.trim().is_empty() {
        errors.push("Name is required.".to_string());
    }
    if form.specialty.trim().is_empty() {
        errors.push("Specialty is required.".to_string());
    }

    let commission_rate = match form.commission_rate.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match raw.replace(',', ".").parse::<f64>() {
            Ok(rate) if (0.0..=100.0).contains(&rate) => Some(rate),
            _ => {
                errors.push("Commission must be a percentage between 0 and 100.".to_string());
                None
            }
        },
    };

    if !errors.is_empty() {
        let template = professionals_template(&state, errors).await?;
        return Ok(render(template));
    }

    sqlx::query(
        "INSERT INTO professionals (id, name, specialty, commission_rate) VALUES (?, ?, ?, ?)",
    )
    .bind(new_id())
    .bind(form.name.trim())
    .bind(form.specialty.trim())
    .bind(commission_rate)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "professional_created",
        &format!("{} added professional {}.", auth.display_name, form.name.trim()),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/admin/professionals"))
        .finish())
}

async fn list_transactions(state: web::Data<AppState>) -> Result<HttpResponse> {
    let template = finance_template(&state, Vec::new()).await?;
    Ok(render(template))
}

async fn finance_template(
    state: &web::Data<AppState>,
    errors: Vec<String>,
) -> Result<AdminFinanceTemplate> {
    let transactions = db::fetch_transactions(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let mut income_total = Decimal::ZERO;
    let mut expense_total = Decimal::ZERO;
    for transaction in &transactions {
        let amount = money::parse_brl(&transaction.amount).unwrap_or(Decimal::ZERO);
        if transaction.tx_type == TX_INCOME {
            income_total += amount;
        } else {
            expense_total += amount;
        }
    }

    Ok(AdminFinanceTemplate {
        transactions: transactions
            .into_iter()
            .map(|t| TransactionView {
                amount_display: money::parse_brl(&t.amount)
                    .map(money::format_brl)
                    .unwrap_or_else(|| t.amount.clone()),
                is_income: t.tx_type == TX_INCOME,
                description: t.description,
                date: t.date,
                category: t.category,
            })
            .collect(),
        income_total,
        expense_total,
        errors,
    })
}

async fn create_transaction(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<TransactionCreateForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();
    if form.description.trim().is_empty() {
        errors.push("Description is required.".to_string());
    }
    if money::parse_brl(&form.amount).is_none() {
        errors.push("Amount must be a valid value, e.g. 100,00.".to_string());
    }
    if form.tx_type != TX_INCOME && form.tx_type != TX_EXPENSE {
        errors.push("Type must be income or expense.".to_string());
    }
    if form.category.trim().is_empty() {
        errors.push("Category is required.".to_string());
    }

    if !errors.is_empty() {
        let template = finance_template(&state, errors).await?;
        return Ok(render(template));
    }

    let date = form
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Local::now().format("%Y-%m-%d").to_string());
    let payment_method = form.payment_method.and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    });

    sqlx::query(
        r#"INSERT INTO financial_transactions (id, description, amount, date, category, tx_type, payment_method)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(form.description.trim())
    .bind(form.amount.trim())
    .bind(&date)
    .bind(form.category.trim())
    .bind(&form.tx_type)
    .bind(&payment_method)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "transaction_created",
        &format!("{} recorded a {} entry.", auth.display_name, form.tx_type),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/admin/finance"))
        .finish())
}

async fn report_page(
    state: web::Data<AppState>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse> {
    let now = Local::now();
    let selected_year = query
        .year
        .clone()
        .filter(|y| !y.trim().is_empty())
        .unwrap_or_else(|| now.year().to_string());
    let selected_month = query
        .month
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("{:02}", now.month()));

    let professional_id = query
        .professional_id
        .clone()
        .unwrap_or_default();

    let professionals = db::fetch_professionals(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let professional_options: Vec<OptionView> = professionals
        .iter()
        .map(|p| OptionView {
            id: p.id.clone(),
            label: p.name.clone(),
            selected: p.id == professional_id,
        })
        .collect();
    let professional_name = professionals
        .iter()
        .find(|p| p.id == professional_id)
        .map(|p| p.name.clone())
        .unwrap_or_default();

    let year: i32 = selected_year.trim().parse().unwrap_or(now.year());
    let month: u32 = selected_month.trim().parse().unwrap_or(now.month());

    // "All professionals" stays an empty prompt, not an error.
    if professional_id.is_empty() {
        return Ok(render(AdminReportsTemplate {
            professionals: professional_options,
            selected_year,
            selected_month,
            no_selection: true,
            has_report: false,
            professional_name,
            rows: Vec::new(),
            total: Decimal::ZERO,
        }));
    }

    let (appointments, clients, services) = tokio::try_join!(
        db::fetch_appointments(&state.db),
        db::fetch_clients(&state.db),
        db::fetch_services(&state.db)
    )
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let report = reports::professional_report(
        &appointments,
        &clients,
        &services,
        Some(professional_id.as_str()),
        year,
        month,
    );

    let (rows, total, has_report) = match report {
        Some(report) => (
            report
                .rows
                .into_iter()
                .map(|row| ReportRowView {
                    date: row.date,
                    client_name: row.client_name,
                    services: row.services,
                    amount: row.amount,
                })
                .collect(),
            report.total,
            true,
        ),
        None => (Vec::new(), Decimal::ZERO, false),
    };

    Ok(render(AdminReportsTemplate {
        professionals: professional_options,
        selected_year,
        selected_month,
        no_selection: false,
        has_report,
        professional_name,
        rows,
        total,
    }))
}

async fn inbox(state: web::Data<AppState>) -> Result<HttpResponse> {
    let conversations = chat::list_conversations(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(render(AdminMessagesTemplate {
        conversations: conversations
            .into_iter()
            .map(|c| ConversationView {
                unread: c.unread_by_admin == 1,
                client_id: c.client_id,
                client_name: c.client_name,
                last_message: c.last_message,
                last_message_at: c.last_message_at,
            })
            .collect(),
    }))
}

async fn conversation(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let client = db::fetch_client(&state.db, &client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let Some(client) = client else {
        return Ok(HttpResponse::NotFound().body("Client not found"));
    };

    // Opening the thread marks it read on the admin side.
    chat::mark_read_by_admin(&state.db, &client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let template =
        conversation_template(&state, &client_id, &client.name, String::new(), String::new())
            .await?;
    Ok(render(template))
}

async fn send_message(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    path: web::Path<String>,
    form: web::Form<SendMessageForm>,
) -> Result<HttpResponse> {
    let client_id = path.into_inner();
    let client = db::fetch_client(&state.db, &client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let Some(client) = client else {
        return Ok(HttpResponse::NotFound().body("Client not found"));
    };

    let body = form.into_inner().body;
    if body.trim().is_empty() {
        let template = conversation_template(
            &state,
            &client_id,
            &client.name,
            String::new(),
            "Write a message before sending.".to_string(),
        )
        .await?;
        return Ok(render(template));
    }

    match chat::send_message(
        &state.db,
        &state.events,
        &client_id,
        &client.name,
        SENDER_ADMIN,
        &auth.display_name,
        body.trim(),
    )
    .await
    {
        Ok(_) => Ok(HttpResponse::SeeOther()
            .append_header((header::LOCATION, format!("/admin/messages/{client_id}")))
            .finish()),
        Err(err) => {
            log::warn!("admin message send failed: {err}");
            let template = conversation_template(
                &state,
                &client_id,
                &client.name,
                body,
                "The message could not be sent. Your draft was kept below.".to_string(),
            )
            .await?;
            Ok(render(template))
        }
    }
}

async fn conversation_template(
    state: &web::Data<AppState>,
    client_id: &str,
    client_name: &str,
    draft: String,
    error: String,
) -> Result<AdminConversationTemplate> {
    let thread = chat::conversation_messages(&state.db, client_id)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(AdminConversationTemplate {
        client_id: client_id.to_string(),
        client_name: client_name.to_string(),
        messages: thread
            .into_iter()
            .map(|m| MessageView {
                is_admin: m.sender_type == SENDER_ADMIN,
                sender_name: m.sender_name,
                body: m.body,
                created_at: m.created_at,
            })
            .collect(),
        draft,
        has_error: !error.is_empty(),
        error,
    })
}

const NOTIFY_KINDS: [KindOption; 3] = [
    KindOption {
        value: NOTIFY_GENERAL,
        label: "General notice",
    },
    KindOption {
        value: NOTIFY_APPOINTMENT,
        label: "Appointment",
    },
    KindOption {
        value: NOTIFY_LOYALTY,
        label: "Loyalty",
    },
];

async fn notify_page(state: web::Data<AppState>) -> Result<HttpResponse> {
    let template = notify_template(&state, Vec::new(), false).await?;
    Ok(render(template))
}

async fn notify_template(
    state: &web::Data<AppState>,
    errors: Vec<String>,
    success: bool,
) -> Result<AdminNotifyTemplate> {
    let clients = db::fetch_clients(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(AdminNotifyTemplate {
        clients: clients
            .into_iter()
            .map(|c| OptionView {
                id: c.id,
                label: c.name,
                selected: false,
            })
            .collect(),
        kinds: NOTIFY_KINDS.to_vec(),
        errors,
        success,
    })
}

async fn send_notification(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    form: web::Form<NotifyForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();
    if form.client_id.trim().is_empty() {
        errors.push("Select a client.".to_string());
    }
    if form.title.trim().is_empty() {
        errors.push("Title is required.".to_string());
    }
    if form.description.trim().is_empty() {
        errors.push("Description is required.".to_string());
    }
    let kind = if NOTIFY_KINDS.iter().any(|k| k.value == form.kind) {
        form.kind.clone()
    } else {
        NOTIFY_GENERAL.to_string()
    };

    if !errors.is_empty() {
        let template = notify_template(&state, errors, false).await?;
        return Ok(render(template));
    }

    let link = form.link.as_deref().map(str::trim).filter(|l| !l.is_empty());
    notifications::notify_client(
        &state.db,
        &state.events,
        form.client_id.trim(),
        &kind,
        form.title.trim(),
        form.description.trim(),
        link,
    )
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "notification_sent",
        &format!("{} sent a notification.", auth.display_name),
        Some(&auth.id),
        None,
    )
    .await;

    let template = notify_template(&state, Vec::new(), true).await?;
    Ok(render(template))
}

async fn settings_page(state: web::Data<AppState>) -> Result<HttpResponse> {
    let settings = db::fetch_settings(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(render(AdminSettingsTemplate {
        settings: settings
            .into_iter()
            .map(|s| SettingView {
                key: s.key,
                label: s.label,
                value: s.value,
            })
            .collect(),
    }))
}

async fn save_setting(
    state: web::Data<AppState>,
    auth: web::ReqData<AuthUser>,
    payload: web::Json<SettingSavePayload>,
) -> Result<HttpResponse> {
    let payload = payload.into_inner();
    sqlx::query(
        r#"INSERT INTO settings (key, label, value)
           VALUES (?, ?, ?)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
    )
    .bind(&payload.key)
    .bind(&payload.key)
    .bind(&payload.value)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "setting_updated",
        &format!("{} updated setting {}.", auth.display_name, payload.key),
        Some(&auth.id),
        None,
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

async fn ai_page(state: web::Data<AppState>) -> Result<HttpResponse> {
    let salon_name = db::setting_value(&state.db, "salon_name").await;
    Ok(render(AdminAiTemplate {
        salon_name,
        ai_enabled: state.ai.enabled(),
    }))
}

async fn instagram_post(
    state: web::Data<AppState>,
    payload: web::Json<InstagramPayload>,
) -> Result<HttpResponse> {
    let payload = payload.into_inner();
    let salon_name = db::setting_value(&state.db, "salon_name").await;

    let input = ai::InstagramPostInput {
        salon_name,
        service_name: payload.service_name,
        promo_details: payload.promo_details,
        tone: payload.tone,
    };

    match ai::generate_instagram_post(&state.ai, &input).await {
        Ok(post) => Ok(HttpResponse::Ok().json(serde_json::json!({ "instagramPost": post }))),
        Err(err) => Ok(ai_error_response(err)),
    }
}
