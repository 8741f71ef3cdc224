use actix_web::{http::header, web, HttpRequest, HttpResponse, Result};
use actix_web::http::header::Header;
use actix_web_httpauth::headers::authorization::{Authorization, Basic};
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::{authenticate_credentials, clear_logout_cookie, hash_password, logout_cookie, new_id, AUTH_REALM},
    db,
    models::{ROLE_ADMIN, ROLE_CLIENT},
    money,
    notifications,
    state::AppState,
    templates::render,
};

#[derive(Clone, Debug)]
struct ServiceView {
    name: String,
    duration: String,
    price_display: String,
    category: String,
    description: String,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    salon_name: String,
    tagline: String,
    opening_hours: String,
    instagram_handle: String,
    services: Vec<ServiceView>,
}

#[derive(Clone, Debug, Default)]
struct RegisterView {
    name: String,
    email: String,
    phone: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    form: RegisterView,
    errors: Vec<String>,
    success: bool,
}

#[derive(Deserialize)]
struct RegisterForm {
    name: String,
    email: String,
    phone: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(
            web::resource("/register")
                .route(web::get().to(show_register))
                .route(web::post().to(create_registration)),
        )
        .service(web::resource("/login").route(web::get().to(login)))
        .service(web::resource("/logout").route(web::get().to(logout)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn logout(req: HttpRequest) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, "/"))
        .cookie(logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<LoginQuery>,
) -> HttpResponse {
    let auth = match Authorization::<Basic>::parse(&req) {
        Ok(auth) => auth,
        Err(_) => return auth_challenge(),
    };
    let credentials = auth.into_scheme();
    let email = credentials.user_id();
    let password = credentials.password().unwrap_or_default();

    let user = match authenticate_credentials(&state, email, password).await {
        Some(user) => user,
        None => return auth_challenge(),
    };

    let requested = query.next.as_deref().unwrap_or("");
    let requested = if requested.starts_with('/') { requested } else { "" };
    let fallback = if user.role == ROLE_ADMIN {
        "/admin/dashboard"
    } else {
        "/portal/dashboard"
    };

    let redirect = if user.role == ROLE_ADMIN {
        if requested.starts_with("/admin") {
            requested
        } else {
            fallback
        }
    } else if requested.starts_with("/portal") {
        requested
    } else {
        fallback
    };

    HttpResponse::SeeOther()
        .append_header((header::LOCATION, redirect))
        .cookie(clear_logout_cookie(&req))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .finish()
}

fn auth_challenge() -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", AUTH_REALM)))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body("Invalid email or password")
}

async fn home(state: web::Data<AppState>) -> Result<HttpResponse> {
    let salon_name = db::setting_value(&state.db, "salon_name").await;
    let tagline = db::setting_value(&state.db, "salon_tagline").await;
    let opening_hours = db::setting_value(&state.db, "opening_hours").await;
    let instagram_handle = db::setting_value(&state.db, "instagram_handle").await;

    let services = db::fetch_services(&state.db)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|service| ServiceView {
            price_display: money::parse_brl(&service.price)
                .map(money::format_brl)
                .unwrap_or_else(|| service.price.clone()),
            name: service.name,
            duration: service.duration,
            category: service.category,
            description: service.description.unwrap_or_default(),
        })
        .collect();

    Ok(render(HomeTemplate {
        salon_name,
        tagline,
        opening_hours,
        instagram_handle,
        services,
    }))
}

async fn show_register() -> Result<HttpResponse> {
    Ok(render(RegisterTemplate {
        form: RegisterView::default(),
        errors: Vec::new(),
        success: false,
    }))
}

async fn create_registration(
    state: web::Data<AppState>,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let mut errors = Vec::new();
    if form.name.trim().is_empty() {
        errors.push("Full name is required.".to_string());
    }
    if !form.email.contains('@') {
        errors.push("A valid email is required.".to_string());
    }
    if form.phone.trim().is_empty() {
        errors.push("Phone number is required.".to_string());
    }
    if form.password.trim().len() < 6 {
        errors.push("Password must be at least 6 characters.".to_string());
    }

    let email = form.email.trim().to_lowercase();
    if errors.is_empty() {
        let taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE email = ?",
        )
        .bind(&email)
        .fetch_one(&state.db)
        .await
        .unwrap_or(0)
            + sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients WHERE email = ?")
                .bind(&email)
                .fetch_one(&state.db)
                .await
                .unwrap_or(0);
        if taken > 0 {
            errors.push("An account with this email already exists.".to_string());
        }
    }

    if !errors.is_empty() {
        return Ok(render(RegisterTemplate {
            form: RegisterView {
                name: form.name,
                email: form.email,
                phone: form.phone,
            },
            errors,
            success: false,
        }));
    }

    let password_hash = hash_password(&form.password)
        .map_err(|_| actix_web::error::ErrorInternalServerError("hash failure"))?;
    let now = chrono::Utc::now().to_rfc3339();
    let client_id = new_id();

    sqlx::query(
        r#"INSERT INTO clients (id, name, email, phone, stamps_earned, mimos_redeemed, created_at, updated_at)
           VALUES (?, ?, ?, ?, 0, 0, ?, ?)"#,
    )
    .bind(&client_id)
    .bind(form.name.trim())
    .bind(&email)
    .bind(form.phone.trim())
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    sqlx::query(
        r#"INSERT INTO users (id, email, display_name, role, password_hash, active, created_at)
           VALUES (?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(&email)
    .bind(form.name.trim())
    .bind(ROLE_CLIENT)
    .bind(password_hash)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    db::log_activity(
        &state.db,
        "client_registered",
        &format!("{} created a client account.", form.name.trim()),
        None,
        None,
    )
    .await;

    if let Err(err) = notifications::notify_client(
        &state.db,
        &state.events,
        &client_id,
        crate::models::NOTIFY_GENERAL,
        "Bem-vinda ao salão!",
        "Seu cadastro está pronto. Fale com a gente pelo portal sempre que quiser.",
        Some("/portal/dashboard"),
    )
    .await
    {
        log::warn!("welcome notification failed: {err}");
    }

    Ok(render(RegisterTemplate {
        form: RegisterView::default(),
        errors: Vec::new(),
        success: true,
    }))
}
