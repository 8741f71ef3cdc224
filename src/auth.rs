use actix_web::{
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    error::ErrorUnauthorized,
    http::header,
    middleware::Next,
    web, Error, HttpMessage, HttpRequest, HttpResponse,
};
use actix_web::cookie::{Cookie, SameSite, time::Duration};
use actix_web_httpauth::extractors::basic::BasicAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use uuid::Uuid;

use crate::{
    db,
    models::{UserRow, ROLE_ADMIN, ROLE_CLIENT},
    state::AppState,
};

pub const AUTH_REALM: &str = "SalonFlow";
const LOGOUT_COOKIE: &str = "sf_logged_out";

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
}

/// Portal identity: the authenticated user plus the client record resolved by
/// matching the account email against the clients collection.
#[derive(Clone, Debug)]
pub struct ClientAccount {
    pub user: AuthUser,
    pub client_id: String,
    pub client_name: String,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn authenticate_credentials(
    state: &AppState,
    email: &str,
    password: &str,
) -> Option<AuthUser> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, email, display_name, role, password_hash, active, created_at
           FROM users
           WHERE email = ? AND active = 1
           LIMIT 1"#,
    )
    .bind(email)
    .fetch_optional(&state.db)
    .await
    .ok()??;

    if !verify_password(password, &user.password_hash) {
        return None;
    }

    Some(AuthUser {
        id: user.id,
        email: user.email,
        display_name: user.display_name,
        role: user.role,
    })
}

async fn authenticate(req: &ServiceRequest, credentials: &BasicAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ErrorUnauthorized("Invalid email or password"))?;
    let email = credentials.user_id();
    let password = credentials.password().unwrap_or_default();
    authenticate_credentials(state, email, password)
        .await
        .ok_or_else(|| ErrorUnauthorized("Invalid email or password"))
}

pub async fn admin_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            if user.role != ROLE_ADMIN {
                return Err((ErrorUnauthorized("Admin access required"), req));
            }
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

pub async fn client_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let user = match authenticate(&req, &credentials).await {
        Ok(user) => user,
        Err(err) => return Err((err, req)),
    };

    if user.role == ROLE_ADMIN {
        return Err((
            ErrorUnauthorized("This sign-in is for salon clients. Use the admin area."),
            req,
        ));
    }
    if user.role != ROLE_CLIENT {
        return Err((ErrorUnauthorized("Client access required"), req));
    }

    let state = match req.app_data::<web::Data<AppState>>() {
        Some(state) => state.clone(),
        None => return Err((ErrorUnauthorized("Client access required"), req)),
    };
    let client = match db::fetch_client_by_email(&state.db, &user.email).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return Err((
                ErrorUnauthorized("No client profile found for this account"),
                req,
            ))
        }
        Err(err) => {
            log::warn!("client lookup failed during sign-in: {err}");
            return Err((ErrorUnauthorized("Client access required"), req));
        }
    };

    req.extensions_mut().insert(ClientAccount {
        client_id: client.id,
        client_name: client.name,
        user,
    });
    Ok(req)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn logout_cookie(req: &HttpRequest) -> Cookie<'static> {
    let mut builder = Cookie::build(LOGOUT_COOKIE, "1")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(365));
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn clear_logout_cookie(req: &HttpRequest) -> Cookie<'static> {
    let mut builder = Cookie::build(LOGOUT_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(0));
    if req.connection_info().scheme() == "https" {
        builder = builder.secure(true);
    }
    builder.finish()
}

pub fn is_logged_out(req: &HttpRequest) -> bool {
    req.cookie(LOGOUT_COOKIE).is_some()
}

pub async fn logout_guard<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<BoxBody>, Error>
where
    B: actix_web::body::MessageBody + 'static,
{
    if is_logged_out(req.request()) {
        let path = req.path();
        let login_target = if path.starts_with("/portal") {
            "/portal/dashboard"
        } else {
            "/admin/dashboard"
        };
        let login_url = format!("/login?next={}", login_target);
        let body = format!(
            r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Signed out</title>
    <style>
      body {{
        font-family: "Source Sans 3", system-ui, -apple-system, sans-serif;
        background: #f8f2f4;
        color: #2b2328;
        padding: 48px 20px;
      }}
      .card {{
        max-width: 520px;
        margin: 0 auto;
        background: #ffffff;
        border-radius: 20px;
        padding: 32px;
        box-shadow: 0 18px 40px rgba(75, 46, 62, 0.12);
      }}
      a {{
        color: #b3457a;
        text-decoration: none;
        font-weight: 600;
      }}
    </style>
  </head>
  <body>
    <div class="card">
      <h1>You're signed out</h1>
      <p>Your session has been closed.</p>
      <p><a href="{login_url}">Sign in again</a> or <a href="/">return to the salon page</a>.</p>
    </div>
  </body>
</html>"#
        );
        let response = HttpResponse::Unauthorized()
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .content_type("text/html; charset=utf-8")
            .body(body);
        return Ok(req.into_response(response));
    }

    let res = next.call(req).await?;
    Ok(res.map_into_boxed_body())
}
