use std::collections::HashMap;
use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::{
        Appointment, AppointmentRow, Client, ClientRow, FinancialTransaction,
        FinancialTransactionRow, Professional, ProfessionalRow, PurchasedPackageRow, SalonService,
        ServiceRow, SettingRow, ROLE_ADMIN,
    },
    normalize,
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    seed_services(pool).await?;
    seed_settings(pool).await?;
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    appointment_id: Option<&str>,
) {
    let _ = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, appointment_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(appointment_id)
    .execute(pool)
    .await;
}

const APPOINTMENT_SELECT: &str = r#"SELECT a.id, a.client_id, c.name AS client_name,
       a.professional_id, p.name AS professional_name,
       a.date, a.start_time, a.end_time, a.status,
       a.discount, a.extra_amount, a.total_amount,
       a.payment_method, a.notes, a.created_at
  FROM appointments a
  LEFT JOIN clients c ON a.client_id = c.id
  LEFT JOIN professionals p ON a.professional_id = p.id"#;

/// Full appointment collection, normalized, with service references attached.
pub async fn fetch_appointments(pool: &SqlitePool) -> Result<Vec<Appointment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        "{APPOINTMENT_SELECT} ORDER BY a.date, a.start_time"
    ))
    .fetch_all(pool)
    .await?;

    let links = sqlx::query_as::<_, (String, String)>(
        "SELECT appointment_id, service_id FROM appointment_services",
    )
    .fetch_all(pool)
    .await?;

    let mut services_by_appointment: HashMap<String, Vec<String>> = HashMap::new();
    for (appointment_id, service_id) in links {
        services_by_appointment
            .entry(appointment_id)
            .or_default()
            .push(service_id);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let service_ids = services_by_appointment.remove(&row.id).unwrap_or_default();
            normalize::normalize_appointment(row, service_ids)
        })
        .collect())
}

pub async fn fetch_appointment(
    pool: &SqlitePool,
    appointment_id: &str,
) -> Result<Option<Appointment>, sqlx::Error> {
    let row = sqlx::query_as::<_, AppointmentRow>(&format!(
        "{APPOINTMENT_SELECT} WHERE a.id = ? LIMIT 1"
    ))
    .bind(appointment_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let service_ids = sqlx::query_scalar::<_, String>(
        "SELECT service_id FROM appointment_services WHERE appointment_id = ?",
    )
    .bind(&row.id)
    .fetch_all(pool)
    .await?;

    Ok(Some(normalize::normalize_appointment(row, service_ids)))
}

/// Full client collection with purchased packages attached.
pub async fn fetch_clients(pool: &SqlitePool) -> Result<Vec<Client>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ClientRow>(
        "SELECT id, name, email, phone, stamps_earned, mimos_redeemed, created_at, updated_at
         FROM clients ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let package_rows = sqlx::query_as::<_, PurchasedPackageRow>(
        "SELECT id, client_id, name, total_sessions, used_sessions, purchase_date, expiry_date
         FROM purchased_packages ORDER BY purchase_date DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut packages_by_client: HashMap<String, Vec<PurchasedPackageRow>> = HashMap::new();
    for package in package_rows {
        packages_by_client
            .entry(package.client_id.clone())
            .or_default()
            .push(package);
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let packages = packages_by_client.remove(&row.id).unwrap_or_default();
            normalize::normalize_client(row, packages)
        })
        .collect())
}

pub async fn fetch_client(pool: &SqlitePool, client_id: &str) -> Result<Option<Client>, sqlx::Error> {
    let row = sqlx::query_as::<_, ClientRow>(
        "SELECT id, name, email, phone, stamps_earned, mimos_redeemed, created_at, updated_at
         FROM clients WHERE id = ? LIMIT 1",
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let packages = sqlx::query_as::<_, PurchasedPackageRow>(
        "SELECT id, client_id, name, total_sessions, used_sessions, purchase_date, expiry_date
         FROM purchased_packages WHERE client_id = ? ORDER BY purchase_date DESC",
    )
    .bind(&row.id)
    .fetch_all(pool)
    .await?;

    Ok(Some(normalize::normalize_client(row, packages)))
}

pub async fn fetch_client_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<Client>, sqlx::Error> {
    let row = sqlx::query_as::<_, ClientRow>(
        "SELECT id, name, email, phone, stamps_earned, mimos_redeemed, created_at, updated_at
         FROM clients WHERE email = ? LIMIT 1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let packages = sqlx::query_as::<_, PurchasedPackageRow>(
                "SELECT id, client_id, name, total_sessions, used_sessions, purchase_date, expiry_date
                 FROM purchased_packages WHERE client_id = ? ORDER BY purchase_date DESC",
            )
            .bind(&row.id)
            .fetch_all(pool)
            .await?;
            Ok(Some(normalize::normalize_client(row, packages)))
        }
        None => Ok(None),
    }
}

pub async fn fetch_services(pool: &SqlitePool) -> Result<Vec<SalonService>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ServiceRow>(
        "SELECT id, name, duration, price, category, description FROM services ORDER BY category, name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(normalize::normalize_service).collect())
}

pub async fn fetch_professionals(pool: &SqlitePool) -> Result<Vec<Professional>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProfessionalRow>(
        "SELECT id, name, specialty, commission_rate FROM professionals ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(normalize::normalize_professional)
        .collect())
}

pub async fn fetch_transactions(
    pool: &SqlitePool,
) -> Result<Vec<FinancialTransaction>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FinancialTransactionRow>(
        "SELECT id, description, amount, date, category, tx_type, payment_method
         FROM financial_transactions ORDER BY date DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(normalize::normalize_transaction)
        .collect())
}

pub async fn fetch_settings(pool: &SqlitePool) -> Result<Vec<SettingRow>, sqlx::Error> {
    sqlx::query_as::<_, SettingRow>("SELECT key, label, value FROM settings ORDER BY key")
        .fetch_all(pool)
        .await
}

pub async fn setting_value(pool: &SqlitePool, key: &str) -> String {
    sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing =
        sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
            .bind(ROLE_ADMIN)
            .fetch_optional(pool)
            .await?;

    if existing.is_some() {
        return Ok(());
    }

    let email = env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@salonflow.local".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let display_name =
        env::var("ADMIN_DISPLAY_NAME").unwrap_or_else(|_| "Salon Admin".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash = hash_password(&password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"INSERT INTO users (id, email, display_name, role, password_hash, active, created_at)
           VALUES (?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(email)
    .bind(display_name)
    .bind(ROLE_ADMIN)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_services(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let catalog = vec![
        ("Corte Feminino", "60 min", "120,00", "cabelo", "Corte, lavagem e finalização."),
        ("Escova Modelada", "40 min", "80,00", "cabelo", "Escova com finalização."),
        ("Coloração Completa", "120 min", "250,00", "cabelo", "Coloração com produtos profissionais."),
        ("Manicure", "45 min", "50,00", "unhas", "Cutilagem e esmaltação."),
        ("Design de Sobrancelhas", "30 min", "45,00", "estética", "Design com pinça e acabamento."),
    ];

    for (name, duration, price, category, description) in catalog {
        sqlx::query(
            r#"INSERT INTO services (id, name, duration, price, category, description)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(duration)
        .bind(price)
        .bind(category)
        .bind(description)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_settings(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let defaults = vec![
        ("salon_name", "Salon name", "SalonFlow Studio"),
        ("salon_tagline", "Tagline", "Beleza com hora marcada."),
        ("opening_hours", "Opening hours", "Ter–Sáb, 9h às 19h"),
        ("instagram_handle", "Instagram handle", "@salonflow.studio"),
    ];

    for (key, label, value) in defaults {
        let exists =
            sqlx::query_as::<_, (String,)>("SELECT key FROM settings WHERE key = ? LIMIT 1")
                .bind(key)
                .fetch_optional(pool)
                .await?;
        if exists.is_some() {
            continue;
        }
        sqlx::query("INSERT INTO settings (key, label, value) VALUES (?, ?, ?)")
            .bind(key)
            .bind(label)
            .bind(value)
            .execute(pool)
            .await?;
    }

    Ok(())
}
