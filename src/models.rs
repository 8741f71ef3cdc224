use serde::Serialize;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CLIENT: &str = "client";

pub const STATUS_SCHEDULED: &str = "Agendado";
pub const STATUS_CONFIRMED: &str = "Confirmado";
pub const STATUS_COMPLETED: &str = "Concluído";
pub const STATUS_CANCELLED: &str = "Cancelado";

pub const APPOINTMENT_STATUSES: [&str; 4] = [
    STATUS_SCHEDULED,
    STATUS_CONFIRMED,
    STATUS_COMPLETED,
    STATUS_CANCELLED,
];

pub const TX_INCOME: &str = "income";
pub const TX_EXPENSE: &str = "expense";

pub const SENDER_ADMIN: &str = "admin";
pub const SENDER_CLIENT: &str = "client";

pub const NOTIFY_APPOINTMENT: &str = "appointment";
pub const NOTIFY_LOYALTY: &str = "loyalty";
pub const NOTIFY_GENERAL: &str = "general";

/// Stamps a client must collect before one mimo can be redeemed.
pub const STAMPS_PER_MIMO: i64 = 10;

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub password_hash: String,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub stamps_earned: i64,
    pub mimos_redeemed: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchasedPackageRow {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub total_sessions: i64,
    pub used_sessions: i64,
    pub purchase_date: String,
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub duration: String,
    pub price: String,
    pub category: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfessionalRow {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub commission_rate: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub client_id: String,
    pub client_name: Option<String>,
    pub professional_id: Option<String>,
    pub professional_name: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub discount: Option<String>,
    pub extra_amount: Option<String>,
    pub total_amount: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FinancialTransactionRow {
    pub id: String,
    pub description: String,
    pub amount: String,
    pub date: String,
    pub category: String,
    pub tx_type: String,
    pub payment_method: Option<String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientNotificationRow {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub link: Option<String>,
    pub read: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationRow {
    pub client_id: String,
    pub client_name: String,
    pub last_message: String,
    pub last_message_at: String,
    pub unread_by_admin: i64,
    pub unread_by_client: i64,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: String,
    pub client_id: String,
    pub sender_type: String,
    pub sender_name: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettingRow {
    pub key: String,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}

// Canonical records produced by the normalizer. Read paths work on these,
// never on raw rows.

#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub stamps_earned: i64,
    pub mimos_redeemed: i64,
    pub packages: Vec<PurchasedPackage>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchasedPackage {
    pub id: String,
    pub name: String,
    pub total_sessions: i64,
    pub used_sessions: i64,
    pub purchase_date: String,
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub professional_id: Option<String>,
    pub professional_name: Option<String>,
    pub service_ids: Vec<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub discount: Option<String>,
    pub extra_amount: Option<String>,
    pub total_amount: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalonService {
    pub id: String,
    pub name: String,
    pub duration: String,
    pub price: String,
    pub category: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Professional {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub commission_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialTransaction {
    pub id: String,
    pub description: String,
    pub amount: String,
    pub date: String,
    pub category: String,
    pub tx_type: String,
    pub payment_method: Option<String>,
}
