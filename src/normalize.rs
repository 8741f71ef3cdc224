//! Record normalizer. Raw rows come out of storage with whatever timestamp
//! shapes past writers left behind; every read path converts them into
//! canonical records here before any aggregation or rendering happens.
//!
//! One explicit function per collection — no shape sniffing. Malformed
//! timestamp-like values pass through unchanged (lenient-parse policy).

use chrono::DateTime;

use crate::models::{
    Appointment, AppointmentRow, Client, ClientNotificationRow, ClientRow, ConversationRow,
    FinancialTransaction, FinancialTransactionRow, MessageRow, Professional, ProfessionalRow,
    PurchasedPackage, PurchasedPackageRow, SalonService, ServiceRow,
};

/// Truncate a calendar field to its `YYYY-MM-DD` portion. Values that carry a
/// time component (either `T`-separated or space-separated) lose it; anything
/// else is returned as-is.
pub fn date_only(raw: &str) -> String {
    raw.split(['T', ' ']).next().unwrap_or(raw).to_string()
}

/// Re-render a timestamp as canonical RFC 3339. Unparseable values are passed
/// through unchanged rather than raising.
pub fn canonical_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed.to_rfc3339(),
        Err(_) => raw.to_string(),
    }
}

pub fn normalize_package(row: PurchasedPackageRow) -> PurchasedPackage {
    PurchasedPackage {
        id: row.id,
        name: row.name,
        total_sessions: row.total_sessions,
        used_sessions: row.used_sessions,
        purchase_date: date_only(&row.purchase_date),
        expiry_date: row.expiry_date.as_deref().map(date_only),
    }
}

/// Clients are the only collection where a missing `mimos_redeemed` counter
/// is back-filled to zero; older records predate the column.
pub fn normalize_client(row: ClientRow, packages: Vec<PurchasedPackageRow>) -> Client {
    Client {
        created_at: canonical_timestamp(&row.created_at),
        updated_at: canonical_timestamp(&row.updated_at),
        id: row.id,
        name: row.name,
        email: row.email,
        phone: row.phone,
        stamps_earned: row.stamps_earned,
        mimos_redeemed: row.mimos_redeemed.unwrap_or(0),
        packages: packages.into_iter().map(normalize_package).collect(),
    }
}

pub fn normalize_appointment(row: AppointmentRow, service_ids: Vec<String>) -> Appointment {
    Appointment {
        date: date_only(&row.date),
        created_at: canonical_timestamp(&row.created_at),
        client_name: row.client_name.unwrap_or_else(|| "Unknown client".to_string()),
        id: row.id,
        client_id: row.client_id,
        professional_id: row.professional_id,
        professional_name: row.professional_name,
        service_ids,
        start_time: row.start_time,
        end_time: row.end_time,
        status: row.status,
        discount: row.discount,
        extra_amount: row.extra_amount,
        total_amount: row.total_amount,
        payment_method: row.payment_method,
        notes: row.notes,
    }
}

pub fn normalize_service(row: ServiceRow) -> SalonService {
    SalonService {
        id: row.id,
        name: row.name,
        duration: row.duration,
        price: row.price,
        category: row.category,
        description: row.description,
    }
}

pub fn normalize_professional(row: ProfessionalRow) -> Professional {
    Professional {
        id: row.id,
        name: row.name,
        specialty: row.specialty,
        commission_rate: row.commission_rate,
    }
}

pub fn normalize_transaction(row: FinancialTransactionRow) -> FinancialTransaction {
    FinancialTransaction {
        date: date_only(&row.date),
        id: row.id,
        description: row.description,
        amount: row.amount,
        category: row.category,
        tx_type: row.tx_type,
        payment_method: row.payment_method,
    }
}

pub fn normalize_notification(mut row: ClientNotificationRow) -> ClientNotificationRow {
    row.created_at = canonical_timestamp(&row.created_at);
    row
}

pub fn normalize_conversation(mut row: ConversationRow) -> ConversationRow {
    row.last_message_at = canonical_timestamp(&row.last_message_at);
    row
}

pub fn normalize_message(mut row: MessageRow) -> MessageRow {
    row.created_at = canonical_timestamp(&row.created_at);
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_only_strips_time_components() {
        assert_eq!(date_only("2024-05-01"), "2024-05-01");
        assert_eq!(date_only("2024-05-01T13:30:00Z"), "2024-05-01");
        assert_eq!(date_only("2024-05-01 13:30:00"), "2024-05-01");
    }

    #[test]
    fn canonical_timestamp_is_lenient() {
        assert_eq!(
            canonical_timestamp("2024-05-01T13:30:00+00:00"),
            "2024-05-01T13:30:00+00:00"
        );
        // Malformed values pass through unchanged.
        assert_eq!(canonical_timestamp("yesterday-ish"), "yesterday-ish");
        assert_eq!(canonical_timestamp(""), "");
    }

    #[test]
    fn client_backfills_missing_mimos() {
        let row = ClientRow {
            id: "c1".into(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: "11 99999-0000".into(),
            stamps_earned: 4,
            mimos_redeemed: None,
            created_at: "2024-01-02T10:00:00+00:00".into(),
            updated_at: "2024-01-02T10:00:00+00:00".into(),
        };
        let client = normalize_client(row, Vec::new());
        assert_eq!(client.mimos_redeemed, 0);
        assert_eq!(client.stamps_earned, 4);
    }

    #[test]
    fn package_dates_are_truncated() {
        let row = PurchasedPackageRow {
            id: "p1".into(),
            client_id: "c1".into(),
            name: "Hidratação 5x".into(),
            total_sessions: 5,
            used_sessions: 1,
            purchase_date: "2024-03-10T09:00:00Z".into(),
            expiry_date: Some("2024-09-10T09:00:00Z".into()),
        };
        let package = normalize_package(row);
        assert_eq!(package.purchase_date, "2024-03-10");
        assert_eq!(package.expiry_date.as_deref(), Some("2024-09-10"));
    }

    #[test]
    fn appointment_date_is_truncated() {
        let row = AppointmentRow {
            id: "a1".into(),
            client_id: "c1".into(),
            client_name: Some("Ana".into()),
            professional_id: None,
            professional_name: None,
            date: "2024-05-01T00:00:00Z".into(),
            start_time: "09:00".into(),
            end_time: "10:00".into(),
            status: "Agendado".into(),
            discount: None,
            extra_amount: None,
            total_amount: Some("150,00".into()),
            payment_method: None,
            notes: None,
            created_at: "2024-04-28T18:00:00+00:00".into(),
        };
        let appointment = normalize_appointment(row, vec!["s1".into()]);
        assert_eq!(appointment.date, "2024-05-01");
        assert_eq!(appointment.service_ids, vec!["s1".to_string()]);
    }
}
