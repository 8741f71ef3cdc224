//! Aggregation engine. Every view here is computed over full in-memory record
//! sets; callers fetch complete collections first and filtering happens after
//! the fetch. Row-level data problems (unparseable currency, invalid dates)
//! are logged and skipped, never surfaced as errors.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{
    Appointment, Client, FinancialTransaction, SalonService, STATUS_COMPLETED, STATUS_CONFIRMED,
    TX_INCOME,
};
use crate::money;

/// Appointments whose `date` equals the target day, stored order preserved.
pub fn daily_agenda<'a>(appointments: &'a [Appointment], date: &str) -> Vec<&'a Appointment> {
    appointments.iter().filter(|a| a.date == date).collect()
}

#[derive(Debug, Clone)]
pub struct DashboardMetrics {
    pub appointments_today: usize,
    pub confirmed_today: usize,
    pub total_clients: usize,
    pub monthly_revenue: Decimal,
    pub loyalty_clients: usize,
}

/// Headline numbers for the admin dashboard. `today` is a `YYYY-MM-DD` day;
/// the revenue month is its `YYYY-MM` prefix. Unparseable transaction amounts
/// count as zero.
pub fn dashboard_metrics(
    appointments: &[Appointment],
    clients: &[Client],
    transactions: &[FinancialTransaction],
    today: &str,
) -> DashboardMetrics {
    let todays = daily_agenda(appointments, today);
    let confirmed_today = todays
        .iter()
        .filter(|a| a.status == STATUS_CONFIRMED)
        .count();

    let month = today.get(..7).unwrap_or(today);
    let monthly_revenue = transactions
        .iter()
        .filter(|t| t.tx_type == TX_INCOME && t.date.starts_with(month))
        .map(|t| money::parse_brl(&t.amount).unwrap_or(Decimal::ZERO))
        .sum();

    let loyalty_clients = clients
        .iter()
        .filter(|c| c.stamps_earned > 0 || !c.packages.is_empty())
        .count();

    DashboardMetrics {
        appointments_today: todays.len(),
        confirmed_today,
        total_clients: clients.len(),
        monthly_revenue,
        loyalty_clients,
    }
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub date: String,
    pub client_name: String,
    pub services: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct ProfessionalReport {
    pub rows: Vec<ReportRow>,
    pub total: Decimal,
}

/// Monthly performance for one professional: completed appointments inside
/// the month, newest first, with a running total. Selecting all professionals
/// (`None`) is an explicit no-op, not an error. Appointments with a missing
/// or unparseable total, or an invalid date, are skipped with a log entry and
/// never contribute to the total.
pub fn professional_report(
    appointments: &[Appointment],
    clients: &[Client],
    services: &[SalonService],
    professional_id: Option<&str>,
    year: i32,
    month: u32,
) -> Option<ProfessionalReport> {
    let professional_id = professional_id.filter(|id| !id.is_empty())?;
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = month_end(year, month)?;

    let client_names: HashMap<&str, &str> = clients
        .iter()
        .map(|c| (c.id.as_str(), c.name.as_str()))
        .collect();
    let service_names: HashMap<&str, &str> = services
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_str()))
        .collect();

    let mut rows = Vec::new();
    let mut total = Decimal::ZERO;

    for appointment in appointments {
        if appointment.status != STATUS_COMPLETED {
            continue;
        }
        if appointment.professional_id.as_deref() != Some(professional_id) {
            continue;
        }
        let date = match NaiveDate::parse_from_str(&appointment.date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                log::warn!(
                    "report: skipping appointment {} with invalid date {:?}",
                    appointment.id,
                    appointment.date
                );
                continue;
            }
        };
        if date < start || date > end {
            continue;
        }
        let amount = match appointment.total_amount.as_deref().and_then(money::parse_brl) {
            Some(amount) => amount,
            None => {
                log::warn!(
                    "report: skipping appointment {} with missing or unparseable total {:?}",
                    appointment.id,
                    appointment.total_amount
                );
                continue;
            }
        };

        let joined_services = appointment
            .service_ids
            .iter()
            .filter_map(|id| service_names.get(id.as_str()).copied())
            .collect::<Vec<_>>()
            .join(", ");
        let client_name = client_names
            .get(appointment.client_id.as_str())
            .copied()
            .unwrap_or("Unknown client")
            .to_string();

        total += amount;
        rows.push(ReportRow {
            date: appointment.date.clone(),
            client_name,
            services: joined_services,
            amount,
        });
    }

    rows.sort_by(|a, b| b.date.cmp(&a.date));

    Some(ProfessionalReport { rows, total })
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        NaiveDate::from_ymd_opt(year, 12, 31)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?.pred_opt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(
        id: &str,
        date: &str,
        status: &str,
        professional_id: Option<&str>,
        total_amount: Option<&str>,
    ) -> Appointment {
        Appointment {
            id: id.to_string(),
            client_id: "c1".to_string(),
            client_name: "Ana".to_string(),
            professional_id: professional_id.map(str::to_string),
            professional_name: None,
            service_ids: vec!["s1".to_string()],
            date: date.to_string(),
            start_time: "09:00".to_string(),
            end_time: "10:00".to_string(),
            status: status.to_string(),
            discount: None,
            extra_amount: None,
            total_amount: total_amount.map(str::to_string),
            payment_method: None,
            notes: None,
            created_at: "2024-04-01T12:00:00+00:00".to_string(),
        }
    }

    fn client(id: &str, name: &str, stamps: i64, packages: usize) -> Client {
        Client {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{id}@example.com"),
            phone: "11 98888-0000".to_string(),
            stamps_earned: stamps,
            mimos_redeemed: 0,
            packages: (0..packages)
                .map(|n| crate::models::PurchasedPackage {
                    id: format!("{id}-p{n}"),
                    name: "Pacote".to_string(),
                    total_sessions: 5,
                    used_sessions: 0,
                    purchase_date: "2024-01-01".to_string(),
                    expiry_date: None,
                })
                .collect(),
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            updated_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn transaction(tx_type: &str, date: &str, amount: &str) -> FinancialTransaction {
        FinancialTransaction {
            id: format!("{tx_type}-{date}"),
            description: "lançamento".to_string(),
            amount: amount.to_string(),
            date: date.to_string(),
            category: "geral".to_string(),
            tx_type: tx_type.to_string(),
            payment_method: None,
        }
    }

    fn service(id: &str, name: &str) -> SalonService {
        SalonService {
            id: id.to_string(),
            name: name.to_string(),
            duration: "45 min".to_string(),
            price: "100,00".to_string(),
            category: "cabelo".to_string(),
            description: None,
        }
    }

    #[test]
    fn daily_agenda_filters_by_exact_day_preserving_order() {
        let appointments = vec![
            appointment("a1", "2024-05-01", "Agendado", None, None),
            appointment("a2", "2024-05-02", "Agendado", None, None),
            appointment("a3", "2024-05-01", "Confirmado", None, None),
        ];
        let agenda = daily_agenda(&appointments, "2024-05-01");
        let ids: Vec<&str> = agenda.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a3"]);
    }

    #[test]
    fn dashboard_counts_today_and_confirmed_subset() {
        let appointments = vec![
            appointment("a1", "2024-05-06", "Agendado", None, None),
            appointment("a2", "2024-05-06", "Confirmado", None, None),
            appointment("a3", "2024-05-07", "Confirmado", None, None),
        ];
        let metrics = dashboard_metrics(&appointments, &[], &[], "2024-05-06");
        assert_eq!(metrics.appointments_today, 2);
        assert_eq!(metrics.confirmed_today, 1);
    }

    #[test]
    fn monthly_revenue_excludes_expenses() {
        // Income 100,00 and expense 50,00 in the same month.
        let transactions = vec![
            transaction("income", "2024-05-03", "100,00"),
            transaction("expense", "2024-05-04", "50,00"),
        ];
        let metrics = dashboard_metrics(&[], &[], &transactions, "2024-05-06");
        assert_eq!(money::format_brl(metrics.monthly_revenue), "R$ 100,00");
    }

    #[test]
    fn monthly_revenue_is_order_invariant_and_lenient() {
        let forward = vec![
            transaction("income", "2024-05-03", "100,00"),
            transaction("income", "2024-05-10", "not-a-number"),
            transaction("income", "2024-05-20", "49,90"),
            transaction("income", "2024-04-30", "999,00"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = dashboard_metrics(&[], &[], &forward, "2024-05-06").monthly_revenue;
        let b = dashboard_metrics(&[], &[], &reversed, "2024-05-06").monthly_revenue;
        assert_eq!(a, b);
        assert_eq!(money::format_amount(a), "149,90");
    }

    #[test]
    fn loyalty_clients_are_a_subset_of_all_clients() {
        let clients = vec![
            client("c1", "Ana", 3, 0),
            client("c2", "Bia", 0, 1),
            client("c3", "Carla", 0, 0),
        ];
        let metrics = dashboard_metrics(&[], &clients, &[], "2024-05-06");
        assert_eq!(metrics.loyalty_clients, 2);
        assert!(metrics.loyalty_clients <= metrics.total_clients);
    }

    #[test]
    fn report_sums_completed_appointments_newest_first() {
        // 150,00 plus "R$ 90,00" in May 2024 totals 240,00, newest row first.
        let appointments = vec![
            appointment("a1", "2024-05-01", "Concluído", Some("p1"), Some("150,00")),
            appointment("a2", "2024-05-15", "Concluído", Some("p1"), Some("R$ 90,00")),
        ];
        let clients = vec![client("c1", "Ana", 0, 0)];
        let services = vec![service("s1", "Corte")];

        let report =
            professional_report(&appointments, &clients, &services, Some("p1"), 2024, 5).unwrap();
        assert_eq!(money::format_amount(report.total), "240,00");
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].date, "2024-05-15");
        assert_eq!(report.rows[1].date, "2024-05-01");
        assert_eq!(report.rows[0].client_name, "Ana");
        assert_eq!(report.rows[0].services, "Corte");
    }

    #[test]
    fn report_skips_unparseable_rows_and_total_matches_detail_sum() {
        let appointments = vec![
            appointment("a1", "2024-05-01", "Concluído", Some("p1"), Some("150,00")),
            appointment("a2", "2024-05-02", "Concluído", Some("p1"), Some("R$ ???")),
            appointment("a3", "2024-05-03", "Concluído", Some("p1"), None),
            appointment("a4", "not-a-date", "Concluído", Some("p1"), Some("10,00")),
            appointment("a5", "2024-05-04", "Agendado", Some("p1"), Some("10,00")),
            appointment("a6", "2024-05-05", "Concluído", Some("p2"), Some("10,00")),
            appointment("a7", "2024-06-01", "Concluído", Some("p1"), Some("10,00")),
        ];
        let report =
            professional_report(&appointments, &[], &[], Some("p1"), 2024, 5).unwrap();
        assert_eq!(report.rows.len(), 1);
        let detail_sum: Decimal = report.rows.iter().map(|r| r.amount).sum();
        assert_eq!(detail_sum, report.total);
        assert_eq!(money::format_amount(report.total), "150,00");
    }

    #[test]
    fn report_includes_month_boundaries() {
        let appointments = vec![
            appointment("a1", "2024-05-01", "Concluído", Some("p1"), Some("10,00")),
            appointment("a2", "2024-05-31", "Concluído", Some("p1"), Some("20,00")),
        ];
        let report =
            professional_report(&appointments, &[], &[], Some("p1"), 2024, 5).unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(money::format_amount(report.total), "30,00");
    }

    #[test]
    fn all_professionals_selection_is_a_no_op() {
        let appointments = vec![appointment(
            "a1",
            "2024-05-01",
            "Concluído",
            Some("p1"),
            Some("10,00"),
        )];
        assert!(professional_report(&appointments, &[], &[], None, 2024, 5).is_none());
        assert!(professional_report(&appointments, &[], &[], Some(""), 2024, 5).is_none());
    }

    #[test]
    fn december_report_covers_the_full_month() {
        let appointments = vec![appointment(
            "a1",
            "2024-12-31",
            "Concluído",
            Some("p1"),
            Some("55,00"),
        )];
        let report =
            professional_report(&appointments, &[], &[], Some("p1"), 2024, 12).unwrap();
        assert_eq!(report.rows.len(), 1);
    }
}
