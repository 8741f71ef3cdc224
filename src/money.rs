//! Currency handling. Amounts are stored as decimal strings in the Brazilian
//! locale ("150,00", optionally prefixed with "R$"); everything internal works
//! on `rust_decimal::Decimal` and display strings are produced only at the
//! template boundary.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Parse a stored amount string into a fixed-point value.
///
/// Accepts an optional `R$` prefix and a comma decimal separator. Returns
/// `None` for anything that does not parse; callers decide whether that means
/// "treat as zero" (dashboard revenue) or "skip the row" (reports).
pub fn parse_brl(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("R$").unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized).ok().map(|value| value.round_dp(2))
}

/// Two fixed decimal places with a comma separator: `240,00`.
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2)).replace('.', ",")
}

/// Display form with the currency prefix: `R$ 240,00`.
pub fn format_brl(value: Decimal) -> String {
    format!("R$ {}", format_amount(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn parses_comma_separated_amounts() {
        assert_eq!(parse_brl("150,00"), Some(dec(15000)));
        assert_eq!(parse_brl("90,5"), Some(dec(9050)));
    }

    #[test]
    fn parses_currency_prefixed_amounts() {
        assert_eq!(parse_brl("R$ 90,00"), Some(dec(9000)));
        assert_eq!(parse_brl("R$120,00"), Some(dec(12000)));
    }

    #[test]
    fn parses_period_separated_amounts() {
        assert_eq!(parse_brl("75.50"), Some(dec(7550)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_brl(""), None);
        assert_eq!(parse_brl("R$"), None);
        assert_eq!(parse_brl("abc"), None);
        assert_eq!(parse_brl("12,34,56"), None);
    }

    #[test]
    fn formats_with_comma_and_two_places() {
        assert_eq!(format_amount(dec(24000)), "240,00");
        assert_eq!(format_amount(Decimal::new(100, 0)), "100,00");
        assert_eq!(format_brl(dec(10000)), "R$ 100,00");
    }

    #[test]
    fn round_trips_through_display_form() {
        let value = parse_brl("R$ 1234,56").unwrap();
        assert_eq!(parse_brl(&format_brl(value)), Some(value));
    }
}
