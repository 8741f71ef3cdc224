//! Template filters used by the askama pages.

use rust_decimal::Decimal;

use crate::money;

/// `R$ 1234,56` display form for fixed-point amounts.
pub fn brl(value: &Decimal) -> ::askama::Result<String> {
    Ok(money::format_brl(*value))
}

/// `YYYY-MM-DD` → `DD/MM/YYYY`. Anything that is not a calendar day is shown
/// unchanged.
pub fn day(value: &str) -> ::askama::Result<String> {
    let parts: Vec<&str> = value.split('-').collect();
    if let [year, month, day] = parts.as_slice() {
        if year.len() == 4 && month.len() == 2 && day.len() == 2 {
            return Ok(format!("{day}/{month}/{year}"));
        }
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brl_formats_with_comma() {
        assert_eq!(brl(&Decimal::new(123456, 2)).unwrap(), "R$ 1234,56");
    }

    #[test]
    fn day_reorders_calendar_dates_only() {
        assert_eq!(day("2024-05-15").unwrap(), "15/05/2024");
        assert_eq!(day("amanhã").unwrap(), "amanhã");
    }
}
