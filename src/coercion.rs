//! Numeric coercion and text sanitization for raw form inputs
//!
//! Display inputs never fail: unparsable text reads as zero.
//! Inputs that gate a calculation go through `coerce_bounded` and are rejected instead.

use crate::error::AdvisorError;
use crate::Result;

/// Maximum length of a free-text field (asset names)
pub const MAX_TEXT_LEN: usize = 50;

const MARKUP_CHARS: &[char] = &['<', '>', '\'', '"', '&'];

/// Keep digits and the first decimal point; drop everything else.
pub fn sanitize_numeric(raw: &str) -> String {
    let mut seen_dot = false;
    raw.chars()
        .filter(|c| match c {
            '0'..='9' => true,
            '.' if !seen_dot => {
                seen_dot = true;
                true
            }
            _ => false,
        })
        .collect()
}

fn parse_sanitized(raw: &str) -> Option<f64> {
    let cleaned = sanitize_numeric(raw);
    if cleaned.is_empty() || cleaned == "." {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Lenient coercion for display and non-validated call sites.
pub fn coerce(raw: &str) -> f64 {
    parse_sanitized(raw).unwrap_or(0.0)
}

/// Strict coercion: the value must parse and fall inside `[min, max]`.
pub fn coerce_bounded(field: &str, raw: &str, min: f64, max: f64) -> Result<f64> {
    match parse_sanitized(raw) {
        Some(value) if value >= min && value <= max => Ok(value),
        _ => Err(AdvisorError::invalid_number(field, raw)),
    }
}

/// Bounds check for values that are already numbers.
pub fn check_bounds(field: &str, value: f64, min: f64, max: f64) -> Result<f64> {
    if value.is_finite() && value >= min && value <= max {
        Ok(value)
    } else {
        Err(AdvisorError::invalid_number(field, value.to_string()))
    }
}

/// Trim, strip markup-significant characters and cap the length.
pub fn sanitize_text(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !MARKUP_CHARS.contains(c))
        .take(MAX_TEXT_LEN)
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_numeric() {
        assert_eq!(sanitize_numeric("15.000,50 €"), "15.00050");
        assert_eq!(sanitize_numeric("1.2.3"), "1.23");
        assert_eq!(sanitize_numeric("abc"), "");
        assert_eq!(sanitize_numeric("-7.5%"), "7.5");
    }

    #[test]
    fn test_lenient_coercion_defaults_to_zero() {
        assert_eq!(coerce(""), 0.0);
        assert_eq!(coerce("n/a"), 0.0);
        assert_eq!(coerce("."), 0.0);
        assert_eq!(coerce("7.5"), 7.5);
        assert_eq!(coerce("1,500"), 1500.0);
    }

    #[test]
    fn test_bounded_coercion_rejects() {
        assert_eq!(coerce_bounded("termMonths", "60", 1.0, 600.0).unwrap(), 60.0);
        assert!(coerce_bounded("termMonths", "", 1.0, 600.0).is_err());
        assert!(coerce_bounded("termMonths", "601", 1.0, 600.0).is_err());
        assert!(coerce_bounded("principal", "0", 1.0, 10_000_000.0).is_err());

        match coerce_bounded("principal", "abc", 1.0, 10.0) {
            Err(AdvisorError::InvalidNumber { field, value }) => {
                assert_eq!(field, "principal");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_check_bounds() {
        assert!(check_bounds("returnRate", -20.0, -100.0, 100.0).is_ok());
        assert!(check_bounds("returnRate", 120.0, -100.0, 100.0).is_err());
        assert!(check_bounds("returnRate", f64::NAN, -100.0, 100.0).is_err());
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  <b>ETF \"World\"</b> & co "), "bETF World/b  co");
        let long = "x".repeat(80);
        assert_eq!(sanitize_text(&long).len(), MAX_TEXT_LEN);
        assert_eq!(sanitize_text("   "), "");
    }
}
