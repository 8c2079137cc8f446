//! Shared field-extraction helpers for portal payloads.
//!
//! The portal reports every value as a string, but the JSON rendition
//! sometimes emits bare numbers instead. Both are accepted. Blank strings
//! mean "absent", never zero.

use serde_json::Value;

/// Returns the trimmed, non-empty text of `field`, accepting JSON strings
/// and numbers.
#[must_use]
pub fn get_text(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Tries each field name in order and returns the first non-empty value.
#[must_use]
pub fn first_text(record: &Value, names: &[String]) -> Option<String> {
    names.iter().find_map(|name| get_text(record, name))
}

/// Removes thousands separators and surrounding whitespace.
fn strip_separators(s: &str) -> String {
    s.trim().chars().filter(|c| *c != ',').collect()
}

/// Parses a whole number such as `"12,345"` or `"-1"`.
///
/// Returns `None` for blank or unparseable input. A decimal rendition of a
/// whole number (`"3.0"`) is accepted.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn parse_integer(s: &str) -> Option<i64> {
    let cleaned = strip_separators(s);
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = cleaned.parse::<i64>() {
        return Some(v);
    }
    let f = cleaned.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parses a decimal number such as `"84.97"` or `"1,024.5"`.
#[must_use]
pub fn parse_decimal(s: &str) -> Option<f64> {
    let cleaned = strip_separators(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(parse_integer("12,345"), Some(12_345));
        assert_eq!(parse_integer(" 1,234,567 "), Some(1_234_567));
    }

    #[test]
    fn blank_is_absent_not_zero() {
        assert_eq!(parse_integer(""), None);
        assert_eq!(parse_integer("   "), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn parses_negative_floor() {
        assert_eq!(parse_integer("-1"), Some(-1));
    }

    #[test]
    fn accepts_whole_decimal_as_integer() {
        assert_eq!(parse_integer("3.0"), Some(3));
        assert_eq!(parse_integer("3.5"), None);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn parses_area() {
        let v = parse_decimal("84.97").unwrap();
        assert!((v - 84.97).abs() < f64::EPSILON);
    }

    #[test]
    fn get_text_trims_and_accepts_numbers() {
        let record = serde_json::json!({
            "aptNm": "  한라아파트 ",
            "dealYear": 2024,
            "jibun": " ",
            "nested": {"a": 1}
        });
        assert_eq!(get_text(&record, "aptNm").as_deref(), Some("한라아파트"));
        assert_eq!(get_text(&record, "dealYear").as_deref(), Some("2024"));
        assert_eq!(get_text(&record, "jibun"), None);
        assert_eq!(get_text(&record, "nested"), None);
        assert_eq!(get_text(&record, "missing"), None);
    }

    #[test]
    fn first_text_falls_back_through_aliases() {
        let record = serde_json::json!({"umdNm": "", "법정동": "연동"});
        let names = vec!["umdNm".to_string(), "법정동".to_string()];
        assert_eq!(first_text(&record, &names).as_deref(), Some("연동"));
    }
}
