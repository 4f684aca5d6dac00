/// Formats seconds as `mm:ss`, truncating fractions.
///
/// Minutes are not wrapped into hours. Negative or non-finite input renders
/// as `00:00`.
///
/// # Example
/// ```
/// use engine::time::format_time;
///
/// assert_eq!(format_time(65.9), "01:05");
/// assert_eq!(format_time(f64::NAN), "00:00");
/// ```
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00".to_string();
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).floor() as u64;
    format!("{minutes:02}:{rest:02}")
}

/// Parses `mm:ss` into seconds.
///
/// Both fields are trimmed and may carry a fraction. Returns `None` unless
/// there are exactly two fields, both non-negative numbers, with seconds
/// below 60.
pub fn parse_time(text: &str) -> Option<f64> {
    let mut fields = text.split(':');
    let minutes = parse_field(fields.next()?)?;
    let seconds = parse_field(fields.next()?)?;
    if fields.next().is_some() || seconds >= 60.0 {
        return None;
    }
    Some(minutes * 60.0 + seconds)
}

fn parse_field(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::{format_time, parse_time};

    #[test]
    fn format_truncates_and_keeps_minutes_unbounded() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(59.999), "00:59");
        assert_eq!(format_time(225.12), "03:45");
        assert_eq!(format_time(6000.0), "100:00");
        assert_eq!(format_time(-1.0), "00:00");
        assert_eq!(format_time(f64::INFINITY), "00:00");
    }

    #[test]
    fn parse_accepts_padded_and_fractional_fields() {
        assert_eq!(parse_time("01:05"), Some(65.0));
        assert_eq!(parse_time(" 2 : 30.5 "), Some(150.5));
        assert_eq!(parse_time("120:00"), Some(7200.0));
    }

    #[test]
    fn parse_rejects_malformed_text() {
        for text in ["", "5", "1:2:3", "a:10", "01:xx", "00:60", "-1:00", "00:-5", "inf:00"] {
            assert_eq!(parse_time(text), None, "{text}");
        }
    }

    #[test]
    fn formatting_parsed_text_round_trips() {
        for text in ["00:00", "00:59", "03:45", "10:01", "123:59"] {
            let seconds = parse_time(text).expect("valid mm:ss");
            assert_eq!(format_time(seconds), text);
        }
    }
}
