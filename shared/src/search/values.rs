//! Value coercion helpers.
//!
//! Dates, relative dates, durations and numbers are parsed here, and wildcard
//! patterns are translated into anchored regular expressions or `LIKE`
//! patterns.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use super::ast::SearchValue;
use super::error::{Result, SearchError};

/// Parses an ISO 8601 date or datetime. Values without an offset are UTC.
///
/// # Errors
///
/// Returns an error if the text is not a valid date.
pub fn parse_datetime(text: &str) -> Result<DateTime<Utc>> {
    let invalid = || SearchError::invalid(format!("{text} is not a valid ISO8601 date query"));

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = text.strip_suffix('Z').unwrap_or(text);
    if naive.contains('T') {
        return NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|dt| dt.and_utc())
            .map_err(|_| invalid());
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(invalid)
}

/// Returns the `[start, end)` window matched by a bare date or datetime.
///
/// A bare date covers the whole day. A datetime covers five minutes before
/// to six minutes after, since stored timestamps are truncated.
///
/// # Errors
///
/// Returns an error if the text is not a valid date.
pub fn datetime_window(text: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let value = parse_datetime(text)?;
    if text.contains('T') {
        Ok((value - Duration::minutes(5), value + Duration::minutes(6)))
    } else {
        Ok((value, value + Duration::days(1)))
    }
}

/// Which side of a range a relative date bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeBound {
    /// `-N<unit>`: at or after the computed instant.
    From(DateTime<Utc>),
    /// `+N<unit>`: at or before the computed instant.
    To(DateTime<Utc>),
}

/// Parses a relative date such as `+7d` or `-2w` against `now`.
///
/// # Errors
///
/// Returns an error if the sign, count or unit is invalid.
pub fn parse_relative_date(text: &str, now: DateTime<Utc>) -> Result<RelativeBound> {
    let invalid = || SearchError::invalid(format!("{text} is not a valid datetime query"));

    let mut chars = text.chars();
    let sign = chars.next().ok_or_else(invalid)?;
    let unit = chars.next_back().ok_or_else(invalid)?;
    let count: i64 = chars.as_str().parse().map_err(|_| invalid())?;

    let delta = match unit {
        'w' => Duration::try_weeks(count),
        'd' => Duration::try_days(count),
        'h' => Duration::try_hours(count),
        'm' => Duration::try_minutes(count),
        _ => None,
    }
    .ok_or_else(invalid)?;

    let instant = now.checked_sub_signed(delta).ok_or_else(invalid)?;
    match sign {
        '-' => Ok(RelativeBound::From(instant)),
        '+' => Ok(RelativeBound::To(instant)),
        _ => Err(invalid()),
    }
}

/// Converts a duration literal into milliseconds.
///
/// # Errors
///
/// Returns an error if the number does not parse or the unit is unknown.
pub fn parse_duration(number: &str, unit: &str) -> Result<f64> {
    let invalid = || SearchError::invalid(format!("{number}{unit} is not a valid duration value"));
    let value: f64 = number
        .parse()
        .ok()
        .filter(|value: &f64| value.is_finite())
        .ok_or_else(invalid)?;

    let multiplier = match unit {
        "ms" => 1.0,
        "s" => 1_000.0,
        "min" | "m" => 60_000.0,
        "hr" | "h" => 3_600_000.0,
        "day" | "d" => 86_400_000.0,
        "wk" | "w" => 604_800_000.0,
        _ => return Err(invalid()),
    };
    let millis = value * multiplier;
    if millis.is_finite() {
        Ok(millis)
    } else {
        Err(invalid())
    }
}

/// Parses an integer, falling back to a float.
///
/// # Errors
///
/// Returns an error if the text is neither, or overflows to infinity.
pub fn parse_numeric(text: &str) -> Result<SearchValue> {
    if let Ok(value) = text.parse::<i64>() {
        return Ok(SearchValue::Integer(value));
    }
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(SearchValue::Float)
        .ok_or_else(|| SearchError::invalid(format!("{text} is not a valid number")))
}

/// Formats a number the way it appears in aliases and expressions:
/// integral values without a fractional part.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ============================================================================
// Wildcards
// ============================================================================

/// Single quotes are left alone: they are escaped once, when the pattern is
/// rendered as a quoted argument.
fn escape_char(c: char, out: &mut String) {
    if !(c.is_ascii_alphanumeric() || c == '_' || c == '\'' || !c.is_ascii()) {
        out.push('\\');
    }
    out.push(c);
}

/// Translates a wildcard pattern into an anchored regular expression.
///
/// `*` matches anything, `\x` matches `x` literally and every other
/// character is escaped. A trailing lone backslash matches a backslash.
#[must_use]
pub fn translate_wildcard(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => escape_char(escaped, &mut out),
                None => escape_char('\\', &mut out),
            },
            '*' => out.push_str(".*"),
            other => escape_char(other, &mut out),
        }
    }
    out.push('$');
    out
}

/// Translates a wildcard pattern into a `LIKE` pattern.
#[must_use]
pub fn translate_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => push_like_char(escaped, &mut out),
                None => out.push('\\'),
            },
            '*' => out.push('%'),
            other => push_like_char(other, &mut out),
        }
    }
    out
}

fn push_like_char(c: char, out: &mut String) {
    if c == '%' || c == '_' {
        out.push('\\');
    }
    out.push(c);
}
