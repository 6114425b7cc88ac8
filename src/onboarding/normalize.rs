//! Input normalization and field checks for the step forms.
//!
//! Normalizers run on every keystroke and never fail; checks run when the
//! user tries to leave a step and mirror the backend's validators.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static EIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}-\d{7}$").unwrap());
static ZIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());
static SWIFT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{8}([A-Z0-9]{3})?$").unwrap());
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .unwrap()
});

pub const ACH_ROUTING_LEN: usize = 9;
pub const WIRE_ROUTING_MAX: usize = 34;
pub const SWIFT_MAX: usize = 11;
pub const ACCOUNT_NUMBER_MAX: usize = 34;

/// Keep only ASCII digits, truncated to `max_len`.
pub fn normalize_digits(input: &str, max_len: usize) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(max_len)
        .collect()
}

/// Format an EIN as `NN-NNNNNNN` while it is being typed.
pub fn normalize_ein(input: &str) -> String {
    let digits = normalize_digits(input, 9);
    if digits.len() <= 2 {
        return digits;
    }
    format!("{}-{}", &digits[..2], &digits[2..])
}

pub fn normalize_ach_routing(input: &str) -> String {
    normalize_digits(input, ACH_ROUTING_LEN)
}

pub fn normalize_wire_routing(input: &str) -> String {
    normalize_digits(input, WIRE_ROUTING_MAX)
}

/// Uppercase alphanumerics only, at most 11 characters.
pub fn normalize_swift(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(SWIFT_MAX)
        .collect()
}

/// Alphanumerics only, spaces and dashes dropped.
pub fn normalize_account_number(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .take(ACCOUNT_NUMBER_MAX)
        .collect()
}

/// Strip scheme and path from a website, lowercased.
pub fn normalize_website(input: &str) -> String {
    let value = input.trim().to_lowercase();
    let value = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(&value);
    value.split('/').next().unwrap_or_default().to_string()
}

pub fn is_valid_ein(value: &str) -> bool {
    EIN_RE.is_match(value.trim())
}

pub fn is_valid_zip(value: &str) -> bool {
    ZIP_RE.is_match(value.trim())
}

pub fn is_valid_swift(value: &str) -> bool {
    SWIFT_RE.is_match(value.trim())
}

pub fn is_valid_ach_routing(value: &str) -> bool {
    let value = value.trim();
    value.len() == ACH_ROUTING_LEN && value.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_wire_routing(value: &str) -> bool {
    let value = value.trim();
    value.len() >= 6 && value.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_domain(value: &str) -> bool {
    value.len() <= 253 && DOMAIN_RE.is_match(value)
}

/// Parse a formation date, rejecting dates after `today`.
pub fn parse_formation_date(value: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| "Formation date must be a valid date (YYYY-MM-DD).".to_string())?;
    if date > today {
        return Err("Formation date cannot be in the future.".to_string());
    }
    Ok(date)
}
