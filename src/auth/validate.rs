//! Field validators shared by login, password reset and dietician registration.
//!
//! Every check runs before any database or network call so a malformed form
//! never costs a round trip.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{ApiError, ApiResult};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref PHONE_RE: Regex = Regex::new(r"^[+]?[0-9\s\-()]{10,13}$").unwrap();
}

pub const MIN_PASSWORD_LEN: usize = 6;
pub const OTP_LEN: usize = 6;

pub fn email(email: &str) -> ApiResult<()> {
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::validation("Please enter a valid email address"));
    }
    Ok(())
}

pub fn phone(phone: &str) -> ApiResult<()> {
    if phone.is_empty() {
        return Err(ApiError::validation("Phone number is required"));
    }
    let len = phone.chars().count();
    if !(10..=13).contains(&len) {
        return Err(ApiError::validation(
            "Phone number must be between 10-13 digits",
        ));
    }
    if !PHONE_RE.is_match(phone) {
        return Err(ApiError::validation("Please enter a valid phone number"));
    }
    Ok(())
}

pub fn otp(otp: &str) -> ApiResult<()> {
    if otp.is_empty() {
        return Err(ApiError::validation("OTP is required"));
    }
    if otp.chars().count() != OTP_LEN {
        return Err(ApiError::validation("OTP must be exactly 6 digits"));
    }
    if !otp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::validation("OTP must contain only numbers"));
    }
    Ok(())
}

pub fn password(password: &str) -> ApiResult<()> {
    if password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            "Password must be at least 6 characters long",
        ));
    }
    Ok(())
}

/// Accepts a 10 digit local number with or without the `+91` prefix and
/// returns it in the stored `+91XXXXXXXXXX` form. Spaces and dashes are ignored.
pub fn indian_mobile(phone: &str) -> ApiResult<String> {
    let compact: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let local = compact.strip_prefix("+91").unwrap_or(&compact);
    if local.len() != 10 || !local.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::validation("Phone number must be 10 digits"));
    }
    Ok(format!("+91{local}"))
}

/// Spellings under which a phone number may have been stored.
pub fn phone_variants(phone: &str) -> Vec<String> {
    let trimmed = phone.trim().to_string();
    let mut out = vec![trimmed.clone()];
    if let Ok(normalized) = indian_mobile(&trimmed) {
        let local = normalized.trim_start_matches("+91").to_string();
        for v in [normalized, local] {
            if !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(r: ApiResult<()>) -> String {
        r.unwrap_err().to_string()
    }

    #[test]
    fn otp_must_be_six_ascii_digits() {
        assert!(otp("123456").is_ok());
        assert_eq!(msg(otp("")), "OTP is required");
        assert_eq!(msg(otp("12345")), "OTP must be exactly 6 digits");
        assert_eq!(msg(otp("1234567")), "OTP must be exactly 6 digits");
        assert_eq!(msg(otp("12a456")), "OTP must contain only numbers");
        assert_eq!(msg(otp("١٢٣٤٥٦")), "OTP must contain only numbers");
    }

    #[test]
    fn password_needs_six_characters() {
        assert!(password("abcdef").is_ok());
        assert_eq!(msg(password("")), "Password is required");
        assert_eq!(
            msg(password("abcde")),
            "Password must be at least 6 characters long"
        );
    }

    #[test]
    fn phone_length_and_charset() {
        assert!(phone("9876543210").is_ok());
        assert!(phone("+919876543210").is_ok());
        assert!(phone("(987) 654-32").is_ok());
        assert_eq!(msg(phone("")), "Phone number is required");
        assert_eq!(
            msg(phone("98765")),
            "Phone number must be between 10-13 digits"
        );
        assert_eq!(msg(phone("98765abc210")), "Please enter a valid phone number");
    }

    #[test]
    fn email_shape() {
        assert!(email("staff@clinic.in").is_ok());
        assert_eq!(msg(email("")), "Email is required");
        assert_eq!(msg(email("staff@clinic")), "Please enter a valid email address");
        assert_eq!(msg(email("st aff@clinic.in")), "Please enter a valid email address");
    }

    #[test]
    fn indian_mobile_normalizes_prefix() {
        assert_eq!(indian_mobile("9876543210").unwrap(), "+919876543210");
        assert_eq!(indian_mobile("+919876543210").unwrap(), "+919876543210");
        assert!(indian_mobile("98765").is_err());
        assert!(indian_mobile("+91987654321x").is_err());
        assert_eq!(indian_mobile("+91 98765-43210").unwrap(), "+919876543210");
    }

    #[test]
    fn phone_variants_cover_both_forms() {
        let v = phone_variants("9876543210");
        assert!(v.contains(&"9876543210".to_string()));
        assert!(v.contains(&"+919876543210".to_string()));
        assert_eq!(v.len(), 2);

        assert_eq!(phone_variants("+1 555 0100"), vec!["+1 555 0100".to_string()]);
    }
}
