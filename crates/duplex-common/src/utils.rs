//! Utility functions for Duplex
//!
//! Small helpers shared by request handlers.

use rand::Rng;

const DIGITS: &[u8] = b"1234567890";

/// Prefix a phone number with a dial code.
///
/// Leading zeros of a local number are dropped. Numbers already carrying the
/// dial code, and numbers given without one, are returned unchanged.
///
/// # Examples
///
/// ```
/// use duplex_common::format_phone_number_with_dial_code;
///
/// assert_eq!(format_phone_number_with_dial_code("0241234567", "+233"), "+233241234567");
/// assert_eq!(format_phone_number_with_dial_code("+233241234567", "+233"), "+233241234567");
/// assert_eq!(format_phone_number_with_dial_code("0241234567", ""), "0241234567");
/// ```
pub fn format_phone_number_with_dial_code(phone_number: &str, dial_code: &str) -> String {
    if phone_number.is_empty() {
        return String::new();
    }
    if dial_code.is_empty() || phone_number.starts_with(dial_code) {
        return phone_number.to_string();
    }
    format!("{}{}", dial_code, phone_number.trim_start_matches('0'))
}

/// Generate a random string of decimal digits.
pub fn generate_digits(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| DIGITS[rng.random_range(0..DIGITS.len())] as char)
        .collect()
}

/// Generate a six digit one-time password.
pub fn generate_six_digit_otp() -> String {
    generate_digits(6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone_number_empty() {
        assert_eq!(format_phone_number_with_dial_code("", "+233"), "");
    }

    #[test]
    fn test_format_phone_number_strips_leading_zeros() {
        assert_eq!(
            format_phone_number_with_dial_code("00554635701", "+233"),
            "+233554635701"
        );
    }

    #[test]
    fn test_generate_digits() {
        let code = generate_digits(12);
        assert_eq!(code.len(), 12);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert!(generate_digits(0).is_empty());
    }

    #[test]
    fn test_generate_six_digit_otp() {
        let otp = generate_six_digit_otp();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }
}
