use chrono::NaiveDate;

use crate::error::{AppError, Result};

/// Validates that a required text field is present and non-blank.
pub fn validate_required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Validates an email address.
///
/// # Arguments
///
/// * `email` - The email to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the email is valid.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || AppError::Validation("Invalid email format".to_string());

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());

    if !(local_ok && host_ok && tld_ok) {
        return Err(invalid());
    }
    Ok(())
}

/// Validates a mainland mobile number: 11 digits, `1` then `3`-`9`.
pub fn validate_phone(phone: &str) -> Result<()> {
    let bytes = phone.as_bytes();
    let valid = bytes.len() == 11
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1])
        && bytes.iter().all(|b| b.is_ascii_digit());

    if !valid {
        return Err(AppError::Validation("Invalid phone number format".to_string()));
    }
    Ok(())
}

/// Validates a password.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is valid.
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validates an 18-character national identity card number: 17 digits and
/// a final digit or `X`.
pub fn validate_id_number(id_number: &str) -> Result<()> {
    let bytes = id_number.as_bytes();
    let valid = bytes.len() == 18
        && bytes[..17].iter().all(|b| b.is_ascii_digit())
        && (bytes[17].is_ascii_digit() || bytes[17] == b'X' || bytes[17] == b'x');

    if !valid {
        return Err(AppError::Validation(
            "Invalid identity card number format".to_string(),
        ));
    }
    Ok(())
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{} must be a YYYY-MM-DD date", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        for ok in ["a@b.co", "li.wei+test@mail.example.com", "x_y%z@a-b.org"] {
            assert!(validate_email(ok).is_ok(), "{ok}");
        }
        for bad in ["", "a@b", "@b.com", "a@.com", "a@b.c", "a b@c.com", "a@b.c0m", "a@b@c.com"] {
            assert!(validate_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn phones() {
        assert!(validate_phone("13812345678").is_ok());
        for bad in ["12812345678", "1381234567", "138123456789", "1381234567a", ""] {
            assert!(validate_phone(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn passwords() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn id_numbers() {
        assert!(validate_id_number("11010119900307123X").is_ok());
        assert!(validate_id_number("110101199003071234").is_ok());
        for bad in [
            "11010119900307123",
            "1101011990030712345",
            "11010119900307X234",
            "11010119900307123Y",
        ] {
            assert!(validate_id_number(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn dates() {
        assert_eq!(
            parse_date("dateOfBirth", "1990-03-07").unwrap(),
            NaiveDate::from_ymd_opt(1990, 3, 7).unwrap()
        );
        assert_eq!(parse_date("dateOfBirth", "1990/03/07").unwrap_err().code(), 400);
    }
}
