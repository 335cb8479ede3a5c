// Form and patch validation for user/bin input

use crate::utils::error::AppError;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_ADDRESS_LEN: usize = 200;
pub const MIN_PASSWORD_LEN: usize = 6;

pub fn validate_name(name: &str) -> Result<(), AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let invalid = || AppError::Validation(format!("Invalid email address: {}", email));

    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Empty is allowed; otherwise 7-15 digits, optional leading `+`,
/// spaces and dashes as separators.
pub fn validate_phone(phone: &str) -> Result<(), AppError> {
    let trimmed = phone.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' => {}
            _ => {
                return Err(AppError::Validation(format!("Invalid phone number: {}", phone)));
            }
        }
    }

    if !(7..=15).contains(&digits) {
        return Err(AppError::Validation(format!(
            "Phone number must have 7 to 15 digits: {}",
            phone
        )));
    }
    Ok(())
}

pub fn validate_address(address: &str) -> Result<(), AppError> {
    if address.chars().count() > MAX_ADDRESS_LEN {
        return Err(AppError::Validation(format!(
            "Address must be at most {} characters",
            MAX_ADDRESS_LEN
        )));
    }
    Ok(())
}

pub fn validate_level(level: i64) -> Result<u8, AppError> {
    u8::try_from(level)
        .ok()
        .filter(|l| *l <= 100)
        .ok_or_else(|| AppError::Validation(format!("Level must be between 0 and 100, got {}", level)))
}

pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), AppError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::Validation(format!("Latitude out of range: {}", lat)));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::Validation(format!("Longitude out of range: {}", lng)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_rules() {
        assert!(validate_name("Nimal Perera").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("ops@city.lk").is_ok());
        assert!(validate_email("ops.city.lk").is_err());
        assert!(validate_email("@city.lk").is_err());
        assert!(validate_email("ops@city").is_err());
        assert!(validate_email("ops@@city.lk").is_err());
        assert!(validate_email("o ps@city.lk").is_err());
    }

    #[test]
    fn test_phone_rules() {
        assert!(validate_phone("").is_ok());
        assert!(validate_phone("+94 77 123 4567").is_ok());
        assert!(validate_phone("011-2345678").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone("+94 77 123 4567 890 12").is_err());
    }

    #[test]
    fn test_level_bounds() {
        assert_eq!(validate_level(0), Ok(0));
        assert_eq!(validate_level(100), Ok(100));
        assert!(validate_level(101).is_err());
        assert!(validate_level(-1).is_err());
    }

    #[test]
    fn test_coordinates() {
        assert!(validate_coordinates(6.9271, 79.8612).is_ok());
        assert!(validate_coordinates(91.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("12345").is_err());
    }
}
