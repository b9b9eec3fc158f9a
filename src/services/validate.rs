//! Input field checks

use crate::services::ServiceError;

/// Trimmed, non-empty text of at most `max` characters
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(ServiceError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

/// Like [`required_text`], but blank input means "no value"
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, ServiceError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => required_text(field, value, max).map(Some),
    }
}

pub fn email(field: &str, value: &str) -> Result<String, ServiceError> {
    let value = required_text(field, value, 255)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(value),
        _ => Err(ServiceError::Validation(format!("{} must be a valid email address", field))),
    }
}

/// `http://` or `https://` URL
pub fn optional_url(field: &str, value: Option<&str>) -> Result<Option<String>, ServiceError> {
    let value = optional_text(field, value, 500)?;
    if let Some(url) = &value {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ServiceError::Validation(format!(
                "{} must start with http:// or https://",
                field
            )));
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text() {
        assert_eq!(required_text("name", "  Ada ", 10).unwrap(), "Ada");
        assert!(required_text("name", "   ", 10).is_err());
        assert!(required_text("name", "abcdefghijk", 10).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("phone", None, 5).unwrap(), None);
        assert_eq!(optional_text("phone", Some(" "), 5).unwrap(), None);
        assert_eq!(optional_text("phone", Some("123"), 5).unwrap(), Some("123".to_string()));
        assert!(optional_text("phone", Some("123456"), 5).is_err());
    }

    #[test]
    fn test_email_and_url() {
        assert!(email("email", "ada@example.org").is_ok());
        assert!(email("email", "ada.example.org").is_err());
        assert!(email("email", "@example.org").is_err());
        assert!(optional_url("website", Some("https://acme.example")).is_ok());
        assert!(optional_url("website", Some("javascript:alert(1)")).is_err());
    }
}
