//! Field validation shared by drafts and forms.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Requires a non-blank value.
pub fn require(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "This field is required."));
    }
    Ok(())
}

/// Rejects values longer than `max` characters.
pub fn max_chars(field: &'static str, value: &str, max: usize) -> ValidationResult {
    let count = value.chars().count();
    if count > max {
        return Err(ValidationError::new(
            field,
            format!("Ensure this value has at most {max} characters (it has {count})."),
        ));
    }
    Ok(())
}

/// Accepts absolute `http`/`https` URLs with a host.
pub fn url(field: &'static str, value: &str) -> ValidationResult {
    if is_http_url(value) {
        return Ok(());
    }
    Err(ValidationError::new(field, "Enter a valid URL."))
}

/// Like [`url`] but accepts blank input.
pub fn optional_url(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Ok(());
    }
    url(field, value)
}

pub fn is_http_url(value: &str) -> bool {
    let trimmed = value.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            !host.is_empty() && !trimmed.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Truncates to at most `max` characters on a char boundary.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_requires_scheme_and_host() {
        assert!(is_http_url("https://example.com/a.png"));
        assert!(is_http_url("http://localhost:8000"));
        assert!(!is_http_url("example.com"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("https://exa mple.com"));
    }

    #[test]
    fn truncate_respects_multibyte_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn max_chars_counts_characters_not_bytes() {
        assert!(max_chars("title", "ééé", 3).is_ok());
        assert!(max_chars("title", "éééé", 3).is_err());
    }
}
