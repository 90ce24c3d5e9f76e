//! Input checks shared by the workflows.

use std::sync::LazyLock;

use regex::Regex;

use campus_core::{Error, Result};

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("static regex is valid"));
static NATIONAL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("static regex is valid"));
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("static regex is valid"));

pub fn phone(value: &str) -> Result<()> {
    if PHONE_RE.is_match(value) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "phone must be 10-15 digits with an optional leading '+', got '{value}'"
        )))
    }
}

pub fn national_id(value: &str) -> Result<()> {
    if NATIONAL_ID_RE.is_match(value) {
        Ok(())
    } else {
        Err(Error::Validation("national id must be exactly 10 digits".into()))
    }
}

pub fn slug(value: &str) -> Result<()> {
    if SLUG_RE.is_match(value) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "slug must be lowercase words joined by '-', got '{value}'"
        )))
    }
}

pub fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers() {
        assert!(phone("09121234567").is_ok());
        assert!(phone("+989121234567").is_ok());
        assert!(phone("0912").is_err());
        assert!(phone("0912-123-4567").is_err());
        assert!(phone("++989121234567").is_err());
    }

    #[test]
    fn national_ids() {
        assert!(national_id("0012345678").is_ok());
        assert!(national_id("001234567").is_err());
        assert!(national_id("00123456789").is_err());
        assert!(national_id("00123x5678").is_err());
    }

    #[test]
    fn slugs() {
        assert!(slug("hello").is_ok());
        assert!(slug("rust-2024-notes").is_ok());
        assert!(slug("Hello").is_err());
        assert!(slug("a--b").is_err());
        assert!(slug("-a").is_err());
        assert!(slug("").is_err());
    }

    #[test]
    fn blank_is_rejected() {
        assert!(non_empty("subject", "  ").is_err());
        assert!(non_empty("subject", "help").is_ok());
    }
}
