//! Input validation for link creation

use url::Url;

use super::errors::ValidationError;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_ALIAS_LENGTH: usize = 32;

/// Accept absolute http(s) URLs with a host. Returns the input trimmed.
pub fn validate_original_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidUrl("empty".into()));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(ValidationError::InvalidUrl(format!(
            "longer than {MAX_URL_LENGTH} bytes"
        )));
    }

    let parsed = Url::parse(trimmed).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidUrl(
            "must start with http:// or https://".into(),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidUrl("missing host".into()));
    }

    Ok(trimmed.to_string())
}

/// Normalize an optional alias: blank means "generate one for me".
pub fn normalize_alias(alias: Option<&str>) -> Option<&str> {
    alias.map(str::trim).filter(|a| !a.is_empty())
}

/// Aliases become URL path segments: 1-32 chars of `[A-Za-z0-9_-]`.
pub fn validate_alias(alias: &str) -> Result<(), ValidationError> {
    if alias.len() > MAX_ALIAS_LENGTH {
        return Err(ValidationError::InvalidAlias(format!(
            "must be at most {MAX_ALIAS_LENGTH} characters"
        )));
    }
    if let Some(bad) = alias
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(ValidationError::InvalidAlias(format!(
            "character '{bad}' is not allowed"
        )));
    }
    if alias.is_empty() {
        return Err(ValidationError::InvalidAlias("empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation_basic() {
        assert!(validate_original_url("https://example.com").is_ok());
        assert!(validate_original_url("http://example.com/a/b?c=d").is_ok());
        assert_eq!(
            validate_original_url("  https://example.com/x  ").unwrap(),
            "https://example.com/x"
        );
        assert!(validate_original_url("").is_err());
        assert!(validate_original_url("ftp://example.com").is_err());
        assert!(validate_original_url("example.com").is_err());
        assert!(validate_original_url("https://").is_err());
    }

    #[test]
    fn test_url_too_long() {
        let url = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(matches!(
            validate_original_url(&url),
            Err(ValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_alias_validation() {
        assert!(validate_alias("abc").is_ok());
        assert!(validate_alias("my-link_2").is_ok());
        assert!(validate_alias("").is_err());
        assert!(validate_alias("bad/char").is_err());
        assert!(validate_alias("space here").is_err());
        assert!(validate_alias(&"a".repeat(MAX_ALIAS_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_blank_alias_is_absent() {
        assert_eq!(normalize_alias(None), None);
        assert_eq!(normalize_alias(Some("   ")), None);
        assert_eq!(normalize_alias(Some(" abc ")), Some("abc"));
    }
}
