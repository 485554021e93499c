use super::ApiError;

pub fn validate_openid(openid: &str) -> Result<&str, ApiError> {
    let trimmed = openid.trim();
    if trimmed.is_empty() {
        return Err(ApiError::field("openid", "This field is required."));
    }
    Ok(trimmed)
}

/// Accepts only same-site absolute paths as post-login redirect targets.
#[must_use]
pub fn safe_next(next: &str) -> Option<&str> {
    let next = next.trim();

    let is_local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.chars().any(char::is_control);

    is_local.then_some(next)
}
