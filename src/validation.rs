//! Profile id (username) validation.

/// Longest username the origin accepts.
pub const MAX_USERNAME_LEN: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a username")]
    Empty,
    #[error("Username must be 30 characters or less")]
    TooLong,
    #[error("Username can only contain letters, numbers, underscores, and periods")]
    InvalidCharacters,
}

/// Check `username` against the origin's rules: 1–30 ASCII letters, digits,
/// underscores or periods.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::TooLong);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(())
}
