/// Why an API key was rejected.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing x-api-key header")]
    Missing,
    #[error("Invalid API key")]
    Invalid,
}

/// Validates the provided API key against the key configured at startup.
///
/// Returns `Ok(())` if the key matches, or an error if it is invalid or missing.
pub fn validate_api_key(provided_key: Option<&str>, expected_key: &str) -> Result<(), AuthError> {
    let provided_key = provided_key.ok_or(AuthError::Missing)?;
    if provided_key == expected_key {
        Ok(())
    } else {
        Err(AuthError::Invalid)
    }
}
