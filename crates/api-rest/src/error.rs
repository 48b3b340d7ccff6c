//! Mapping of core errors onto HTTP responses.

use axum::http::StatusCode;
use hsr_core::ResourceError;

/// Error half of every handler result.
pub type ApiError = (StatusCode, String);

/// Status code for a core error.
pub fn status_for(e: &ResourceError) -> StatusCode {
    match e {
        ResourceError::NotFound(_) | ResourceError::FileNotFound(_) => StatusCode::NOT_FOUND,
        ResourceError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ResourceError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        ResourceError::InvalidInput(_)
        | ResourceError::InvalidContent(_)
        | ResourceError::UnknownResourceType(_)
        | ResourceError::UserNotFound(_)
        | ResourceError::GroupNotFound(_)
        | ResourceError::Text(_)
        | ResourceError::Uuid(_) => StatusCode::BAD_REQUEST,
        ResourceError::DuplicateFile(_)
        | ResourceError::DuplicateAccount(_)
        | ResourceError::AlreadyObsoleted(_) => StatusCode::CONFLICT,
        ResourceError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Logs `e` and turns it into a response. Server errors get a generic message.
pub fn api_error(context: &str, e: ResourceError) -> ApiError {
    let status = status_for(&e);
    if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
        tracing::error!("{} error: {:?}", context, e);
        (status, "Internal error".to_string())
    } else {
        tracing::warn!("{} rejected: {}", context, e);
        (status, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_domain_errors() {
        assert_eq!(
            status_for(&ResourceError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ResourceError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&ResourceError::AlreadyObsoleted("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ResourceError::NotImplemented("related resources")),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn hides_internal_details() {
        let err = ResourceError::FileRead(std::io::Error::other("disk on fire"));
        let (status, body) = api_error("Test", err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal error");
    }
}
