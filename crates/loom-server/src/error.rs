use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use loom_core::LoomError;

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

fn status_for(e: &LoomError) -> StatusCode {
    match e {
        LoomError::NotInitialized
        | LoomError::InvalidRequest(_)
        | LoomError::NoSeedPrompts => StatusCode::BAD_REQUEST,
        LoomError::RecordNotFound(_) => StatusCode::NOT_FOUND,
        LoomError::Transform { .. } | LoomError::Submission(_) => StatusCode::BAD_GATEWAY,
        LoomError::Persistence(_)
        | LoomError::Io(_)
        | LoomError::Yaml(_)
        | LoomError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self
            .0
            .downcast_ref::<LoomError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use loom_core::LoomError;

    #[test]
    fn record_not_found_maps_to_404() {
        let err = AppError(LoomError::RecordNotFound(uuid::Uuid::new_v4()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_request_maps_to_400() {
        let err = AppError(LoomError::InvalidRequest("variantCount must be at least 1".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn empty_seed_library_maps_to_400() {
        let err = AppError(LoomError::NoSeedPrompts.into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_initialized_maps_to_400() {
        let err = AppError(LoomError::NotInitialized.into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn transform_failure_maps_to_502() {
        let err = AppError(
            LoomError::Transform {
                stage: "breakdown",
                reason: "503".into(),
            }
            .into(),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn persistence_failure_maps_to_500() {
        let err = AppError(LoomError::Persistence("table missing".into()).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn io_error_maps_to_500() {
        let io_err = std::io::Error::other("disk full");
        let err = AppError(LoomError::Io(io_err).into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn non_loom_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_body_contains_error_field() {
        let err = AppError(LoomError::NoSeedPrompts.into());
        let response = err.into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(
            ct.to_str().unwrap().contains("application/json"),
            "expected JSON content type, got {:?}",
            ct
        );
    }
}
