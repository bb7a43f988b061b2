use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shopper_core::error::ShopperError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 504 Gateway Timeout errors
// ---------------------------------------------------------------------------

/// Carries an explicit 504 through the `anyhow::Error` chain when a tool call
/// outlives its deadline.
#[derive(Debug)]
struct TimeoutError(String);

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TimeoutError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self(TimeoutError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<TimeoutError>().is_some() {
            StatusCode::GATEWAY_TIMEOUT
        } else if let Some(e) = self.0.downcast_ref::<ShopperError>() {
            match e {
                ShopperError::UnknownAgent(_) => StatusCode::NOT_FOUND,
                ShopperError::InvalidPayload(_)
                | ShopperError::InvalidInput(_)
                | ShopperError::InvalidReply(_) => StatusCode::BAD_REQUEST,
                ShopperError::Normalization { .. } => StatusCode::BAD_GATEWAY,
                ShopperError::MissingConfig(_)
                | ShopperError::InvalidConfig { .. }
                | ShopperError::Io(_)
                | ShopperError::Yaml(_)
                | ShopperError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            // Agent runtime failures land here too; they are not retried.
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
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
