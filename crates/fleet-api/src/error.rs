use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fleet_core::models::wire::ApiErrorBody;
use fleet_core::IngestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest { message: String, details: String },
    #[error("Schema not ready: {0}")]
    Unavailable(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::BadRequest {
            details: message.clone(),
            message,
        }
    }

    fn details(&self) -> String {
        match self {
            Self::BadRequest { details, .. } => details.clone(),
            Self::Unavailable(message) | Self::Internal(message) => message.clone(),
        }
    }
}

/// Every ingest failure is a 400: the batch was rejected and nothing was saved.
impl From<IngestError> for AppError {
    fn from(error: IngestError) -> Self {
        let details = match &error {
            IngestError::Persistence { source, .. } => source.to_string(),
            IngestError::MissingField { .. } | IngestError::OdometerRegression { .. } => {
                "Batch rejected; no trips were saved".to_string()
            }
        };
        Self::BadRequest {
            message: error.to_string(),
            details,
        }
    }
}

impl From<fleet_core::Error> for AppError {
    fn from(error: fleet_core::Error) -> Self {
        match error {
            fleet_core::Error::InvalidInput(message) => Self::bad_request(message),
            fleet_core::Error::SchemaNotReady(table) => {
                Self::Unavailable(format!("table `{table}` does not exist"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest {
            message: "Invalid JSON body".to_string(),
            details: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            message: "Invalid query parameters".to_string(),
            details: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }
        let body = ApiErrorBody {
            success: false,
            details: self.details(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
