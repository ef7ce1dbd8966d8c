use axum::{
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),
    #[error("Rendering metrics failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::UnknownDomain(_) => StatusCode::NOT_FOUND,
            AppError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Metrics(err) = &self {
            error!("Failed to render metrics: {err}");
        }
        (
            self.status(),
            axum::Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
