use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use serde::Serialize;
use thiserror::Error;
use vigil_service::CoreError;
use vigil_service::config::ConfigError;
use vigil_service::database::StoreError;

/// Startup failures of the server binary
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

/// Error returned by request handlers
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub CoreError);

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    error: &'a str,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let CoreError::Store(e) = &self.0 {
            tracing::error!("Request failed on the store: {}", e);
        }
        let message = self.to_string();
        HttpResponse::build(self.status_code()).json(ErrorBody { status: "error", error: &message })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Report undecodable bodies, paths and queries with the same JSON body as handler errors
pub fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| rejected(err)))
        .app_data(web::PathConfig::default().error_handler(|err, _| rejected(err)))
        .app_data(web::QueryConfig::default().error_handler(|err, _| rejected(err)));
}

fn rejected(err: impl std::fmt::Display) -> actix_web::Error {
    ApiError(CoreError::Validation(err.to_string())).into()
}
