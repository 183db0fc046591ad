use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::accounts::AccountError;
use crate::catalog::CatalogError;
use crate::db::RepositoryError;
use crate::reviews::ReviewError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthenticated() -> Self {
        AppError::Unauthorized("Authentication required".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => json!({
                "success": false,
                "message": "Validation failed",
                "errors": errors,
            }),
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => json!({ "success": false, "message": msg }),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                json!({ "success": false, "message": "Internal server error" })
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                json!({ "success": false, "message": "Internal server error" })
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                json!({ "success": false, "message": "Internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

// -- Error conversion --

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            RepositoryError::Conflict(msg) => AppError::Conflict(msg),
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(errors) => AppError::Validation(errors),
            AccountError::InvalidCredentials => {
                AppError::Unauthorized(AccountError::InvalidCredentials.to_string())
            }
            AccountError::InvalidToken => AppError::BadRequest(err.to_string()),
            AccountError::NotFound(_) => AppError::NotFound(err.to_string()),
            AccountError::Conflict(msg) => AppError::Conflict(msg),
            AccountError::Forbidden(msg) => AppError::Forbidden(msg),
            AccountError::Hashing(msg) => AppError::Internal(msg),
            AccountError::Repository(e) => e.into(),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(errors) => AppError::Validation(errors),
            CatalogError::NotFound(_) => AppError::NotFound(err.to_string()),
            CatalogError::Conflict(msg) => AppError::Conflict(msg),
            CatalogError::Forbidden(msg) => AppError::Forbidden(msg),
            CatalogError::Repository(e) => e.into(),
        }
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::Validation(errors) => AppError::Validation(errors),
            ReviewError::NotFound(_) => AppError::NotFound(err.to_string()),
            ReviewError::Conflict(msg) => AppError::Conflict(msg),
            ReviewError::Forbidden(msg) => AppError::Forbidden(msg),
            ReviewError::Repository(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(
            response_status(AppError::NotFound("Review not found".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn unauthorized_returns_401() {
        assert_eq!(
            response_status(AppError::unauthenticated()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn validation_returns_400() {
        assert_eq!(
            response_status(AppError::Validation(vec!["Name is required".into()])),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn repository_conflicts_surface_as_409() {
        let err: AppError = AccountError::Repository(RepositoryError::Conflict(
            "An account with this email already exists".into(),
        ))
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: AppError = ReviewError::Repository(RepositoryError::NotFound("Hijab style".into())).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (AccountError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED),
            (AccountError::Forbidden("no".into()).into(), StatusCode::FORBIDDEN),
            (CatalogError::Conflict("slug".into()).into(), StatusCode::CONFLICT),
            (ReviewError::NotFound("Review".into()).into(), StatusCode::NOT_FOUND),
            (AccountError::Hashing("bcrypt".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }
}
