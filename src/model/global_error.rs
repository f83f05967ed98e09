use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use thiserror::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // 400 BAD REQUEST
    ValidationError,
    SelfRelation,

    // 404 NOT FOUND
    IssueNotFound,
    RelationshipNotFound,

    // 409 CONFLICT
    DuplicateRelationship,
    DuplicateActiveIssue,

    // 500 SERVER ERRORS
    DatabaseError,

    // 504 GATEWAY TIMEOUT
    DeadlineExceeded,
}

impl ErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "Request validation failed",
            ErrorCode::SelfRelation => "An issue cannot be related to itself",

            ErrorCode::IssueNotFound => "Issue not found",
            ErrorCode::RelationshipNotFound => "Relationship not found",

            ErrorCode::DuplicateRelationship => "Relationship already exists",
            ErrorCode::DuplicateActiveIssue => "An active issue already exists for this scope",

            ErrorCode::DatabaseError => "A database error occurred",

            ErrorCode::DeadlineExceeded => "The operation did not complete in time",
        }
    }

    pub fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            ErrorCode::ValidationError |
            ErrorCode::SelfRelation => StatusCode::BAD_REQUEST,

            ErrorCode::IssueNotFound |
            ErrorCode::RelationshipNotFound => StatusCode::NOT_FOUND,

            ErrorCode::DuplicateRelationship |
            ErrorCode::DuplicateActiveIssue => StatusCode::CONFLICT,

            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,

            ErrorCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{code}: {id}")]
    NotFound { code: ErrorCode, id: String },

    #[error("{code}: {detail}")]
    Conflict { code: ErrorCode, detail: String },

    #[error("{code}: {detail}")]
    Validation { code: ErrorCode, detail: String },

    #[error("{operation} failed (entity: {entity_id:?}): {source}")]
    Persistence {
        operation: &'static str,
        entity_id: Option<String>,
        #[source]
        source: DbErr,
    },

    #[error("{operation} exceeded its deadline")]
    DeadlineExceeded { operation: &'static str },
}

impl AppError {
    pub fn issue_not_found(id: impl Into<String>) -> Self {
        AppError::NotFound { code: ErrorCode::IssueNotFound, id: id.into() }
    }

    pub fn relationship_not_found(source_id: &str, target_id: &str) -> Self {
        AppError::NotFound {
            code: ErrorCode::RelationshipNotFound,
            id: format!("{source_id} <-> {target_id}"),
        }
    }

    pub fn conflict(code: ErrorCode, detail: impl Into<String>) -> Self {
        AppError::Conflict { code, detail: detail.into() }
    }

    pub fn validation(code: ErrorCode, detail: impl Into<String>) -> Self {
        AppError::Validation { code, detail: detail.into() }
    }

    pub fn persistence(operation: &'static str, entity_id: Option<&str>, source: DbErr) -> Self {
        AppError::Persistence {
            operation,
            entity_id: entity_id.map(str::to_string),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Validation { code, .. } => *code,
            AppError::Persistence { .. } => ErrorCode::DatabaseError,
            AppError::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }
}

/// Attaches operation context to raw store errors.
pub trait DbResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T, AppError>;
    fn during_for(self, operation: &'static str, entity_id: &str) -> Result<T, AppError>;
}

impl<T> DbResultExt<T> for Result<T, DbErr> {
    fn during(self, operation: &'static str) -> Result<T, AppError> {
        self.map_err(|e| AppError::persistence(operation, None, e))
    }

    fn during_for(self, operation: &'static str, entity_id: &str) -> Result<T, AppError> {
        self.map_err(|e| AppError::persistence(operation, Some(entity_id), e))
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.code().status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.code();
        let (detail, correlation_id) = match self {
            AppError::NotFound { id, .. } => (Some(id.clone()), None),
            AppError::Conflict { detail, .. } | AppError::Validation { detail, .. } => (Some(detail.clone()), None),
            AppError::Persistence { .. } | AppError::DeadlineExceeded { .. } => {
                let correlation_id = uuid::Uuid::new_v4().to_string();
                tracing::error!(correlation_id = %correlation_id, error = %self, "request failed");
                (None, Some(correlation_id))
            }
        };

        HttpResponse::build(code.status_code())
            .json(ErrorResponse {
                code: format!("{:?}", code),
                message: code.message().to_string(),
                detail,
                correlation_id,
            })
    }
}
