use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use redis::RedisError;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use validator::ValidationErrors;

use crate::models::pagination::PaginationMeta;

#[derive(Debug, PartialEq)]
pub enum AppErrorType {
    NotFoundError,
    DbError,
    AuthError,
    PayloadValidationError,
    BadRequestError,
    CacheError,
    InternalServerError,
    ForbiddenError,
}

/// Machine-readable error code carried in every error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    ValidationError,
    Unauthorized,
    Forbidden,
    InternalError,
    DatabaseError,
    CacheError,
    ClinicContextRequired,
    ClinicNotFound,
    StaffNotFound,
    DoctorNotFound,
    PatientNotFound,
    AppointmentNotFound,
    TreatmentHistoryNotFound,
    PrescriptionNotFound,
    MedicineNotFound,
    BatchNotFound,
    BillNotFound,
    ReceiptNotFound,
    QueueEntryNotFound,
    NotificationNotFound,
    PackageNotFound,
    SubscriptionNotFound,
    NoActiveSubscription,
    ActiveSubscriptionExists,
    UsageLimitExceeded,
    InvalidUpgrade,
    EmailAlreadyExists,
    TimeSlotConflict,
    InvalidTimeRange,
    InvalidStatusTransition,
    InsufficientStock,
    PrescriptionNotPending,
    InvalidDiscount,
    InvalidAmount,
    Overpayment,
    BillNotPayable,
    BillHasPayments,
    QueueEmpty,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::InternalError => "INTERNAL_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CacheError => "CACHE_ERROR",
            Self::ClinicContextRequired => "CLINIC_CONTEXT_REQUIRED",
            Self::ClinicNotFound => "CLINIC_NOT_FOUND",
            Self::StaffNotFound => "STAFF_NOT_FOUND",
            Self::DoctorNotFound => "DOCTOR_NOT_FOUND",
            Self::PatientNotFound => "PATIENT_NOT_FOUND",
            Self::AppointmentNotFound => "APPOINTMENT_NOT_FOUND",
            Self::TreatmentHistoryNotFound => "TREATMENT_HISTORY_NOT_FOUND",
            Self::PrescriptionNotFound => "PRESCRIPTION_NOT_FOUND",
            Self::MedicineNotFound => "MEDICINE_NOT_FOUND",
            Self::BatchNotFound => "BATCH_NOT_FOUND",
            Self::BillNotFound => "BILL_NOT_FOUND",
            Self::ReceiptNotFound => "RECEIPT_NOT_FOUND",
            Self::QueueEntryNotFound => "QUEUE_ENTRY_NOT_FOUND",
            Self::NotificationNotFound => "NOTIFICATION_NOT_FOUND",
            Self::PackageNotFound => "PACKAGE_NOT_FOUND",
            Self::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            Self::NoActiveSubscription => "NO_ACTIVE_SUBSCRIPTION",
            Self::ActiveSubscriptionExists => "ACTIVE_SUBSCRIPTION_EXISTS",
            Self::UsageLimitExceeded => "USAGE_LIMIT_EXCEEDED",
            Self::InvalidUpgrade => "INVALID_UPGRADE",
            Self::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            Self::TimeSlotConflict => "TIME_SLOT_CONFLICT",
            Self::InvalidTimeRange => "INVALID_TIME_RANGE",
            Self::InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
            Self::InsufficientStock => "INSUFFICIENT_STOCK",
            Self::PrescriptionNotPending => "PRESCRIPTION_NOT_PENDING",
            Self::InvalidDiscount => "INVALID_DISCOUNT",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::Overpayment => "OVERPAYMENT",
            Self::BillNotPayable => "BILL_NOT_PAYABLE",
            Self::BillHasPayments => "BILL_HAS_PAYMENTS",
            Self::QueueEmpty => "QUEUE_EMPTY",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub code: ErrorCode,
    pub message: Option<String>,
    pub cause: Option<String>,
}

#[derive(Serialize)]
pub struct AppErrorResponse {
    pub success: bool,
    pub code: ErrorCode,
    pub message: String,
}

impl AppError {
    pub fn message(&self) -> String {
        match self {
            AppError {
                message: Some(message),
                ..
            } => message.clone(),

            AppError {
                message: None,
                error_type: AppErrorType::NotFoundError,
                ..
            } => "The requested item was not found".to_string(),
            _ => "An unexpected error has occurred".to_string(),
        }
    }

    pub fn bad_request(code: ErrorCode, message: impl ToString) -> AppError {
        AppError {
            cause: None,
            code,
            error_type: AppErrorType::BadRequestError,
            message: Some(message.to_string()),
        }
    }

    pub fn not_found(code: ErrorCode, message: impl ToString) -> AppError {
        AppError {
            cause: None,
            code,
            error_type: AppErrorType::NotFoundError,
            message: Some(message.to_string()),
        }
    }

    pub fn db_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            code: ErrorCode::DatabaseError,
            error_type: AppErrorType::DbError,
            message: None,
        }
    }

    pub fn forbidden_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            code: ErrorCode::Forbidden,
            error_type: AppErrorType::ForbiddenError,
            message: Some(error.to_string()),
        }
    }

    pub fn unauthorized(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            code: ErrorCode::Unauthorized,
            error_type: AppErrorType::AuthError,
            message: Some(error.to_string()),
        }
    }

    pub fn internal_error(error: impl ToString) -> AppError {
        AppError {
            cause: Some(error.to_string()),
            code: ErrorCode::InternalError,
            error_type: AppErrorType::InternalServerError,
            message: None,
        }
    }

    pub fn validation_error(error: impl ToString) -> AppError {
        AppError {
            cause: None,
            code: ErrorCode::ValidationError,
            error_type: AppErrorType::PayloadValidationError,
            message: Some(error.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::internal_error(error)
    }
}

/// `true` when `error` is a unique violation (SQLSTATE 23505) raised by `constraint`.
pub fn is_unique_violation(error: &sqlx::Error, constraint: &str) -> bool {
    match error {
        sqlx::Error::Database(db_error) => {
            db_error.is_unique_violation() && db_error.constraint() == Some(constraint)
        }
        _ => false,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => AppError {
                cause: Some(error.to_string()),
                code: ErrorCode::NotFound,
                error_type: AppErrorType::NotFoundError,
                message: None,
            },
            other => AppError::db_error(other),
        }
    }
}

impl From<RedisError> for AppError {
    fn from(error: RedisError) -> Self {
        AppError {
            cause: Some(error.to_string()),
            code: ErrorCode::CacheError,
            message: Some("Internal Caching Error".to_string()),
            error_type: AppErrorType::CacheError,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::validation_error(errors)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.error_type {
            AppErrorType::AuthError => StatusCode::UNAUTHORIZED,
            AppErrorType::DbError
            | AppErrorType::CacheError
            | AppErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            AppErrorType::NotFoundError => StatusCode::NOT_FOUND,
            AppErrorType::PayloadValidationError | AppErrorType::BadRequestError => {
                StatusCode::BAD_REQUEST
            }
            AppErrorType::ForbiddenError => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(
                error.cause = ?self.cause,
                error.code = self.code.as_str(),
                "request failed"
            );
        }
        HttpResponse::build(self.status_code()).json(AppErrorResponse {
            success: false,
            code: self.code,
            message: self.message(),
        })
    }
}

#[derive(Serialize)]
pub struct AppSuccessResponse<T> {
    pub success: bool,
    pub code: Option<ErrorCode>,
    pub data: T,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl<T: Serialize> AppSuccessResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: None,
            data,
            message: message.into(),
            pagination: None,
        }
    }

    pub fn paginated(data: T, message: impl Into<String>, pagination: PaginationMeta) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::new(data, message)
        }
    }
}
