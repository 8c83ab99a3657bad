use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use serde_json::json;
use storefront_engine::{cart::CartError, lifecycle::TransitionError, CheckoutApiError, GatewayError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("{message}")]
    InvalidTransition { message: String, current: &'static str },
    #[error("The request conflicts with the current state. {0}")]
    Conflict(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::InvalidTransition { current, .. } => json!({ "error": self.to_string(), "current": current }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

impl From<TransitionError> for ServerError {
    fn from(e: TransitionError) -> Self {
        Self::InvalidTransition { message: e.to_string(), current: e.current_state() }
    }
}

impl From<CartError> for ServerError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::LineNotFound(_) => Self::NoRecordFound(e.to_string()),
            e => Self::ValidationError(e.to_string()),
        }
    }
}

impl From<CheckoutApiError> for ServerError {
    fn from(e: CheckoutApiError) -> Self {
        match e {
            CheckoutApiError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            CheckoutApiError::InvalidCart(e) => e.into(),
            CheckoutApiError::EmptyCart
            | CheckoutApiError::InvalidShippingAddress(_)
            | CheckoutApiError::InvalidAmount(_) => Self::ValidationError(e.to_string()),
            CheckoutApiError::OrderNotFound(_) | CheckoutApiError::PaymentNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            CheckoutApiError::NotOrderOwner(_) => Self::InsufficientPermissions(e.to_string()),
            CheckoutApiError::PaymentAlreadyExists(_)
            | CheckoutApiError::OrderClosed { .. }
            | CheckoutApiError::PaymentStillOpen { .. } => Self::Conflict(e.to_string()),
            CheckoutApiError::InvalidTransition(e) => e.into(),
        }
    }
}

impl From<GatewayError> for ServerError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::DatabaseError(s) => Self::BackendError(format!("Database error: {s}")),
            GatewayError::OrderNotFound(_) | GatewayError::PaymentNotFound(_) => Self::NoRecordFound(e.to_string()),
            GatewayError::InvalidTransition(e) => e.into(),
        }
    }
}
