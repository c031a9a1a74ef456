use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use foodhub_order_engine::traits::{OrderApiError, OrderFlowError, PaymentGatewayError};
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
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment signature did not verify.")]
    InvalidSignature,
    #[error("Order flow error. {0}")]
    OrderFlow(#[from] OrderFlowError),
    #[error("Payment gateway error. {0}")]
    PaymentGatewayError(#[from] PaymentGatewayError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::OrderFlow(e) => order_flow_status_code(e),
            Self::PaymentGatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

/// Map engine errors onto the HTTP taxonomy: caller mistakes are 400, missing resources 404, and requests
/// that are well-formed but conflict with the order's current state are 409.
fn order_flow_status_code(e: &OrderFlowError) -> StatusCode {
    match e {
        OrderFlowError::FoodNotFound(_) => StatusCode::BAD_REQUEST,
        OrderFlowError::FoodUnavailable(_) => StatusCode::BAD_REQUEST,
        OrderFlowError::MissingDeliveryField(_) => StatusCode::BAD_REQUEST,
        OrderFlowError::InvalidPricing(_) => StatusCode::BAD_REQUEST,
        OrderFlowError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        OrderFlowError::InsufficientStock { .. } => StatusCode::CONFLICT,
        OrderFlowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        OrderFlowError::AlreadyTerminal(_) => StatusCode::CONFLICT,
        OrderFlowError::InvalidRefundState(_) => StatusCode::CONFLICT,
        OrderFlowError::PaymentConflict(_) => StatusCode::CONFLICT,
        OrderFlowError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        OrderFlowError::OrderApiError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<OrderApiError> for ServerError {
    fn from(e: OrderApiError) -> Self {
        match e {
            OrderApiError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id} not found")),
            OrderApiError::DatabaseError(e) => Self::BackendError(format!("Database error: {e}")),
        }
    }
}
