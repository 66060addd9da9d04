//! Request and response bodies at the order flow's boundary.

use serde::{Deserialize, Serialize};

use super::error::{ErrorKind, OrderError};
use crate::model::OrderLine;

/// Body of a checkout request. The user comes from the authenticated identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&OrderError> for ApiError {
    fn from(e: &OrderError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Envelope shared by every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> From<Result<T, OrderError>> for ApiResponse<T> {
    fn from(result: Result<T, OrderError>) -> Self {
        match result {
            Ok(data) => Self { success: true, data: Some(data), error: None },
            Err(e) => Self { success: false, data: None, error: Some(ApiError::from(&e)) },
        }
    }
}
