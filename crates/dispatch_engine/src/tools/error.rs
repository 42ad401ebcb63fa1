/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse, ResponseError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    error_message: String,
    pub error_code: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("InternalError: {0}")]
    InternalError(String),
    #[error("InvalidRequest: {0}")]
    InvalidRequest(String),
    #[error("UnprocessibleRequest: {0}")]
    UnprocessibleRequest(String),
    #[error("RequestNotFound: {0}")]
    RequestNotFound(String),
    #[error("RequestAlreadyExists: {0}")]
    RequestAlreadyExists(String),
    #[error("InvalidRequestStatus: {0} - {1}")]
    InvalidRequestStatus(String, String),
    #[error("TransactionConflict: {0}")]
    TransactionConflict(String),
    #[error("StoreUnavailable: {0}")]
    StoreUnavailable(String),
    #[error("SerializationError: {0}")]
    SerializationError(String),
    #[error("DeserializationError: {0}")]
    DeserializationError(String),
    #[error("ExternalAPICallError: {0}")]
    ExternalAPICallError(String),
    #[error("PushDeliveryFailed: {0}")]
    PushDeliveryFailed(String),
    #[error("RequestTimeout")]
    RequestTimeout,
}

impl AppError {
    fn error_message(&self) -> ErrorBody {
        ErrorBody {
            error_message: self.message(),
            error_code: self.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::InternalError(err) => err.to_string(),
            AppError::InvalidRequest(err) => err.to_string(),
            AppError::UnprocessibleRequest(err) => err.to_string(),
            AppError::RequestNotFound(request_id) => {
                format!("Request not found : RequestId - {request_id}")
            }
            AppError::RequestAlreadyExists(request_id) => {
                format!("Request already exists : RequestId - {request_id}")
            }
            AppError::InvalidRequestStatus(request_id, request_status) => {
                format!(
                    "Invalid Request Status : RequestId - {request_id}, Request Status - {request_status}"
                )
            }
            AppError::TransactionConflict(request_id) => {
                format!("Concurrent updates kept conflicting : RequestId - {request_id}")
            }
            AppError::StoreUnavailable(err) => format!("Store unavailable : {err}"),
            AppError::SerializationError(err) => err.to_string(),
            AppError::DeserializationError(err) => err.to_string(),
            AppError::ExternalAPICallError(err) => err.to_string(),
            AppError::PushDeliveryFailed(err) => format!("Push delivery failed : {err}"),
            AppError::RequestTimeout => "Request timed out".to_string(),
        }
    }

    pub fn code(&self) -> String {
        match self {
            AppError::InternalError(_) => "INTERNAL_ERROR",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::UnprocessibleRequest(_) => "UNPROCESSIBLE_REQUEST",
            AppError::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            AppError::RequestAlreadyExists(_) => "REQUEST_ALREADY_EXISTS",
            AppError::InvalidRequestStatus(_, _) => "INVALID_REQUEST_STATUS",
            AppError::TransactionConflict(_) => "TRANSACTION_CONFLICT",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::SerializationError(_) => "SERIALIZATION_ERROR",
            AppError::DeserializationError(_) => "DESERIALIZATION_ERROR",
            AppError::ExternalAPICallError(_) => "EXTERNAL_API_CALL_ERROR",
            AppError::PushDeliveryFailed(_) => "PUSH_DELIVERY_FAILED",
            AppError::RequestTimeout => "REQUEST_TIMEOUT",
        }
        .to_string()
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(self.error_message())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnprocessibleRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RequestNotFound(_) => StatusCode::NOT_FOUND,
            AppError::RequestAlreadyExists(_) => StatusCode::CONFLICT,
            AppError::InvalidRequestStatus(_, _) => StatusCode::BAD_REQUEST,
            AppError::TransactionConflict(_) => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DeserializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalAPICallError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::PushDeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl From<fred::error::RedisError> for AppError {
    fn from(error: fred::error::RedisError) -> Self {
        AppError::StoreUnavailable(error.to_string())
    }
}
