/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::web::Data;
use uuid::Uuid;

use super::dispatch;
use crate::common::{types::*, utils::now};
use crate::domain::types::internal::request::*;
use crate::environment::AppState;
use crate::tools::error::AppError;

async fn dispatch_response(
    data: &AppState,
    request_id: RequestId,
    outcome: DispatchOutcome,
) -> Result<DispatchResponse, AppError> {
    let request = data
        .request_store
        .get_request(&request_id)
        .await?
        .ok_or_else(|| AppError::RequestNotFound(request_id.to_string()))?;

    Ok(DispatchResponse {
        request_id,
        status: request.status,
        outcome,
    })
}

pub async fn create_request(
    data: Data<AppState>,
    request_body: CreateRequestBody,
) -> Result<DispatchResponse, AppError> {
    let request_id = request_body
        .request_id
        .unwrap_or_else(|| RequestId(Uuid::new_v4().to_string()));

    if request_id.0.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "requestId must not be empty".to_string(),
        ));
    }

    let request = ServiceRequest::new(
        request_id.to_owned(),
        request_body.origin,
        request_body.details,
        now(),
    );

    let outcome = dispatch::create_request(&data, request).await?;

    dispatch_response(&data, request_id, outcome).await
}

pub async fn get_request(
    request_id: RequestId,
    data: Data<AppState>,
) -> Result<RequestResponse, AppError> {
    let request = data
        .request_store
        .get_request(&request_id)
        .await?
        .ok_or_else(|| AppError::RequestNotFound(request_id.to_string()))?;

    Ok(RequestResponse { request })
}

pub async fn dispatch_request(
    request_id: RequestId,
    data: Data<AppState>,
) -> Result<DispatchResponse, AppError> {
    let outcome = dispatch::on_request_dispatchable(&data, &request_id).await?;

    dispatch_response(&data, request_id, outcome).await
}

pub async fn accept_request(
    request_id: RequestId,
    data: Data<AppState>,
    request_body: ProviderActionRequest,
) -> Result<RequestResponse, AppError> {
    let request =
        dispatch::on_provider_accepted(&data, &request_id, &request_body.provider_id).await?;

    Ok(RequestResponse { request })
}

pub async fn decline_request(
    request_id: RequestId,
    data: Data<AppState>,
    request_body: ProviderActionRequest,
) -> Result<DispatchResponse, AppError> {
    let outcome =
        dispatch::on_provider_declined(&data, &request_id, &request_body.provider_id).await?;

    dispatch_response(&data, request_id, outcome).await
}

pub async fn cancel_request(
    request_id: RequestId,
    data: Data<AppState>,
) -> Result<RequestResponse, AppError> {
    let request = dispatch::on_request_cancelled(&data, &request_id).await?;

    Ok(RequestResponse { request })
}

pub async fn sweep(data: Data<AppState>) -> Result<SweepSummary, AppError> {
    dispatch::on_sweep_tick(&data).await
}
