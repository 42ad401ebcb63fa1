/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{
    get, post,
    web::{Data, Json, Path},
};

use crate::{
    common::types::*,
    domain::{action::internal::*, types::internal::request::*},
    environment::AppState,
    tools::error::AppError,
};

#[post("/internal/request")]
async fn create_request(
    data: Data<AppState>,
    param_obj: Json<CreateRequestBody>,
) -> Result<Json<DispatchResponse>, AppError> {
    let request_body = param_obj.into_inner();

    Ok(Json(request::create_request(data, request_body).await?))
}

#[get("/internal/request/{requestId}")]
async fn get_request(
    data: Data<AppState>,
    path: Path<String>,
) -> Result<Json<RequestResponse>, AppError> {
    let request_id = RequestId(path.into_inner());

    Ok(Json(request::get_request(request_id, data).await?))
}

#[post("/internal/request/{requestId}/dispatch")]
async fn dispatch_request(
    data: Data<AppState>,
    path: Path<String>,
) -> Result<Json<DispatchResponse>, AppError> {
    let request_id = RequestId(path.into_inner());

    Ok(Json(request::dispatch_request(request_id, data).await?))
}

#[post("/internal/request/{requestId}/accept")]
async fn accept_request(
    data: Data<AppState>,
    param_obj: Json<ProviderActionRequest>,
    path: Path<String>,
) -> Result<Json<RequestResponse>, AppError> {
    let request_body = param_obj.into_inner();
    let request_id = RequestId(path.into_inner());

    Ok(Json(
        request::accept_request(request_id, data, request_body).await?,
    ))
}

#[post("/internal/request/{requestId}/decline")]
async fn decline_request(
    data: Data<AppState>,
    param_obj: Json<ProviderActionRequest>,
    path: Path<String>,
) -> Result<Json<DispatchResponse>, AppError> {
    let request_body = param_obj.into_inner();
    let request_id = RequestId(path.into_inner());

    Ok(Json(
        request::decline_request(request_id, data, request_body).await?,
    ))
}

#[post("/internal/request/{requestId}/cancel")]
async fn cancel_request(
    data: Data<AppState>,
    path: Path<String>,
) -> Result<Json<RequestResponse>, AppError> {
    let request_id = RequestId(path.into_inner());

    Ok(Json(request::cancel_request(request_id, data).await?))
}

#[post("/internal/sweep")]
async fn sweep(data: Data<AppState>) -> Result<Json<SweepSummary>, AppError> {
    Ok(Json(request::sweep(data).await?))
}
