/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::time::Duration;

use crate::incoming_api;
use crate::tools::{error::AppError, prometheus::INCOMING_API};
use actix_http::StatusCode;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use tokio::time::{timeout, Instant};
use tracing::{info, warn, Span};
use tracing_actix_web::{DefaultRootSpanBuilder, RootSpanBuilder};
use uuid::Uuid;

/// Enforces the request deadline and records latency and outcome per route.
pub struct IncomingRequest {
    deadline: Duration,
}

impl IncomingRequest {
    pub fn new(deadline: Duration) -> Self {
        IncomingRequest { deadline }
    }
}

impl<S> Transform<S, ServiceRequest> for IncomingRequest
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = IncomingRequestMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IncomingRequestMiddleware {
            service,
            deadline: self.deadline,
        }))
    }
}

pub struct IncomingRequestMiddleware<S> {
    service: S,
    deadline: Duration,
}

impl<S> Service<ServiceRequest> for IncomingRequestMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
    S::Future: 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        let method = req.method().to_string();
        // Route pattern rather than the raw path keeps request ids out of metric labels.
        let route = req
            .match_pattern()
            .unwrap_or_else(|| req.path().to_string());
        let deadline = self.deadline;

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = match timeout(deadline, fut).await {
                Ok(result) => result,
                Err(_) => Err(Error::from(AppError::RequestTimeout)),
            };

            match &result {
                Ok(response) => record(
                    &method,
                    &route,
                    response.status(),
                    response.response().error(),
                    started,
                ),
                Err(err) => record(
                    &method,
                    &route,
                    err.error_response().status(),
                    Some(err),
                    started,
                ),
            }

            result
        })
    }
}

fn record(method: &str, route: &str, status: StatusCode, error: Option<&Error>, started: Instant) {
    let status = status.as_str();
    let latency_ms = started.elapsed().as_millis() as u64;
    match error {
        Some(err) => {
            let code = err.to_string();
            warn!(tag = "[Incoming Request Failed]", method, route, status, code = %code, latency_ms);
            incoming_api!(method, route, status, code.as_str(), started);
        }
        None => {
            info!(tag = "[Incoming Request]", method, route, status, latency_ms);
            incoming_api!(method, route, status, "SUCCESS", started);
        }
    }
}

/// Root span per request, keyed by the caller's `x-request-id` or a fresh uuid.
pub struct DomainRootSpanBuilder;

impl RootSpanBuilder for DomainRootSpanBuilder {
    fn on_request_start(request: &ServiceRequest) -> Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|request_id| request_id.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        tracing_actix_web::root_span!(request, request_id)
    }

    fn on_request_end<B: MessageBody>(span: Span, outcome: &Result<ServiceResponse<B>, Error>) {
        DefaultRootSpanBuilder::on_request_end(span, outcome);
    }
}
