/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{dev::Service, http::StatusCode, test, web, App, HttpResponse};
use dispatch_engine::{
    middleware::IncomingRequest,
    tools::logger::{setup_tracing, LogLevel, LoggerConfig},
};
use std::time::Duration;

#[actix_web::test]
async fn test_requests_past_the_deadline_time_out() {
    let app = test::init_service(
        App::new()
            .wrap(IncomingRequest::new(Duration::from_millis(20)))
            .route(
                "/slow",
                web::get().to(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    HttpResponse::Ok().finish()
                }),
            )
            .route(
                "/fast",
                web::get().to(|| async { HttpResponse::Ok().finish() }),
            ),
    )
    .await;

    let fast = app
        .call(test::TestRequest::get().uri("/fast").to_request())
        .await
        .expect("fast response");
    assert_eq!(fast.status(), StatusCode::OK);

    let slow = app
        .call(test::TestRequest::get().uri("/slow").to_request())
        .await;
    match slow {
        Ok(response) => panic!("expected a timeout, got {}", response.status()),
        Err(err) => assert_eq!(err.error_response().status(), StatusCode::REQUEST_TIMEOUT),
    }
}

#[::core::prelude::v1::test]
fn test_tracing_setup_twice_keeps_the_first_subscriber() {
    let logger_cfg = LoggerConfig {
        level: LogLevel::OFF,
        log_dir: None,
    };

    let first = setup_tracing(&logger_cfg);
    let second = setup_tracing(&logger_cfg);

    assert!(first.is_some());
    assert!(second.is_none());
}
