/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use prometheus::{
    opts, register_histogram, register_histogram_vec, register_int_counter,
    register_int_counter_vec, Histogram, HistogramVec, IntCounter, IntCounterVec,
};

pub static INCOMING_API: once_cell::sync::Lazy<HistogramVec> = once_cell::sync::Lazy::new(|| {
    register_histogram_vec!(
        opts!("http_request_duration_seconds", "Incoming API requests").into(),
        &["method", "handler", "status_code", "code", "version"]
    )
    .expect("Failed to register incoming API metrics")
});

pub static CALL_EXTERNAL_API: once_cell::sync::Lazy<HistogramVec> =
    once_cell::sync::Lazy::new(|| {
        register_histogram_vec!(
            opts!("external_request_duration", "Call external API requests").into(),
            &["method", "host", "service", "status"]
        )
        .expect("Failed to register call external API metrics")
    });

pub static DISPATCH_OUTCOME: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            "dispatch_outcome_total",
            "Dispatch attempts by request kind and outcome",
            &["kind", "outcome"]
        )
        .expect("Failed to register dispatch outcome metrics")
    });

pub static PUSH_DELIVERY: once_cell::sync::Lazy<IntCounterVec> =
    once_cell::sync::Lazy::new(|| {
        register_int_counter_vec!(
            "push_delivery_total",
            "Push deliveries by request kind and outcome",
            &["kind", "outcome"]
        )
        .expect("Failed to register push delivery metrics")
    });

pub static SWEEP_DURATION: once_cell::sync::Lazy<Histogram> = once_cell::sync::Lazy::new(|| {
    register_histogram!("sweep_duration_seconds", "Staleness sweep duration")
        .expect("Failed to register sweep duration metrics")
});

pub static SWEPT_REQUESTS: once_cell::sync::Lazy<IntCounter> = once_cell::sync::Lazy::new(|| {
    register_int_counter!("swept_requests_total", "Stale requests advanced by the sweeper")
        .expect("Failed to register swept requests metrics")
});

/// Observes the duration of an incoming API request.
///
/// # Arguments
///
/// * `$method` - The HTTP method of the request (e.g., GET, POST).
/// * `$endpoint` - The endpoint or route of the request.
/// * `$status` - The HTTP status code of the response.
/// * `$code` - Error code of the response, or `SUCCESS`.
/// * `$start` - The `Instant` the request was received.
#[macro_export]
macro_rules! incoming_api {
    ($method:expr, $endpoint:expr, $status:expr, $code:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        let version = std::env::var("DEPLOYMENT_VERSION").unwrap_or("DEV".to_string());
        INCOMING_API
            .with_label_values(&[$method, $endpoint, $status, $code, version.as_str()])
            .observe(duration);
    };
}

/// Observes the duration of an outgoing API call.
///
/// # Arguments
///
/// * `$method` - The HTTP method of the external request.
/// * `$host` - The host of the external service.
/// * `$path` - The path of the external service.
/// * `$status` - The HTTP status code returned by the external service.
/// * `$start` - The `Instant` the external request was initiated.
#[macro_export]
macro_rules! call_external_api {
    ($method:expr, $host:expr, $path:expr, $status:expr, $start:expr) => {
        let duration = $start.elapsed().as_secs_f64();
        CALL_EXTERNAL_API
            .with_label_values(&[$method, $host, $path, $status])
            .observe(duration);
    };
}

#[macro_export]
macro_rules! dispatch_outcome {
    ($kind:expr, $outcome:expr) => {
        DISPATCH_OUTCOME
            .with_label_values(&[$kind, $outcome])
            .inc();
    };
}

#[macro_export]
macro_rules! push_delivery {
    ($kind:expr, $outcome:expr) => {
        PUSH_DELIVERY.with_label_values(&[$kind, $outcome]).inc();
    };
}

/// Builds the actix middleware that serves `/metrics` and registers the dispatch metrics
/// on its registry.
///
/// # Panics
///
/// * If the metrics middleware cannot be built or a metric fails to register.
pub fn prometheus_metrics() -> PrometheusMetrics {
    let prometheus = PrometheusMetricsBuilder::new("api")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus Metrics");

    prometheus
        .registry
        .register(Box::new(INCOMING_API.to_owned()))
        .expect("Failed to register incoming API metrics");

    prometheus
        .registry
        .register(Box::new(CALL_EXTERNAL_API.to_owned()))
        .expect("Failed to register call external API metrics");

    prometheus
        .registry
        .register(Box::new(DISPATCH_OUTCOME.to_owned()))
        .expect("Failed to register dispatch outcome metrics");

    prometheus
        .registry
        .register(Box::new(PUSH_DELIVERY.to_owned()))
        .expect("Failed to register push delivery metrics");

    prometheus
        .registry
        .register(Box::new(SWEEP_DURATION.to_owned()))
        .expect("Failed to register sweep duration metrics");

    prometheus
        .registry
        .register(Box::new(SWEPT_REQUESTS.to_owned()))
        .expect("Failed to register swept requests metrics");

    prometheus
}
