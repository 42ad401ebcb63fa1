/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::subscriber::set_global_default;
pub use tracing::{debug, error, info, instrument, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, Registry};

const SERVICE_NAME: &str = "dispatch-engine";

#[derive(Debug, Deserialize, Clone, Copy)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
    OFF,
}

impl From<LogLevel> for LevelFilter {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::TRACE => LevelFilter::TRACE,
            LogLevel::DEBUG => LevelFilter::DEBUG,
            LogLevel::INFO => LevelFilter::INFO,
            LogLevel::WARN => LevelFilter::WARN,
            LogLevel::ERROR => LevelFilter::ERROR,
            LogLevel::OFF => LevelFilter::OFF,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    pub level: LogLevel,
    /// Directory for the daily rolling log file; `None` logs to stdout only.
    pub log_dir: Option<String>,
}

/// Keeps the non-blocking writers flushing. Drop it only on shutdown.
pub struct LogGuards {
    _console: WorkerGuard,
    _file: Option<WorkerGuard>,
}

fn service_fields() -> HashMap<String, Value> {
    HashMap::from([
        ("service".to_string(), Value::from(SERVICE_NAME)),
        (
            "version".to_string(),
            Value::from(
                std::env::var("DEPLOYMENT_VERSION").unwrap_or_else(|_| "DEV".to_string()),
            ),
        ),
    ])
}

/// Installs bunyan JSON logging on stdout and, with `log_dir`, on a daily rolling file.
///
/// Returns `None` when a global subscriber is already in place (e.g. a second call from the
/// same test binary); the existing one keeps receiving events.
pub fn setup_tracing(logger_cfg: &LoggerConfig) -> Option<LogGuards> {
    if LogTracer::init().is_err() {
        return None;
    }

    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stdout());
    let console_layer = BunyanFormattingLayer::with_default_fields(
        SERVICE_NAME.to_string(),
        console_writer,
        service_fields(),
    );

    let (file_layer, file_guard) = match &logger_cfg.log_dir {
        Some(log_dir) => {
            let (file_writer, file_guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::daily(log_dir, format!("{SERVICE_NAME}.log")),
            );
            let file_layer = BunyanFormattingLayer::with_default_fields(
                SERVICE_NAME.to_string(),
                file_writer,
                service_fields(),
            );
            (Some(file_layer), Some(file_guard))
        }
        None => (None, None),
    };

    let subscriber = Registry::default()
        .with(LevelFilter::from(logger_cfg.level))
        .with(JsonStorageLayer)
        .with(file_layer)
        .with(console_layer);

    set_global_default(subscriber).ok()?;

    Some(LogGuards {
        _console: console_guard,
        _file: file_guard,
    })
}
