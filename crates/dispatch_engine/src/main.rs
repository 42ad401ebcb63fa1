/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use actix_web::{web, App, HttpServer};
use dispatch_engine::{
    domain::api,
    environment::{AppConfig, AppState},
    middleware::*,
    sweeper::run_sweeper,
    tools::{error::AppError, logger::*, prometheus::prometheus_metrics},
};
use std::{
    env::var,
    time::Duration,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::signal::unix::{signal, SignalKind};
use tracing_actix_web::TracingLogger;

pub fn read_dhall_config(config_path: &str) -> Result<AppConfig, String> {
    let config = serde_dhall::from_file(config_path).parse::<AppConfig>();
    match config {
        Ok(config) => Ok(config),
        Err(e) => Err(format!("Error reading config: {}", e)),
    }
}

fn listen_for(kind: SignalKind, graceful_termination_requested: Arc<AtomicBool>) {
    tokio::spawn(async move {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
                graceful_termination_requested.store(true, Ordering::Relaxed);
            }
            Err(err) => error!(tag = "[Signal Handler]", error = %err),
        }
    });
}

#[actix_web::main]
async fn start_server() -> std::io::Result<()> {
    let dhall_config_path = var("DHALL_CONFIG")
        .unwrap_or_else(|_| "./dhall_config/dispatch_engine.dhall".to_string());
    let app_config = read_dhall_config(&dhall_config_path).unwrap_or_else(|err| {
        println!("Dhall Config Reading Error : {}", err);
        std::process::exit(1);
    });

    let _guards = setup_tracing(&app_config.logger_cfg);

    let port = app_config.port;
    let workers = app_config.workers;

    let app_state = AppState::new(app_config).await;

    let request_deadline = Duration::from_millis(app_state.request_timeout);
    let data = web::Data::new(app_state);

    let graceful_termination_requested = Arc::new(AtomicBool::new(false));
    // SIGTERM
    listen_for(
        SignalKind::terminate(),
        graceful_termination_requested.to_owned(),
    );
    // SIGINT (Ctrl+C)
    listen_for(
        SignalKind::interrupt(),
        graceful_termination_requested.to_owned(),
    );

    let sweeper_state = data.clone().into_inner();
    let sweeper_thread = tokio::spawn(async move {
        run_sweeper(sweeper_state, graceful_termination_requested).await;
    });

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .app_data(
                web::JsonConfig::default()
                    .error_handler(|err, _| AppError::UnprocessibleRequest(err.to_string()).into()),
            )
            .wrap(IncomingRequest::new(request_deadline))
            .wrap(TracingLogger::<DomainRootSpanBuilder>::new())
            .wrap(prometheus_metrics())
            .configure(api::handler)
    })
    .workers(workers)
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    if let Err(err) = sweeper_thread.await {
        error!(tag = "[Sweeper Thread]", error = %err);
    }

    Ok(())
}

fn main() -> std::io::Result<()> {
    start_server()
}
