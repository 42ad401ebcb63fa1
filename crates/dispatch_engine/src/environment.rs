/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use crate::{
    common::types::ServiceKind,
    outbound::push::{FcmPushTransport, PushTransport},
    redis::types::{RedisConnectionPool, RedisSettings},
    storage::{ProviderStore, RequestStore},
    tools::logger::LoggerConfig,
};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub workers: usize,
    pub logger_cfg: LoggerConfig,
    pub redis_cfg: RedisConfig,
    pub push_cfg: PushConfig,
    pub matching_cfg: MatchingConfig,
    pub sweeper_interval_seconds: u64,
    pub sweep_concurrency: usize,
    pub max_transaction_attempts: u32,
    pub request_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_pool_size: usize,
    pub redis_partition: usize,
    pub reconnect_max_attempts: u32,
    pub reconnect_delay: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    pub fcm_url: String,
    pub fcm_server_key: String,
    pub push_timeout_ms: u64,
}

/// Matching heuristics for one request kind.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct KindPolicy {
    /// `None` means no distance cutoff; candidates are still ranked by distance.
    pub radius_km: Option<f64>,
    pub eta_minutes_per_km: f64,
    /// How long a dispatched request may wait for a response before the sweeper acts.
    pub response_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MatchingConfig {
    pub ride: KindPolicy,
    pub roadside_job: KindPolicy,
    pub emergency_case: KindPolicy,
    /// Broadcasts sent before a ride/roadside request is given up on, the first one included.
    pub max_broadcast_attempts: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig {
            ride: KindPolicy {
                radius_km: Some(10.0),
                eta_minutes_per_km: 2.0,
                response_timeout_seconds: 60,
            },
            roadside_job: KindPolicy {
                radius_km: Some(15.0),
                eta_minutes_per_km: 2.0,
                response_timeout_seconds: 120,
            },
            emergency_case: KindPolicy {
                radius_km: None,
                eta_minutes_per_km: 2.0,
                response_timeout_seconds: 60,
            },
            max_broadcast_attempts: 2,
        }
    }
}

impl MatchingConfig {
    pub fn policy(&self, kind: ServiceKind) -> &KindPolicy {
        match kind {
            ServiceKind::Ride => &self.ride,
            ServiceKind::RoadsideJob => &self.roadside_job,
            ServiceKind::EmergencyCase => &self.emergency_case,
        }
    }

    /// The shortest response timeout across kinds; nothing younger than this can be stale.
    pub fn min_response_timeout_seconds(&self) -> u64 {
        [&self.ride, &self.roadside_job, &self.emergency_case]
            .iter()
            .map(|policy| policy.response_timeout_seconds)
            .min()
            .unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub request_store: Arc<dyn RequestStore>,
    pub provider_store: Arc<dyn ProviderStore>,
    pub push_transport: Arc<dyn PushTransport>,
    pub matching_cfg: MatchingConfig,
    pub max_transaction_attempts: u32,
    pub sweeper_interval_seconds: u64,
    /// Stale requests advanced at once by a single sweep.
    pub sweep_concurrency: usize,
    pub request_timeout: u64,
}

impl AppState {
    pub async fn new(app_config: AppConfig) -> AppState {
        let redis = Arc::new(
            RedisConnectionPool::new(RedisSettings::new(
                app_config.redis_cfg.redis_host,
                app_config.redis_cfg.redis_port,
                app_config.redis_cfg.redis_pool_size,
                app_config.redis_cfg.redis_partition,
                app_config.redis_cfg.reconnect_max_attempts,
                app_config.redis_cfg.reconnect_delay,
            ))
            .await
            .expect("Failed to create Redis connection pool"),
        );

        let push_transport = Arc::new(FcmPushTransport::new(
            Url::parse(app_config.push_cfg.fcm_url.as_str()).expect("Failed to parse fcm_url."),
            app_config.push_cfg.fcm_server_key,
            Duration::from_millis(app_config.push_cfg.push_timeout_ms),
        ));

        AppState {
            request_store: redis.clone(),
            provider_store: redis,
            push_transport,
            matching_cfg: app_config.matching_cfg,
            max_transaction_attempts: app_config.max_transaction_attempts,
            sweeper_interval_seconds: app_config.sweeper_interval_seconds,
            sweep_concurrency: app_config.sweep_concurrency.max(1),
            request_timeout: app_config.request_timeout,
        }
    }

    /// Wires arbitrary collaborators, e.g. the in-memory stores.
    pub fn with_collaborators(
        request_store: Arc<dyn RequestStore>,
        provider_store: Arc<dyn ProviderStore>,
        push_transport: Arc<dyn PushTransport>,
        matching_cfg: MatchingConfig,
    ) -> AppState {
        AppState {
            request_store,
            provider_store,
            push_transport,
            matching_cfg,
            max_transaction_attempts: 5,
            sweeper_interval_seconds: 30,
            sweep_concurrency: 8,
            request_timeout: 10_000,
        }
    }
}
