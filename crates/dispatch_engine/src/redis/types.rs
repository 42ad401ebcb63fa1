/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use fred::prelude::*;
use serde::Deserialize;

use crate::tools::error::AppError;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub pool_size: usize,
    pub partition: usize,
    pub reconnect_max_attempts: u32,
    /// Reconnect delay in milliseconds
    pub reconnect_delay: u32,
}

impl Default for RedisSettings {
    fn default() -> Self {
        RedisSettings {
            host: String::from("localhost"),
            port: 6379,
            pool_size: 10,
            partition: 0,
            reconnect_max_attempts: 5,
            reconnect_delay: 1000,
        }
    }
}

impl RedisSettings {
    pub fn new(
        host: String,
        port: u16,
        pool_size: usize,
        partition: usize,
        reconnect_max_attempts: u32,
        reconnect_delay: u32,
    ) -> Self {
        RedisSettings {
            host,
            port,
            pool_size,
            partition,
            reconnect_max_attempts,
            reconnect_delay,
        }
    }
}

pub struct RedisConnectionPool {
    pub pool: RedisPool,
}

impl RedisConnectionPool {
    pub async fn new(conf: RedisSettings) -> Result<Self, AppError> {
        let redis_connection_url = format!(
            "redis://{}:{}/{}", //URI Schema
            conf.host, conf.port, conf.partition
        );

        let config = RedisConfig::from_url(&redis_connection_url)
            .map_err(|err| AppError::StoreUnavailable(err.to_string()))?;

        let reconnect_policy =
            ReconnectPolicy::new_constant(conf.reconnect_max_attempts, conf.reconnect_delay);

        let pool = Builder::from_config(config)
            .set_policy(reconnect_policy)
            .build_pool(conf.pool_size)
            .map_err(|err| AppError::StoreUnavailable(err.to_string()))?;

        pool.init()
            .await
            .map_err(|err| AppError::StoreUnavailable(err.to_string()))?;

        Ok(Self { pool })
    }
}
