/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::{keys::*, types::RedisConnectionPool};
use crate::common::{types::*, utils::EARTH_RADIUS_KM};
use crate::storage::{ProviderStore, RequestStore};
use crate::tools::error::AppError;
use crate::tools::logger::*;
use async_trait::async_trait;
use fred::{
    interfaces::{GeoInterface, KeysInterface, LuaInterface, SortedSetsInterface},
    types::{Expiration, GeoPosition, GeoUnit, RedisValue, SortOrder},
};
use rustc_hash::FxHashMap;

/// KEYS: record, unsettled index. ARGV: expected version, new record, score, keep-in-index flag, member.
/// Returns -1 when the record is missing, 0 on a version mismatch, 1 once written.
const COMPARE_AND_SET_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
local stored = cjson.decode(current)
if tonumber(stored['version']) ~= tonumber(ARGV[1]) then
    return 0
end
redis.call('SET', KEYS[1], ARGV[2])
if ARGV[4] == '1' then
    redis.call('ZADD', KEYS[2], ARGV[3], ARGV[5])
else
    redis.call('ZREM', KEYS[2], ARGV[5])
end
return 1
"#;

/// KEYS: record, unsettled index. ARGV: record, score, index flag, member.
const INSERT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1])
if ARGV[3] == '1' then
    redis.call('ZADD', KEYS[2], ARGV[2], ARGV[4])
end
return 1
"#;

/// Sphere radius Redis uses for GEO distances.
const REDIS_GEO_EARTH_RADIUS_KM: f64 = 6372.797560856;

const GEOSEARCH_MARGIN_KM: f64 = 0.01;

/// `BYRADIUS` argument covering every member within `radius` by haversine on the
/// `EARTH_RADIUS_KM` sphere. Redis measures on a larger sphere, so the radius is scaled up;
/// the selector applies the exact cutoff afterwards.
pub fn geosearch_radius_km(Radius(radius): Radius) -> f64 {
    radius * REDIS_GEO_EARTH_RADIUS_KM / EARTH_RADIUS_KM + GEOSEARCH_MARGIN_KM
}

/// Decodes a `GEOSEARCH ... WITHCOORD` reply into provider ids and their stored positions.
pub fn decode_geo_members(reply: RedisValue) -> Result<Vec<(String, Option<Point>)>, AppError> {
    Ok(reply
        .into_geo_radius_result(true, false, false)?
        .into_iter()
        .filter_map(|info| {
            let position = info.position.map(|pos| Point {
                lat: Latitude(pos.latitude),
                lon: Longitude(pos.longitude),
            });
            info.member
                .as_string()
                .map(|provider_id| (provider_id, position))
        })
        .collect())
}

fn index_args(request: &ServiceRequest) -> (String, String) {
    let TimeStamp(last_activity) = request.last_activity_at();
    let flag = if request.status.is_unsettled() { "1" } else { "0" };
    (last_activity.timestamp().to_string(), flag.to_string())
}

fn decode_request(raw: &str) -> Result<ServiceRequest, AppError> {
    serde_json::from_str(raw).map_err(|err| AppError::DeserializationError(err.to_string()))
}

impl RedisConnectionPool {
    async fn get_requests(&self, request_ids: Vec<String>) -> Result<Vec<ServiceRequest>, AppError> {
        if request_ids.is_empty() {
            return Ok(vec![]);
        }

        let keys: Vec<String> = request_ids
            .into_iter()
            .map(|request_id| request_key(&RequestId(request_id)))
            .collect();

        let records: Vec<Option<String>> = self.pool.mget(keys).await?;

        let mut requests = Vec::with_capacity(records.len());
        for raw in records.into_iter().flatten() {
            match decode_request(&raw) {
                Ok(request) => requests.push(request),
                Err(err) => error!(tag = "[Decode Request]", "{}", err.message()),
            }
        }
        Ok(requests)
    }

    async fn get_providers(
        &self,
        provider_ids: Vec<String>,
    ) -> Result<FxHashMap<ProviderId, Provider>, AppError> {
        if provider_ids.is_empty() {
            return Ok(FxHashMap::default());
        }

        let keys: Vec<String> = provider_ids
            .into_iter()
            .map(|provider_id| provider_details_key(&ProviderId(provider_id)))
            .collect();

        let records: Vec<Option<String>> = self.pool.mget(keys).await?;

        let mut providers = FxHashMap::default();
        for raw in records.into_iter().flatten() {
            match serde_json::from_str::<Provider>(&raw) {
                Ok(provider) => {
                    providers.insert(provider.id.to_owned(), provider);
                }
                Err(err) => error!(tag = "[Decode Provider]", "{}", err),
            }
        }
        Ok(providers)
    }
}

#[async_trait]
impl RequestStore for RedisConnectionPool {
    #[instrument(level = "DEBUG", skip(self))]
    async fn get_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<ServiceRequest>, AppError> {
        let raw: Option<String> = self.pool.get(request_key(request_id)).await?;
        raw.as_deref().map(decode_request).transpose()
    }

    #[instrument(level = "DEBUG", skip(self))]
    async fn insert_request(&self, request: &ServiceRequest) -> Result<bool, AppError> {
        let record = serde_json::to_string(request)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        let (score, flag) = index_args(request);

        let inserted: i64 = self
            .pool
            .eval(
                INSERT_SCRIPT,
                vec![request_key(&request.id), unsettled_requests_key()],
                vec![record, score, flag, request.id.to_string()],
            )
            .await?;

        Ok(inserted == 1)
    }

    #[instrument(level = "DEBUG", skip(self))]
    async fn compare_and_set(
        &self,
        expected_version: u64,
        updated: &ServiceRequest,
    ) -> Result<Option<ServiceRequest>, AppError> {
        let mut written = updated.to_owned();
        written.version = expected_version + 1;

        let record = serde_json::to_string(&written)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        let (score, flag) = index_args(&written);

        let result: i64 = self
            .pool
            .eval(
                COMPARE_AND_SET_SCRIPT,
                vec![request_key(&written.id), unsettled_requests_key()],
                vec![
                    expected_version.to_string(),
                    record,
                    score,
                    flag,
                    written.id.to_string(),
                ],
            )
            .await?;

        match result {
            1 => Ok(Some(written)),
            0 => Ok(None),
            _ => Err(AppError::RequestNotFound(written.id.to_string())),
        }
    }

    #[instrument(level = "DEBUG", skip(self))]
    async fn get_unsettled_requests(
        &self,
        older_than: TimeStamp,
    ) -> Result<Vec<ServiceRequest>, AppError> {
        let TimeStamp(cutoff) = older_than;

        let request_ids: Vec<String> = self
            .pool
            .zrangebyscore(
                unsettled_requests_key(),
                "-inf",
                cutoff.timestamp() as f64,
                false,
                None,
            )
            .await?;

        // The index is only a hint; the record itself decides.
        let mut unsettled: Vec<ServiceRequest> = self
            .get_requests(request_ids)
            .await?
            .into_iter()
            .filter(|request| {
                request.status.is_unsettled() && request.last_activity_at() <= older_than
            })
            .collect();
        unsettled.sort_by_key(|request| request.last_activity_at());

        Ok(unsettled)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let _: () = self
            .pool
            .set(
                health_check_key(),
                "dispatch-engine-health-check",
                Some(Expiration::EX(60)),
                None,
                false,
            )
            .await?;

        let resp: Option<String> = self.pool.get(health_check_key()).await?;
        match resp {
            Some(_) => Ok(()),
            None => Err(AppError::StoreUnavailable(
                "Health check failed as cannot get key from redis".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ProviderStore for RedisConnectionPool {
    #[instrument(level = "DEBUG", skip(self))]
    async fn get_online_providers(
        &self,
        kind: ServiceKind,
        search_area: Option<(Point, Radius)>,
    ) -> Result<Vec<Provider>, AppError> {
        let locations_key = provider_locations_key(&kind);

        let positions: Vec<(String, Option<Point>)> = match search_area {
            Some((Point { lat, lon }, radius)) => {
                let reply: RedisValue = self
                    .pool
                    .geosearch(
                        locations_key,
                        None,
                        Some(GeoPosition {
                            longitude: lon.0,
                            latitude: lat.0,
                        }),
                        Some((geosearch_radius_km(radius), GeoUnit::Kilometers)),
                        None,
                        Some(SortOrder::Asc),
                        None,
                        true,
                        false,
                        false,
                    )
                    .await?;

                decode_geo_members(reply)?
            }
            None => {
                let members: Vec<String> = self
                    .pool
                    .zrange(locations_key, 0_i64, -1_i64, None, false, None, false)
                    .await?;
                members.into_iter().map(|member| (member, None)).collect()
            }
        };

        let mut details = self
            .get_providers(positions.iter().map(|(id, _)| id.to_owned()).collect())
            .await?;

        Ok(positions
            .into_iter()
            .filter_map(|(provider_id, position)| {
                let mut provider = details.remove(&ProviderId(provider_id))?;
                if position.is_some() {
                    provider.location = position;
                }
                Some(provider)
            })
            .filter(|provider| provider.online && provider.kind() == kind)
            .collect())
    }
}
