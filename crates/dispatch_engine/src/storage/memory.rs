/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::{ProviderStore, RequestStore};
use crate::common::types::*;
use crate::tools::error::AppError;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

/// In-process request store. The write lock serializes compare-and-set the same way a
/// database transaction would.
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<FxHashMap<RequestId, ServiceRequest>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a record regardless of its version, the way an external writer would.
    pub async fn put_request(&self, request: ServiceRequest) {
        self.requests
            .write()
            .await
            .insert(request.id.to_owned(), request);
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn get_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<ServiceRequest>, AppError> {
        Ok(self.requests.read().await.get(request_id).cloned())
    }

    async fn insert_request(&self, request: &ServiceRequest) -> Result<bool, AppError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            return Ok(false);
        }
        requests.insert(request.id.to_owned(), request.to_owned());
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        expected_version: u64,
        updated: &ServiceRequest,
    ) -> Result<Option<ServiceRequest>, AppError> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&updated.id) {
            Some(current) if current.version == expected_version => {
                let mut written = updated.to_owned();
                written.version = expected_version + 1;
                *current = written.to_owned();
                Ok(Some(written))
            }
            Some(_) => Ok(None),
            None => Err(AppError::RequestNotFound(updated.id.to_string())),
        }
    }

    async fn get_unsettled_requests(
        &self,
        older_than: TimeStamp,
    ) -> Result<Vec<ServiceRequest>, AppError> {
        let mut unsettled: Vec<ServiceRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|request| request.status.is_unsettled() && request.last_activity_at() <= older_than)
            .cloned()
            .collect();
        unsettled.sort_by_key(|request| request.last_activity_at());
        Ok(unsettled)
    }
}

#[derive(Default)]
pub struct InMemoryProviderStore {
    providers: RwLock<FxHashMap<ProviderId, Provider>>,
}

impl InMemoryProviderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_provider(&self, provider: Provider) {
        self.providers
            .write()
            .await
            .insert(provider.id.to_owned(), provider);
    }

    pub async fn set_online(&self, provider_id: &ProviderId, online: bool) {
        if let Some(provider) = self.providers.write().await.get_mut(provider_id) {
            provider.online = online;
        }
    }
}

#[async_trait]
impl ProviderStore for InMemoryProviderStore {
    async fn get_online_providers(
        &self,
        kind: ServiceKind,
        _search_area: Option<(Point, Radius)>,
    ) -> Result<Vec<Provider>, AppError> {
        Ok(self
            .providers
            .read()
            .await
            .values()
            .filter(|provider| provider.online && provider.kind() == kind)
            .cloned()
            .collect())
    }
}
