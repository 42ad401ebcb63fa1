/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
pub mod memory;

use crate::common::types::*;
use crate::tools::error::AppError;
use async_trait::async_trait;

/// Request records live in an external document store. The only write primitive the
/// dispatch path relies on is an optimistic compare-and-set keyed on `version`.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get_request(&self, request_id: &RequestId)
        -> Result<Option<ServiceRequest>, AppError>;

    /// Stores a new record. Returns `false` when the id is already taken.
    async fn insert_request(&self, request: &ServiceRequest) -> Result<bool, AppError>;

    /// Atomically replaces the stored record with `updated` only if the stored version is still
    /// `expected_version`. On success the written record is returned with its version bumped;
    /// `None` means another writer got there first.
    async fn compare_and_set(
        &self,
        expected_version: u64,
        updated: &ServiceRequest,
    ) -> Result<Option<ServiceRequest>, AppError>;

    /// Requests in `SEARCHING` or `AWAITING_RESPONSE` whose last activity is at or before `older_than`.
    async fn get_unsettled_requests(
        &self,
        older_than: TimeStamp,
    ) -> Result<Vec<ServiceRequest>, AppError>;

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Read-only view of provider presence, maintained elsewhere.
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Online providers able to serve `kind`. `search_area` is a hint the store may use to
    /// narrow the result; callers still filter by distance themselves.
    async fn get_online_providers(
        &self,
        kind: ServiceKind,
        search_area: Option<(Point, Radius)>,
    ) -> Result<Vec<Provider>, AppError>;
}
