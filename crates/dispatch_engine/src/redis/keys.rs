/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::types::*;

pub fn request_key(RequestId(request_id): &RequestId) -> String {
    format!("dms:request:{request_id}")
}

/// Sorted set of non-terminal request ids, scored by last activity (epoch seconds).
pub fn unsettled_requests_key() -> String {
    "dms:requests:unsettled".to_string()
}

/// Geo set of provider positions, one per request kind.
pub fn provider_locations_key(kind: &ServiceKind) -> String {
    format!("dms:providers:{kind}")
}

pub fn provider_details_key(ProviderId(provider_id): &ProviderId) -> String {
    format!("dms:provider:{provider_id}")
}

pub fn health_check_key() -> String {
    "dms:health_check".to_string()
}
