/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::types::*;
use crate::environment::KindPolicy;

/// Ride requests name a class such as "Ride Premium"; only its first word has to prefix
/// the driver's vehicle class.
pub fn vehicle_class_matches(requested: &str, offered: &str) -> bool {
    match requested.split_whitespace().next() {
        Some(token) => offered
            .to_ascii_lowercase()
            .starts_with(&token.to_ascii_lowercase()),
        None => false,
    }
}

/// Kind-specific eligibility, independent of distance.
///
/// A provider is never eligible when it is offline, has no known location, already
/// rejected the request, or serves a different kind of request.
pub fn is_eligible(request: &ServiceRequest, provider: &Provider) -> bool {
    if !provider.online || provider.location.is_none() || request.has_rejected(&provider.id) {
        return false;
    }

    match (&request.details, &provider.capabilities) {
        (
            RequestDetails::Ride {
                vehicle_class,
                gender_restricted,
            },
            Capabilities::Driver {
                vehicle_class: offered_class,
                gender_restricted: offers_restricted,
            },
        ) => vehicle_class_matches(vehicle_class, offered_class) && (!gender_restricted || *offers_restricted),
        (RequestDetails::RoadsideJob { .. }, Capabilities::Mechanic { .. }) => true,
        (RequestDetails::EmergencyCase, Capabilities::Facility) => true,
        _ => false,
    }
}

pub fn within_radius(Kilometers(distance): Kilometers, policy: &KindPolicy) -> bool {
    match policy.radius_km {
        Some(radius_km) => distance <= radius_km,
        None => true,
    }
}
