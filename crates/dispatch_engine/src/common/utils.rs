/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::types::*;
use chrono::{Duration, Utc};
use std::f64::consts::PI;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

fn deg2rad(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

pub fn distance_between_in_km(latlong1: &Point, latlong2: &Point) -> Kilometers {
    let Latitude(lat1) = latlong1.lat;
    let Longitude(lon1) = latlong1.lon;
    let Latitude(lat2) = latlong2.lat;
    let Longitude(lon2) = latlong2.lon;

    let dlat = deg2rad(lat2 - lat1);
    let dlon = deg2rad(lon2 - lon1);

    let rlat1 = deg2rad(lat1);
    let rlat2 = deg2rad(lat2);

    let sq = |x: f64| x * x;

    // h stays within [0, 1] for valid coordinates; clamp guards against float drift
    let h = (sq((dlat / 2.0).sin()) + rlat1.cos() * rlat2.cos() * sq((dlon / 2.0).sin()))
        .clamp(0.0, 1.0);

    Kilometers(2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt()))
}

pub fn eta_from_distance(Kilometers(distance): Kilometers, minutes_per_km: f64) -> Minutes {
    Minutes(distance * minutes_per_km)
}

pub fn now() -> TimeStamp {
    TimeStamp(Utc::now())
}

pub fn seconds_before(TimeStamp(ts): TimeStamp, seconds: u64) -> TimeStamp {
    TimeStamp(ts - Duration::seconds(seconds as i64))
}

/// True once `timeout_seconds` have passed since `since`.
pub fn has_elapsed(TimeStamp(since): TimeStamp, timeout_seconds: u64, TimeStamp(at): TimeStamp) -> bool {
    at.signed_duration_since(since) >= Duration::seconds(timeout_seconds as i64)
}
