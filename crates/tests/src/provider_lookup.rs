/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::fixtures::*;
use dispatch_engine::{
    common::{
        types::*,
        utils::{distance_between_in_km, EARTH_RADIUS_KM},
    },
    redis::commands::{decode_geo_members, geosearch_radius_km},
};
use fred::types::RedisValue;

const REDIS_GEO_EARTH_RADIUS_KM: f64 = 6372.797560856;

fn geo_entry(member: &str, lon: f64, lat: f64) -> RedisValue {
    RedisValue::Array(vec![
        RedisValue::from(member),
        RedisValue::Array(vec![RedisValue::Double(lon), RedisValue::Double(lat)]),
    ])
}

#[test]
fn test_geosearch_reply_decodes_members_with_positions() {
    let reply = RedisValue::Array(vec![
        geo_entry("d1", 77.20, 28.61),
        geo_entry("d2", 77.21, 28.62),
    ]);

    let members = decode_geo_members(reply).expect("decode geosearch reply");

    assert_eq!(
        members,
        vec![
            (
                "d1".to_string(),
                Some(Point {
                    lat: Latitude(28.61),
                    lon: Longitude(77.20),
                })
            ),
            (
                "d2".to_string(),
                Some(Point {
                    lat: Latitude(28.62),
                    lon: Longitude(77.21),
                })
            ),
        ]
    );
}

#[test]
fn test_empty_geosearch_reply_has_no_members() {
    assert!(decode_geo_members(RedisValue::Null)
        .expect("decode null reply")
        .is_empty());
    assert!(decode_geo_members(RedisValue::Array(vec![]))
        .expect("decode empty reply")
        .is_empty());
}

#[test]
fn test_malformed_geosearch_reply_is_an_error() {
    assert!(decode_geo_members(RedisValue::from("d1")).is_err());
}

#[test]
fn test_geosearch_radius_keeps_providers_at_the_edge() {
    let edge = north_of_origin(9.999);
    let Kilometers(selected) = distance_between_in_km(&ORIGIN, &edge);
    assert!(selected <= 10.0);

    // Same central angle, measured on the sphere Redis uses.
    let measured_by_redis = selected * REDIS_GEO_EARTH_RADIUS_KM / EARTH_RADIUS_KM;
    assert!(measured_by_redis > 10.0);

    assert!(geosearch_radius_km(Radius(10.0)) >= measured_by_redis);
}

#[test]
fn test_geosearch_radius_stays_close_to_the_selection_radius() {
    let padded = geosearch_radius_km(Radius(15.0));
    assert!(padded > 15.0);
    assert!(padded < 15.1);
}
