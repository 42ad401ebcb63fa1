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
        eligibility::{is_eligible, vehicle_class_matches},
        selector::select_candidates,
        types::*,
        utils::{distance_between_in_km, eta_from_distance, now},
    },
    environment::MatchingConfig,
};

fn request_for(details: RequestDetails) -> ServiceRequest {
    ServiceRequest::new(request_id("request-1"), ORIGIN, details, now())
}

fn ids(candidates: &[Candidate]) -> Vec<String> {
    candidates
        .iter()
        .map(|candidate| candidate.provider.id.0.to_owned())
        .collect()
}

#[test]
fn test_distance_is_zero_for_identical_points() {
    let Kilometers(distance) = distance_between_in_km(&ORIGIN, &ORIGIN);
    assert_eq!(distance, 0.0);
}

#[test]
fn test_distance_between_delhi_and_mumbai() {
    let delhi = Point {
        lat: Latitude(28.6139),
        lon: Longitude(77.2090),
    };
    let mumbai = Point {
        lat: Latitude(19.0760),
        lon: Longitude(72.8777),
    };

    let Kilometers(there) = distance_between_in_km(&delhi, &mumbai);
    let Kilometers(back) = distance_between_in_km(&mumbai, &delhi);

    assert!((there - 1148.09).abs() < 0.5, "got {there}");
    assert!((there - back).abs() < 1e-9);
}

#[test]
fn test_one_degree_of_longitude_on_the_equator() {
    let a = Point {
        lat: Latitude(0.0),
        lon: Longitude(0.0),
    };
    let b = Point {
        lat: Latitude(0.0),
        lon: Longitude(1.0),
    };

    let Kilometers(distance) = distance_between_in_km(&a, &b);
    assert!((distance - 111.195).abs() < 0.01, "got {distance}");
}

#[test]
fn test_eta_uses_minutes_per_km() {
    let Minutes(eta) = eta_from_distance(Kilometers(5.0), 2.0);
    assert_eq!(eta, 10.0);
}

#[test]
fn test_ride_candidates_stay_inside_radius() {
    let cfg = MatchingConfig::default();
    let request = request_for(ride("Sedan"));
    let providers = vec![driver("near", 2.0, "Sedan"), driver("far", 12.0, "Sedan")];

    let candidates = select_candidates(&request, &providers, &cfg.ride);

    assert_eq!(ids(&candidates), vec!["near"]);
    let Kilometers(distance) = candidates[0].distance;
    assert!((distance - 2.0).abs() < 1e-6);
}

#[test]
fn test_radius_applies_per_kind() {
    let cfg = MatchingConfig::default();
    let distances = [1.0, 4.0, 9.5, 10.5, 14.0, 16.0, 40.0];

    let drivers: Vec<Provider> = distances
        .iter()
        .map(|km| driver(&format!("d-{km}"), *km, "Sedan"))
        .collect();
    let mechanics: Vec<Provider> = distances
        .iter()
        .map(|km| mechanic(&format!("m-{km}"), *km))
        .collect();
    let facilities: Vec<Provider> = distances
        .iter()
        .map(|km| facility(&format!("f-{km}"), *km))
        .collect();

    let rides = select_candidates(&request_for(ride("Sedan")), &drivers, &cfg.ride);
    let jobs = select_candidates(&request_for(roadside_job()), &mechanics, &cfg.roadside_job);
    let cases = select_candidates(
        &request_for(RequestDetails::EmergencyCase),
        &facilities,
        &cfg.emergency_case,
    );

    assert!(rides.iter().all(|c| c.distance.0 <= 10.0));
    assert_eq!(rides.len(), 3);
    assert!(jobs.iter().all(|c| c.distance.0 <= 15.0));
    assert_eq!(jobs.len(), 5);
    assert_eq!(cases.len(), distances.len());
}

#[test]
fn test_candidates_are_ordered_nearest_first() {
    let cfg = MatchingConfig::default();
    let providers = vec![
        facility("c", 8.0),
        facility("a", 3.0),
        facility("b", 5.0),
        facility("a2", 3.0),
    ];

    let candidates = select_candidates(
        &request_for(RequestDetails::EmergencyCase),
        &providers,
        &cfg.emergency_case,
    );

    assert_eq!(ids(&candidates), vec!["a", "a2", "b", "c"]);
}

#[test]
fn test_vehicle_class_prefix_rule() {
    assert!(vehicle_class_matches("Ride Premium", "Ride Mini"));
    assert!(vehicle_class_matches("sedan", "SEDAN_AC"));
    assert!(!vehicle_class_matches("Sedan", "SUV"));
    assert!(!vehicle_class_matches("", "Sedan"));
}

#[test]
fn test_gender_restricted_ride_needs_restricted_driver() {
    let request = request_for(RequestDetails::Ride {
        vehicle_class: "Sedan".to_string(),
        gender_restricted: true,
    });
    let open = driver("open", 1.0, "Sedan");
    let mut restricted = driver("restricted", 1.0, "Sedan");
    restricted.capabilities = Capabilities::Driver {
        vehicle_class: "Sedan".to_string(),
        gender_restricted: true,
    };

    assert!(!is_eligible(&request, &open));
    assert!(is_eligible(&request, &restricted));
}

#[test]
fn test_ineligible_providers_are_filtered() {
    let mut request = request_for(ride("Sedan"));
    request.reject(provider_id("rejected"));

    let mut unlocated = driver("unlocated", 1.0, "Sedan");
    unlocated.location = None;

    let providers = vec![
        offline(driver("offline", 1.0, "Sedan")),
        unlocated,
        driver("rejected", 1.0, "Sedan"),
        mechanic("mechanic", 1.0),
        driver("suv", 1.0, "SUV"),
        driver("ok", 3.0, "Sedan"),
    ];

    let candidates = select_candidates(&request, &providers, &MatchingConfig::default().ride);

    assert_eq!(ids(&candidates), vec!["ok"]);
}

#[test]
fn test_empty_pool_is_not_an_error() {
    let candidates = select_candidates(
        &request_for(RequestDetails::EmergencyCase),
        &[],
        &MatchingConfig::default().emergency_case,
    );
    assert!(candidates.is_empty());
}
