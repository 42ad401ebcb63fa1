/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::{
    eligibility::{is_eligible, within_radius},
    types::*,
    utils::distance_between_in_km,
};
use crate::environment::KindPolicy;
use std::cmp::Ordering;

/// Applies the request kind's eligibility predicate and radius to `providers` and returns the
/// survivors nearest first. Ties are broken by provider id so the order only depends on the
/// snapshot. An empty result is a normal outcome.
pub fn select_candidates(
    request: &ServiceRequest,
    providers: &[Provider],
    policy: &KindPolicy,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = providers
        .iter()
        .filter(|provider| is_eligible(request, provider))
        .filter_map(|provider| {
            let location = provider.location.as_ref()?;
            let distance = distance_between_in_km(&request.origin, location);
            within_radius(distance, policy).then(|| Candidate {
                provider: provider.to_owned(),
                distance,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        let Kilometers(a_distance) = a.distance;
        let Kilometers(b_distance) = b.distance;
        match a_distance.total_cmp(&b_distance) {
            Ordering::Equal => a.provider.id.cmp(&b.provider.id),
            ordering => ordering,
        }
    });

    candidates
}
