/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use super::{types::*, utils::eta_from_distance};
use crate::environment::KindPolicy;
use crate::outbound::push::PushTransport;
use crate::push_delivery;
use crate::tools::logger::*;
use crate::tools::prometheus::PUSH_DELIVERY;

pub fn build_payload(
    request: &ServiceRequest,
    candidate: &Candidate,
    policy: &KindPolicy,
    dispatched_at: TimeStamp,
) -> DispatchPayload {
    DispatchPayload {
        request_id: request.id.to_owned(),
        kind: request.kind(),
        origin: request.origin,
        details: request.details.to_owned(),
        distance_km: candidate.distance,
        eta_minutes: eta_from_distance(candidate.distance, policy.eta_minutes_per_km),
        dispatched_at,
    }
}

fn record_outcome(request: &ServiceRequest, outcome: &DeliveryOutcome) {
    let kind = request.kind().to_string();
    push_delivery!(kind.as_str(), outcome.label());
    match outcome {
        DeliveryOutcome::Delivered { provider_id } => {
            info!(tag = "[Push Delivered]", request_id = %request.id, provider_id = %provider_id, kind = %kind);
        }
        DeliveryOutcome::SkippedNoToken { provider_id } => {
            warn!(tag = "[Push Skipped - No Token]", request_id = %request.id, provider_id = %provider_id, kind = %kind);
        }
        DeliveryOutcome::Failed {
            provider_id,
            reason,
        } => {
            error!(tag = "[Push Failed]", request_id = %request.id, provider_id = %provider_id, kind = %kind, reason = %reason);
        }
    }
}

/// Sends the payload to every candidate independently. Candidates without a push token are
/// skipped, failures are reported per recipient, and nothing is retried.
pub async fn broadcast(
    transport: &dyn PushTransport,
    request: &ServiceRequest,
    candidates: &[Candidate],
    policy: &KindPolicy,
    dispatched_at: TimeStamp,
) -> Vec<DeliveryOutcome> {
    let messages: Vec<(PushToken, DispatchPayload)> = candidates
        .iter()
        .filter_map(|candidate| {
            candidate.provider.push_token.to_owned().map(|token| {
                (
                    token,
                    build_payload(request, candidate, policy, dispatched_at),
                )
            })
        })
        .collect();

    let mut results = transport.send_batch(messages).await.into_iter();

    candidates
        .iter()
        .map(|candidate| {
            let provider_id = candidate.provider.id.to_owned();
            let outcome = match candidate.provider.push_token {
                None => DeliveryOutcome::SkippedNoToken { provider_id },
                Some(_) => match results.next() {
                    Some(Ok(())) => DeliveryOutcome::Delivered { provider_id },
                    Some(Err(err)) => DeliveryOutcome::Failed {
                        provider_id,
                        reason: err.message(),
                    },
                    None => DeliveryOutcome::Failed {
                        provider_id,
                        reason: "Transport returned fewer results than messages".to_string(),
                    },
                },
            };
            record_outcome(request, &outcome);
            outcome
        })
        .collect()
}

/// Reports a cascade candidate that was passed over for lacking a push token.
pub fn skip_tokenless(request: &ServiceRequest, provider_id: ProviderId) -> DeliveryOutcome {
    let outcome = DeliveryOutcome::SkippedNoToken { provider_id };
    record_outcome(request, &outcome);
    outcome
}

/// Sends the payload to a single candidate, used for cascading offers.
pub async fn deliver(
    transport: &dyn PushTransport,
    request: &ServiceRequest,
    candidate: &Candidate,
    policy: &KindPolicy,
    dispatched_at: TimeStamp,
) -> DeliveryOutcome {
    let provider_id = candidate.provider.id.to_owned();

    let outcome = match &candidate.provider.push_token {
        None => DeliveryOutcome::SkippedNoToken { provider_id },
        Some(token) => {
            let payload = build_payload(request, candidate, policy, dispatched_at);
            match transport.send(token, &payload).await {
                Ok(()) => DeliveryOutcome::Delivered { provider_id },
                Err(err) => DeliveryOutcome::Failed {
                    provider_id,
                    reason: err.message(),
                },
            }
        }
    };

    record_outcome(request, &outcome);
    outcome
}
