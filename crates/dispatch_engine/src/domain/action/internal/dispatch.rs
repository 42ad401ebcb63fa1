/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::common::{
    notifier,
    selector::select_candidates,
    types::*,
    utils::{has_elapsed, now, seconds_before},
};
use crate::dispatch_outcome;
use crate::environment::{AppState, KindPolicy, MatchingConfig};
use crate::tools::error::AppError;
use crate::tools::logger::*;
use crate::tools::prometheus::{DISPATCH_OUTCOME, SWEPT_REQUESTS};
use futures::{stream, StreamExt};

/// Why the dispatch routine is being entered. Each trigger has its own precondition on the
/// stored status; when it does not hold the invocation is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchTrigger {
    /// The request has just become dispatchable (creation event or manual re-dispatch).
    Dispatchable,
    /// The sweeper found the request idle past its response timeout.
    Sweep,
    /// A provider turned the request down, explicitly or by failing delivery.
    Declined(ProviderId),
}

/// What to do once the claimed record has been written.
#[derive(Debug, Clone)]
enum Plan {
    Broadcast(Vec<Candidate>),
    Offer {
        candidate: Candidate,
        skipped: Vec<ProviderId>,
    },
    GiveUp {
        status: RequestStatus,
        skipped: Vec<ProviderId>,
    },
    Record,
}

/// Status a request settles in when nobody is left to notify.
pub fn unfulfillable_status(request: &ServiceRequest) -> RequestStatus {
    match request.kind() {
        ServiceKind::Ride => RequestStatus::NoProvidersAvailable,
        ServiceKind::RoadsideJob => RequestStatus::NoMechanicsAvailable,
        ServiceKind::EmergencyCase => {
            if request.rejected_by().is_empty() {
                RequestStatus::NoProvidersAvailable
            } else {
                RequestStatus::AllPartnersBusy
            }
        }
    }
}

fn search_area(request: &ServiceRequest, policy: &KindPolicy) -> Option<(Point, Radius)> {
    policy
        .radius_km
        .map(|radius_km| (request.origin, Radius(radius_km)))
}

fn give_up(mut next: ServiceRequest, skipped: Vec<ProviderId>) -> (ServiceRequest, Plan) {
    let status = unfulfillable_status(&next);
    next.status = status;
    next.pending_provider = None;
    (next, Plan::GiveUp { status, skipped })
}

/// Decides, from the freshly read record alone, what this invocation should write and do.
/// `None` means the trigger's precondition does not hold anymore.
fn plan_dispatch(
    request: &ServiceRequest,
    trigger: &DispatchTrigger,
    providers: &[Provider],
    matching_cfg: &MatchingConfig,
    at: TimeStamp,
) -> Option<(ServiceRequest, Plan)> {
    let kind = request.kind();
    let policy = matching_cfg.policy(kind);
    let strategy = kind.delivery_strategy();
    let mut next = request.to_owned();

    match trigger {
        DispatchTrigger::Dispatchable => {
            if request.status != RequestStatus::Searching {
                return None;
            }
        }
        DispatchTrigger::Sweep => {
            if !request.status.is_unsettled()
                || !has_elapsed(
                    request.last_activity_at(),
                    policy.response_timeout_seconds,
                    at,
                )
            {
                return None;
            }
            if request.status == RequestStatus::AwaitingResponse {
                match strategy {
                    DeliveryStrategy::Cascade => {
                        if let Some(pending) = request.pending_provider.to_owned() {
                            next.reject(pending);
                        }
                    }
                    DeliveryStrategy::Broadcast => {
                        if request.dispatch_attempts >= matching_cfg.max_broadcast_attempts {
                            return Some(give_up(next, vec![]));
                        }
                    }
                }
            }
        }
        DispatchTrigger::Declined(provider_id) => {
            if !request.status.is_unsettled() || request.has_rejected(provider_id) {
                return None;
            }
            match strategy {
                DeliveryStrategy::Broadcast => {
                    next.reject(provider_id.to_owned());
                    return Some((next, Plan::Record));
                }
                DeliveryStrategy::Cascade => {
                    if request.status != RequestStatus::AwaitingResponse
                        || request.pending_provider.as_ref() != Some(provider_id)
                    {
                        return None;
                    }
                    next.reject(provider_id.to_owned());
                }
            }
        }
    }

    let candidates = select_candidates(&next, providers, policy);

    let (next, plan) = match strategy {
        DeliveryStrategy::Broadcast => {
            if candidates.is_empty() {
                give_up(next, vec![])
            } else {
                next.status = RequestStatus::AwaitingResponse;
                next.dispatched_at = Some(at);
                next.dispatch_attempts += 1;
                (next, Plan::Broadcast(candidates))
            }
        }
        DeliveryStrategy::Cascade => {
            // Tokenless candidates count as rejections, so walking the ranked list is the same
            // as re-selecting after each one; it ends after at most one pass over the pool.
            let mut skipped = Vec::new();
            let mut offer = None;
            for candidate in candidates {
                if candidate.provider.push_token.is_some() {
                    offer = Some(candidate);
                    break;
                }
                next.reject(candidate.provider.id.to_owned());
                skipped.push(candidate.provider.id);
            }

            match offer {
                Some(candidate) => {
                    next.status = RequestStatus::AwaitingResponse;
                    next.pending_provider = Some(candidate.provider.id.to_owned());
                    next.dispatched_at = Some(at);
                    next.dispatch_attempts += 1;
                    (next, Plan::Offer { candidate, skipped })
                }
                None => give_up(next, skipped),
            }
        }
    };

    if next.status != request.status && !request.status.can_transition_to(&next.status) {
        return None;
    }

    Some((next, plan))
}

/// Optimistic read-modify-write. `plan` is re-run against a fresh read after every conflict;
/// it returns `Ok(None)` to leave the record untouched.
pub(crate) async fn update_with<T, F>(
    data: &AppState,
    mut current: ServiceRequest,
    plan: F,
) -> Result<Option<(ServiceRequest, T)>, AppError>
where
    F: Fn(&ServiceRequest) -> Result<Option<(ServiceRequest, T)>, AppError>,
{
    for attempt in 1..=data.max_transaction_attempts {
        let Some((updated, result)) = plan(&current)? else {
            return Ok(None);
        };

        if let Some(written) = data
            .request_store
            .compare_and_set(current.version, &updated)
            .await?
        {
            return Ok(Some((written, result)));
        }

        debug!(tag = "[Transaction Conflict]", request_id = %current.id, attempt = attempt);

        current = data
            .request_store
            .get_request(&current.id)
            .await?
            .ok_or_else(|| AppError::RequestNotFound(current.id.to_string()))?;
    }

    Err(AppError::TransactionConflict(current.id.to_string()))
}

/// The dispatch guard. Reads the request, snapshots the provider pool once, claims the request
/// with a compare-and-set and only then notifies. A cascade whose offer cannot be delivered
/// re-enters itself as an implicit decline against the same snapshot.
#[instrument(level = "DEBUG", skip(data))]
pub async fn dispatch(
    data: &AppState,
    request_id: &RequestId,
    trigger: DispatchTrigger,
    at: TimeStamp,
) -> Result<DispatchOutcome, AppError> {
    let request = data
        .request_store
        .get_request(request_id)
        .await?
        .ok_or_else(|| AppError::RequestNotFound(request_id.to_string()))?;

    let kind = request.kind();
    let policy = data.matching_cfg.policy(kind);

    let providers = data
        .provider_store
        .get_online_providers(kind, search_area(&request, policy))
        .await?;

    let mut trigger = trigger;
    let mut current = request;
    let mut deliveries: Vec<DeliveryOutcome> = Vec::new();

    for _ in 0..=providers.len() {
        let planned = update_with(data, current, |request| {
            Ok(plan_dispatch(
                request,
                &trigger,
                &providers,
                &data.matching_cfg,
                at,
            ))
        })
        .await?;

        let Some((written, plan)) = planned else {
            info!(tag = "[Dispatch NoOp]", request_id = %request_id, kind = %kind, trigger = ?trigger);
            return Ok(finish(kind, DispatchOutcome::NoOp));
        };

        let outcome = match plan {
            Plan::Record => DispatchOutcome::Recorded,
            Plan::GiveUp { status, skipped } => {
                deliveries.extend(
                    skipped
                        .into_iter()
                        .map(|provider_id| notifier::skip_tokenless(&written, provider_id)),
                );
                warn!(tag = "[Request Unfulfillable]", request_id = %request_id, kind = %kind, status = %status);
                DispatchOutcome::Unfulfillable { status, deliveries }
            }
            Plan::Broadcast(candidates) => {
                let dispatched_at = written.dispatched_at.unwrap_or(at);
                let sent = notifier::broadcast(
                    data.push_transport.as_ref(),
                    &written,
                    &candidates,
                    policy,
                    dispatched_at,
                )
                .await;
                info!(tag = "[Broadcast Dispatched]", request_id = %request_id, kind = %kind, candidates = candidates.len(), attempt = written.dispatch_attempts);
                deliveries.extend(sent);
                DispatchOutcome::Broadcast { deliveries }
            }
            Plan::Offer { candidate, skipped } => {
                deliveries.extend(
                    skipped
                        .into_iter()
                        .map(|provider_id| notifier::skip_tokenless(&written, provider_id)),
                );
                let dispatched_at = written.dispatched_at.unwrap_or(at);
                let delivery = notifier::deliver(
                    data.push_transport.as_ref(),
                    &written,
                    &candidate,
                    policy,
                    dispatched_at,
                )
                .await;
                let delivered = delivery.is_delivered();
                deliveries.push(delivery);

                if !delivered {
                    trigger = DispatchTrigger::Declined(candidate.provider.id);
                    current = written;
                    continue;
                }

                info!(tag = "[Cascade Offered]", request_id = %request_id, provider_id = %candidate.provider.id, distance_km = candidate.distance.0);
                DispatchOutcome::Offered {
                    provider_id: candidate.provider.id,
                    deliveries,
                }
            }
        };

        return Ok(finish(kind, outcome));
    }

    Err(AppError::InternalError(format!(
        "Cascade did not settle : RequestId - {request_id}"
    )))
}

fn finish(kind: ServiceKind, outcome: DispatchOutcome) -> DispatchOutcome {
    dispatch_outcome!(kind.to_string().as_str(), outcome.label());
    outcome
}

/// Entry point for the request-creation trigger. Safe to call any number of times.
pub async fn on_request_dispatchable(
    data: &AppState,
    request_id: &RequestId,
) -> Result<DispatchOutcome, AppError> {
    dispatch(data, request_id, DispatchTrigger::Dispatchable, now()).await
}

/// Explicit decline. Cascading requests move on to the next candidate right away; broadcast
/// requests only remember the rejection.
pub async fn on_provider_declined(
    data: &AppState,
    request_id: &RequestId,
    provider_id: &ProviderId,
) -> Result<DispatchOutcome, AppError> {
    dispatch(
        data,
        request_id,
        DispatchTrigger::Declined(provider_id.to_owned()),
        now(),
    )
    .await
}

/// First acceptance wins. A repeated acceptance by the matched provider returns the record as is.
pub async fn on_provider_accepted(
    data: &AppState,
    request_id: &RequestId,
    provider_id: &ProviderId,
) -> Result<ServiceRequest, AppError> {
    let current = data
        .request_store
        .get_request(request_id)
        .await?
        .ok_or_else(|| AppError::RequestNotFound(request_id.to_string()))?;

    let accepted = update_with(data, current, |request| {
        if request.status == RequestStatus::Matched
            && request.matched_provider.as_ref() == Some(provider_id)
        {
            return Ok(None);
        }

        let offered = match request.kind().delivery_strategy() {
            DeliveryStrategy::Broadcast => !request.has_rejected(provider_id),
            DeliveryStrategy::Cascade => request.pending_provider.as_ref() == Some(provider_id),
        };

        if request.status != RequestStatus::AwaitingResponse || !offered {
            return Err(AppError::InvalidRequestStatus(
                request.id.to_string(),
                request.status.to_string(),
            ));
        }

        let mut next = request.to_owned();
        next.status = RequestStatus::Matched;
        next.matched_provider = Some(provider_id.to_owned());
        next.pending_provider = None;
        Ok(Some((next, ())))
    })
    .await?;

    match accepted {
        Some((written, ())) => {
            info!(tag = "[Request Matched]", request_id = %request_id, provider_id = %provider_id);
            Ok(written)
        }
        None => data
            .request_store
            .get_request(request_id)
            .await?
            .ok_or_else(|| AppError::RequestNotFound(request_id.to_string())),
    }
}

/// Requester cancellation. Any in-flight dispatch sees the new status on its own compare-and-set.
pub async fn on_request_cancelled(
    data: &AppState,
    request_id: &RequestId,
) -> Result<ServiceRequest, AppError> {
    let current = data
        .request_store
        .get_request(request_id)
        .await?
        .ok_or_else(|| AppError::RequestNotFound(request_id.to_string()))?;

    let cancelled = update_with(data, current, |request| {
        if !request
            .status
            .can_transition_to(&RequestStatus::CancelledByRequester)
        {
            return Err(AppError::InvalidRequestStatus(
                request.id.to_string(),
                request.status.to_string(),
            ));
        }
        let mut next = request.to_owned();
        next.status = RequestStatus::CancelledByRequester;
        next.pending_provider = None;
        Ok(Some((next, ())))
    })
    .await?
    .map(|(written, ())| written)
    .ok_or_else(|| AppError::RequestNotFound(request_id.to_string()))?;

    info!(tag = "[Request Cancelled]", request_id = %request_id);
    Ok(cancelled)
}

/// Stores a new request in `SEARCHING` and dispatches it, as the store's creation trigger would.
pub async fn create_request(
    data: &AppState,
    request: ServiceRequest,
) -> Result<DispatchOutcome, AppError> {
    if request.status != RequestStatus::Searching {
        return Err(AppError::InvalidRequestStatus(
            request.id.to_string(),
            request.status.to_string(),
        ));
    }

    if !data.request_store.insert_request(&request).await? {
        return Err(AppError::RequestAlreadyExists(request.id.to_string()));
    }

    info!(tag = "[Request Created]", request_id = %request.id, kind = %request.kind());

    on_request_dispatchable(data, &request.id).await
}

/// Entry point for the timer facility.
pub async fn on_sweep_tick(data: &AppState) -> Result<SweepSummary, AppError> {
    sweep_stale_requests(data, now()).await
}

/// Advances every unsettled request idle past its kind's response timeout as of `at`.
/// Requests are handled independently, at most `sweep_concurrency` at a time; a failure on
/// one is counted and logged, never fatal.
pub async fn sweep_stale_requests(
    data: &AppState,
    at: TimeStamp,
) -> Result<SweepSummary, AppError> {
    let older_than = seconds_before(at, data.matching_cfg.min_response_timeout_seconds());
    let stale = data.request_store.get_unsettled_requests(older_than).await?;

    let stale_ids: Vec<RequestId> = stale.iter().map(|request| request.id.to_owned()).collect();
    let results: Vec<(RequestId, Result<DispatchOutcome, AppError>)> =
        stream::iter(stale_ids)
            .map(|request_id| async move {
                let result = dispatch(data, &request_id, DispatchTrigger::Sweep, at).await;
                (request_id, result)
            })
            .buffer_unordered(data.sweep_concurrency.max(1))
            .collect()
            .await;

    let mut summary = SweepSummary {
        scanned: stale.len(),
        ..SweepSummary::default()
    };

    for (request_id, result) in results {
        match result {
            Ok(DispatchOutcome::NoOp) => summary.skipped += 1,
            Ok(_) => {
                SWEPT_REQUESTS.inc();
                summary.advanced += 1;
            }
            Err(err) => {
                error!(tag = "[Sweep Request Failed]", request_id = %request_id, error = %err.message());
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
