/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use crate::fixtures::*;
use chrono::Duration;
use dispatch_engine::{
    common::{types::*, utils::now},
    domain::action::internal::dispatch::*,
};
use std::sync::Arc;

fn minutes_after(TimeStamp(at): TimeStamp, minutes: i64) -> TimeStamp {
    TimeStamp(at + Duration::minutes(minutes))
}

#[tokio::test]
async fn test_fresh_requests_are_left_alone() {
    let harness = Harness::new(vec![facility("h3", 3.0)]).await;
    let request_id = harness
        .submit("case-1", RequestDetails::EmergencyCase)
        .await;
    on_request_dispatchable(&harness.data, &request_id)
        .await
        .expect("dispatch");

    let summary = sweep_stale_requests(&harness.data, now())
        .await
        .expect("sweep");

    assert_eq!(summary, SweepSummary::default());
    assert_eq!(
        harness.request(&request_id).await.pending_provider,
        Some(provider_id("h3"))
    );
}

#[tokio::test]
async fn test_broadcast_is_retried_once_then_given_up() {
    let harness = Harness::new(vec![driver("d1", 1.0, "Sedan")]).await;
    let request_id = harness.submit("ride-1", ride("Sedan")).await;
    on_request_dispatchable(&harness.data, &request_id)
        .await
        .expect("dispatch");

    // Supply changes before the retry.
    harness
        .providers
        .upsert_provider(driver("d2", 3.0, "Sedan"))
        .await;

    let first_sweep_at = minutes_after(harness.request(&request_id).await.last_activity_at(), 5);
    let summary = sweep_stale_requests(&harness.data, first_sweep_at)
        .await
        .expect("first sweep");
    assert_eq!(summary.advanced, 1);

    let request = harness.request(&request_id).await;
    assert_eq!(request.status, RequestStatus::AwaitingResponse);
    assert_eq!(request.dispatch_attempts, 2);
    assert_eq!(
        harness.push.recipients(),
        vec![token("d1"), token("d1"), token("d2")]
    );

    let second_sweep_at = minutes_after(first_sweep_at, 5);
    sweep_stale_requests(&harness.data, second_sweep_at)
        .await
        .expect("second sweep");

    assert_eq!(
        harness.request(&request_id).await.status,
        RequestStatus::NoProvidersAvailable
    );
    assert_eq!(harness.push.attempts().len(), 3);
}

#[tokio::test]
async fn test_roadside_job_gives_up_as_no_mechanics() {
    let harness = Harness::new(vec![mechanic("m1", 2.0)]).await;
    let request_id = harness.submit("job-1", roadside_job()).await;
    on_request_dispatchable(&harness.data, &request_id)
        .await
        .expect("dispatch");

    harness
        .providers
        .set_online(&provider_id("m1"), false)
        .await;

    let at = minutes_after(harness.request(&request_id).await.last_activity_at(), 10);
    sweep_stale_requests(&harness.data, at)
        .await
        .expect("sweep");

    assert_eq!(
        harness.request(&request_id).await.status,
        RequestStatus::NoMechanicsAvailable
    );
}

#[tokio::test]
async fn test_lost_trigger_is_recovered() {
    let harness = Harness::new(vec![driver("d1", 1.0, "Sedan")]).await;
    let request_id = harness.submit("ride-1", ride("Sedan")).await;

    let at = minutes_after(harness.request(&request_id).await.created_at, 5);
    let summary = sweep_stale_requests(&harness.data, at)
        .await
        .expect("sweep");

    assert_eq!(summary.scanned, 1);
    assert_eq!(summary.advanced, 1);
    assert_eq!(harness.push.recipients(), vec![token("d1")]);
    assert_eq!(
        harness.request(&request_id).await.status,
        RequestStatus::AwaitingResponse
    );
}

#[tokio::test]
async fn test_last_emergency_partner_timing_out_is_all_partners_busy() {
    let harness = Harness::new(vec![facility("h3", 3.0)]).await;
    let request_id = harness
        .submit("case-1", RequestDetails::EmergencyCase)
        .await;
    on_request_dispatchable(&harness.data, &request_id)
        .await
        .expect("dispatch");

    let at = minutes_after(harness.request(&request_id).await.last_activity_at(), 5);
    sweep_stale_requests(&harness.data, at)
        .await
        .expect("sweep");

    let request = harness.request(&request_id).await;
    assert_eq!(request.status, RequestStatus::AllPartnersBusy);
    assert!(request.has_rejected(&provider_id("h3")));
    assert_eq!(request.pending_provider, None);

    let later = sweep_stale_requests(&harness.data, minutes_after(at, 5))
        .await
        .expect("sweep after give up");
    assert_eq!(later.scanned, 0);
}

#[tokio::test]
async fn test_sweep_handles_requests_independently() {
    let harness = Harness::new(vec![
        facility("h3", 3.0),
        facility("h5", 5.0),
        driver("d1", 1.0, "Sedan"),
    ])
    .await;
    let case_id = harness
        .submit("case-1", RequestDetails::EmergencyCase)
        .await;
    let ride_id = harness.submit("ride-1", ride("Sedan")).await;
    let cancelled_id = harness.submit("ride-2", ride("Sedan")).await;
    on_request_dispatchable(&harness.data, &case_id)
        .await
        .expect("dispatch case");
    on_request_cancelled(&harness.data, &cancelled_id)
        .await
        .expect("cancel");

    let summary = sweep_stale_requests(&harness.data, minutes_after(now(), 5))
        .await
        .expect("sweep");

    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.advanced, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        harness.request(&case_id).await.pending_provider,
        Some(provider_id("h5"))
    );
    assert_eq!(
        harness.request(&ride_id).await.status,
        RequestStatus::AwaitingResponse
    );
    assert_eq!(
        harness.request(&cancelled_id).await.status,
        RequestStatus::CancelledByRequester
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sweeps_advance_a_cascade_once() {
    let (harness, store) =
        Harness::contended(vec![facility("h3", 3.0), facility("h5", 5.0)], 2).await;
    let case_id = harness
        .submit("case-1", RequestDetails::EmergencyCase)
        .await;
    on_request_dispatchable(&harness.data, &case_id)
        .await
        .expect("dispatch");

    let at = minutes_after(harness.request(&case_id).await.last_activity_at(), 5);
    let data = Arc::new(harness.data.clone());
    store.arm();

    let sweeps: Vec<_> = (0..2)
        .map(|_| {
            let data = data.clone();
            tokio::spawn(async move { sweep_stale_requests(&data, at).await })
        })
        .collect();

    let mut advanced = 0;
    let mut skipped = 0;
    for sweep in sweeps {
        let summary = sweep.await.expect("sweep task").expect("sweep");
        assert_eq!(summary.scanned, 1);
        advanced += summary.advanced;
        skipped += summary.skipped;
    }

    assert_eq!(advanced, 1);
    assert_eq!(skipped, 1);
    assert_eq!(store.conflicts(), 1);
    assert_eq!(harness.push.recipients(), vec![token("h3"), token("h5")]);

    let request = harness.request(&case_id).await;
    assert_eq!(request.pending_provider, Some(provider_id("h5")));
    assert!(request.has_rejected(&provider_id("h3")));
    assert!(!request.has_rejected(&provider_id("h5")));
}

#[tokio::test]
async fn test_sweep_limits_concurrent_dispatches() {
    let (mut harness, store) = Harness::contended(vec![driver("d1", 1.0, "Sedan")], 0).await;
    harness.data.sweep_concurrency = 2;

    let mut request_ids = Vec::new();
    for n in 0..5 {
        request_ids.push(harness.submit(&format!("ride-{n}"), ride("Sedan")).await);
    }

    let summary = sweep_stale_requests(&harness.data, minutes_after(now(), 5))
        .await
        .expect("sweep");

    assert_eq!(summary.scanned, 5);
    assert_eq!(summary.advanced, 5);
    assert!(store.peak_reads_in_flight() <= 2);
    for request_id in request_ids {
        assert_eq!(
            harness.request(&request_id).await.status,
            RequestStatus::AwaitingResponse
        );
    }
}
