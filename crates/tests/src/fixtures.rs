/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use async_trait::async_trait;
use dispatch_engine::{
    common::{types::*, utils::now},
    environment::{AppState, MatchingConfig},
    outbound::push::PushTransport,
    storage::{
        memory::{InMemoryProviderStore, InMemoryRequestStore},
        RequestStore,
    },
    tools::error::AppError,
};
use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use tokio::sync::Barrier;

pub const ORIGIN: Point = Point {
    lat: Latitude(28.60),
    lon: Longitude(77.20),
};

/// Length of one degree of latitude on the haversine sphere.
const KM_PER_DEGREE: f64 = 6371.0 * std::f64::consts::PI / 180.0;

/// A point `km` due north of `ORIGIN`; its haversine distance from `ORIGIN` is `km`.
pub fn north_of_origin(km: f64) -> Point {
    let Latitude(lat) = ORIGIN.lat;
    Point {
        lat: Latitude(lat + km / KM_PER_DEGREE),
        lon: ORIGIN.lon,
    }
}

fn provider(id: &str, km: f64, capabilities: Capabilities) -> Provider {
    Provider {
        id: ProviderId(id.to_string()),
        online: true,
        location: Some(north_of_origin(km)),
        capabilities,
        push_token: Some(PushToken(format!("token-{id}"))),
    }
}

pub fn driver(id: &str, km: f64, vehicle_class: &str) -> Provider {
    provider(
        id,
        km,
        Capabilities::Driver {
            vehicle_class: vehicle_class.to_string(),
            gender_restricted: false,
        },
    )
}

pub fn mechanic(id: &str, km: f64) -> Provider {
    provider(
        id,
        km,
        Capabilities::Mechanic {
            service_categories: vec!["TOWING".to_string()],
        },
    )
}

pub fn facility(id: &str, km: f64) -> Provider {
    provider(id, km, Capabilities::Facility)
}

pub fn tokenless(mut provider: Provider) -> Provider {
    provider.push_token = None;
    provider
}

pub fn offline(mut provider: Provider) -> Provider {
    provider.online = false;
    provider
}

pub fn ride(vehicle_class: &str) -> RequestDetails {
    RequestDetails::Ride {
        vehicle_class: vehicle_class.to_string(),
        gender_restricted: false,
    }
}

pub fn roadside_job() -> RequestDetails {
    RequestDetails::RoadsideJob {
        service_categories: vec!["TOWING".to_string()],
    }
}

pub fn request_id(id: &str) -> RequestId {
    RequestId(id.to_string())
}

pub fn provider_id(id: &str) -> ProviderId {
    ProviderId(id.to_string())
}

pub fn token(id: &str) -> String {
    format!("token-{id}")
}

/// Push transport that records every attempt and fails for chosen tokens.
#[derive(Default)]
pub struct RecordingPushTransport {
    attempts: Mutex<Vec<(PushToken, DispatchPayload)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingPushTransport {
    pub fn fail_for(&self, token: String) {
        self.failing.lock().unwrap().insert(token);
    }

    pub fn attempts(&self) -> Vec<(PushToken, DispatchPayload)> {
        self.attempts.lock().unwrap().clone()
    }

    /// Tokens that were sent to, in attempt order.
    pub fn recipients(&self) -> Vec<String> {
        self.attempts()
            .into_iter()
            .map(|(PushToken(token), _)| token)
            .collect()
    }
}

#[async_trait]
impl PushTransport for RecordingPushTransport {
    async fn send(&self, token: &PushToken, payload: &DispatchPayload) -> Result<(), AppError> {
        self.attempts
            .lock()
            .unwrap()
            .push((token.to_owned(), payload.to_owned()));

        if self.failing.lock().unwrap().contains(&token.0) {
            return Err(AppError::PushDeliveryFailed(format!(
                "Unregistered token {}",
                token.0
            )));
        }
        Ok(())
    }
}

/// Request store that lets concurrent dispatches interleave. Once armed, the first `readers`
/// reads wait for each other, so every one of them plans against the same version; writes
/// yield before they land. Counts lost compare-and-sets and the peak of overlapping reads.
pub struct ContendedRequestStore {
    inner: Arc<InMemoryRequestStore>,
    readers: usize,
    gate: Barrier,
    armed: AtomicBool,
    gated_reads: AtomicUsize,
    reads_in_flight: AtomicUsize,
    peak_reads_in_flight: AtomicUsize,
    conflicts: AtomicUsize,
}

impl ContendedRequestStore {
    pub fn new(inner: Arc<InMemoryRequestStore>, readers: usize) -> Self {
        ContendedRequestStore {
            inner,
            readers,
            gate: Barrier::new(readers.max(1)),
            armed: AtomicBool::new(false),
            gated_reads: AtomicUsize::new(0),
            reads_in_flight: AtomicUsize::new(0),
            peak_reads_in_flight: AtomicUsize::new(0),
            conflicts: AtomicUsize::new(0),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }

    pub fn peak_reads_in_flight(&self) -> usize {
        self.peak_reads_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestStore for ContendedRequestStore {
    async fn get_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<ServiceRequest>, AppError> {
        let in_flight = self.reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_reads_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let read = self.inner.get_request(request_id).await;

        if self.armed.load(Ordering::SeqCst)
            && self.gated_reads.fetch_add(1, Ordering::SeqCst) < self.readers
        {
            self.gate.wait().await;
        }
        tokio::task::yield_now().await;

        self.reads_in_flight.fetch_sub(1, Ordering::SeqCst);
        read
    }

    async fn insert_request(&self, request: &ServiceRequest) -> Result<bool, AppError> {
        self.inner.insert_request(request).await
    }

    async fn compare_and_set(
        &self,
        expected_version: u64,
        updated: &ServiceRequest,
    ) -> Result<Option<ServiceRequest>, AppError> {
        tokio::task::yield_now().await;
        let written = self.inner.compare_and_set(expected_version, updated).await?;
        if written.is_none() {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(written)
    }

    async fn get_unsettled_requests(
        &self,
        older_than: TimeStamp,
    ) -> Result<Vec<ServiceRequest>, AppError> {
        self.inner.get_unsettled_requests(older_than).await
    }
}

pub struct Harness {
    pub data: AppState,
    pub requests: Arc<InMemoryRequestStore>,
    pub providers: Arc<InMemoryProviderStore>,
    pub push: Arc<RecordingPushTransport>,
}

impl Harness {
    pub async fn new(providers: Vec<Provider>) -> Self {
        Self::with_config(providers, MatchingConfig::default()).await
    }

    pub async fn with_config(providers: Vec<Provider>, matching_cfg: MatchingConfig) -> Self {
        let requests = Arc::new(InMemoryRequestStore::new());
        Self::build(providers, matching_cfg, requests.clone(), requests).await
    }

    /// Same as `new`, but dispatches go through a `ContendedRequestStore` gating `readers` reads.
    pub async fn contended(
        providers: Vec<Provider>,
        readers: usize,
    ) -> (Self, Arc<ContendedRequestStore>) {
        let requests = Arc::new(InMemoryRequestStore::new());
        let contended = Arc::new(ContendedRequestStore::new(requests.clone(), readers));
        let harness = Self::build(
            providers,
            MatchingConfig::default(),
            requests,
            contended.clone(),
        )
        .await;
        (harness, contended)
    }

    async fn build(
        providers: Vec<Provider>,
        matching_cfg: MatchingConfig,
        requests: Arc<InMemoryRequestStore>,
        request_store: Arc<dyn RequestStore>,
    ) -> Self {
        let provider_store = Arc::new(InMemoryProviderStore::new());
        let push = Arc::new(RecordingPushTransport::default());

        for provider in providers {
            provider_store.upsert_provider(provider).await;
        }

        let data = AppState::with_collaborators(
            request_store,
            provider_store.clone(),
            push.clone(),
            matching_cfg,
        );

        Harness {
            data,
            requests,
            providers: provider_store,
            push,
        }
    }

    /// Stores a `SEARCHING` request at `ORIGIN` without dispatching it.
    pub async fn submit(&self, id: &str, details: RequestDetails) -> RequestId {
        let request = ServiceRequest::new(request_id(id), ORIGIN, details, now());
        let inserted = self
            .requests
            .insert_request(&request)
            .await
            .expect("insert request");
        assert!(inserted);
        request.id
    }

    pub async fn request(&self, request_id: &RequestId) -> ServiceRequest {
        self.requests
            .get_request(request_id)
            .await
            .expect("read request")
            .expect("request exists")
    }
}

pub fn delivered_to(outcome: &DispatchOutcome) -> Vec<ProviderId> {
    outcome
        .deliveries()
        .iter()
        .filter(|delivery| delivery.is_delivered())
        .map(|delivery| delivery.provider_id().to_owned())
        .collect()
}
