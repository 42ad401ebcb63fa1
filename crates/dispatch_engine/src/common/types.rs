/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumString};

#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct RequestId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ProviderId(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, Eq, PartialEq)]
pub struct PushToken(pub String);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Latitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
pub struct Longitude(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, PartialOrd, Copy)]
pub struct Radius(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, PartialOrd, Copy)]
pub struct Kilometers(pub f64);
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, PartialOrd, Copy)]
pub struct Minutes(pub f64);
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Hash, Ord)]
pub struct TimeStamp(pub DateTime<Utc>);

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Copy)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    pub lat: Latitude,
    pub lon: Longitude,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(
    Debug, Clone, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq, Copy,
)]
pub enum ServiceKind {
    #[strum(serialize = "RIDE")]
    #[serde(rename = "RIDE")]
    Ride,
    #[strum(serialize = "ROADSIDE_JOB")]
    #[serde(rename = "ROADSIDE_JOB")]
    RoadsideJob,
    #[strum(serialize = "EMERGENCY_CASE")]
    #[serde(rename = "EMERGENCY_CASE")]
    EmergencyCase,
}

/// How a request kind reaches its candidates.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeliveryStrategy {
    /// Every candidate at once, first acceptance wins.
    Broadcast,
    /// One candidate at a time, nearest first.
    Cascade,
}

impl ServiceKind {
    pub fn delivery_strategy(&self) -> DeliveryStrategy {
        match self {
            ServiceKind::Ride | ServiceKind::RoadsideJob => DeliveryStrategy::Broadcast,
            ServiceKind::EmergencyCase => DeliveryStrategy::Cascade,
        }
    }
}

#[derive(Debug, Clone, EnumString, Display, Serialize, Deserialize, Eq, Hash, PartialEq, Copy)]
pub enum RequestStatus {
    #[strum(serialize = "SEARCHING")]
    #[serde(rename = "SEARCHING")]
    Searching,
    #[strum(serialize = "AWAITING_RESPONSE")]
    #[serde(rename = "AWAITING_RESPONSE")]
    AwaitingResponse,
    #[strum(serialize = "MATCHED")]
    #[serde(rename = "MATCHED")]
    Matched,
    #[strum(serialize = "IN_PROGRESS")]
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[strum(serialize = "COMPLETED")]
    #[serde(rename = "COMPLETED")]
    Completed,
    #[strum(serialize = "CANCELLED_BY_REQUESTER")]
    #[serde(rename = "CANCELLED_BY_REQUESTER")]
    CancelledByRequester,
    #[strum(serialize = "NO_PROVIDERS_AVAILABLE")]
    #[serde(rename = "NO_PROVIDERS_AVAILABLE")]
    NoProvidersAvailable,
    #[strum(serialize = "NO_MECHANICS_AVAILABLE")]
    #[serde(rename = "NO_MECHANICS_AVAILABLE")]
    NoMechanicsAvailable,
    #[strum(serialize = "ALL_PARTNERS_BUSY")]
    #[serde(rename = "ALL_PARTNERS_BUSY")]
    AllPartnersBusy,
}

impl RequestStatus {
    /// Statuses the sweeper keeps an eye on.
    pub fn is_unsettled(&self) -> bool {
        matches!(
            self,
            RequestStatus::Searching | RequestStatus::AwaitingResponse
        )
    }

    /// Forward-only state machine. `AwaitingResponse -> AwaitingResponse` covers a
    /// cascade moving to its next candidate or a broadcast being re-sent by the sweeper.
    pub fn can_transition_to(&self, next: &RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Searching, AwaitingResponse) => true,
            (AwaitingResponse, AwaitingResponse) => true,
            (Searching | AwaitingResponse, Matched) => true,
            (Matched, InProgress) => true,
            (InProgress, Completed) => true,
            (
                Searching | AwaitingResponse,
                NoProvidersAvailable | NoMechanicsAvailable | AllPartnersBusy,
            ) => true,
            (Searching | AwaitingResponse | Matched, CancelledByRequester) => true,
            _ => false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestDetails {
    #[serde(rename_all = "camelCase")]
    Ride {
        vehicle_class: String,
        #[serde(default)]
        gender_restricted: bool,
    },
    #[serde(rename_all = "camelCase")]
    RoadsideJob {
        #[serde(default)]
        service_categories: Vec<String>,
    },
    EmergencyCase,
}

impl RequestDetails {
    pub fn kind(&self) -> ServiceKind {
        match self {
            RequestDetails::Ride { .. } => ServiceKind::Ride,
            RequestDetails::RoadsideJob { .. } => ServiceKind::RoadsideJob,
            RequestDetails::EmergencyCase => ServiceKind::EmergencyCase,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: RequestId,
    pub origin: Point,
    pub details: RequestDetails,
    pub status: RequestStatus,
    #[serde(default)]
    rejected_by: BTreeSet<ProviderId>,
    pub pending_provider: Option<ProviderId>,
    pub matched_provider: Option<ProviderId>,
    pub dispatched_at: Option<TimeStamp>,
    #[serde(default)]
    pub dispatch_attempts: u32,
    pub created_at: TimeStamp,
    #[serde(default)]
    pub version: u64,
}

impl ServiceRequest {
    pub fn new(id: RequestId, origin: Point, details: RequestDetails, created_at: TimeStamp) -> Self {
        ServiceRequest {
            id,
            origin,
            details,
            status: RequestStatus::Searching,
            rejected_by: BTreeSet::new(),
            pending_provider: None,
            matched_provider: None,
            dispatched_at: None,
            dispatch_attempts: 0,
            created_at,
            version: 0,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.details.kind()
    }

    pub fn rejected_by(&self) -> &BTreeSet<ProviderId> {
        &self.rejected_by
    }

    pub fn has_rejected(&self, provider_id: &ProviderId) -> bool {
        self.rejected_by.contains(provider_id)
    }

    /// Append-only. Entries are never removed once added.
    pub fn reject(&mut self, provider_id: ProviderId) {
        if self.pending_provider.as_ref() == Some(&provider_id) {
            self.pending_provider = None;
        }
        self.rejected_by.insert(provider_id);
    }

    /// Reference point for staleness: the last dispatch, or creation if never dispatched.
    pub fn last_activity_at(&self) -> TimeStamp {
        self.dispatched_at.unwrap_or(self.created_at)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capabilities {
    #[serde(rename_all = "camelCase")]
    Driver {
        vehicle_class: String,
        #[serde(default)]
        gender_restricted: bool,
    },
    #[serde(rename_all = "camelCase")]
    Mechanic {
        #[serde(default)]
        service_categories: Vec<String>,
    },
    Facility,
}

impl Capabilities {
    pub fn kind(&self) -> ServiceKind {
        match self {
            Capabilities::Driver { .. } => ServiceKind::Ride,
            Capabilities::Mechanic { .. } => ServiceKind::RoadsideJob,
            Capabilities::Facility => ServiceKind::EmergencyCase,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: ProviderId,
    pub online: bool,
    pub location: Option<Point>,
    pub capabilities: Capabilities,
    pub push_token: Option<PushToken>,
}

impl Provider {
    pub fn kind(&self) -> ServiceKind {
        self.capabilities.kind()
    }
}

/// A provider that passed eligibility, with its distance from the request origin.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub provider: Provider,
    pub distance: Kilometers,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub request_id: RequestId,
    pub kind: ServiceKind,
    pub origin: Point,
    pub details: RequestDetails,
    pub distance_km: Kilometers,
    pub eta_minutes: Minutes,
    pub dispatched_at: TimeStamp,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryOutcome {
    #[serde(rename_all = "camelCase")]
    Delivered { provider_id: ProviderId },
    #[serde(rename_all = "camelCase")]
    SkippedNoToken { provider_id: ProviderId },
    #[serde(rename_all = "camelCase")]
    Failed { provider_id: ProviderId, reason: String },
}

impl DeliveryOutcome {
    pub fn provider_id(&self) -> &ProviderId {
        match self {
            DeliveryOutcome::Delivered { provider_id }
            | DeliveryOutcome::SkippedNoToken { provider_id }
            | DeliveryOutcome::Failed { provider_id, .. } => provider_id,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered { .. } => "delivered",
            DeliveryOutcome::SkippedNoToken { .. } => "skipped_no_token",
            DeliveryOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchOutcome {
    /// The request was not in the state this trigger expects; nothing happened.
    NoOp,
    #[serde(rename_all = "camelCase")]
    Broadcast { deliveries: Vec<DeliveryOutcome> },
    #[serde(rename_all = "camelCase")]
    Offered {
        provider_id: ProviderId,
        deliveries: Vec<DeliveryOutcome>,
    },
    #[serde(rename_all = "camelCase")]
    Unfulfillable {
        status: RequestStatus,
        deliveries: Vec<DeliveryOutcome>,
    },
    /// Bookkeeping was written but nobody needed to be notified.
    Recorded,
}

impl DispatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::NoOp => "noop",
            DispatchOutcome::Broadcast { .. } => "broadcast",
            DispatchOutcome::Offered { .. } => "offered",
            DispatchOutcome::Unfulfillable { .. } => "unfulfillable",
            DispatchOutcome::Recorded => "recorded",
        }
    }

    pub fn deliveries(&self) -> &[DeliveryOutcome] {
        match self {
            DispatchOutcome::Broadcast { deliveries }
            | DispatchOutcome::Offered { deliveries, .. }
            | DispatchOutcome::Unfulfillable { deliveries, .. } => deliveries,
            DispatchOutcome::NoOp | DispatchOutcome::Recorded => &[],
        }
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub scanned: usize,
    pub advanced: usize,
    pub skipped: usize,
    pub failed: usize,
}
