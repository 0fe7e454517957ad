//! The driver's ride board: open requests, the inspected request and the
//! single active ride.
//!
//! Every remote operation is split in two. `begin_*` validates against the
//! current state and returns a plan describing the request to send;
//! `complete_*` applies the confirmed result. Nothing changes optimistically:
//! until a confirmation arrives the board shows the prior state.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_ADDRESS_CACHE_CAPACITY;
use crate::error::{AppError, AppResult, ErrorKind};
use crate::event::{RideId, UserId};
use crate::geo::Coordinate;
use crate::geocode::AddressCache;
use crate::model::FetchStatus;
use crate::ride::{Endpoint, Ride, RideAction, RideStatus, StatusPatch};
use crate::session::{Session, User};

/// A reverse-geocode the caller must perform for an inspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddressLookup {
    pub endpoint: Endpoint,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectionPlan {
    pub seq: u64,
    pub ride_id: RideId,
    pub rider_id: UserId,
    /// Endpoints not already answered by the cache.
    pub lookups: Vec<AddressLookup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub ride_id: RideId,
    pub action: RideAction,
    pub patch: StatusPatch,
}

#[derive(Debug, Clone)]
struct InFlight {
    action: RideAction,
    driver_id: Option<UserId>,
}

/// An inspection waiting on its rider profile and addresses.
#[derive(Debug)]
struct PendingInspection {
    ride: Ride,
    rider: Option<User>,
}

impl PendingInspection {
    fn is_complete(&self) -> bool {
        self.rider.is_some()
            && self.ride.pickup.address.is_some()
            && self.ride.destination.address.is_some()
    }
}

#[derive(Debug)]
pub struct RideBoard {
    open: Vec<Ride>,
    inspected: Option<Ride>,
    active: Option<Ride>,

    load_status: FetchStatus,
    load_seq: u64,

    inspection_status: FetchStatus,
    inspection_seq: u64,
    pending_inspection: Option<PendingInspection>,

    transition_status: FetchStatus,
    in_flight: HashMap<RideId, InFlight>,

    error: Option<AppError>,
    addresses: AddressCache,
}

impl Default for RideBoard {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_ADDRESS_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        )
    }
}

impl RideBoard {
    pub fn new(address_cache_capacity: NonZeroUsize) -> Self {
        Self {
            open: Vec::new(),
            inspected: None,
            active: None,
            load_status: FetchStatus::Idle,
            load_seq: 0,
            inspection_status: FetchStatus::Idle,
            inspection_seq: 0,
            pending_inspection: None,
            transition_status: FetchStatus::Idle,
            in_flight: HashMap::new(),
            error: None,
            addresses: AddressCache::new(address_cache_capacity),
        }
    }

    // --- Read access ---

    /// Pending requests in the order the server listed them.
    pub fn open_requests(&self) -> &[Ride] {
        &self.open
    }

    pub fn find_open(&self, ride_id: &RideId) -> Option<&Ride> {
        self.open.iter().find(|r| &r.id == ride_id)
    }

    pub fn inspected(&self) -> Option<&Ride> {
        self.inspected.as_ref()
    }

    pub fn active(&self) -> Option<&Ride> {
        self.active.as_ref()
    }

    pub fn load_status(&self) -> FetchStatus {
        self.load_status
    }

    pub fn inspection_status(&self) -> FetchStatus {
        self.inspection_status
    }

    pub fn transition_status(&self) -> FetchStatus {
        self.transition_status
    }

    /// The ride currently being inspected, including one still loading.
    pub fn inspecting_id(&self) -> Option<&RideId> {
        self.pending_inspection
            .as_ref()
            .map(|p| &p.ride.id)
            .or_else(|| self.inspected.as_ref().map(|r| &r.id))
    }

    pub fn in_flight_action(&self, ride_id: &RideId) -> Option<RideAction> {
        self.in_flight.get(ride_id).map(|f| f.action)
    }

    pub fn is_in_flight(&self, ride_id: &RideId) -> bool {
        self.in_flight.contains_key(ride_id)
    }

    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn resize_address_cache(&mut self, capacity: NonZeroUsize) {
        self.addresses.resize(capacity);
    }

    pub fn cached_address_count(&self) -> usize {
        self.addresses.len()
    }

    // --- Open-request set ---

    pub fn begin_load(&mut self) -> u64 {
        self.load_seq += 1;
        self.load_status = FetchStatus::Loading;
        self.error = None;
        debug!(seq = self.load_seq, "loading open requests");
        self.load_seq
    }

    /// Replaces the open set with the pending entries of `result`, never
    /// including the active ride. Returns `false` when the response belongs
    /// to a superseded load.
    pub fn complete_load(&mut self, seq: u64, result: AppResult<Vec<Ride>>) -> bool {
        if seq != self.load_seq {
            warn!(seq, latest = self.load_seq, "stale open-request load discarded");
            return false;
        }

        match result {
            Ok(rides) => {
                let total = rides.len();
                let active_id = self.active.as_ref().map(|r| r.id.clone());
                self.open = rides
                    .into_iter()
                    .filter(|r| r.status == RideStatus::Pending)
                    .filter(|r| active_id.as_ref() != Some(&r.id))
                    .collect();
                self.load_status = FetchStatus::Succeeded;
                info!(total, open = self.open.len(), "open requests loaded");
            }
            Err(error) => {
                warn!(error = %error, "loading open requests failed");
                self.load_status = FetchStatus::Failed;
                self.error = Some(error);
            }
        }
        true
    }

    // --- Inspection ---

    /// Starts enriching an open request with its rider and addresses.
    ///
    /// Addresses already on the ride or in the cache are filled in right
    /// away; invalid coordinates resolve to `""` without a lookup.
    pub fn begin_inspection(&mut self, ride_id: &RideId) -> AppResult<InspectionPlan> {
        let Some(source) = self.find_open(ride_id) else {
            let error = AppError::not_found("Ride request", ride_id.as_str());
            warn!(ride_id = %ride_id, "inspection of unknown request rejected");
            self.error = Some(error.clone());
            return Err(error);
        };
        let mut ride = source.clone();

        self.inspection_seq += 1;
        self.inspection_status = FetchStatus::Loading;
        self.error = None;

        let mut lookups = Vec::with_capacity(2);
        for endpoint in [Endpoint::Pickup, Endpoint::Destination] {
            let location = ride.location_mut(endpoint);
            if location.address.as_deref().is_some_and(|a| !a.is_empty()) {
                continue;
            }
            match location.coordinate() {
                Ok(coordinate) => match self.addresses.get(coordinate) {
                    Some(cached) => {
                        debug!(ride_id = %ride_id, ?endpoint, "address cache hit");
                        location.address = Some(cached);
                    }
                    None => {
                        location.address = None;
                        lookups.push(AddressLookup {
                            endpoint,
                            coordinate,
                        });
                    }
                },
                Err(e) => {
                    warn!(ride_id = %ride_id, ?endpoint, error = %e, "unusable coordinate, no address");
                    location.address = Some(String::new());
                }
            }
        }

        let plan = InspectionPlan {
            seq: self.inspection_seq,
            ride_id: ride.id.clone(),
            rider_id: ride.rider_id.clone(),
            lookups,
        };
        debug!(ride_id = %ride_id, seq = plan.seq, lookups = plan.lookups.len(), "inspection started");

        self.pending_inspection = Some(PendingInspection { ride, rider: None });
        Ok(plan)
    }

    /// Applies the rider profile fetch. A failure fails the whole inspection.
    pub fn complete_rider(&mut self, seq: u64, result: AppResult<User>) -> bool {
        if !self.is_current_inspection(seq) {
            return false;
        }

        match result {
            Ok(user) => {
                if let Some(pending) = self.pending_inspection.as_mut() {
                    pending.rider = Some(user);
                }
                self.finish_inspection_if_ready();
            }
            Err(error) => {
                warn!(seq, error = %error, "rider profile fetch failed, inspection abandoned");
                self.pending_inspection = None;
                self.inspection_status = FetchStatus::Failed;
                self.error = Some(error);
            }
        }
        true
    }

    /// Applies one reverse-geocode result. Failures degrade to `""`.
    pub fn complete_address(
        &mut self,
        seq: u64,
        endpoint: Endpoint,
        result: AppResult<String>,
    ) -> bool {
        if !self.is_current_inspection(seq) {
            return false;
        }
        let Some(pending) = self.pending_inspection.as_mut() else {
            return false;
        };

        let location = pending.ride.location_mut(endpoint);
        let address = match result {
            Ok(address) => {
                if let Ok(coordinate) = location.coordinate() {
                    self.addresses.insert(coordinate, &address);
                }
                address
            }
            Err(error) => {
                warn!(seq, ?endpoint, error = %error, "reverse geocoding failed, using empty address");
                String::new()
            }
        };
        location.address = Some(address);

        self.finish_inspection_if_ready();
        true
    }

    /// Drops the inspected request. Late results for it are ignored.
    pub fn clear_inspection(&mut self) {
        self.inspection_seq += 1;
        self.inspected = None;
        self.pending_inspection = None;
        self.inspection_status = FetchStatus::Idle;
        debug!(seq = self.inspection_seq, "inspection cleared");
    }

    fn is_current_inspection(&self, seq: u64) -> bool {
        if seq == self.inspection_seq && self.pending_inspection.is_some() {
            return true;
        }
        debug!(seq, latest = self.inspection_seq, "stale inspection result discarded");
        false
    }

    fn finish_inspection_if_ready(&mut self) {
        if !self
            .pending_inspection
            .as_ref()
            .is_some_and(PendingInspection::is_complete)
        {
            return;
        }
        if let Some(PendingInspection { mut ride, rider }) = self.pending_inspection.take() {
            ride.rider = rider;
            info!(ride_id = %ride.id, "inspection complete");
            self.inspected = Some(ride);
            self.inspection_status = FetchStatus::Succeeded;
        }
    }

    // --- Lifecycle transitions ---

    /// Validates a transition and marks it in flight.
    ///
    /// Rejections other than a duplicate in-flight attempt are recorded as
    /// the board's error.
    pub fn begin_transition(
        &mut self,
        ride_id: &RideId,
        action: RideAction,
        session: &Session,
    ) -> AppResult<TransitionPlan> {
        if let Some(pending) = self.in_flight.get(ride_id) {
            warn!(ride_id = %ride_id, ?action, pending = ?pending.action, "transition already in flight");
            return Err(AppError::new(
                ErrorKind::TransitionInFlight,
                format!("ride {ride_id} is already being updated"),
            )
            .with_context("ride_id", ride_id.to_string()));
        }

        let driver_id = match self.validate_transition(ride_id, action, session) {
            Ok(driver_id) => driver_id,
            Err(error) => {
                warn!(ride_id = %ride_id, ?action, error = %error, "transition rejected");
                if error.kind != ErrorKind::TransitionInFlight {
                    self.transition_status = FetchStatus::Failed;
                    self.error = Some(error.clone());
                }
                return Err(error);
            }
        };

        let patch = StatusPatch {
            status: action.target_status(),
            driver_id: driver_id.clone(),
        };
        self.in_flight.insert(
            ride_id.clone(),
            InFlight {
                action,
                driver_id,
            },
        );
        self.transition_status = FetchStatus::Loading;
        self.error = None;
        debug!(ride_id = %ride_id, ?action, "transition requested");

        Ok(TransitionPlan {
            ride_id: ride_id.clone(),
            action,
            patch,
        })
    }

    fn validate_transition(
        &self,
        ride_id: &RideId,
        action: RideAction,
        session: &Session,
    ) -> AppResult<Option<UserId>> {
        if action.acts_on_open_request() {
            let open = self
                .find_open(ride_id)
                .filter(|r| r.status == RideStatus::Pending)
                .ok_or_else(|| AppError::not_found("Ride request", ride_id.as_str()))?;

            if action != RideAction::Accept {
                open.status.apply(action)?;
                return Ok(None);
            }

            let driver_id = session.driver_id()?;
            if let Some(active) = &self.active {
                return Err(AppError::new(
                    ErrorKind::ActiveRideExists,
                    format!("ride {} is still in progress", active.id),
                )
                .with_context("active_ride_id", active.id.to_string()));
            }
            if let Some((other, _)) = self
                .in_flight
                .iter()
                .find(|(_, f)| f.action == RideAction::Accept)
            {
                return Err(AppError::new(
                    ErrorKind::TransitionInFlight,
                    format!("accept of ride {other} is still pending"),
                )
                .with_context("ride_id", other.to_string()));
            }
            return Ok(Some(driver_id));
        }

        let driver_id = session.driver_id()?;
        let active = self
            .active
            .as_ref()
            .filter(|r| &r.id == ride_id)
            .filter(|r| r.driver_id.as_ref() == Some(&driver_id))
            .ok_or_else(|| AppError::not_found("Active ride", ride_id.as_str()))?;
        active.status.apply(action)?;
        Ok(None)
    }

    /// Applies the server's answer to an in-flight transition.
    ///
    /// Only `status` (and `driver_id` on accept) change on the local copy.
    /// A confirmation reporting any other status is a conflict and leaves
    /// the board as it was. Returns `Ok(false)` when no matching request is
    /// in flight, e.g. after the board was reset by a new login.
    pub fn complete_transition(
        &mut self,
        ride_id: &RideId,
        action: RideAction,
        result: AppResult<Ride>,
    ) -> AppResult<bool> {
        let in_flight = match self.in_flight.remove(ride_id) {
            Some(f) if f.action == action => f,
            other => {
                if let Some(f) = other {
                    self.in_flight.insert(ride_id.clone(), f);
                }
                debug!(ride_id = %ride_id, ?action, "confirmation without matching request ignored");
                return Ok(false);
            }
        };

        let outcome = result.and_then(|confirmed| {
            let expected = action.target_status();
            if confirmed.status == expected {
                Ok(confirmed)
            } else {
                Err(AppError::new(
                    ErrorKind::Conflict,
                    format!(
                        "ride {ride_id} is {} on the server, expected {expected}",
                        confirmed.status
                    ),
                )
                .with_context("ride_id", ride_id.to_string()))
            }
        });

        let confirmed = match outcome {
            Ok(confirmed) => confirmed,
            Err(error) => {
                warn!(ride_id = %ride_id, ?action, error = %error, "transition failed, state unchanged");
                self.transition_status = FetchStatus::Failed;
                self.error = Some(error.clone());
                return Err(error);
            }
        };

        match action {
            RideAction::Accept => {
                let mut ride = self
                    .inspected
                    .as_ref()
                    .filter(|r| &r.id == ride_id)
                    .cloned()
                    .or_else(|| self.find_open(ride_id).cloned())
                    .unwrap_or_else(|| confirmed.clone());
                ride.status = confirmed.status;
                ride.driver_id = confirmed.driver_id.clone().or(in_flight.driver_id);
                if ride.rider.is_none() {
                    ride.rider = confirmed.rider;
                }
                self.open.retain(|r| &r.id != ride_id);
                self.active = Some(ride);
            }
            RideAction::Decline => {
                self.open.retain(|r| &r.id != ride_id);
            }
            RideAction::Start | RideAction::PickUp => {
                match self
                    .active
                    .as_mut()
                    .filter(|r| &r.id == ride_id && r.status.can_transition_to(confirmed.status))
                {
                    Some(active) => active.status = confirmed.status,
                    None => warn!(ride_id = %ride_id, ?action, "confirmed ride is no longer active"),
                }
            }
            RideAction::DropOff => {
                if self.active.as_ref().is_some_and(|r| &r.id == ride_id) {
                    self.active = None;
                }
            }
        }

        self.transition_status = if self.in_flight.is_empty() {
            FetchStatus::Succeeded
        } else {
            FetchStatus::Loading
        };
        info!(ride_id = %ride_id, ?action, status = %confirmed.status, "transition confirmed");
        Ok(true)
    }

    // --- Identity ---

    /// Forgets everything tied to the previous identity: the open set, the
    /// inspection, the active ride and pending transitions. Responses still
    /// in flight are discarded when they arrive. The address cache is kept.
    pub fn reset_for_new_identity(&mut self) {
        self.load_seq += 1;
        self.inspection_seq += 1;
        self.open.clear();
        self.inspected = None;
        self.pending_inspection = None;
        self.active = None;
        self.in_flight.clear();
        self.load_status = FetchStatus::Idle;
        self.inspection_status = FetchStatus::Idle;
        self.transition_status = FetchStatus::Idle;
        self.error = None;
        info!("ride board reset for new identity");
    }
}
