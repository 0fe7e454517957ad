//! Ride requests and their lifecycle state machine.
//!
//! ```text
//! pending --accept--> accepted --start--> started --pick_up--> picked-up --drop_off--> dropped-off*
//!    \--decline--> declined*
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::{AppError, ErrorKind};
use crate::event::{RideId, UserId};
use crate::geo::{Coordinate, InvalidCoordinate};
use crate::session::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Resolved lazily when the request is inspected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            address: None,
        }
    }

    pub fn coordinate(&self) -> Result<Coordinate, InvalidCoordinate> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Pickup,
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RideStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Started,
    PickedUp,
    DroppedOff,
}

impl RideStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Accepted,
        Self::Declined,
        Self::Started,
        Self::PickedUp,
        Self::DroppedOff,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Started => "started",
            Self::PickedUp => "picked-up",
            Self::DroppedOff => "dropped-off",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
            Self::Started => "On the way",
            Self::PickedUp => "Picked up",
            Self::DroppedOff => "Dropped off",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Declined | Self::DroppedOff)
    }

    /// Statuses that occupy the driver's single active slot.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Accepted | Self::Started | Self::PickedUp)
    }

    /// Actions the presentation may offer, in button order.
    #[must_use]
    pub const fn available_actions(self) -> &'static [RideAction] {
        match self {
            Self::Pending => &[RideAction::Decline, RideAction::Accept],
            Self::Accepted => &[RideAction::Start],
            Self::Started => &[RideAction::PickUp],
            Self::PickedUp => &[RideAction::DropOff],
            Self::Declined | Self::DroppedOff => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.available_actions()
            .iter()
            .any(|action| action.target_status() == to)
    }

    pub fn apply(self, action: RideAction) -> Result<Self, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::FromTerminalStatus { status: self });
        }
        if action.required_status() != self {
            return Err(TransitionError::InvalidTransition { from: self, action });
        }
        Ok(action.target_status())
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideAction {
    Accept,
    Decline,
    Start,
    PickUp,
    DropOff,
}

impl RideAction {
    pub const ALL: [Self; 5] = [
        Self::Accept,
        Self::Decline,
        Self::Start,
        Self::PickUp,
        Self::DropOff,
    ];

    #[must_use]
    pub const fn required_status(self) -> RideStatus {
        match self {
            Self::Accept | Self::Decline => RideStatus::Pending,
            Self::Start => RideStatus::Accepted,
            Self::PickUp => RideStatus::Started,
            Self::DropOff => RideStatus::PickedUp,
        }
    }

    #[must_use]
    pub const fn target_status(self) -> RideStatus {
        match self {
            Self::Accept => RideStatus::Accepted,
            Self::Decline => RideStatus::Declined,
            Self::Start => RideStatus::Started,
            Self::PickUp => RideStatus::PickedUp,
            Self::DropOff => RideStatus::DroppedOff,
        }
    }

    /// Accept and decline act on the open set; the rest on the active slot.
    #[must_use]
    pub const fn acts_on_open_request(self) -> bool {
        matches!(self, Self::Accept | Self::Decline)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Accept => "Accept",
            Self::Decline => "Decline",
            Self::Start => "Start",
            Self::PickUp => "Pick Up",
            Self::DropOff => "Drop Off",
        }
    }

    #[must_use]
    pub const fn confirmation_message(self) -> &'static str {
        match self {
            Self::Accept => "That's a go. Let's go pick-up the customer!",
            Self::Decline => "That ride's a no-go. Keep searching!",
            Self::Start => "Ride started!",
            Self::PickUp => "Customer picked up! Let's go to their destination.",
            Self::DropOff => "Customer dropped off! You can now accept new ride requests.",
        }
    }
}

impl fmt::Display for RideAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot leave terminal status: {status}")]
    FromTerminalStatus { status: RideStatus },
    #[error("Cannot {action} a ride that is {from}")]
    InvalidTransition { from: RideStatus, action: RideAction },
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::new(ErrorKind::InvalidTransition, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    #[serde(rename = "userId")]
    pub rider_id: UserId,
    #[serde(rename = "driverId", default)]
    pub driver_id: Option<UserId>,
    #[serde(rename = "pickupLocation")]
    pub pickup: Location,
    pub destination: Location,
    pub status: RideStatus,
    #[serde(rename = "timestamp")]
    pub requested_at: DateTime<Utc>,
    #[serde(rename = "pickupTime")]
    pub scheduled_pickup_at: DateTime<Utc>,
    /// Rider profile snapshot, attached once a driver inspects the request.
    #[serde(rename = "customer", default, skip_serializing_if = "Option::is_none")]
    pub rider: Option<User>,
}

impl Ride {
    pub fn location(&self, endpoint: Endpoint) -> &Location {
        match endpoint {
            Endpoint::Pickup => &self.pickup,
            Endpoint::Destination => &self.destination,
        }
    }

    pub fn location_mut(&mut self, endpoint: Endpoint) -> &mut Location {
        match endpoint {
            Endpoint::Pickup => &mut self.pickup,
            Endpoint::Destination => &mut self.destination,
        }
    }
}

/// Body of `PATCH /rideRequests/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPatch {
    pub status: RideStatus,
    #[serde(rename = "driverId", default, skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<UserId>,
}
