use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::board::RideBoard;
use crate::error::UserFacingError;
use crate::geo::MapBounds;
use crate::model::{Model, ToastKind, ToastMessage};
use crate::pricing::{estimate_fare, FareEstimate};
use crate::ride::{Ride, RideAction, RideStatus};
use crate::session::{Role, Session};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    pub user_id: String,
    pub name: String,
    pub profile_picture: String,
    pub role: Role,
    pub earnings: Option<f64>,
    pub review: Option<f64>,
    pub is_driver: bool,
    pub online: bool,
    /// Caption for the availability toggle.
    pub online_label: String,
}

impl SessionView {
    fn from_session(session: &Session) -> Option<Self> {
        let user = session.user()?;
        let online = session.is_online();
        Some(Self {
            user_id: user.id.to_string(),
            name: user.name.clone(),
            profile_picture: user.profile_picture.clone(),
            role: user.role,
            earnings: user.earnings,
            review: user.review,
            is_driver: session.is_driver(),
            online,
            online_label: if online { "Break" } else { "Let's Go!" }.to_string(),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RideMarker {
    pub ride_id: String,
    pub lat: f64,
    pub lng: f64,
    pub is_selected: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionButton {
    pub action: RideAction,
    pub label: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RideDetail {
    pub ride_id: String,
    pub status: RideStatus,
    pub status_label: String,
    pub rider_name: Option<String>,
    pub rider_picture: Option<String>,
    pub pickup_address: String,
    pub destination_address: String,
    pub pickup_time: DateTime<Utc>,
    pub requested_at: DateTime<Utc>,
    pub fare: Option<FareEstimate>,
    pub actions: Vec<ActionButton>,
    /// A transition for this ride awaits confirmation.
    pub busy: bool,
    pub pending_action: Option<RideAction>,
}

impl RideDetail {
    fn build(ride: &Ride, board: &RideBoard) -> Self {
        let pending_action = board.in_flight_action(&ride.id);
        let busy = pending_action.is_some();
        let actions = ride
            .status
            .available_actions()
            .iter()
            .map(|&action| ActionButton {
                action,
                label: action.label().to_string(),
                enabled: !busy,
            })
            .collect();

        Self {
            ride_id: ride.id.to_string(),
            status: ride.status,
            status_label: ride.status.display_name().to_string(),
            rider_name: ride.rider.as_ref().map(|u| u.name.clone()),
            rider_picture: ride.rider.as_ref().map(|u| u.profile_picture.clone()),
            pickup_address: ride.pickup.address.clone().unwrap_or_default(),
            destination_address: ride.destination.address.clone().unwrap_or_default(),
            pickup_time: ride.scheduled_pickup_at,
            requested_at: ride.requested_at,
            fare: estimate_fare(ride),
            actions,
            busy,
            pending_action,
        }
    }
}

/// Which bottom sheet the shell shows.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SheetView {
    Offline,
    Browsing {
        open_count: usize,
        is_refreshing: bool,
    },
    Inspecting {
        ride_id: String,
        /// `None` until the rider and addresses have arrived.
        detail: Option<RideDetail>,
        is_loading: bool,
    },
    ActiveRide {
        detail: RideDetail,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub session: Option<SessionView>,
    pub sheet: SheetView,
    /// Open requests to pin on the map; empty while offline.
    pub markers: Vec<RideMarker>,
    pub map_bounds: Option<MapBounds>,
    pub is_loading: bool,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
}

impl ViewModel {
    pub fn from_model(model: &Model) -> Self {
        let session = model.session();
        let board = model.rides();
        let online = session.is_online();
        let inspecting_id = board.inspecting_id();

        let sheet = if let Some(active) = board.active() {
            SheetView::ActiveRide {
                detail: RideDetail::build(active, board),
            }
        } else if !online {
            SheetView::Offline
        } else if let Some(id) = inspecting_id {
            SheetView::Inspecting {
                ride_id: id.to_string(),
                detail: board
                    .inspected()
                    .filter(|r| &r.id == id)
                    .map(|r| RideDetail::build(r, board)),
                is_loading: board.inspection_status().is_loading(),
            }
        } else {
            SheetView::Browsing {
                open_count: board.open_requests().len(),
                is_refreshing: board.load_status().is_loading(),
            }
        };

        let markers = if online && board.active().is_none() {
            board
                .open_requests()
                .iter()
                .map(|r| RideMarker {
                    ride_id: r.id.to_string(),
                    lat: r.pickup.latitude,
                    lng: r.pickup.longitude,
                    is_selected: inspecting_id == Some(&r.id),
                })
                .collect()
        } else {
            Vec::new()
        };

        let focused = board.active().or_else(|| {
            if online {
                board.inspected()
            } else {
                None
            }
        });
        let map_bounds = focused.and_then(|r| {
            let pickup = r.pickup.coordinate().ok()?;
            let destination = r.destination.coordinate().ok()?;
            Some(MapBounds::around(pickup, destination))
        });

        Self {
            session: SessionView::from_session(session),
            sheet,
            markers,
            map_bounds,
            is_loading: model.is_loading(),
            error: model.active_error().map(UserFacingError::from),
            toast: model.toast().map(ToastView::from),
        }
    }
}
