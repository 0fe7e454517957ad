use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::capabilities::HttpResult;
use crate::config::ConfigInput;
use crate::ride::{Endpoint, RideAction};

// --- Typed IDs ---
//
// The mock server is not consistent about numeric vs string ids, so both
// JSON shapes are accepted and normalized to a string.

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Text(String),
                    Number(u64),
                }

                Ok(match Raw::deserialize(deserializer)? {
                    Raw::Text(s) => Self(s),
                    Raw::Number(n) => Self(n.to_string()),
                })
            }
        }
    };
}

typed_id!(RideId);
typed_id!(UserId);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Setup & identity
    Configure(ConfigInput),
    LoginRequested {
        user_id: UserId,
    },
    ToggleOnline,

    // Open requests
    LoadOpenRequests,
    InspectRequested {
        ride_id: RideId,
    },
    InspectionCleared,

    // Ride lifecycle
    AcceptRequested {
        ride_id: RideId,
    },
    DeclineRequested {
        ride_id: RideId,
    },
    StartRequested {
        ride_id: RideId,
    },
    PickUpRequested {
        ride_id: RideId,
    },
    DropOffRequested {
        ride_id: RideId,
    },

    // Transient UI
    ToastDismissed,
    ErrorDismissed,

    // Capability responses (boxed to keep enum size small)
    #[serde(skip)]
    UserFetched {
        seq: u64,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    OpenRequestsFetched {
        seq: u64,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    RiderFetched {
        seq: u64,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    AddressResolved {
        seq: u64,
        endpoint: Endpoint,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    TransitionConfirmed {
        ride_id: RideId,
        action: RideAction,
        result: Box<HttpResult>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::LoginRequested { .. } => "login_requested",
            Self::ToggleOnline => "toggle_online",
            Self::LoadOpenRequests => "load_open_requests",
            Self::InspectRequested { .. } => "inspect_requested",
            Self::InspectionCleared => "inspection_cleared",
            Self::AcceptRequested { .. } => "accept_requested",
            Self::DeclineRequested { .. } => "decline_requested",
            Self::StartRequested { .. } => "start_requested",
            Self::PickUpRequested { .. } => "pick_up_requested",
            Self::DropOffRequested { .. } => "drop_off_requested",
            Self::ToastDismissed => "toast_dismissed",
            Self::ErrorDismissed => "error_dismissed",
            Self::UserFetched { .. } => "user_fetched",
            Self::OpenRequestsFetched { .. } => "open_requests_fetched",
            Self::RiderFetched { .. } => "rider_fetched",
            Self::AddressResolved { .. } => "address_resolved",
            Self::TransitionConfirmed { .. } => "transition_confirmed",
        }
    }

    /// Shell-originated intent, as opposed to a capability response.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        !matches!(
            self,
            Self::UserFetched { .. }
                | Self::OpenRequestsFetched { .. }
                | Self::RiderFetched { .. }
                | Self::AddressResolved { .. }
                | Self::TransitionConfirmed { .. }
        )
    }

    /// The lifecycle action an intent maps to, if any.
    #[must_use]
    pub fn transition(&self) -> Option<(&RideId, RideAction)> {
        match self {
            Self::AcceptRequested { ride_id } => Some((ride_id, RideAction::Accept)),
            Self::DeclineRequested { ride_id } => Some((ride_id, RideAction::Decline)),
            Self::StartRequested { ride_id } => Some((ride_id, RideAction::Start)),
            Self::PickUpRequested { ride_id } => Some((ride_id, RideAction::PickUp)),
            Self::DropOffRequested { ride_id } => Some((ride_id, RideAction::DropOff)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_numbers_and_strings() {
        let a: RideId = serde_json::from_str("\"abc\"").unwrap();
        let b: RideId = serde_json::from_str("42").unwrap();
        assert_eq!(a.as_str(), "abc");
        assert_eq!(b.as_str(), "42");
        assert_eq!(serde_json::to_string(&b).unwrap(), "\"42\"");
    }

    #[test]
    fn typed_ids_are_not_interchangeable() {
        let ride = RideId::new("abc");
        let user = UserId::new("abc");
        // Different types; only their text can be compared.
        assert_eq!(ride.as_str(), user.as_str());
    }

    #[test]
    fn shell_intents_deserialize() {
        let event: Event =
            serde_json::from_str(r#"{"AcceptRequested":{"ride_id":"7"}}"#).unwrap();
        assert_eq!(
            event.transition(),
            Some((&RideId::new("7"), RideAction::Accept))
        );
        assert!(event.is_user_initiated());
    }

    #[test]
    fn event_size_is_reasonable() {
        let size = std::mem::size_of::<Event>();
        assert!(
            size <= 128,
            "Event enum is {size} bytes, box more variants"
        );
    }
}
