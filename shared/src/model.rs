use serde::{Deserialize, Serialize};

use crate::board::RideBoard;
use crate::config::CoreConfig;
use crate::error::AppError;
use crate::session::Session;

/// Progress of one asynchronous slot (login, open-set load, inspection,
/// transitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

impl FetchStatus {
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

/// All core state. Only `App::update` holds a `&mut Model`; the stores
/// inside guard their own invariants.
#[derive(Debug, Default)]
pub struct Model {
    pub(crate) config: CoreConfig,
    pub(crate) session: Session,
    pub(crate) rides: RideBoard,
    toast: Option<ToastMessage>,
    config_error: Option<AppError>,
}

impl Model {
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn rides(&self) -> &RideBoard {
        &self.rides
    }

    pub fn toast(&self) -> Option<&ToastMessage> {
        self.toast.as_ref()
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.toast = Some(ToastMessage::new(message, kind));
    }

    pub fn clear_toast(&mut self) {
        self.toast = None;
    }

    pub(crate) fn set_config_error(&mut self, error: AppError) {
        self.config_error = Some(error);
    }

    /// The most recent unacknowledged failure across the stores. Ride
    /// failures win over session ones, which win over configuration.
    pub fn active_error(&self) -> Option<&AppError> {
        self.rides
            .error()
            .or_else(|| self.session.error())
            .or(self.config_error.as_ref())
    }

    pub fn clear_errors(&mut self) {
        self.rides.clear_error();
        self.session.clear_error();
        self.config_error = None;
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.session.status().is_loading()
            || self.rides.load_status().is_loading()
            || self.rides.inspection_status().is_loading()
    }
}
