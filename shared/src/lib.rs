//! Shared core for the driver app: session, open ride requests and the
//! ride lifecycle, driven through Crux events and capabilities.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod app;
pub mod board;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod event;
pub mod geo;
pub mod geocode;
pub mod model;
pub mod pricing;
pub mod ride;
pub mod session;
pub mod view;

pub use app::App;
pub use board::RideBoard;
pub use capabilities::{Capabilities, Effect};
pub use config::{ConfigInput, CoreConfig};
pub use crux_core::{render::Render, App as CruxApp};
pub use error::{AppError, AppResult, ErrorKind, ErrorSeverity, UserFacingError};
pub use event::{Event, RideId, UserId};
pub use model::{FetchStatus, Model, ToastKind, ToastMessage};
pub use ride::{Endpoint, Location, Ride, RideAction, RideStatus};
pub use session::{Role, Session, User};
pub use view::{RideDetail, SessionView, SheetView, ViewModel};
