use tracing::{debug, info, warn};

use crate::api;
use crate::capabilities::Capabilities;
use crate::config::CoreConfig;
use crate::event::{Event, RideId};
use crate::model::{Model, ToastKind};
use crate::ride::RideAction;
use crate::view::ViewModel;

#[derive(Default)]
pub struct App;

impl App {
    fn load_open_requests(model: &mut Model, caps: &Capabilities) {
        let seq = model.rides.begin_load();
        match api::list_ride_requests(&model.config) {
            Ok(request) => caps.http.execute(request, move |result| {
                Event::OpenRequestsFetched {
                    seq,
                    result: Box::new(result),
                }
            }),
            Err(e) => {
                model.rides.complete_load(seq, Err(e));
            }
        }
    }

    /// Fans out the rider profile fetch and any uncached address lookups.
    fn inspect(ride_id: &RideId, model: &mut Model, caps: &Capabilities) {
        let plan = match model.rides.begin_inspection(ride_id) {
            Ok(plan) => plan,
            Err(e) => {
                model.show_toast(e.user_facing_message(), ToastKind::Warning);
                return;
            }
        };
        let seq = plan.seq;

        match api::fetch_user(&model.config, &plan.rider_id) {
            Ok(request) => caps.http.execute(request, move |result| Event::RiderFetched {
                seq,
                result: Box::new(result),
            }),
            Err(e) => {
                model.rides.complete_rider(seq, Err(e));
                return;
            }
        }

        for lookup in plan.lookups {
            let endpoint = lookup.endpoint;
            match api::reverse_geocode(&model.config, lookup.coordinate) {
                Ok(request) => caps.http.execute(request, move |result| {
                    Event::AddressResolved {
                        seq,
                        endpoint,
                        result: Box::new(result),
                    }
                }),
                Err(e) => {
                    model.rides.complete_address(seq, endpoint, Err(e));
                }
            }
        }
    }

    fn request_transition(
        ride_id: &RideId,
        action: RideAction,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let plan = match model
            .rides
            .begin_transition(ride_id, action, &model.session)
        {
            Ok(plan) => plan,
            Err(e) => {
                model.show_toast(e.user_facing_message(), ToastKind::Warning);
                return;
            }
        };

        match api::patch_ride_status(&model.config, &plan.ride_id, &plan.patch) {
            Ok(request) => {
                let ride_id = plan.ride_id;
                caps.http.execute(request, move |result| Event::TransitionConfirmed {
                    ride_id,
                    action,
                    result: Box::new(result),
                });
            }
            Err(e) => {
                if let Err(e) = model.rides.complete_transition(&plan.ride_id, action, Err(e)) {
                    model.show_toast(e.user_facing_message(), ToastKind::Error);
                }
            }
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(
            event = event.name(),
            user_initiated = event.is_user_initiated(),
            "update"
        );

        if let Some((ride_id, action)) = event.transition() {
            Self::request_transition(ride_id, action, model, caps);
            caps.render.render();
            return;
        }

        match event {
            Event::Configure(input) => match CoreConfig::try_from(input) {
                Ok(config) => {
                    model
                        .rides
                        .resize_address_cache(config.address_cache_capacity());
                    info!(?config, "configuration applied");
                    model.config = config;
                }
                Err(e) => {
                    warn!(error = %e, "configuration rejected, keeping previous");
                    model.set_config_error(e.into());
                }
            },

            Event::LoginRequested { user_id } => {
                let seq = model.session.begin_login(&user_id);
                match api::fetch_user(&model.config, &user_id) {
                    Ok(request) => caps.http.execute(request, move |result| Event::UserFetched {
                        seq,
                        result: Box::new(result),
                    }),
                    Err(e) => {
                        model.session.complete_login(seq, Err(e));
                    }
                }
            }

            Event::UserFetched { seq, result } => {
                let previous = model.session.user().map(|u| u.id.clone());
                let applied = model.session.complete_login(seq, api::decode(*result));
                let current = model.session.user().map(|u| &u.id);
                if applied && previous.is_some() && current != previous.as_ref() {
                    model.rides.reset_for_new_identity();
                }
            }

            Event::ToggleOnline => {
                // Going online is what triggers a fresh load; going offline
                // only hides the open set.
                if model.session.toggle_online() == Some(true) {
                    Self::load_open_requests(model, caps);
                }
            }

            Event::LoadOpenRequests => Self::load_open_requests(model, caps),

            Event::OpenRequestsFetched { seq, result } => {
                model.rides.complete_load(seq, api::decode(*result));
            }

            Event::InspectRequested { ride_id } => Self::inspect(&ride_id, model, caps),

            Event::RiderFetched { seq, result } => {
                model.rides.complete_rider(seq, api::decode(*result));
            }

            Event::AddressResolved {
                seq,
                endpoint,
                result,
            } => {
                model
                    .rides
                    .complete_address(seq, endpoint, api::decode_address(*result));
            }

            Event::InspectionCleared => model.rides.clear_inspection(),

            Event::TransitionConfirmed {
                ride_id,
                action,
                result,
            } => match model
                .rides
                .complete_transition(&ride_id, action, api::decode(*result))
            {
                Ok(true) => {
                    model.show_toast(action.confirmation_message(), ToastKind::Success);
                    // The ride is gone from view; close its sheet if it is the one shown.
                    if matches!(action, RideAction::Decline | RideAction::DropOff)
                        && model.rides.inspecting_id() == Some(&ride_id)
                    {
                        model.rides.clear_inspection();
                    }
                }
                Ok(false) => {}
                Err(e) => model.show_toast(e.user_facing_message(), ToastKind::Error),
            },

            Event::ToastDismissed => model.clear_toast(),

            Event::ErrorDismissed => model.clear_errors(),

            Event::AcceptRequested { .. }
            | Event::DeclineRequested { .. }
            | Event::StartRequested { .. }
            | Event::PickUpRequested { .. }
            | Event::DropOffRequested { .. } => {}
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from_model(model)
    }
}
