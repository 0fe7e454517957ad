use std::collections::{BTreeMap, VecDeque};

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use ride_shared::{
    AppError, ErrorKind, Location, Ride, RideAction, RideBoard, RideId, RideStatus, Role,
    Session, User, UserId,
};

#[derive(Debug, Clone)]
enum Op {
    Load(BTreeMap<u8, RideStatus>),
    Transition(u8, RideAction),
    Confirm { ok: bool },
    Inspect(u8),
    ClearInspection,
}

fn ride(id: u8, status: RideStatus) -> Ride {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    Ride {
        id: RideId::new(format!("r{id}")),
        rider_id: UserId::new(format!("c{id}")),
        driver_id: None,
        pickup: Location::new(37.7749, -122.4194),
        destination: Location::new(37.8044, -122.2712),
        status,
        requested_at: at,
        scheduled_pickup_at: at,
        rider: None,
    }
}

fn driver_session() -> Session {
    let mut session = Session::default();
    let seq = session.begin_login(&UserId::new("501"));
    session.complete_login(
        seq,
        Ok(User {
            id: UserId::new("501"),
            name: "Dana".into(),
            role: Role::Driver,
            profile_picture: String::new(),
            earnings: None,
            review: None,
        }),
    );
    session
}

fn op() -> impl Strategy<Value = Op> {
    let status = prop::sample::select(RideStatus::ALL.to_vec());
    let action = prop::sample::select(RideAction::ALL.to_vec());
    prop_oneof![
        prop::collection::btree_map(0u8..4, status, 0..4).prop_map(Op::Load),
        (0u8..4, action).prop_map(|(id, action)| Op::Transition(id, action)),
        any::<bool>().prop_map(|ok| Op::Confirm { ok }),
        (0u8..4).prop_map(Op::Inspect),
        Just(Op::ClearInspection),
    ]
}

fn check_invariants(board: &RideBoard) -> Result<(), TestCaseError> {
    let open = board.open_requests();
    prop_assert!(open.iter().all(|r| r.status == RideStatus::Pending));

    let mut ids: Vec<_> = open.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids.dedup();
    prop_assert_eq!(ids.len(), open.len(), "duplicate open request");

    if let Some(active) = board.active() {
        prop_assert!(active.status.is_active(), "active ride is {}", active.status);
        prop_assert!(board.find_open(&active.id).is_none(), "active ride still open");
        prop_assert_eq!(active.driver_id.clone(), Some(UserId::new("501")));
    }
    Ok(())
}

proptest! {
    #[test]
    fn board_invariants_hold(ops in prop::collection::vec(op(), 1..40)) {
        let session = driver_session();
        let mut board = RideBoard::default();
        let mut pending: VecDeque<(RideId, RideAction)> = VecDeque::new();

        for op in ops {
            match op {
                Op::Load(rides) => {
                    let seq = board.begin_load();
                    let rides = rides.into_iter().map(|(id, s)| ride(id, s)).collect();
                    prop_assert!(board.complete_load(seq, Ok(rides)));
                }
                Op::Transition(id, action) => {
                    let ride_id = RideId::new(format!("r{id}"));
                    let was_in_flight = board.is_in_flight(&ride_id);
                    match board.begin_transition(&ride_id, action, &session) {
                        Ok(plan) => {
                            prop_assert!(!was_in_flight);
                            prop_assert_eq!(plan.patch.status, action.target_status());
                            pending.push_back((ride_id, action));
                        }
                        Err(e) => {
                            if was_in_flight {
                                prop_assert_eq!(e.kind, ErrorKind::TransitionInFlight);
                            }
                        }
                    }
                }
                Op::Confirm { ok } => {
                    if let Some((ride_id, action)) = pending.pop_front() {
                        let open_before = board.open_requests().to_vec();
                        let active_before = board.active().cloned();
                        let result = if ok {
                            let id = ride_id.as_str().trim_start_matches('r').parse().unwrap_or(0);
                            let mut confirmed = ride(id, action.target_status());
                            confirmed.driver_id = Some(UserId::new("501"));
                            Ok(confirmed)
                        } else {
                            Err(AppError::new(ErrorKind::Network, "offline"))
                        };
                        let outcome = board.complete_transition(&ride_id, action, result);
                        prop_assert!(!board.is_in_flight(&ride_id));
                        if !ok {
                            prop_assert!(outcome.is_err());
                            prop_assert_eq!(board.open_requests(), open_before.as_slice());
                            prop_assert_eq!(board.active().cloned(), active_before);
                        } else {
                            prop_assert!(outcome.is_ok());
                        }
                    }
                }
                Op::Inspect(id) => {
                    let ride_id = RideId::new(format!("r{id}"));
                    let is_open = board.find_open(&ride_id).is_some();
                    prop_assert_eq!(board.begin_inspection(&ride_id).is_ok(), is_open);
                }
                Op::ClearInspection => {
                    board.clear_inspection();
                    prop_assert!(board.inspected().is_none());
                }
            }
            check_invariants(&board)?;
        }
    }

    #[test]
    fn lifecycle_only_moves_forward(steps in prop::collection::vec(prop::sample::select(RideAction::ALL.to_vec()), 1..12)) {
        let session = driver_session();
        let mut board = RideBoard::default();
        let seq = board.begin_load();
        board.complete_load(seq, Ok(vec![ride(1, RideStatus::Pending)]));
        let id = RideId::new("r1");

        let mut expected = Some(RideStatus::Pending);
        for action in steps {
            let accepted = board.begin_transition(&id, action, &session).is_ok();
            prop_assert_eq!(accepted, expected == Some(action.required_status()));
            if accepted {
                let mut confirmed = ride(1, action.target_status());
                confirmed.driver_id = Some(UserId::new("501"));
                board.complete_transition(&id, action, Ok(confirmed)).unwrap();
                let next = action.target_status();
                expected = if next.is_terminal() { None } else { Some(next) };
            }
            let current = board
                .active()
                .map(|r| r.status)
                .or_else(|| board.find_open(&id).map(|r| r.status));
            prop_assert_eq!(current, expected);
        }
    }
}
