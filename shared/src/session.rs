use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, ErrorKind};
use crate::event::UserId;
use crate::model::FetchStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Customer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub profile_picture: String,
    /// Cumulative earnings; drivers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earnings: Option<f64>,
    /// Review score; drivers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<f64>,
}

/// Identity store: who is signed in, as what, and whether a driver is
/// currently taking requests.
#[derive(Debug, Default)]
pub struct Session {
    user: Option<User>,
    online: bool,
    status: FetchStatus,
    error: Option<AppError>,
    login_seq: u64,
}

impl Session {
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn is_driver(&self) -> bool {
        self.role() == Some(Role::Driver)
    }

    /// Always `false` for anyone who is not a driver.
    pub fn is_online(&self) -> bool {
        self.online && self.is_driver()
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Resolves the acting driver for an accept.
    pub fn driver_id(&self) -> AppResult<UserId> {
        match &self.user {
            None => Err(AppError::new(
                ErrorKind::IdentityMissing,
                "Driver ID not found",
            )),
            Some(user) if user.role != Role::Driver => Err(AppError::new(
                ErrorKind::RoleMismatch,
                format!("user {} is not a driver", user.id),
            )
            .with_context("user_id", user.id.to_string())),
            Some(user) => Ok(user.id.clone()),
        }
    }

    /// Marks a login as in flight; returns the tag its response must carry.
    pub fn begin_login(&mut self, user_id: &UserId) -> u64 {
        self.login_seq += 1;
        self.status = FetchStatus::Loading;
        self.error = None;
        debug!(user_id = %user_id, seq = self.login_seq, "login started");
        self.login_seq
    }

    /// Applies a fetched profile. Responses for superseded logins are dropped.
    pub fn complete_login(&mut self, seq: u64, result: AppResult<User>) -> bool {
        if seq != self.login_seq {
            debug!(seq, latest = self.login_seq, "stale login response dropped");
            return false;
        }

        match result {
            Ok(user) => {
                info!(user_id = %user.id, role = ?user.role, "signed in");
                // A fresh session always starts offline.
                self.online = false;
                self.user = Some(user);
                self.status = FetchStatus::Succeeded;
            }
            Err(error) => {
                warn!(error = %error, "login failed");
                self.status = FetchStatus::Failed;
                self.error = Some(error);
            }
        }
        true
    }

    /// Flips the online flag for drivers. Returns the new value, or `None`
    /// when the session holds no driver.
    pub fn toggle_online(&mut self) -> Option<bool> {
        if !self.is_driver() {
            debug!("online toggle ignored: not a driver");
            return None;
        }
        self.online = !self.online;
        info!(online = self.online, "driver availability changed");
        Some(self.online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(id: &str) -> User {
        User {
            id: UserId::new(id),
            name: "Dana".into(),
            role: Role::Driver,
            profile_picture: String::new(),
            earnings: Some(120.5),
            review: Some(4.9),
        }
    }

    #[test]
    fn login_as_driver_starts_offline() {
        let mut session = Session::default();
        let seq = session.begin_login(&UserId::new("501"));
        assert_eq!(session.status(), FetchStatus::Loading);

        assert!(session.complete_login(seq, Ok(driver("501"))));
        assert_eq!(session.status(), FetchStatus::Succeeded);
        assert!(!session.is_online());
        assert_eq!(session.driver_id().unwrap(), UserId::new("501"));
    }

    #[test]
    fn toggle_is_noop_for_customers_and_anonymous() {
        let mut session = Session::default();
        assert_eq!(session.toggle_online(), None);

        let seq = session.begin_login(&UserId::new("9"));
        let mut customer = driver("9");
        customer.role = Role::Customer;
        session.complete_login(seq, Ok(customer));
        assert_eq!(session.toggle_online(), None);
        assert!(!session.is_online());
    }

    #[test]
    fn toggle_flips_for_drivers() {
        let mut session = Session::default();
        let seq = session.begin_login(&UserId::new("501"));
        session.complete_login(seq, Ok(driver("501")));
        assert_eq!(session.toggle_online(), Some(true));
        assert!(session.is_online());
        assert_eq!(session.toggle_online(), Some(false));
    }

    #[test]
    fn driver_id_requires_identity_and_role() {
        let mut session = Session::default();
        assert_eq!(
            session.driver_id().unwrap_err().kind,
            ErrorKind::IdentityMissing
        );

        let seq = session.begin_login(&UserId::new("9"));
        let mut customer = driver("9");
        customer.role = Role::Customer;
        session.complete_login(seq, Ok(customer));
        assert_eq!(session.driver_id().unwrap_err().kind, ErrorKind::RoleMismatch);
    }

    #[test]
    fn failed_login_keeps_previous_identity() {
        let mut session = Session::default();
        let seq = session.begin_login(&UserId::new("501"));
        session.complete_login(seq, Ok(driver("501")));

        let seq = session.begin_login(&UserId::new("502"));
        session.complete_login(seq, Err(AppError::new(ErrorKind::Network, "down")));
        assert_eq!(session.status(), FetchStatus::Failed);
        assert_eq!(session.user().unwrap().id, UserId::new("501"));
        assert!(session.error().is_some());
    }

    #[test]
    fn stale_login_response_is_dropped() {
        let mut session = Session::default();
        let first = session.begin_login(&UserId::new("1"));
        let second = session.begin_login(&UserId::new("501"));
        assert!(!session.complete_login(first, Ok(driver("1"))));
        assert!(session.complete_login(second, Ok(driver("501"))));
        assert_eq!(session.user().unwrap().id, UserId::new("501"));
    }

    #[test]
    fn user_wire_format() {
        let user: User = serde_json::from_str(
            r#"{"id":"501","name":"Dana","role":"driver","profilePicture":"https://x/p.png","earnings":10,"review":4}"#,
        )
        .unwrap();
        assert_eq!(user.role, Role::Driver);
        assert_eq!(user.profile_picture, "https://x/p.png");
        assert_eq!(user.earnings, Some(10.0));
    }
}
