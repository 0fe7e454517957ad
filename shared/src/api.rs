//! REST and geocoding request builders, plus response decoding.

use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use crate::capabilities::{HttpError, HttpRequest, HttpResult};
use crate::config::CoreConfig;
use crate::error::AppResult;
use crate::event::{RideId, UserId};
use crate::geo::Coordinate;
use crate::geocode::first_formatted_address;
use crate::ride::StatusPatch;

/// `GET /rideRequests`
#[instrument(level = "debug", skip(config))]
pub fn list_ride_requests(config: &CoreConfig) -> AppResult<HttpRequest> {
    let url = endpoint(config.api_base_url(), &["rideRequests"])?;
    Ok(HttpRequest::get(url)?.with_timeout(config.request_timeout())?)
}

/// `GET /users/{id}`
#[instrument(level = "debug", skip(config, user_id), fields(user_id = %user_id))]
pub fn fetch_user(config: &CoreConfig, user_id: &UserId) -> AppResult<HttpRequest> {
    let url = endpoint(config.api_base_url(), &["users", user_id.as_str()])?;
    Ok(HttpRequest::get(url)?.with_timeout(config.request_timeout())?)
}

/// `PATCH /rideRequests/{id}` with `{status, driverId?}`
#[instrument(level = "debug", skip(config, ride_id, patch), fields(ride_id = %ride_id, status = %patch.status))]
pub fn patch_ride_status(
    config: &CoreConfig,
    ride_id: &RideId,
    patch: &StatusPatch,
) -> AppResult<HttpRequest> {
    let url = endpoint(config.api_base_url(), &["rideRequests", ride_id.as_str()])?;
    Ok(HttpRequest::patch(url)?
        .with_json(patch)?
        .with_timeout(config.request_timeout())?)
}

/// `GET <geocode_url>?latlng=<lat>,<lng>&key=<key>`
#[instrument(level = "debug", skip(config))]
pub fn reverse_geocode(config: &CoreConfig, at: Coordinate) -> AppResult<HttpRequest> {
    let mut url = parse(config.geocode_url())?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("latlng", &format!("{},{}", at.lat(), at.lng()));
        if let Some(key) = config.geocode_api_key() {
            query.append_pair("key", key);
        }
    }
    Ok(HttpRequest::get(url.as_str())?.with_timeout(config.request_timeout())?)
}

/// Turns a shell response into a typed entity. Non-2xx statuses and
/// transport failures become `AppError`s.
pub fn decode<T: DeserializeOwned>(result: HttpResult) -> AppResult<T> {
    let response = result?.error_for_status()?;
    Ok(response.json()?)
}

/// Reverse-geocode response to the first formatted address.
pub fn decode_address(result: HttpResult) -> AppResult<String> {
    let response = result?.error_for_status()?;
    Ok(first_formatted_address(response.body())?)
}

fn parse(raw: &str) -> Result<Url, HttpError> {
    Url::parse(raw).map_err(|e| HttpError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Appends percent-encoded path segments to a base URL.
fn endpoint(base: &str, segments: &[&str]) -> Result<String, HttpError> {
    let mut url = parse(base)?;
    url.path_segments_mut()
        .map_err(|()| HttpError::InvalidUrl {
            url: base.to_string(),
            reason: "URL cannot be a base".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}
