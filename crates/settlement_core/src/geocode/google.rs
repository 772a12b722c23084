//! Google Places (New) text-search client.

use super::{GeocodeError, GeocodeQuery, Geocoder};
use crate::model::settlement::Coordinate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";
pub const PLACES_SEARCH_URL: &str = "https://places.googleapis.com/v1/places:searchText";
pub const FIELD_MASK: &str =
    "places.displayName,places.location,places.formattedAddress,places.types";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextRequest<'a> {
    text_query: &'a str,
    location_bias: LocationBias,
    language_code: &'a str,
    region_code: &'a str,
    strict_type_filtering: bool,
}

#[derive(Serialize)]
struct LocationBias {
    rectangle: Rectangle,
}

#[derive(Serialize)]
struct Rectangle {
    low: LatLng,
    high: LatLng,
}

#[derive(Serialize, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    location: Option<LatLng>,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
}

#[derive(Deserialize)]
struct LocalizedText {
    text: String,
}

/// Blocking Places text-search client.
pub struct GooglePlacesGeocoder {
    client: reqwest::blocking::Client,
    api_key: String,
}

impl GooglePlacesGeocoder {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GeocodeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Builds a client from `GOOGLE_MAPS_API_KEY`; fails before any request if unset.
    pub fn from_env() -> Result<Self, GeocodeError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(key.trim()),
            _ => Err(GeocodeError::MissingApiKey(API_KEY_ENV)),
        }
    }
}

impl Geocoder for GooglePlacesGeocoder {
    fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError> {
        let bias = &query.location_bias;
        let body = SearchTextRequest {
            text_query: &query.text,
            location_bias: LocationBias {
                rectangle: Rectangle {
                    low: LatLng {
                        latitude: bias.min_lat,
                        longitude: bias.min_lon,
                    },
                    high: LatLng {
                        latitude: bias.max_lat,
                        longitude: bias.max_lon,
                    },
                },
            },
            language_code: &query.language_code,
            region_code: &query.region_code,
            strict_type_filtering: false,
        };

        let response = self
            .client
            .post(PLACES_SEARCH_URL)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(
                "event=geocode_request module=geocode status=error http_status={} query={:?}",
                status.as_u16(),
                query.text
            );
            return Err(GeocodeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SearchTextResponse = response
            .json()
            .map_err(|err| GeocodeError::Decode(err.to_string()))?;
        Ok(first_location(parsed))
    }
}

fn first_location(response: SearchTextResponse) -> Option<Coordinate> {
    let place = response.places.into_iter().next()?;
    let location = place.location?;
    debug!(
        "event=geocode_match module=geocode display_name={:?} address={:?}",
        place.display_name.map(|name| name.text),
        place.formatted_address
    );
    Some(Coordinate::new(location.latitude, location.longitude))
}

#[cfg(test)]
mod tests {
    use super::{first_location, SearchTextResponse};
    use crate::model::settlement::Coordinate;

    #[test]
    fn first_place_location_is_authoritative() {
        let response: SearchTextResponse = serde_json::from_str(
            r#"{"places":[
                {"displayName":{"text":"Clonmel"},"location":{"latitude":52.355,"longitude":-7.704}},
                {"location":{"latitude":1.0,"longitude":2.0}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_location(response), Some(Coordinate::new(52.355, -7.704)));
    }

    #[test]
    fn missing_places_means_unresolved() {
        let response: SearchTextResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(first_location(response), None);
    }
}
