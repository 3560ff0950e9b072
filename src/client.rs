//! Upstream gateway: the `GdsTransport` seam plus the reqwest-backed
//! implementation and the JSON search payload builders.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::AdapterError;
use crate::model::AvailabilityRequest;

pub const SEARCH_TIMEOUT_SECS: u64 = 60;
pub const BOOKING_TIMEOUT_SECS: u64 = 90;

const DEFAULT_BASE_URL: &str = "https://wings.laveen-air.com/RIAM_main/rest/api";

/// Raw booking response. The body is kept verbatim for auditing even
/// when reference extraction later fails.
#[derive(Debug, Clone)]
pub struct BookResponse {
    pub status: u16,
    pub body: String,
}

impl BookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The one seam between the adapter and the provider network protocol.
#[async_trait]
pub trait GdsTransport: Send + Sync {
    /// POSTs a low-fare search payload, returns the decoded JSON body.
    async fn low_fare_search(&self, payload: &Value) -> Result<Value, AdapterError>;

    /// POSTs the booking XML. Transport-level failures are errors;
    /// a non-2xx status is a normal return, the caller decides.
    async fn air_book(&self, xml: &str) -> Result<BookResponse, AdapterError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub auth_token: String,
}

fn derive_base_from_full_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    // Full endpoint URLs carry the operation as the last path component.
    match trimmed.rsplit_once('/') {
        Some((base, _)) => Some(base.to_string()),
        None => Some(trimmed.to_string()),
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl GatewayConfig {
    /// Reads credentials and endpoint from the environment. Returns
    /// `None` when no auth token is configured.
    pub fn from_env() -> Option<Self> {
        let auth_token = env_nonempty("WINGS_AUTH_TOKEN").or_else(|| env_nonempty("AUTH_TOKEN"))?;

        let base_url = env_nonempty("WINGS_BASE_URL")
            .or_else(|| {
                env_nonempty("SEARCH_URL")
                    .or_else(|| env_nonempty("WINGS_SEARCH_URL"))
                    .and_then(|u| derive_base_from_full_url(&u))
            })
            .or_else(|| {
                env_nonempty("BOOK_URL")
                    .or_else(|| env_nonempty("WINGS_BOOK_URL"))
                    .and_then(|u| derive_base_from_full_url(&u))
            })
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Some(GatewayConfig { base_url: base_url.trim_end_matches('/').to_string(), auth_token })
    }
}

/// HTTP implementation over reqwest. Searches and bookings use separate
/// clients because their timeouts differ; a booking is never retried.
pub struct HttpGateway {
    config: GatewayConfig,
    search_client: reqwest::Client,
    booking_client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, AdapterError> {
        let search_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AdapterError::Network(e.to_string()))?;
        let booking_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(BOOKING_TIMEOUT_SECS))
            .build()
            .map_err(|e| AdapterError::Network(e.to_string()))?;
        Ok(HttpGateway { config, search_client, booking_client })
    }
}

#[async_trait]
impl GdsTransport for HttpGateway {
    async fn low_fare_search(&self, payload: &Value) -> Result<Value, AdapterError> {
        let url = format!("{}/AirLowFareSearch", self.config.base_url);
        debug!(%url, "low-fare search");
        let response = self
            .search_client
            .post(&url)
            .header("Authorization", &self.config.auth_token)
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout(SEARCH_TIMEOUT_SECS)
                } else {
                    AdapterError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::UpstreamStatus(status.as_u16()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| AdapterError::JsonParse(e.to_string()))
    }

    async fn air_book(&self, xml: &str) -> Result<BookResponse, AdapterError> {
        let url = format!("{}/AirBook", self.config.base_url);
        debug!(%url, "air book");
        let response = self
            .booking_client
            .post(&url)
            .header("Authorization", &self.config.auth_token)
            .header("Accept", "application/xml")
            .header("Content-Type", "application/xml")
            .body(xml.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout(BOOKING_TIMEOUT_SECS)
                } else {
                    AdapterError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::Network(e.to_string()))?;
        Ok(BookResponse { status, body })
    }
}

// ---------------------------------------------------------------------
// Search payload builders
// ---------------------------------------------------------------------

/// Which direction of the trip a one-way search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Outbound,
    Return,
}

fn traveler_summary(req: &AvailabilityRequest) -> Value {
    json!({
        "AirTravelerAvail": [{
            "PassengerTypeQuantity": [
                {"Code": "ADT", "Quantity": req.pax.adults},
                {"Code": "CHD", "Quantity": req.pax.children},
                {"Code": "INF", "Quantity": req.pax.infants},
            ]
        }]
    })
}

fn leg(date: &str, from: &str, to: &str) -> Value {
    json!({
        "DepartureDateTime": {"value": date},
        "OriginLocation": {"LocationCode": from},
        "DestinationLocation": {"LocationCode": to},
    })
}

/// One-way low-fare search payload. The return direction swaps the
/// airports and uses the return date.
pub fn search_payload(req: &AvailabilityRequest, direction: SearchDirection) -> Value {
    let od = match direction {
        SearchDirection::Outbound => leg(&req.date, &req.from, &req.to),
        SearchDirection::Return => leg(
            req.return_date.as_deref().unwrap_or(&req.date),
            &req.to,
            &req.from,
        ),
    };
    json!({
        "ProcessingInfo": {"SearchType": "STANDARD"},
        "OriginDestinationInformation": [od],
        "TravelPreferences": [{"CabinPref": [{"Cabin": req.cabin.upstream_value()}]}],
        "TravelerInfoSummary": traveler_summary(req),
    })
}

/// Combined outbound+return payload used only for round-trip price
/// reconciliation.
pub fn combined_payload(req: &AvailabilityRequest) -> Value {
    json!({
        "ProcessingInfo": {"SearchType": "STANDARD"},
        "OriginDestinationInformation": [
            leg(&req.date, &req.from, &req.to),
            leg(req.return_date.as_deref().unwrap_or(&req.date), &req.to, &req.from),
        ],
        "TravelPreferences": [{"CabinPref": [{"Cabin": req.cabin.upstream_value()}]}],
        "TravelerInfoSummary": traveler_summary(req),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CabinClass, Pax, TripType};

    fn request() -> AvailabilityRequest {
        AvailabilityRequest {
            from: "BGW".into(),
            to: "DXB".into(),
            date: "2026-02-02".into(),
            trip_type: TripType::RoundTrip,
            return_date: Some("2026-02-09".into()),
            cabin: CabinClass::Business,
            pax: Pax { adults: 2, children: 1, infants: 0 },
        }
    }

    #[test]
    fn outbound_payload_shape() {
        let p = search_payload(&request(), SearchDirection::Outbound);
        assert_eq!(p["ProcessingInfo"]["SearchType"], "STANDARD");
        let od = &p["OriginDestinationInformation"][0];
        assert_eq!(od["OriginLocation"]["LocationCode"], "BGW");
        assert_eq!(od["DestinationLocation"]["LocationCode"], "DXB");
        assert_eq!(od["DepartureDateTime"]["value"], "2026-02-02");
        assert_eq!(p["TravelPreferences"][0]["CabinPref"][0]["Cabin"], "Business");
        let ptq = &p["TravelerInfoSummary"]["AirTravelerAvail"][0]["PassengerTypeQuantity"];
        assert_eq!(ptq[0]["Quantity"], 2);
        assert_eq!(ptq[1]["Quantity"], 1);
    }

    #[test]
    fn return_payload_swaps_airports() {
        let p = search_payload(&request(), SearchDirection::Return);
        let od = &p["OriginDestinationInformation"][0];
        assert_eq!(od["OriginLocation"]["LocationCode"], "DXB");
        assert_eq!(od["DestinationLocation"]["LocationCode"], "BGW");
        assert_eq!(od["DepartureDateTime"]["value"], "2026-02-09");
    }

    #[test]
    fn combined_payload_has_both_legs() {
        let p = combined_payload(&request());
        let ods = p["OriginDestinationInformation"].as_array().unwrap();
        assert_eq!(ods.len(), 2);
        assert_eq!(ods[1]["OriginLocation"]["LocationCode"], "DXB");
    }

    #[test]
    fn base_url_derivation_chops_endpoint() {
        assert_eq!(
            derive_base_from_full_url("https://host/api/AirLowFareSearch").as_deref(),
            Some("https://host/api")
        );
        assert_eq!(
            derive_base_from_full_url("https://host/api/AirBook/").as_deref(),
            Some("https://host/api")
        );
        assert_eq!(derive_base_from_full_url("  "), None);
        assert_eq!(derive_base_from_full_url("bare-host").as_deref(), Some("bare-host"));
    }
}
