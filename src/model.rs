use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// One flown flight within an itinerary, after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    pub dep: String,
    pub arr: String,
    pub dep_dt: String,
    pub arr_dt: String,
    pub airline: String,
    pub airline_name: String,
    pub flight: String,
    pub booking_class: String,
    pub fare_basis: String,
    pub equipment: String,
    pub aircraft: String,
    pub baggage: String,
    pub duration_raw: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItinerarySummary {
    pub depart_time: String,
    pub arrive_time: String,
    pub duration_mins: i64,
    pub duration: String,
    pub stops: usize,
    pub stops_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketingVendor {
    #[serde(rename = "companyShortName")]
    pub company_short_name: String,
    pub code: String,
    #[serde(rename = "codeContext")]
    pub code_context: String,
}

impl TicketingVendor {
    pub fn is_complete(&self) -> bool {
        !self.company_short_name.is_empty() && !self.code.is_empty() && !self.code_context.is_empty()
    }
}

/// A single directional travel option in the flat normalized shape the
/// rest of the system works with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedItinerary {
    pub sequence_number: i64,
    pub segments: Vec<Segment>,
    pub summary: ItinerarySummary,
    pub total_currency: String,
    pub total_amount: String,
    pub amount_raw: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticketing: Option<TicketingVendor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// True round-trip totals merged from a combined search; the one-way
    /// totals above stay untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roundtrip_total_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roundtrip_total_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roundtrip_amount_raw: Option<f64>,
    /// Filled by the seat probe estimator when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats_available: Option<u32>,
}

/// Stable signature of an itinerary's first segment:
/// `dep|arr|depDateTime|arrDateTime|airlineCode|flightNumber`.
///
/// Round-trip matching, blocked-airline filtering and seat tracking all
/// key on this; it must come out identical no matter which component
/// computes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItineraryKey(String);

impl ItineraryKey {
    pub fn from_parts(
        dep: &str,
        arr: &str,
        dep_dt: &str,
        arr_dt: &str,
        airline: &str,
        flight: &str,
    ) -> Self {
        ItineraryKey(
            [
                dep.trim().to_ascii_uppercase(),
                arr.trim().to_ascii_uppercase(),
                dep_dt.trim().to_string(),
                arr_dt.trim().to_string(),
                airline.trim().to_ascii_uppercase(),
                flight.trim().to_string(),
            ]
            .join("|"),
        )
    }

    pub fn of_itinerary(it: &NormalizedItinerary) -> Option<Self> {
        let s = it.segments.first()?;
        Some(Self::from_parts(
            &s.dep, &s.arr, &s.dep_dt, &s.arr_dt, &s.airline, &s.flight,
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    OneWay,
    RoundTrip,
}

impl Default for TripType {
    fn default() -> Self {
        TripType::OneWay
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CabinClass {
    Economy,
    Business,
}

impl Default for CabinClass {
    fn default() -> Self {
        CabinClass::Economy
    }
}

impl CabinClass {
    /// Upstream cabin preference value.
    pub fn upstream_value(&self) -> &'static str {
        match self {
            CabinClass::Economy => "Economy",
            CabinClass::Business => "Business",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pax {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl Default for Pax {
    fn default() -> Self {
        Pax { adults: 1, children: 0, infants: 0 }
    }
}

impl Pax {
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    pub from: String,
    pub to: String,
    /// Departure date, YYYY-MM-DD.
    pub date: String,
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub cabin: CabinClass,
    #[serde(default)]
    pub pax: Pax,
}

impl AvailabilityRequest {
    pub fn validate(&self) -> Result<(), AdapterError> {
        validate_airport(&self.from)?;
        validate_airport(&self.to)?;
        Ok(())
    }
}

fn validate_airport(code: &str) -> Result<(), AdapterError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AdapterError::InvalidAirport(code.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassengerType {
    #[serde(rename = "ADT")]
    Adult,
    #[serde(rename = "CHD")]
    Child,
    #[serde(rename = "INF")]
    Infant,
}

impl Default for PassengerType {
    fn default() -> Self {
        PassengerType::Adult
    }
}

impl PassengerType {
    pub fn code(&self) -> &'static str {
        match self {
            PassengerType::Adult => "ADT",
            PassengerType::Child => "CHD",
            PassengerType::Infant => "INF",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
    /// YYYY-MM-DD.
    pub birth_date: String,
    #[serde(default)]
    pub pax_type: PassengerType,
    #[serde(default = "default_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_gender")]
    pub gender: String,
    #[serde(default)]
    pub passport: Option<String>,
    #[serde(default)]
    pub issue_country: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub expire_date: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
}

fn default_prefix() -> String {
    "MR".to_string()
}

fn default_gender() -> String {
    "M".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// Booking input. The itineraries arrive as raw JSON because callers may
/// hand back either the raw priced itinerary from the upstream or the
/// normalized shape produced by [`crate::normalize`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub trip_type: TripType,
    pub outbound_itinerary: serde_json::Value,
    #[serde(default)]
    pub return_itinerary: Option<serde_json::Value>,
    pub passengers: Vec<Passenger>,
    #[serde(default)]
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchMeta {
    pub echo_token: Option<String>,
    pub target_name: Option<String>,
    pub disabled: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub meta: SearchMeta,
    pub results: Vec<NormalizedItinerary>,
    pub results_return: Vec<NormalizedItinerary>,
}

/// Terminal outcome of a booking attempt. Pending is a first-class
/// variant: operators complete those manually, they are not failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BookingOutcome {
    Success {
        pnr: Option<String>,
        secondary_id: Option<String>,
        request_xml: String,
        response_xml: String,
    },
    Pending {
        pending_id: String,
        provider: String,
        reason: String,
    },
}

impl BookingOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, BookingOutcome::Pending { .. })
    }
}
