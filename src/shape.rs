//! Shape adapters for the polymorphic provider JSON.
//!
//! The upstream mixes casing (`ticketingInfo` vs `TicketingInfo`), wraps
//! single children as either an object or a one-element list, and callers
//! may hand back itineraries in the raw priced shape or our normalized
//! shape. All of that tolerance lives here, one named adapter per field
//! family, instead of being scattered through the components.

use serde_json::Value;

use crate::model::TicketingVendor;

pub fn get<'a>(val: &'a Value, key: &str) -> Option<&'a Value> {
    match val.get(key) {
        Some(Value::Null) | None => None,
        Some(v) => Some(v),
    }
}

/// Key lookup trying each casing variant in order.
pub fn get_any<'a>(val: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| get(val, k))
}

pub fn str_of(val: &Value, key: &str) -> String {
    match get(val, key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub fn f64_of(val: &Value, key: &str) -> Option<f64> {
    match get(val, key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

/// Treat an object as a one-element list; providers emit both shapes for
/// "repeated" elements with a single child.
pub fn as_slice(val: Option<&Value>) -> Vec<&Value> {
    match val {
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// The priced-itinerary list under `pricedItineraries.pricedItinerary`.
pub fn priced_itineraries(resp: &Value) -> Vec<&Value> {
    as_slice(get(resp, "pricedItineraries").and_then(|v| get(v, "pricedItinerary")))
}

/// Flight segments for one leg of an itinerary that may be in the raw
/// priced shape (either capitalization) or the normalized flat shape.
///
/// The normalized shape carries a single leg, so it only answers for
/// `leg_index == 0`. First non-empty source wins.
pub fn leg_segments(pi: &Value, leg_index: usize) -> Vec<&Value> {
    for (itin_key, options_key, option_key, segment_key) in [
        ("airItinerary", "originDestinationOptions", "originDestinationOption", "flightSegment"),
        ("AirItinerary", "OriginDestinationOptions", "OriginDestinationOption", "FlightSegment"),
    ] {
        let options = as_slice(
            get(pi, itin_key)
                .and_then(|v| get(v, options_key))
                .and_then(|v| get(v, option_key)),
        );
        if let Some(leg) = options.get(leg_index) {
            let segs: Vec<&Value> =
                as_slice(get(leg, segment_key)).into_iter().filter(|s| s.is_object()).collect();
            if !segs.is_empty() {
                return segs;
            }
        }
    }

    if leg_index == 0 {
        if let Some(Value::Array(segs)) = get(pi, "segments") {
            return segs.iter().filter(|s| s.is_object()).collect();
        }
    }

    Vec::new()
}

/// Airline code and short name, preferring the operating carrier and
/// falling back to the marketing one.
pub fn airline(seg: &Value) -> (String, String) {
    let op = get(seg, "operatingAirline");
    let mk = get(seg, "marketingAirline");
    let code = op
        .map(|v| str_of(v, "code"))
        .filter(|s| !s.is_empty())
        .or_else(|| mk.map(|v| str_of(v, "code")).filter(|s| !s.is_empty()))
        .unwrap_or_default();
    let name = op.map(|v| str_of(v, "companyShortName")).unwrap_or_default();
    (code, name)
}

/// `equipment` arrives as a list-of-one-dict or a dict.
pub fn equipment_type(seg: &Value) -> String {
    match get(seg, "equipment") {
        Some(Value::Array(items)) => {
            items.first().map(|v| str_of(v, "airEquipType")).unwrap_or_default()
        }
        Some(v @ Value::Object(_)) => str_of(v, "airEquipType"),
        _ => String::new(),
    }
}

/// The first `TPA_Extensions` entry: `tpaextensions.any[0]`, tolerating
/// the camel-cased key and a non-list `any`.
pub fn tpa_extension<'a>(seg: &'a Value) -> Option<&'a Value> {
    let tpa = get_any(seg, &["tpaextensions", "tpaExtensions"])?;
    as_slice(get(tpa, "any")).into_iter().next()
}

fn vendor_from(v: &Value) -> TicketingVendor {
    TicketingVendor {
        company_short_name: get_any(v, &["companyShortName", "CompanyShortName"])
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        code: get_any(v, &["code", "Code"]).and_then(|v| v.as_str()).unwrap_or("").to_string(),
        code_context: get_any(v, &["codeContext", "CodeContext"])
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    }
}

/// Ordered vendor lookup over every shape we accept:
/// 1. normalized `ticketing` block,
/// 2. top-level `ticketingVendor` / `TicketingVendor`,
/// 3. nested `ticketingInfo`/`TicketingInfo` → vendor.
pub fn ticketing_vendor(pi: &Value) -> Option<TicketingVendor> {
    if let Some(t) = get(pi, "ticketing").filter(|v| v.is_object()) {
        let vendor = vendor_from(t);
        if vendor.is_complete() {
            return Some(vendor);
        }
    }

    if let Some(t) = get_any(pi, &["ticketingVendor", "TicketingVendor"]).filter(|v| v.is_object())
    {
        let vendor = vendor_from(t);
        if vendor.is_complete() {
            return Some(vendor);
        }
    }

    let info = get_any(pi, &["ticketingInfo", "TicketingInfo"])?;
    let t = get_any(info, &["ticketingVendor", "TicketingVendor"])?;
    let vendor = vendor_from(t);
    vendor.is_complete().then_some(vendor)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FarePricing {
    pub base_currency: String,
    pub base_decimals: String,
    pub base_amount: String,
    pub total_currency: String,
    pub total_decimals: String,
    pub total_amount: String,
}

fn amount_string(n: f64) -> String {
    if (n - n.round()).abs() < 1e-9 {
        format!("{}", n.round() as i64)
    } else {
        n.to_string()
    }
}

/// Pricing from either shape: normalized display currency + raw amount
/// first, else the nested base/total fare blocks with a missing base
/// fare defaulting to the total fare.
pub fn pricing(pi: &Value) -> FarePricing {
    let has_raw_pricing = get(pi, "airItineraryPricingInfo").is_some();
    let looks_normalized = get(pi, "total_currency").is_some()
        || get(pi, "amount_raw").is_some()
        || get(pi, "total_amount").is_some();

    if looks_normalized && !has_raw_pricing {
        let currency = {
            let c = str_of(pi, "total_currency");
            if c.is_empty() { "IQD".to_string() } else { c }
        };
        let amount = f64_of(pi, "amount_raw")
            .or_else(|| f64_of(pi, "total_amount"))
            .unwrap_or(0.0);
        let amount = amount_string(amount);
        return FarePricing {
            base_currency: currency.clone(),
            base_decimals: "2".into(),
            base_amount: amount.clone(),
            total_currency: currency,
            total_decimals: "2".into(),
            total_amount: amount,
        };
    }

    let fare = as_slice(get(pi, "airItineraryPricingInfo").and_then(|v| get(v, "itinTotalFare")))
        .into_iter()
        .next();
    let total = fare.and_then(|f| get(f, "totalFare")).filter(|v| v.is_object());
    let base = fare
        .and_then(|f| get(f, "baseFare"))
        .filter(|v| v.is_object())
        .or(total);

    let pick = |blk: Option<&Value>, other: Option<&Value>, key: &str, default: &str| -> String {
        blk.map(|v| str_of(v, key))
            .filter(|s| !s.is_empty())
            .or_else(|| other.map(|v| str_of(v, key)).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| default.to_string())
    };

    FarePricing {
        base_currency: pick(base, total, "currencyCode", "IQD"),
        base_decimals: pick(base, total, "decimalPlaces", "2"),
        base_amount: pick(base, total, "amount", ""),
        total_currency: pick(total, base, "currencyCode", "IQD"),
        total_decimals: pick(total, base, "decimalPlaces", "2"),
        total_amount: pick(total, base, "amount", ""),
    }
}
