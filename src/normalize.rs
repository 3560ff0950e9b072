//! Normalizes the upstream low-fare-search response into the flat
//! itinerary model the rest of the system (and the frontend) consumes.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use crate::model::{ItinerarySummary, NormalizedItinerary, Segment, SearchMeta};
use crate::shape;

#[derive(Debug, Clone, Default)]
pub struct NormalizedSearch {
    pub meta: SearchMeta,
    pub itineraries: Vec<NormalizedItinerary>,
}

/// Upstream timestamps look like `2026-02-02T14:20:00.000+0300`.
pub fn parse_offset_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    None
}

fn fmt_hhmm(raw: &str) -> String {
    parse_offset_datetime(raw).map(|d| d.format("%H:%M").to_string()).unwrap_or_default()
}

/// Whole minutes between two raw timestamps, clamped to zero when the
/// upstream hands back inconsistent values.
pub fn duration_minutes(dep_dt: &str, arr_dt: &str) -> i64 {
    match (parse_offset_datetime(dep_dt), parse_offset_datetime(arr_dt)) {
        (Some(d0), Some(d1)) => (d1 - d0).num_minutes().max(0),
        _ => 0,
    }
}

pub fn format_duration_minutes(mins: i64) -> String {
    if mins <= 0 {
        return "0 min".to_string();
    }
    let (h, m) = (mins / 60, mins % 60);
    match (h, m) {
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h} hr"),
        (h, m) => format!("{h} hr {m} min"),
    }
}

pub fn stops_label(stops: usize) -> String {
    match stops {
        0 => "Non-stop".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{n} stops"),
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Display rendering for fare amounts: grouped thousands, no decimals
/// when the value is integral, two decimals otherwise.
pub fn format_money(amount: f64) -> String {
    if (amount - amount.round()).abs() < 1e-9 {
        group_thousands(amount.round() as i64)
    } else {
        let whole = amount.trunc() as i64;
        let cents = ((amount - amount.trunc()).abs() * 100.0).round() as i64;
        format!("{}.{:02}", group_thousands(whole), cents)
    }
}

fn normalize_segment(seg: &Value) -> Segment {
    let (airline, airline_name) = shape::airline(seg);
    let tpa = shape::tpa_extension(seg);
    Segment {
        dep: shape::get(seg, "departureAirport")
            .map(|v| shape::str_of(v, "locationCode"))
            .unwrap_or_default(),
        arr: shape::get(seg, "arrivalAirport")
            .map(|v| shape::str_of(v, "locationCode"))
            .unwrap_or_default(),
        dep_dt: shape::str_of(seg, "departureDateTime"),
        arr_dt: shape::str_of(seg, "arrivalDateTime"),
        airline,
        airline_name,
        flight: shape::str_of(seg, "flightNumber"),
        booking_class: shape::str_of(seg, "resBookDesigCode"),
        fare_basis: shape::str_of(seg, "fareBasisCode"),
        equipment: shape::equipment_type(seg),
        aircraft: tpa.map(|v| shape::str_of(v, "aircraftName")).unwrap_or_default(),
        baggage: tpa.map(|v| shape::str_of(v, "freeBaggage")).unwrap_or_default(),
        duration_raw: tpa.map(|v| shape::str_of(v, "duration")).unwrap_or_default(),
    }
}

fn normalize_itinerary(pi: &Value, position: i64) -> Option<NormalizedItinerary> {
    // A priced itinerary exposes one directional option; an empty segment
    // list drops just this itinerary, never the batch.
    let raw_segments = shape::leg_segments(pi, 0);
    if raw_segments.is_empty() {
        return None;
    }
    let segments: Vec<Segment> = raw_segments.iter().map(|s| normalize_segment(s)).collect();

    let first = segments.first()?;
    let last = segments.last()?;
    let total_mins = duration_minutes(&first.dep_dt, &last.arr_dt);
    let stops = segments.len().saturating_sub(1);

    let fare = shape::pricing(pi);
    let amount_raw: f64 = fare.total_amount.parse().unwrap_or(0.0);

    let summary = ItinerarySummary {
        depart_time: fmt_hhmm(&first.dep_dt),
        arrive_time: fmt_hhmm(&last.arr_dt),
        duration_mins: total_mins,
        duration: format_duration_minutes(total_mins),
        stops,
        stops_label: stops_label(stops),
    };

    Some(NormalizedItinerary {
        sequence_number: shape::f64_of(pi, "sequenceNumber").map(|n| n as i64).unwrap_or(position),
        segments,
        summary,
        total_currency: fare.total_currency,
        total_amount: format_money(amount_raw),
        amount_raw,
        ticketing: shape::ticketing_vendor(pi),
        ..Default::default()
    })
}

/// Raw provider search response → ordered list of normalized itineraries.
/// The raw input is never mutated.
pub fn normalize_search_response(resp: &Value) -> NormalizedSearch {
    let meta = SearchMeta {
        echo_token: shape::get(resp, "echoToken").and_then(|v| v.as_str()).map(String::from),
        target_name: shape::get(resp, "targetName").and_then(|v| v.as_str()).map(String::from),
        ..Default::default()
    };

    let itineraries = shape::priced_itineraries(resp)
        .iter()
        .enumerate()
        .filter_map(|(idx, pi)| normalize_itinerary(pi, idx as i64 + 1))
        .collect();

    NormalizedSearch { meta, itineraries }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{raw_itinerary, raw_segment};
    use super::*;
    use crate::model::ItineraryKey;
    use serde_json::{json, Value};
    use test_case::test_case;

    fn sample_response() -> Value {
        json!({
            "echoToken": "tok-1",
            "targetName": "PROD",
            "pricedItineraries": {"pricedItinerary": [
                raw_itinerary(vec![raw_segment(
                    "BGW", "DXB",
                    "2026-02-02T10:00:00.000+0300", "2026-02-02T11:30:00.000+0300",
                    "IA", "241",
                )], 250000.0),
                // zero segments: silently dropped
                json!({"airItinerary": {"originDestinationOptions": {"originDestinationOption": [
                    {"flightSegment": []}
                ]}}}),
                raw_itinerary(vec![
                    raw_segment(
                        "BGW", "IST",
                        "2026-02-02T08:00:00.000+0300", "2026-02-02T10:05:00.000+0300",
                        "TK", "101",
                    ),
                    raw_segment(
                        "IST", "DXB",
                        "2026-02-02T12:00:00.000+0300", "2026-02-02T16:20:00.000+0300",
                        "TK", "760",
                    ),
                ], 310500.5),
            ]}
        })
    }

    #[test]
    fn drops_only_empty_itineraries_and_keeps_order() {
        let out = normalize_search_response(&sample_response());
        assert_eq!(out.meta.echo_token.as_deref(), Some("tok-1"));
        assert_eq!(out.meta.target_name.as_deref(), Some("PROD"));
        assert_eq!(out.itineraries.len(), 2);
        assert_eq!(out.itineraries[0].segments[0].airline, "IA");
        assert_eq!(out.itineraries[1].segments[0].airline, "TK");
    }

    #[test]
    fn duration_and_summary() {
        let out = normalize_search_response(&sample_response());
        let first = &out.itineraries[0];
        assert_eq!(first.summary.duration_mins, 90);
        assert_eq!(first.summary.duration, "1 hr 30 min");
        assert_eq!(first.summary.depart_time, "10:00");
        assert_eq!(first.summary.arrive_time, "11:30");
        assert_eq!(first.summary.stops_label, "Non-stop");

        let second = &out.itineraries[1];
        assert_eq!(second.summary.stops, 1);
        assert_eq!(second.summary.stops_label, "1 stop");
    }

    #[test]
    fn zero_duration_when_timestamps_equal_or_inconsistent() {
        assert_eq!(duration_minutes("2026-02-02T10:00:00.000+0300", "2026-02-02T10:00:00.000+0300"), 0);
        // arrival before departure clamps to zero
        assert_eq!(duration_minutes("2026-02-02T10:00:00.000+0300", "2026-02-02T09:00:00.000+0300"), 0);
        assert_eq!(format_duration_minutes(0), "0 min");
    }

    #[test_case(0 => "Non-stop")]
    #[test_case(1 => "1 stop")]
    #[test_case(3 => "3 stops")]
    fn stop_labels(stops: usize) -> String {
        stops_label(stops)
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(250000.0), "250,000");
        assert_eq!(format_money(310500.5), "310,500.50");
        assert_eq!(format_money(999.0), "999");
        assert_eq!(format_money(120.8), "120.80");
    }

    #[test]
    fn price_defaults_currency_and_keeps_raw_value() {
        let out = normalize_search_response(&sample_response());
        assert_eq!(out.itineraries[0].total_currency, "IQD");
        assert_eq!(out.itineraries[0].total_amount, "250,000");
        assert_eq!(out.itineraries[0].amount_raw, 250000.0);
        assert_eq!(out.itineraries[1].total_amount, "310,500.50");
        assert_eq!(out.itineraries[1].amount_raw, 310500.5);

        let no_currency = json!({"pricedItineraries": {"pricedItinerary": [
            json!({
                "airItinerary": {"originDestinationOptions": {"originDestinationOption": [
                    {"flightSegment": [raw_segment("BGW", "DXB", "", "", "IA", "1")]}
                ]}},
                "airItineraryPricingInfo": {"itinTotalFare": [{"totalFare": {"amount": 10}}]}
            })
        ]}});
        let out = normalize_search_response(&no_currency);
        assert_eq!(out.itineraries[0].total_currency, "IQD");
    }

    #[test]
    fn key_identical_across_repeated_normalization() {
        let resp = sample_response();
        let a = normalize_search_response(&resp);
        let b = normalize_search_response(&resp);
        assert_eq!(
            ItineraryKey::of_itinerary(&a.itineraries[0]),
            ItineraryKey::of_itinerary(&b.itineraries[0])
        );
    }

    #[test]
    fn vendor_extracted_opportunistically() {
        let out = normalize_search_response(&sample_response());
        let vendor = out.itineraries[0].ticketing.as_ref().unwrap();
        assert_eq!(vendor.code, "IA");
        assert_eq!(vendor.company_short_name, "Iraqi Airways");
    }

    #[test]
    fn equipment_dict_variant_tolerated() {
        let mut seg = raw_segment("BGW", "DXB", "", "", "IA", "1");
        seg["equipment"] = json!({"airEquipType": "320"});
        let resp = json!({"pricedItineraries": {"pricedItinerary": [raw_itinerary(vec![seg], 1.0)]}});
        let out = normalize_search_response(&resp);
        assert_eq!(out.itineraries[0].segments[0].equipment, "320");
    }
}
