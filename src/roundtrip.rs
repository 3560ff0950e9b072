//! Reconciles independently searched return legs with true combined
//! round-trip pricing.
//!
//! One-way searches lose the round-trip discount, so the service issues
//! one extra combined search; each priced itinerary there carries both
//! directions, and its second leg identifies which return option it
//! prices. The combined total is attached to matching return results
//! without touching their one-way totals.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::{ItineraryKey, NormalizedItinerary};
use crate::normalize::format_money;
use crate::shape;

#[derive(Debug, Clone, PartialEq)]
pub struct RoundTripPrice {
    pub currency: String,
    pub amount: String,
    pub amount_raw: f64,
}

fn key_of_raw_segment(seg: &Value) -> ItineraryKey {
    let (airline, _) = shape::airline(seg);
    ItineraryKey::from_parts(
        &shape::get(seg, "departureAirport").map(|v| shape::str_of(v, "locationCode")).unwrap_or_default(),
        &shape::get(seg, "arrivalAirport").map(|v| shape::str_of(v, "locationCode")).unwrap_or_default(),
        &shape::str_of(seg, "departureDateTime"),
        &shape::str_of(seg, "arrivalDateTime"),
        &airline,
        &shape::str_of(seg, "flightNumber"),
    )
}

/// Builds the lookup from a combined outbound+return search response:
/// second leg's first-segment key → combined total fare.
pub fn roundtrip_price_map(combined_resp: &Value) -> HashMap<ItineraryKey, RoundTripPrice> {
    let mut map = HashMap::new();

    for pi in shape::priced_itineraries(combined_resp) {
        let return_segs = shape::leg_segments(pi, 1);
        let Some(first_return) = return_segs.first() else {
            continue;
        };

        let fare = shape::pricing(pi);
        let Ok(amount_raw) = fare.total_amount.parse::<f64>() else {
            continue;
        };

        map.insert(
            key_of_raw_segment(first_return),
            RoundTripPrice {
                currency: fare.total_currency,
                amount: format_money(amount_raw),
                amount_raw,
            },
        );
    }

    map
}

/// Attaches round-trip totals to every return itinerary whose key has an
/// entry in the map. Exact signature equality only; everything else is
/// left unchanged.
pub fn merge_roundtrip_totals(
    returns: &mut [NormalizedItinerary],
    prices: &HashMap<ItineraryKey, RoundTripPrice>,
) {
    if prices.is_empty() {
        return;
    }
    for it in returns.iter_mut() {
        let Some(key) = ItineraryKey::of_itinerary(it) else {
            continue;
        };
        if let Some(price) = prices.get(&key) {
            it.roundtrip_total_currency = Some(price.currency.clone());
            it.roundtrip_total_amount = Some(price.amount.clone());
            it.roundtrip_amount_raw = Some(price.amount_raw);
        }
    }
}
