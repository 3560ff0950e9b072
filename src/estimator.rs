//! Seat availability estimation by probing.
//!
//! The provider does not expose seat counts, but results disappear from
//! a search once the requested passenger count exceeds the seats left.
//! Probing ascending passenger counts and watching for each itinerary's
//! first disappearance brackets its availability. Estimates are
//! best-effort display data; any probe failure abandons the whole run
//! without failing the search that requested it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::{search_payload, GdsTransport, SearchDirection};
use crate::model::{AvailabilityRequest, ItineraryKey, NormalizedItinerary};
use crate::normalize::normalize_search_response;

/// Highest passenger count probed.
pub const MAX_CHECK: u32 = 8;
/// Displayed estimate for "at least this many".
pub const DISPLAY_CAP: u32 = 9;

/// Cooperative cancellation for an in-flight probe run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeatEstimates {
    pub outbound: HashMap<ItineraryKey, u32>,
    pub inbound: HashMap<ItineraryKey, u32>,
}

impl SeatEstimates {
    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty() && self.inbound.is_empty()
    }
}

fn key_set(results: &[NormalizedItinerary]) -> Vec<ItineraryKey> {
    results.iter().filter_map(ItineraryKey::of_itinerary).collect()
}

fn resolve_unfilled(pending: HashMap<ItineraryKey, Option<u32>>) -> HashMap<ItineraryKey, u32> {
    pending
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or(DISPLAY_CAP)))
        .collect()
}

/// Probes ascending passenger counts and estimates per-itinerary seat
/// availability for the given result keys.
///
/// `filter` must apply the same result filtering as the search that
/// produced the keys, or disappearances caused by filtering would be
/// mistaken for sold-out flights.
pub async fn estimate_seats(
    transport: &dyn GdsTransport,
    base: &AvailabilityRequest,
    out_keys: &[ItineraryKey],
    ret_keys: &[ItineraryKey],
    filter: &(dyn Fn(&mut Vec<NormalizedItinerary>) + Sync),
    cancel: &CancelFlag,
) -> SeatEstimates {
    let mut seats_out: HashMap<ItineraryKey, Option<u32>> =
        out_keys.iter().cloned().map(|k| (k, None)).collect();
    let mut seats_in: HashMap<ItineraryKey, Option<u32>> =
        ret_keys.iter().cloned().map(|k| (k, None)).collect();
    if seats_out.is_empty() && seats_in.is_empty() {
        return SeatEstimates::default();
    }

    let base_total = base.pax.total().max(1);
    if base_total >= MAX_CHECK {
        let seats = base_total.min(DISPLAY_CAP);
        return SeatEstimates {
            outbound: seats_out.into_keys().map(|k| (k, seats)).collect(),
            inbound: seats_in.into_keys().map(|k| (k, seats)).collect(),
        };
    }

    for pax_total in (base_total + 1)..=MAX_CHECK {
        if cancel.is_cancelled() {
            debug!(pax_total, "seat probe cancelled, capping unresolved keys");
            break;
        }
        if seats_out.values().all(Option::is_some) && seats_in.values().all(Option::is_some) {
            break;
        }

        // Only adults are increased; child/infant mix stays as requested.
        let mut probe = base.clone();
        probe.pax.adults = (base.pax.adults + (pax_total - base_total)).max(1);

        let out_present = match probe_direction(transport, &probe, SearchDirection::Outbound, filter)
            .await
        {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, pax_total, "seat probe failed, abandoning estimation");
                return SeatEstimates::default();
            }
        };
        let in_present = if seats_in.is_empty() {
            Vec::new()
        } else {
            match probe_direction(transport, &probe, SearchDirection::Return, filter).await {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(error = %err, pax_total, "seat probe failed, abandoning estimation");
                    return SeatEstimates::default();
                }
            }
        };

        // First disappearance wins.
        for (key, slot) in seats_out.iter_mut() {
            if slot.is_none() && !out_present.contains(key) {
                *slot = Some(pax_total - 1);
            }
        }
        for (key, slot) in seats_in.iter_mut() {
            if slot.is_none() && !in_present.contains(key) {
                *slot = Some(pax_total - 1);
            }
        }
    }

    SeatEstimates {
        outbound: resolve_unfilled(seats_out),
        inbound: resolve_unfilled(seats_in),
    }
}

async fn probe_direction(
    transport: &dyn GdsTransport,
    probe: &AvailabilityRequest,
    direction: SearchDirection,
    filter: &(dyn Fn(&mut Vec<NormalizedItinerary>) + Sync),
) -> Result<Vec<ItineraryKey>, crate::error::AdapterError> {
    let resp = transport.low_fare_search(&search_payload(probe, direction)).await?;
    let mut results = normalize_search_response(&resp).itineraries;
    filter(&mut results);
    Ok(key_set(&results))
}
