//! Orchestration over the upstream transport: policy-gated search with
//! round-trip reconciliation and seat estimation, and the booking flow
//! with its reject / pending / success outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::booking::{build_air_book_xml, extract_booking_refs, BookingOptions, RefExtraction};
use crate::cache::TtlCache;
use crate::client::{combined_payload, search_payload, GdsTransport, SearchDirection};
use crate::error::AdapterError;
use crate::estimator::{estimate_seats, CancelFlag, SeatEstimates};
use crate::model::{
    AvailabilityRequest, BookingOutcome, BookingRequest, ItineraryKey, NormalizedItinerary,
    SearchResponse, TripType,
};
use crate::normalize::normalize_search_response;
use crate::policy::{evaluate, filter_blocked_airlines, PolicyDecision, ProviderPolicy};
use crate::roundtrip::{merge_roundtrip_totals, roundtrip_price_map};

pub const DEFAULT_PROVIDER_ID: &str = "wings";
const POLICY_CACHE_TTL: Duration = Duration::from_secs(30);

/// Per-request caller identity, used for provider permission checks.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_id: Option<String>,
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get(&self, provider_id: &str) -> Option<ProviderPolicy>;
}

/// Which providers a caller may see. `None` means unrestricted.
#[async_trait]
pub trait PermissionFilter: Send + Sync {
    async fn allowed_providers(&self, ctx: &RequestContext) -> Option<HashSet<String>>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// In-memory policy store; the production deployment swaps in one backed
/// by the operator configuration service.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    policies: RwLock<HashMap<String, ProviderPolicy>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, provider_id: &str, policy: ProviderPolicy) {
        self.policies.write().insert(provider_id.to_string(), policy);
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get(&self, provider_id: &str) -> Option<ProviderPolicy> {
        self.policies.read().get(provider_id).cloned()
    }
}

/// Permission filter that allows everything.
pub struct AllowAll;

#[async_trait]
impl PermissionFilter for AllowAll {
    async fn allowed_providers(&self, _ctx: &RequestContext) -> Option<HashSet<String>> {
        None
    }
}

pub struct FlightService<T: GdsTransport> {
    transport: T,
    policies: Arc<dyn PolicyStore>,
    permissions: Arc<dyn PermissionFilter>,
    clock: Arc<dyn Clock>,
    policy_cache: TtlCache<ProviderPolicy>,
    provider_id: String,
    booking_options: BookingOptions,
}

impl<T: GdsTransport> FlightService<T> {
    pub fn new(
        transport: T,
        policies: Arc<dyn PolicyStore>,
        permissions: Arc<dyn PermissionFilter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        FlightService {
            transport,
            policies,
            permissions,
            clock,
            policy_cache: TtlCache::new(POLICY_CACHE_TTL),
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            booking_options: BookingOptions::default(),
        }
    }

    pub fn with_provider_id(mut self, provider_id: &str) -> Self {
        self.provider_id = provider_id.to_string();
        self
    }

    pub fn with_booking_options(mut self, options: BookingOptions) -> Self {
        self.booking_options = options;
        self
    }

    async fn decision(&self) -> PolicyDecision {
        let policy = match self.policy_cache.get(&self.provider_id) {
            Some(policy) => Some(policy),
            None => {
                let fetched = self.policies.get(&self.provider_id).await;
                if let Some(policy) = &fetched {
                    self.policy_cache.insert(&self.provider_id, policy.clone());
                }
                fetched
            }
        };
        match policy {
            Some(policy) => evaluate(&policy, &self.provider_id, self.clock.now()),
            None => PolicyDecision::disabled(),
        }
    }

    /// Policy-gated availability search. Outbound and return legs are
    /// fetched concurrently; round-trip reconciliation and seat
    /// estimation are best-effort extras on top.
    pub async fn search(
        &self,
        req: &AvailabilityRequest,
        ctx: &RequestContext,
    ) -> Result<SearchResponse, AdapterError> {
        req.validate()?;

        let decision = self.decision().await;
        if !decision.availability {
            info!(provider = %self.provider_id, "availability disabled by policy");
            let mut response = SearchResponse::default();
            response.meta.disabled = true;
            response.meta.reason = Some("provider availability disabled".to_string());
            return Ok(response);
        }

        let want_return = req.trip_type == TripType::RoundTrip && req.return_date.is_some();

        let outbound_payload = search_payload(req, SearchDirection::Outbound);
        let return_payload = search_payload(req, SearchDirection::Return);
        let outbound_fut = self.transport.low_fare_search(&outbound_payload);
        let return_fut = async {
            if want_return {
                self.transport.low_fare_search(&return_payload).await.map(Some)
            } else {
                Ok(None)
            }
        };
        let (outbound_raw, return_raw) = futures::try_join!(outbound_fut, return_fut)?;

        let normalized_out = normalize_search_response(&outbound_raw);
        let mut results = normalized_out.itineraries;
        let mut results_return = return_raw
            .as_ref()
            .map(|raw| normalize_search_response(raw).itineraries)
            .unwrap_or_default();

        // True round-trip totals come from one combined search; losing it
        // only loses the discount display, never the results.
        if want_return && !results.is_empty() && !results_return.is_empty() {
            match self.transport.low_fare_search(&combined_payload(req)).await {
                Ok(combined) => {
                    merge_roundtrip_totals(&mut results_return, &roundtrip_price_map(&combined));
                }
                Err(err) => {
                    warn!(error = %err, "combined round-trip search failed, totals not merged");
                }
            }
        }

        for it in results.iter_mut().chain(results_return.iter_mut()) {
            it.provider = Some(self.provider_id.clone());
        }

        filter_blocked_airlines(&decision, &mut results);
        filter_blocked_airlines(&decision, &mut results_return);

        let allowed = self.permissions.allowed_providers(ctx).await;
        apply_provider_permissions(&allowed, &mut results);
        apply_provider_permissions(&allowed, &mut results_return);

        if decision.seats_estimation_enabled {
            let estimates = self
                .probe_seats(req, &results, &results_return, &decision, &allowed)
                .await;
            attach_seats(&mut results, &estimates.outbound);
            attach_seats(&mut results_return, &estimates.inbound);
        }

        Ok(SearchResponse {
            meta: normalized_out.meta,
            results,
            results_return,
        })
    }

    async fn probe_seats(
        &self,
        req: &AvailabilityRequest,
        results: &[NormalizedItinerary],
        results_return: &[NormalizedItinerary],
        decision: &PolicyDecision,
        allowed: &Option<HashSet<String>>,
    ) -> SeatEstimates {
        let out_keys: Vec<ItineraryKey> =
            results.iter().filter_map(ItineraryKey::of_itinerary).collect();
        let ret_keys: Vec<ItineraryKey> =
            results_return.iter().filter_map(ItineraryKey::of_itinerary).collect();

        let decision = decision.clone();
        let allowed = allowed.clone();
        let provider_id = self.provider_id.clone();
        let filter = move |probe_results: &mut Vec<NormalizedItinerary>| {
            for it in probe_results.iter_mut() {
                it.provider = Some(provider_id.clone());
            }
            filter_blocked_airlines(&decision, probe_results);
            apply_provider_permissions(&allowed, probe_results);
        };

        estimate_seats(&self.transport, req, &out_keys, &ret_keys, &filter, &CancelFlag::new())
            .await
    }

    /// Booking flow. Client input problems are errors; everything after
    /// the input is validated resolves to an outcome, with upstream
    /// trouble parked as `Pending` for manual completion.
    pub async fn book(&self, req: &BookingRequest) -> Result<BookingOutcome, AdapterError> {
        if !req.outbound_itinerary.is_object() {
            return Err(AdapterError::JsonParse(
                "booking itinerary must be a JSON object".to_string(),
            ));
        }
        if req.passengers.is_empty() {
            return Err(AdapterError::NoPassengers);
        }

        let decision = self.decision().await;
        if !decision.ticketing_effective {
            // No network call is made for a policy-parked booking.
            let reason = if decision.availability {
                "ticketing outside the permitted schedule or mode".to_string()
            } else {
                "provider disabled by policy".to_string()
            };
            info!(provider = %self.provider_id, %reason, "booking parked as pending");
            return Ok(self.pending(reason));
        }

        let xml = build_air_book_xml(
            &req.outbound_itinerary,
            req.return_itinerary.as_ref(),
            &req.passengers,
            req.contact.as_ref(),
            req.trip_type,
            &self.booking_options,
        )?;

        let response = match self.transport.air_book(&xml).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "booking transport failure, manual completion required");
                return Ok(self.pending("upstream unreachable, manual completion required".to_string()));
            }
        };
        if !response.is_success() {
            warn!(status = response.status, "upstream rejected booking, manual completion required");
            return Ok(self
                .pending(format!("upstream returned HTTP {}, manual completion required", response.status)));
        }

        let (pnr, secondary_id) = match extract_booking_refs(&response.body) {
            RefExtraction::Strict(refs) => (refs.pnr, refs.secondary_id),
            RefExtraction::Fallback(refs) => {
                debug!("booking references recovered by pattern fallback");
                (refs.pnr, refs.secondary_id)
            }
            RefExtraction::Failed => {
                warn!("booking succeeded upstream but no references could be extracted");
                (None, None)
            }
        };

        Ok(BookingOutcome::Success {
            pnr,
            secondary_id,
            request_xml: xml,
            response_xml: response.body,
        })
    }

    fn pending(&self, reason: String) -> BookingOutcome {
        BookingOutcome::Pending {
            pending_id: new_pending_id(),
            provider: self.provider_id.clone(),
            reason,
        }
    }
}

fn apply_provider_permissions(
    allowed: &Option<HashSet<String>>,
    results: &mut Vec<NormalizedItinerary>,
) {
    let Some(allowed) = allowed else {
        return;
    };
    results.retain(|it| match it.provider.as_deref() {
        None | Some("") => true,
        Some(provider) => allowed.contains(provider),
    });
}

fn attach_seats(results: &mut [NormalizedItinerary], seats: &HashMap<ItineraryKey, u32>) {
    if seats.is_empty() {
        return;
    }
    for it in results.iter_mut() {
        if let Some(key) = ItineraryKey::of_itinerary(it) {
            if let Some(count) = seats.get(&key) {
                it.seats_available = Some(*count);
            }
        }
    }
}

fn new_pending_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..10)
        .map(|_| {
            let digit = rng.gen_range(0..16u32);
            char::from_digit(digit, 16).unwrap_or('0').to_ascii_uppercase()
        })
        .collect();
    format!("PND-{suffix}")
}
