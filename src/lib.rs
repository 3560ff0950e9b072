// GDS protocol adapter: JSON low-fare search in, OTA XML booking out.

pub mod booking;
pub mod cache;
pub mod client;
pub mod error;
pub mod estimator;
pub mod model;
pub mod normalize;
pub mod policy;
pub mod roundtrip;
pub mod service;
pub mod shape;

// Re-export key types for convenience
pub use booking::{build_air_book_xml, extract_booking_refs, BookingOptions, BookingRefs, RefExtraction};
pub use client::{GatewayConfig, GdsTransport, HttpGateway, SearchDirection};
pub use error::AdapterError;
pub use estimator::{estimate_seats, CancelFlag, SeatEstimates};
pub use model::{
    AvailabilityRequest, BookingOutcome, BookingRequest, CabinClass, Contact, ItineraryKey,
    NormalizedItinerary, Passenger, PassengerType, Pax, SearchResponse, TripType,
};
pub use normalize::normalize_search_response;
pub use policy::{evaluate, schedule_allows, PolicyDecision, ProviderPolicy, TicketingMode};
pub use service::{
    Clock, FlightService, PermissionFilter, PolicyStore, RequestContext, SystemClock,
};
