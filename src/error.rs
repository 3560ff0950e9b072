// Error taxonomy for the GDS adapter
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("at least one passenger is required")]
    NoPassengers,

    #[error("itinerary has no flight segments for leg {0}")]
    EmptyItinerary(usize),

    #[error("ticketing vendor not found in itinerary")]
    VendorMissing,

    #[error("passenger {0} is missing travel document fields")]
    MissingDocuments(usize),

    #[error("invalid airport code \"{0}\" (expected 3 letters, e.g. BGW)")]
    InvalidAirport(String),

    #[error("provider {0} is disabled by policy")]
    ProviderDisabled(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("upstream rejected request with HTTP {0}")]
    UpstreamStatus(u16),
}

impl AdapterError {
    /// Errors caused by bad caller input. These reject a booking outright
    /// and must never be downgraded to a pending outcome.
    pub fn is_client_input(&self) -> bool {
        matches!(
            self,
            AdapterError::JsonParse(_)
                | AdapterError::NoPassengers
                | AdapterError::EmptyItinerary(_)
                | AdapterError::VendorMissing
                | AdapterError::MissingDocuments(_)
                | AdapterError::InvalidAirport(_)
        )
    }

    /// Transport-class failures. During search these propagate as
    /// retryable; during booking they resolve to a pending outcome.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AdapterError::Network(_) | AdapterError::Timeout(_) | AdapterError::UpstreamStatus(_)
        )
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AdapterError::Timeout(0);
        }
        if let Some(status) = err.status() {
            return AdapterError::UpstreamStatus(status.as_u16());
        }
        AdapterError::Network(err.to_string())
    }
}
