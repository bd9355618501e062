use thiserror::Error;

/// Why a provider produced no reading for a city.
///
/// Every variant is recoverable: the scheduler logs it and skips the city for
/// the current cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {city} failed: {source}")]
    Transport {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider answered {status} for {city}: {body}")]
    Status {
        city: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed provider response for {city}: {reason}")]
    Malformed { city: String, reason: String },

    #[error("provider timestamp {epoch} for {city} is out of range")]
    InvalidTimestamp { city: String, epoch: i64 },
}

impl FetchError {
    pub fn city(&self) -> &str {
        match self {
            FetchError::Transport { city, .. }
            | FetchError::Status { city, .. }
            | FetchError::Malformed { city, .. }
            | FetchError::InvalidTimestamp { city, .. } => city,
        }
    }
}
