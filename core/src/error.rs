use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Negative duration for '{physician}' on {date}: {minutes} minutes")]
    NegativeDuration {
        physician: String,
        date: String,
        minutes: i32,
    },

    #[error("Unparseable period: year={year}, month='{month}'")]
    InvalidPeriod { year: i32, month: String },

    #[error("No facility selected for period {period}")]
    NoFacilitySelected { period: String },

    #[error("Day classification expects one physician and one date, got {physicians} physicians over {dates} dates")]
    MixedClassificationBatch { physicians: usize, dates: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Peer fetch failed for {facility} {period}: {reason}")]
    PeerFetch {
        facility: String,
        period: String,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RosterResult<T> = Result<T, RosterError>;
