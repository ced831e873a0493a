use std::error::Error;

/// Error returned when a setter, a [`PastConfig`](crate::config::PastConfig)
/// or an environment variable carries a value the engine cannot use.
///
/// A setter that returns this error leaves the logger untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown severity level name: {0:?}")]
    UnknownLevelName(String),

    #[error("severity {0} is not on the level scale")]
    UnknownLevelValue(i64),

    #[error("invalid buffer capacity {0}: expected -1 (unbounded) or a non-negative count")]
    InvalidCapacity(i64),

    #[error("invalid value {value:?} in environment variable {key}")]
    InvalidEnv { key: &'static str, value: String },
}

/// Failure raised by a [`Handler`](crate::handler::Handler).
///
/// The engine never swallows these: they propagate out of
/// [`Logger::log`](crate::logger::Logger::log) to the caller.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("handler i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("handler channel is closed")]
    Closed,

    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn other(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        HandlerError::Other(err.into())
    }
}

/// Error returned when installing the global `tracing` subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to install global subscriber: {0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}
