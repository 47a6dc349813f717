//! Error types for replay extraction.
//!
//! Failures fall into two fatal classes that are always propagated to the
//! caller: the event source failed to decode further, or the request was
//! malformed and rejected before any traversal started. Missing data inside
//! an otherwise healthy stream (an unresolved handle, a name index absent
//! from its table) is never an error and never reaches this module.

use thiserror::Error;

/// The main error type for extraction operations.
///
/// # Example
///
/// ```
/// use replay_extract::error::{ExtractError, Result};
///
/// fn check_interval(interval: u32) -> Result<()> {
///     if interval == 0 {
///         return Err(ExtractError::config("interval_ticks must be positive"));
///     }
///     Ok(())
/// }
///
/// assert!(check_interval(0).is_err());
/// ```
#[derive(Error, Debug)]
pub enum ExtractError {
    /// An I/O error occurred while reading a record dump.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record or configuration document was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The event source could not decode further records.
    ///
    /// This is fatal for the whole traversal; no partial results survive it.
    #[error("Source error at tick {tick}: {reason}")]
    Source {
        /// Tick the source had reached when decoding failed.
        tick: u32,
        /// A description of the decode failure.
        reason: String,
    },

    /// The request was rejected before the source was opened.
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What makes the configuration invalid.
        reason: String,
    },

    /// A traversal was started on a source that has already been consumed.
    ///
    /// Sources are forward-only and single-use; every query must open a
    /// fresh one.
    #[error("Event source already consumed; open a new source for each traversal")]
    SourceReused,
}

impl ExtractError {
    /// Creates a `Source` error at the given tick.
    ///
    /// # Example
    ///
    /// ```
    /// use replay_extract::error::ExtractError;
    ///
    /// let err = ExtractError::source(120, "truncated packet");
    /// assert!(err.to_string().contains("tick 120"));
    /// ```
    #[must_use]
    pub fn source(tick: u32, reason: impl Into<String>) -> Self {
        ExtractError::Source {
            tick,
            reason: reason.into(),
        }
    }

    /// Creates a `Config` error with the given reason.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        ExtractError::Config {
            reason: reason.into(),
        }
    }

    /// Returns true if the error was raised by request validation rather
    /// than by a traversal.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, ExtractError::Config { .. })
    }
}

/// A specialized Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExtractError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(err.to_string().contains("I/O error"));

        let err = ExtractError::source(42, "bad varint");
        assert!(err.to_string().contains("Source error at tick 42"));
        assert!(err.to_string().contains("bad varint"));

        let err = ExtractError::config("heroes_only and creeps_only are exclusive");
        assert!(err.to_string().contains("Invalid configuration"));

        let err = ExtractError::SourceReused;
        assert!(err.to_string().contains("already consumed"));
    }

    #[test]
    fn test_is_config() {
        assert!(ExtractError::config("x").is_config());
        assert!(!ExtractError::source(0, "x").is_config());
        assert!(!ExtractError::SourceReused.is_config());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExtractError>();
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: ExtractError = json_err.into();
        assert!(matches!(err, ExtractError::Json(_)));
    }
}
