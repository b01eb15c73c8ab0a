//! Unified error handling for the balloon-tracker library.
//!
//! This module provides a consistent error type for all tracker operations.
//! Per-hour snapshot failures are recovered locally (an empty snapshot) and
//! never surface through this type; everything else propagates to the caller.

use std::fmt;

/// Unified error type for balloon-tracker operations.
#[derive(Debug, Clone)]
pub enum TrackerError {
    /// Snapshot offset outside the 24-hour window
    OffsetOutOfRange { offset: u8 },
    /// Latitude or longitude outside valid ranges
    InvalidCoordinates { lat: f64, lon: f64 },
    /// Upstream returned a non-success status for one hourly snapshot
    Upstream {
        offset: u8,
        message: String,
        status_code: Option<u16>,
    },
    /// Upstream body for one hourly snapshot was not a well-formed array
    MalformedResponse { offset: u8, message: String },
    /// Facility set was empty; "closest of zero" is undefined
    NoFacilities,
    /// Caller required at least one non-empty snapshot and none exists
    NoData { message: String },
    /// HTTP/transport error outside the per-hour recovery path
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// A refresh was requested while another is still in flight
    RefreshInProgress,
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::OffsetOutOfRange { offset } => {
                write!(f, "Snapshot offset {} outside valid range 0-23", offset)
            }
            TrackerError::InvalidCoordinates { lat, lon } => {
                write!(f, "Invalid coordinates: lat {} lon {}", lat, lon)
            }
            TrackerError::Upstream {
                offset,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Upstream error for offset {} ({}): {}", offset, code, message)
                } else {
                    write!(f, "Upstream error for offset {}: {}", offset, message)
                }
            }
            TrackerError::MalformedResponse { offset, message } => {
                write!(f, "Malformed response for offset {}: {}", offset, message)
            }
            TrackerError::NoFacilities => {
                write!(f, "Facility set is empty; nearest facility is undefined")
            }
            TrackerError::NoData { message } => {
                write!(f, "No data: {}", message)
            }
            TrackerError::Http {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            TrackerError::RefreshInProgress => {
                write!(f, "Refresh already in progress; skipped")
            }
        }
    }
}

impl std::error::Error for TrackerError {}

/// Result type alias for balloon-tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Extension trait for converting Option to TrackerError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a no-data error.
    fn ok_or_no_data(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_no_data(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrackerError::NoData {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackerError::OffsetOutOfRange { offset: 42 };
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("0-23"));

        let err = TrackerError::Upstream {
            offset: 7,
            message: "bad gateway".to_string(),
            status_code: Some(502),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("offset 7"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_no_data("all snapshots empty");
        assert!(matches!(result, Err(TrackerError::NoData { .. })));

        assert_eq!(Some(3).ok_or_no_data("unused").unwrap(), 3);
    }
}
