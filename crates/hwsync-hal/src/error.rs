//! Hardware error types and SDK status handling.
//!
//! Backends wrap a vendor SDK that reports errors as integer status codes;
//! this module maps those into Rust's Result type. Hardware errors are
//! ordinary values: the synchronization engine leaves its programmed state
//! untouched when a backend call fails, and the caller decides what to do.

use std::fmt;
use thiserror::Error;

/// Status codes in the shape vendor switch SDKs return them.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkStatus {
    Success = 0,
    Failure = -1,
    NotSupported = -2,
    NoMemory = -3,
    InvalidParameter = -4,
    NotFound = -5,
    TableFull = -6,
    Busy = -7,
    Uninitialized = -8,
}

impl SdkStatus {
    /// Creates an SdkStatus from a raw i32 value.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => SdkStatus::Success,
            -2 => SdkStatus::NotSupported,
            -3 => SdkStatus::NoMemory,
            -4 => SdkStatus::InvalidParameter,
            -5 => SdkStatus::NotFound,
            -6 => SdkStatus::TableFull,
            -7 => SdkStatus::Busy,
            -8 => SdkStatus::Uninitialized,
            _ => SdkStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == SdkStatus::Success
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> HwResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(HwError::from_status(self))
        }
    }
}

impl fmt::Display for SdkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SdkStatus::Success => "SDK_SUCCESS",
            SdkStatus::Failure => "SDK_FAILURE",
            SdkStatus::NotSupported => "SDK_NOT_SUPPORTED",
            SdkStatus::NoMemory => "SDK_NO_MEMORY",
            SdkStatus::InvalidParameter => "SDK_INVALID_PARAMETER",
            SdkStatus::NotFound => "SDK_NOT_FOUND",
            SdkStatus::TableFull => "SDK_TABLE_FULL",
            SdkStatus::Busy => "SDK_BUSY",
            SdkStatus::Uninitialized => "SDK_UNINITIALIZED",
        };
        write!(f, "{}", s)
    }
}

/// Error type for hardware backend operations.
#[derive(Debug, Clone, Error)]
pub enum HwError {
    /// The SDK returned an error status.
    #[error("SDK call failed: {status}")]
    Sdk { status: SdkStatus },

    /// A hardware table has no room for the requested entry.
    #[error("hardware table full: {table}")]
    TableFull { table: String },

    /// The requested object is not programmed in hardware.
    #[error("not found in hardware: {item}")]
    NotFound { item: String },

    /// The requested feature is not supported by this ASIC.
    #[error("feature not supported: {feature}")]
    NotSupported { feature: String },

    /// The backend has not been initialized.
    #[error("hardware backend not initialized")]
    Uninitialized,

    /// Warm-restart serialization or restore failed.
    #[error("warm restart failed: {message}")]
    WarmRestart { message: String },
}

impl HwError {
    /// Creates an error from an SDK status code.
    pub fn from_status(status: SdkStatus) -> Self {
        match status {
            SdkStatus::TableFull => HwError::TableFull {
                table: "unknown".to_string(),
            },
            SdkStatus::NotFound => HwError::NotFound {
                item: "unknown".to_string(),
            },
            SdkStatus::NotSupported => HwError::NotSupported {
                feature: "unknown".to_string(),
            },
            SdkStatus::Uninitialized => HwError::Uninitialized,
            _ => HwError::Sdk { status },
        }
    }

    pub fn table_full(table: impl Into<String>) -> Self {
        HwError::TableFull {
            table: table.into(),
        }
    }

    pub fn not_found(item: impl Into<String>) -> Self {
        HwError::NotFound { item: item.into() }
    }

    pub fn not_supported(feature: impl Into<String>) -> Self {
        HwError::NotSupported {
            feature: feature.into(),
        }
    }

    pub fn warm_restart(message: impl Into<String>) -> Self {
        HwError::WarmRestart {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HwError::Sdk {
                status: SdkStatus::Busy | SdkStatus::NoMemory
            } | HwError::TableFull { .. }
        )
    }
}

/// Result type for hardware backend operations.
pub type HwResult<T> = Result<T, HwError>;

/// Extension trait for converting raw SDK status codes.
pub trait SdkStatusExt {
    /// Converts a raw status code to a Result.
    fn to_result(self) -> HwResult<()>;
}

impl SdkStatusExt for i32 {
    fn to_result(self) -> HwResult<()> {
        SdkStatus::from_raw(self).into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_success() {
        assert!(SdkStatus::Success.is_success());
        assert!(SdkStatus::Success.into_result().is_ok());
    }

    #[test]
    fn test_status_from_raw() {
        assert_eq!(SdkStatus::from_raw(0), SdkStatus::Success);
        assert_eq!(SdkStatus::from_raw(-6), SdkStatus::TableFull);
        assert_eq!(SdkStatus::from_raw(-999), SdkStatus::Failure);
    }

    #[test]
    fn test_error_from_status() {
        assert!(matches!(
            HwError::from_status(SdkStatus::TableFull),
            HwError::TableFull { .. }
        ));
        assert!(matches!(
            HwError::from_status(SdkStatus::NotFound),
            HwError::NotFound { .. }
        ));
        assert!(matches!(
            HwError::from_status(SdkStatus::Failure),
            HwError::Sdk { .. }
        ));
    }

    #[test]
    fn test_raw_status_to_result() {
        assert!(0_i32.to_result().is_ok());
        assert!((-6_i32).to_result().is_err());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(HwError::table_full("lpm").is_retryable());
        assert!(HwError::from_status(SdkStatus::Busy).is_retryable());
        assert!(!HwError::not_found("route").is_retryable());
    }
}
