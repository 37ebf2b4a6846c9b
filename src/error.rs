//! Error types for the EEPROM manager

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while operating on the replica pool
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying OS error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file missing or unusable
    #[error("configuration error: {0}")]
    Config(String),

    /// Quorum selection found no replica whose digest verified
    #[error("no EEPROM device passed digest verification")]
    NoGoodDevices,

    /// Replica footer magic absent (uninitialised device)
    #[error("EEPROM {} carries no metadata signature", path.display())]
    BadMagic { path: PathBuf },

    /// A replica's stored digest did not match its content
    #[error("EEPROM {} failed its digest check", path.display())]
    ChecksumFailed { path: PathBuf },

    /// Stored document did not parse as JSON
    #[error("stored document is not valid JSON: {0}")]
    JsonParse(#[source] serde_json::Error),

    /// JSON parsed but the root is not an object
    #[error("stored document root is not a JSON object")]
    JsonRootNotObject,

    /// Other JSON codec failure
    #[error("JSON codec error: {0}")]
    Json(#[source] serde_json::Error),

    /// Requested key absent
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Value present but not a string
    #[error("value for key {0} is not a string")]
    KeyNotString(String),

    /// Serialised object exceeds pool capacity
    #[error("serialised document is {len} bytes but the pool holds at most {capacity}")]
    DocumentTooLarge { len: usize, capacity: usize },

    /// Read-after-write mismatch (reserved)
    #[error("EEPROM {} read back different bytes than were written", path.display())]
    WriteVerifyFailed { path: PathBuf },

    /// The 10-digit write counter cannot be advanced any further
    #[error("EEPROM {} write counter is exhausted", path.display())]
    CounterExhausted { path: PathBuf },
}

impl Error {
    /// Stable negative integer for each error kind, used as the CLI exit
    /// code. `0` is success and is never produced by an `Error`.
    pub fn code(&self) -> i32 {
        match self {
            Error::Io(_) | Error::Config(_) => -1,
            Error::NoGoodDevices => -2,
            Error::BadMagic { .. } => -3,
            Error::ChecksumFailed { .. } => -4,
            Error::JsonParse(_) => -5,
            Error::JsonRootNotObject => -6,
            Error::Json(_) => -7,
            Error::KeyNotFound(_) => -8,
            Error::KeyNotString(_) => -9,
            Error::DocumentTooLarge { .. } => -10,
            Error::WriteVerifyFailed { .. } => -11,
            Error::CounterExhausted { .. } => -12,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::NoGoodDevices.code(), -2);
        assert_eq!(
            Error::BadMagic {
                path: PathBuf::from("/dev/eeprom0")
            }
            .code(),
            -3
        );
        assert_eq!(Error::KeyNotFound("serial".into()).code(), -8);
        assert_eq!(
            Error::DocumentTooLarge {
                len: 400,
                capacity: 300
            }
            .code(),
            -10
        );
    }

    #[test]
    fn test_io_errors_map_to_errno_code() {
        let err: Error = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err.code(), -1);
    }
}
