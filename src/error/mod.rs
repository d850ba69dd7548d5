use std::{
    fmt,
    num::{ParseFloatError, ParseIntError},
    str::ParseBoolError,
    time::Duration,
};

/// Represents errors that can occur while attaching to, walking, or reading a target process.
///
/// A pattern that simply does not occur is not an error: searches report it as `Ok(None)`.
#[derive(Debug)]
pub enum ScanError {
    /// No process with the given id (or name) exists
    ProcessNotFound { pid: Option<u32>, name: Option<String> },
    /// The process exists but query/read rights could not be granted
    AccessDenied { pid: u32 },
    /// Bad pid, malformed pattern text, or a mask/pattern length mismatch
    InvalidArgument(String),
    /// The platform reported a region that breaks the enumeration invariants
    InvalidRegion { address: usize, reason: &'static str },
    /// Region metadata could not be queried at `address`
    RegionQueryFailed((usize, Option<anyhow::Error>)),
    /// A memory copy failed or came back short
    ReadFailed {
        address: usize,
        requested: usize,
        read: usize,
        source: Option<anyhow::Error>,
    },
    /// A cooperative cancellation token was triggered mid-operation
    Cancelled,
    /// Operation timed out acquiring a shared scanner
    TimeoutReached((Option<Duration>, Option<anyhow::Error>)),
    /// The process handle was already released
    HandleClosed,
    /// WinAPI errors
    #[cfg(windows)]
    WinApi((windows_result::Error, Option<anyhow::Error>)),
    /// Generic error that wraps an anyhow::Error
    Other(anyhow::Error),
}

impl ScanError {
    /// Creates a new `ScanError::Other` from anything that implements `std::error::Error`
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ScanError::Other(anyhow::Error::new(error))
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ScanError::InvalidArgument(message.into())
    }

    pub fn read_failed(address: usize, requested: usize, read: usize) -> Self {
        ScanError::ReadFailed {
            address,
            requested,
            read,
            source: None,
        }
    }

    /// Returns the inner anyhow::Error if this is an `Other` variant
    pub fn into_inner(self) -> Option<anyhow::Error> {
        match self {
            ScanError::Other(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_process_not_found(&self) -> bool {
        matches!(self, ScanError::ProcessNotFound { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, ScanError::AccessDenied { .. })
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ScanError::InvalidArgument(_))
    }

    pub fn is_invalid_region(&self) -> bool {
        matches!(self, ScanError::InvalidRegion { .. })
    }

    pub fn is_read_failed(&self) -> bool {
        matches!(self, ScanError::ReadFailed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanError::Cancelled)
    }

    /// Returns true if this is a `TimeoutReached` error
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScanError::TimeoutReached(_))
    }

    /// Converts this error to its underlying root cause string
    pub fn root_cause_string(&self) -> String {
        match self {
            ScanError::ProcessNotFound { pid, name } => match (pid, name) {
                (Some(pid), _) => format!("No process with id {pid} exists"),
                (None, Some(name)) => format!("No process named \"{name}\" exists"),
                (None, None) => "Process not found".to_string(),
            },
            ScanError::AccessDenied { pid } => {
                format!("Query/read access to process {pid} was denied")
            }
            ScanError::InvalidArgument(msg) => format!("Invalid argument: {msg}"),
            ScanError::InvalidRegion { address, reason } => {
                format!("Invalid region reported at 0x{address:X}: {reason}")
            }
            ScanError::RegionQueryFailed((address, err)) => match err {
                Some(e) => format!("Region query at 0x{address:X} failed with: \"{e:#}\""),
                None => format!("Region query at 0x{address:X} failed"),
            },
            ScanError::ReadFailed {
                address,
                requested,
                read,
                source,
            } => match source {
                Some(e) => format!(
                    "Reading {requested} bytes at 0x{address:X} failed after {read} bytes with: \"{e:#}\""
                ),
                None => format!(
                    "Reading {requested} bytes at 0x{address:X} returned only {read} bytes"
                ),
            },
            ScanError::Cancelled => "Operation was cancelled".to_string(),
            ScanError::TimeoutReached((timeout, err)) => match (timeout, err) {
                (Some(t), Some(e)) => {
                    format!("Timeout operation of context \"{e}\" failed to complete within timeout \"{t:#?}\".")
                }
                (Some(t), None) => {
                    format!("Timeout operation failed to complete within timeout \"{t:#?}\".")
                }
                (None, None) => "Timeout operation failed to complete within timeout.".to_string(),
                (None, Some(e)) => {
                    format!("Timeout operation of context \"{e}\" failed to complete with its timeout.")
                }
            },
            ScanError::HandleClosed => "Process handle was already closed".to_string(),
            #[cfg(windows)]
            ScanError::WinApi((api_err, err)) => {
                let code = api_err.code().0;
                match err {
                    Some(e) => format!("Windows API call with context \"{e}\" failed with: \"Windows Error: {:08X} - {}\"", code, api_err),
                    None => format!("Windows API call failed with: \"Windows Error: {:08X} - {}\"", code, api_err),
                }
            }
            ScanError::Other(err) => format!("{:#}", err),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScanError: \"{}\"", &self.root_cause_string())
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::Other(err) => err.source(),
            ScanError::ReadFailed {
                source: Some(err), ..
            } => Some(&**err),
            ScanError::RegionQueryFailed((_, Some(err))) => Some(&**err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ScanError {
    fn from(err: anyhow::Error) -> Self {
        ScanError::Other(err)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Other(anyhow::Error::new(err))
    }
}

#[cfg(windows)]
impl From<windows_result::Error> for ScanError {
    fn from(err: windows_result::Error) -> Self {
        ScanError::WinApi((err, None))
    }
}

pub type ScanResult<T> = Result<T, ScanError>;

/// Extension trait to add anyhow-like methods to ScanResult
pub trait ScanResultExt<T> {
    /// Add context to an error
    fn context<C>(self, context: C) -> ScanResult<T>
    where
        C: fmt::Display + Send + Sync + 'static;

    /// Add context to an error with a lazy closure
    fn with_context<C, F>(self, f: F) -> ScanResult<T>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> ScanResultExt<T> for ScanResult<T> {
    fn context<C>(self, context: C) -> ScanResult<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.with_context(|| context)
    }

    // Typed variants are kept so callers can still match on them.
    fn with_context<C, F>(self, f: F) -> ScanResult<T>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|err| match err {
            ScanError::Other(inner) => ScanError::Other(inner.context(f())),
            ScanError::ReadFailed {
                address,
                requested,
                read,
                source,
            } => ScanError::ReadFailed {
                address,
                requested,
                read,
                source: Some(match source {
                    Some(inner) => inner.context(f()),
                    None => anyhow::anyhow!("{}", f()),
                }),
            },
            ScanError::RegionQueryFailed((address, source)) => {
                ScanError::RegionQueryFailed((
                    address,
                    Some(match source {
                        Some(inner) => inner.context(f()),
                        None => anyhow::anyhow!("{}", f()),
                    }),
                ))
            }
            other => other,
        })
    }
}

impl<T> ScanResultExt<T> for Option<T> {
    fn context<C>(self, context: C) -> ScanResult<T>
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| ScanError::Other(anyhow::anyhow!("{}", context)))
    }

    fn with_context<C, F>(self, f: F) -> ScanResult<T>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| ScanError::Other(anyhow::anyhow!("{}", f())))
    }
}

// Allow macro-based error creation, similar to anyhow::anyhow!
#[macro_export]
macro_rules! scan_err {
    ($msg:literal $(,)?) => {
        $crate::ScanError::Other(anyhow::anyhow!($msg))
    };
    ($err:expr $(,)?) => {
        $crate::ScanError::Other(anyhow::anyhow!($err))
    };
    ($fmt:literal, $($arg:tt)*) => {
        $crate::ScanError::Other(anyhow::anyhow!($fmt, $($arg)*))
    };
}

/// Trait for errors that we don't care about matching down further based on context. This will use ScanError::Other().
pub trait GenericError: Send + Sync + Clone + PartialEq + Eq + std::fmt::Debug {}
impl GenericError for ParseIntError {}
impl GenericError for ParseBoolError {}
impl GenericError for ParseFloatError {}

impl<T: GenericError> From<T> for ScanError {
    fn from(err: T) -> Self {
        scan_err!("{:#?}", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_wraps_root_cause() {
        let err = ScanError::read_failed(0x1000, 16, 4);
        assert_eq!(
            err.to_string(),
            "ScanError: \"Reading 16 bytes at 0x1000 returned only 4 bytes\""
        );
    }

    #[test]
    fn context_keeps_typed_variants() {
        let res: ScanResult<()> = Err(ScanError::read_failed(0x2000, 8, 0));
        let err = res.context("reading header").unwrap_err();
        assert!(err.is_read_failed());
        assert!(err.root_cause_string().contains("reading header"));

        let res: ScanResult<()> = Err(ScanError::Cancelled);
        assert!(res.context("ignored").unwrap_err().is_cancelled());
    }

    #[test]
    fn option_context_becomes_other() {
        let none: Option<u8> = None;
        let err = none.context("nothing here").unwrap_err();
        assert_eq!(err.root_cause_string(), "nothing here");
        assert!(err.into_inner().is_some());
    }

    #[test]
    fn parse_errors_convert() {
        let err: ScanError = "zz".parse::<u8>().unwrap_err().into();
        assert!(matches!(err, ScanError::Other(_)));
    }

    #[test]
    fn process_not_found_prefers_pid() {
        let err = ScanError::ProcessNotFound {
            pid: Some(42),
            name: None,
        };
        assert_eq!(err.root_cause_string(), "No process with id 42 exists");
        let err = ScanError::ProcessNotFound {
            pid: None,
            name: Some("game.exe".into()),
        };
        assert!(err.is_process_not_found());
        assert_eq!(err.root_cause_string(), "No process named \"game.exe\" exists");
    }
}
