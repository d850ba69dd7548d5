use std::time::Duration;

use crate::memory::{AddressSpace, ProtectionFlags};

/// Construction-time settings for a [`Scanner`](super::Scanner).
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Range to enumerate. `None` asks the platform backend once at construction.
    pub address_space: Option<AddressSpace>,
    /// A committed region is kept when its protection intersects this filter.
    pub protection_filter: ProtectionFlags,
    /// A region sharing any bit with this mask is dropped even if it passes the filter.
    pub protection_exclude: ProtectionFlags,
    /// How long shared/async callers wait for the scanner lock; `None` blocks.
    pub lock_timeout: Option<Duration>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            address_space: None,
            protection_filter: ProtectionFlags::EXECUTE_READWRITE,
            protection_exclude: ProtectionFlags::NONE,
            lock_timeout: None,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address_space(mut self, address_space: AddressSpace) -> Self {
        self.address_space = Some(address_space);
        self
    }

    pub fn with_protection_filter(mut self, filter: ProtectionFlags) -> Self {
        self.protection_filter = filter;
        self
    }

    pub fn with_protection_exclude(mut self, exclude: ProtectionFlags) -> Self {
        self.protection_exclude = exclude;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }
}
