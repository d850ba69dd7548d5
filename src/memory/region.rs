use std::fmt;
use std::ops::BitOr;

use crate::platform::ProcessAccess;
use crate::process::ProcessHandle;
use crate::{ScanError, ScanResult};

/// Page protection bits, encoded with the Win32 `PAGE_*` values on every platform.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProtectionFlags(pub u32);

impl ProtectionFlags {
    pub const NONE: Self = Self(0);
    pub const NOACCESS: Self = Self(0x01);
    pub const READONLY: Self = Self(0x02);
    pub const READWRITE: Self = Self(0x04);
    pub const WRITECOPY: Self = Self(0x08);
    pub const EXECUTE: Self = Self(0x10);
    pub const EXECUTE_READ: Self = Self(0x20);
    pub const EXECUTE_READWRITE: Self = Self(0x40);
    pub const EXECUTE_WRITECOPY: Self = Self(0x80);
    pub const GUARD: Self = Self(0x100);
    pub const NOCACHE: Self = Self(0x200);
    pub const WRITECOMBINE: Self = Self(0x400);

    /// Every protection that allows reading.
    pub const READABLE: Self = Self(
        Self::READONLY.0
            | Self::READWRITE.0
            | Self::WRITECOPY.0
            | Self::EXECUTE_READ.0
            | Self::EXECUTE_READWRITE.0
            | Self::EXECUTE_WRITECOPY.0,
    );

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ProtectionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for ProtectionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtectionFlags(0x{:03X})", self.0)
    }
}

/// Allocation state, encoded with the Win32 `MEM_*` values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StateFlags(pub u32);

impl StateFlags {
    pub const COMMIT: Self = Self(0x1000);
    pub const RESERVE: Self = Self(0x2000);
    pub const FREE: Self = Self(0x10000);

    pub fn is_committed(self) -> bool {
        self == Self::COMMIT
    }
}

impl fmt::Debug for StateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::COMMIT => "COMMIT",
            Self::RESERVE => "RESERVE",
            Self::FREE => "FREE",
            _ => return write!(f, "StateFlags(0x{:X})", self.0),
        };
        write!(f, "StateFlags({name})")
    }
}

/// One contiguous run of a process's address space with uniform allocation, protection and state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRegion {
    pub allocation_base: usize,
    pub base_address: usize,
    pub region_size: usize,
    pub protection: ProtectionFlags,
    pub state: StateFlags,
}

impl MemoryRegion {
    /// One past the last address of the region, saturating at the top of the address space.
    pub fn end_address(&self) -> usize {
        self.base_address.saturating_add(self.region_size)
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.base_address && address < self.end_address()
    }
}

/// Address-space bounds and page size for the target platform.
///
/// Computed once by the platform backend (or injected by the caller) and passed around by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    pub minimum: usize,
    pub maximum: usize,
    pub page_size: usize,
}

impl AddressSpace {
    /// `minimum` rounded down to a page boundary. Unchanged when `page_size` is not a power of two.
    pub fn first_page(&self) -> usize {
        match self.page_size.is_power_of_two() {
            true => self.minimum & !(self.page_size - 1),
            false => self.minimum,
        }
    }
}

/// Result of one pass over the address space.
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    pub regions: Vec<MemoryRegion>,
    /// Address at which a region query failed and the walk stopped early, if it did.
    pub stopped_at: Option<usize>,
}

/// Walks the address space of an opened process and keeps the committed regions matching a filter.
#[derive(Debug, Clone, Copy)]
pub struct RegionEnumerator {
    pub range: AddressSpace,
    pub filter: ProtectionFlags,
    pub exclude: ProtectionFlags,
}

impl RegionEnumerator {
    pub fn new(range: AddressSpace, filter: ProtectionFlags) -> Self {
        RegionEnumerator {
            range,
            filter,
            exclude: ProtectionFlags::NONE,
        }
    }

    pub fn excluding(mut self, exclude: ProtectionFlags) -> Self {
        self.exclude = exclude;
        self
    }

    fn accepts(&self, region: &MemoryRegion) -> bool {
        region.state.is_committed()
            && region.protection.intersects(self.filter)
            && !region.protection.intersects(self.exclude)
    }

    /// Performs one enumeration pass, starting at the page containing `range.minimum`.
    ///
    /// # Arguments
    /// * `handle`: Open handle to the process whose address space is walked
    /// # Returns
    /// * `ScanResult<Enumeration>`: Accepted regions in ascending address order
    ///
    /// A failing region query ends the walk and keeps what was collected so far; the failing
    /// address is recorded in [`Enumeration::stopped_at`]. A zero-sized or inconsistent region
    /// aborts the pass with `InvalidRegion`.
    pub fn enumerate<A: ProcessAccess>(&self, handle: &ProcessHandle<A>) -> ScanResult<Enumeration> {
        let mut result = Enumeration::default();
        let mut current = self.range.first_page();
        let mut previous_end = current;

        while current < self.range.maximum {
            let region = match handle.query_region(current) {
                Ok(region) => region,
                Err(e) => {
                    tracing::warn!(
                        pid = handle.pid(),
                        address = format_args!("0x{current:X}"),
                        error = %e,
                        "region query failed, ending enumeration early"
                    );
                    result.stopped_at = Some(current);
                    break;
                }
            };

            if region.region_size == 0 {
                return Err(ScanError::InvalidRegion {
                    address: current,
                    reason: "region size is zero",
                });
            }
            if region.allocation_base > region.base_address {
                return Err(ScanError::InvalidRegion {
                    address: current,
                    reason: "allocation base lies above the region base",
                });
            }

            if self.accepts(&region) {
                if region.base_address < previous_end && !result.regions.is_empty() {
                    return Err(ScanError::InvalidRegion {
                        address: current,
                        reason: "region overlaps the previous region",
                    });
                }
                previous_end = region.end_address();
                result.regions.push(region);
            }

            current = match current.checked_add(region.region_size) {
                Some(next) => next,
                None => break,
            };
        }

        tracing::info!(
            pid = handle.pid(),
            regions = result.regions.len(),
            truncated = result.stopped_at.is_some(),
            "enumerated memory regions"
        );

        Ok(result)
    }
}
