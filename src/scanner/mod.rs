mod cancel;
mod options;

pub use cancel::CancelToken;
pub use options::ScanOptions;

use crate::memory::{Enumeration, MemoryRegion, MemorySnapshot, Primitive, RegionEnumerator, Value, ValueKind};
use crate::platform::{ProcessAccess, ProcessDiscovery};
use crate::process::pattern::find_first;
use crate::process::{Pattern, ProcessHandle};
use crate::{ScanError, ScanResult};

#[cfg(any(windows, target_os = "linux"))]
use crate::platform::{NativeAccess, NativeDiscovery};

/// Read-only view of one target process: its filtered region list, a reusable snapshot,
/// and the operations built on them.
///
/// The handle is opened and the regions are enumerated once, at construction. A failed
/// snapshot, search or read leaves the scanner usable for another attempt.
pub struct Scanner<A: ProcessAccess> {
    handle: ProcessHandle<A>,
    enumerator: RegionEnumerator,
    enumeration: Enumeration,
    snapshot: MemorySnapshot,
    options: ScanOptions,
    cancel: CancelToken,
}

#[cfg(any(windows, target_os = "linux"))]
impl Scanner<NativeAccess> {
    /// Attaches to `pid` through the native backend with default options.
    pub fn attach(pid: u32) -> ScanResult<Self> {
        Self::with_access(NativeAccess::default(), pid, ScanOptions::default())
    }

    /// Resolves `name` through the default discovery backend, then attaches.
    pub fn attach_by_name(name: &str) -> ScanResult<Self> {
        Self::by_name(
            NativeAccess::default(),
            &NativeDiscovery::default(),
            name,
            ScanOptions::default(),
        )
    }
}

impl<A: ProcessAccess> Scanner<A> {
    /// Opens `pid` and enumerates its regions.
    ///
    /// # Arguments
    /// * `access`: Platform backend used for every call on the target
    /// * `pid`: Target process id, greater than zero
    /// * `options`: Address range, protection filter and lock timeout
    /// # Returns
    /// * `ScanResult<Scanner<A>>`: A ready scanner. Any failure while opening or enumerating fails
    ///   the whole construction, and an opened handle is released again
    pub fn with_access(access: A, pid: u32, options: ScanOptions) -> ScanResult<Self> {
        let handle = ProcessHandle::open(access, pid)?;
        let address_space = match options.address_space {
            Some(space) => space,
            None => handle.access().address_space()?,
        };

        let enumerator = RegionEnumerator::new(address_space, options.protection_filter)
            .excluding(options.protection_exclude);
        let enumeration = enumerator.enumerate(&handle)?;

        Ok(Scanner {
            handle,
            enumerator,
            enumeration,
            snapshot: MemorySnapshot::new(),
            options,
            cancel: CancelToken::new(),
        })
    }

    /// Resolves `name` to a pid with `discovery`, then behaves like [`Scanner::with_access`].
    pub fn by_name<D: ProcessDiscovery>(
        access: A,
        discovery: &D,
        name: &str,
        options: ScanOptions,
    ) -> ScanResult<Self> {
        let pid = discovery.find_process_by_name(name)?;
        tracing::debug!(name, pid, "resolved process name");
        Self::with_access(access, pid, options)
    }

    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Regions found at construction (or the last [`refresh_regions`](Self::refresh_regions)).
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.enumeration.regions
    }

    /// Address where the last enumeration stopped on a failed region query, if it did.
    pub fn enumeration_truncated_at(&self) -> Option<usize> {
        self.enumeration.stopped_at
    }

    /// A token that cancels this scanner's snapshot and search calls, usable from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Walks the address space again and replaces the region list. The old snapshot is dropped.
    pub fn refresh_regions(&mut self) -> ScanResult<()> {
        self.enumeration = self.enumerator.enumerate(&self.handle)?;
        self.snapshot.clear();
        Ok(())
    }

    /// Copies every region out of the target process.
    ///
    /// # Returns
    /// * `ScanResult<&MemorySnapshot>`: The filled snapshot, or `ReadFailed` for the first region that
    ///   could not be copied completely. The snapshot is then invalid until the next successful call
    pub fn snapshot(&mut self) -> ScanResult<&MemorySnapshot> {
        self.snapshot
            .take(&self.handle, &self.enumeration.regions, &self.cancel)?;
        Ok(&self.snapshot)
    }

    /// The most recent snapshot, valid or not.
    pub fn last_snapshot(&self) -> &MemorySnapshot {
        &self.snapshot
    }

    /// Takes a fresh snapshot and returns the address of the first match.
    ///
    /// Regions are searched in enumeration order, offsets in ascending order.
    ///
    /// # Arguments
    /// * `pattern`: Parsed byte pattern
    /// # Returns
    /// * `ScanResult<Option<usize>>`: Absolute address of the first match, `None` if there is none
    pub fn search(&mut self, pattern: &Pattern) -> ScanResult<Option<usize>> {
        self.snapshot()?;
        self.search_snapshot(pattern)
    }

    /// [`search`](Self::search) for a signature like `"5A 0F 3C ?? 9A 4B"`.
    pub fn search_signature(&mut self, signature: &str) -> ScanResult<Option<usize>> {
        let pattern = Pattern::parse(signature)?;
        self.search(&pattern)
    }

    /// [`search`](Self::search) for raw bytes with an `x`/`?` mask.
    pub fn search_masked(&mut self, bytes: &[u8], mask: &str) -> ScanResult<Option<usize>> {
        let pattern = Pattern::from_bytes_with_mask(bytes, mask)?;
        self.search(&pattern)
    }

    /// Searches the last snapshot without retaking it.
    pub fn search_snapshot(&self, pattern: &Pattern) -> ScanResult<Option<usize>> {
        let found = find_first(pattern, self.snapshot.valid_entries()?, &self.cancel)?;
        match found {
            Some(address) => tracing::debug!(pattern = %pattern, address = format_args!("0x{address:X}"), "pattern found"),
            None => tracing::debug!(pattern = %pattern, "pattern not found"),
        }
        Ok(found)
    }

    /// Reads exactly `size` bytes at `address`.
    ///
    /// # Arguments
    /// * `address`: Absolute address in the target process
    /// * `size`: Number of bytes to read
    /// # Returns
    /// * `ScanResult<Vec<u8>>`: The bytes, or `ReadFailed` when fewer than `size` arrived
    pub fn read_bytes(&self, address: usize, size: usize) -> ScanResult<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.handle.read_exact(address, &mut buffer)?;
        Ok(buffer)
    }

    /// Reads `size_of::<T>()` bytes at `address` and decodes them little-endian.
    pub fn read_typed<T: Primitive>(&self, address: usize) -> ScanResult<T> {
        let bytes = self.read_bytes(address, T::SIZE)?;
        T::from_le_slice(&bytes).ok_or_else(|| ScanError::read_failed(address, T::SIZE, bytes.len()))
    }

    /// Like [`read_typed`](Self::read_typed) with the kind chosen at runtime.
    pub fn read_value(&self, address: usize, kind: ValueKind) -> ScanResult<Value> {
        let bytes = self.read_bytes(address, kind.size())?;
        kind.decode(&bytes)
            .ok_or_else(|| ScanError::read_failed(address, kind.size(), bytes.len()))
    }

    /// Releases the process handle and returns the backend's success flag.
    pub fn dispose(self) -> bool {
        let Scanner { handle, .. } = self;
        handle.close()
    }
}

impl<A: ProcessAccess> std::fmt::Debug for Scanner<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("handle", &self.handle)
            .field("regions", &self.enumeration.regions.len())
            .field("truncated_at", &self.enumeration.stopped_at)
            .field("snapshot_valid", &self.snapshot.is_valid())
            .finish()
    }
}
