#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use memgrep::memory::{AddressSpace, MemoryRegion, ProtectionFlags, StateFlags};
use memgrep::platform::AccessRights;
use memgrep::{ProcessAccess, ProcessDiscovery, ProcessEntry, ScanError, ScanOptions, ScanResult};

pub const PAGE: usize = 0x1000;
pub const PID: u32 = 4242;

/// In-memory target process: a sorted list of regions, their bytes, and failure switches.
#[derive(Clone, Default)]
pub struct FakeAccess {
    pub regions: Vec<MemoryRegion>,
    pub memory: BTreeMap<usize, Vec<u8>>,
    pub fail_query_at: Option<usize>,
    pub short_read_at: Option<usize>,
    pub open_error: Option<fn(u32) -> ScanError>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

pub struct FakeHandle {
    pub pid: u32,
}

pub fn region(base: usize, size: usize, protection: ProtectionFlags) -> MemoryRegion {
    MemoryRegion {
        allocation_base: base,
        base_address: base,
        region_size: size,
        protection,
        state: StateFlags::COMMIT,
    }
}

pub fn space(maximum: usize) -> AddressSpace {
    AddressSpace {
        minimum: PAGE,
        maximum,
        page_size: PAGE,
    }
}

impl FakeAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a region filled with `fill`.
    pub fn with_region(mut self, region: MemoryRegion, fill: u8) -> Self {
        self.memory.insert(region.base_address, vec![fill; region.region_size]);
        self.regions.push(region);
        self.regions.sort_by_key(|r| r.base_address);
        self
    }

    /// Overwrites bytes at an absolute address inside an existing region.
    pub fn write(mut self, address: usize, bytes: &[u8]) -> Self {
        let (base, buffer) = self
            .memory
            .range_mut(..=address)
            .next_back()
            .expect("address outside every fake region");
        let offset = address - base;
        buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn options(&self, maximum: usize) -> ScanOptions {
        ScanOptions::default().with_address_space(space(maximum))
    }

    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl ProcessAccess for FakeAccess {
    type Handle = FakeHandle;

    fn open_process(&self, pid: u32, rights: AccessRights) -> ScanResult<FakeHandle> {
        assert!(rights.contains(AccessRights::VM_READ));
        if let Some(make_error) = self.open_error {
            return Err(make_error(pid));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle { pid })
    }

    fn close_handle(&self, _handle: FakeHandle) -> bool {
        self.closed.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn query_region(&self, _handle: &FakeHandle, address: usize) -> ScanResult<MemoryRegion> {
        if self.fail_query_at == Some(address) {
            return Err(ScanError::RegionQueryFailed((address, None)));
        }

        if let Some(region) = self.regions.iter().find(|r| r.contains(address) || (r.region_size == 0 && r.base_address == address)) {
            return Ok(*region);
        }

        // Unmapped gap up to the next region, or to the end of the address space.
        let next = self
            .regions
            .iter()
            .map(|r| r.base_address)
            .find(|&base| base > address)
            .unwrap_or(usize::MAX);
        Ok(MemoryRegion {
            allocation_base: address,
            base_address: address,
            region_size: next - address,
            protection: ProtectionFlags::NOACCESS,
            state: StateFlags::FREE,
        })
    }

    fn read_memory(&self, _handle: &FakeHandle, address: usize, buffer: &mut [u8]) -> ScanResult<usize> {
        let Some((base, bytes)) = self.memory.range(..=address).next_back() else {
            return Err(ScanError::read_failed(address, buffer.len(), 0));
        };
        let offset = address - base;
        if offset >= bytes.len() {
            return Err(ScanError::read_failed(address, buffer.len(), 0));
        }

        let mut available = (bytes.len() - offset).min(buffer.len());
        if self.short_read_at == Some(address) {
            available /= 2;
        }
        buffer[..available].copy_from_slice(&bytes[offset..offset + available]);
        Ok(available)
    }

    fn address_space(&self) -> ScanResult<AddressSpace> {
        Ok(space(0x10_0000))
    }
}

pub struct FakeDiscovery(pub Vec<ProcessEntry>);

impl ProcessDiscovery for FakeDiscovery {
    fn enumerate_processes(&self) -> ScanResult<Vec<ProcessEntry>> {
        Ok(self.0.clone())
    }
}
