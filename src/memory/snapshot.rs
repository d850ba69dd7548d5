use crate::memory::MemoryRegion;
use crate::platform::ProcessAccess;
use crate::process::ProcessHandle;
use crate::scanner::CancelToken;
use crate::{ScanError, ScanResult};

/// Point-in-time copy of a set of regions.
///
/// Buffers are kept between calls and resized in place. After a failed [`take`](Self::take)
/// the buffers filled before the failure are left as they were, but the snapshot is marked
/// invalid and must not be searched.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    entries: Vec<(MemoryRegion, Vec<u8>)>,
    valid: bool,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies every region in order, `region_size` bytes from `base_address`.
    ///
    /// The first short or failing read aborts the call with `ReadFailed` naming that region;
    /// later regions are not attempted.
    pub fn take<A: ProcessAccess>(
        &mut self,
        handle: &ProcessHandle<A>,
        regions: &[MemoryRegion],
        cancel: &CancelToken,
    ) -> ScanResult<()> {
        self.valid = false;
        self.entries.truncate(regions.len());

        for (index, region) in regions.iter().enumerate() {
            cancel.check()?;

            if index == self.entries.len() {
                self.entries.push((*region, Vec::new()));
            }
            let (slot_region, buffer) = &mut self.entries[index];
            *slot_region = *region;
            buffer.resize(region.region_size, 0);

            tracing::trace!(
                base = format_args!("0x{:X}", region.base_address),
                size = region.region_size,
                "reading region"
            );
            handle.read_exact(region.base_address, buffer).map_err(|e| {
                tracing::debug!(
                    pid = handle.pid(),
                    base = format_args!("0x{:X}", region.base_address),
                    error = %e,
                    "snapshot aborted"
                );
                e
            })?;
        }

        self.valid = true;
        tracing::debug!(
            pid = handle.pid(),
            regions = regions.len(),
            bytes = self.total_bytes(),
            "snapshot complete"
        );
        Ok(())
    }

    /// Whether the last [`take`](Self::take) completed for every region.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|(_, bytes)| bytes.len()).sum()
    }

    /// Buffers in enumeration order, regardless of validity.
    pub fn iter(&self) -> impl Iterator<Item = (&MemoryRegion, &[u8])> {
        self.entries.iter().map(|(region, bytes)| (region, bytes.as_slice()))
    }

    /// Buffers of a valid snapshot, or `InvalidArgument` when the last take failed.
    pub fn valid_entries(&self) -> ScanResult<impl Iterator<Item = (&MemoryRegion, &[u8])>> {
        if !self.valid {
            return Err(ScanError::invalid_argument(
                "snapshot is incomplete; take a new snapshot before searching",
            ));
        }
        Ok(self.iter())
    }

    pub fn bytes_of(&self, region: &MemoryRegion) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(r, _)| r == region)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Releases all buffers and invalidates the snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.valid = false;
    }
}
