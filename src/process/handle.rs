use crate::memory::MemoryRegion;
use crate::platform::{AccessRights, ProcessAccess};
use crate::{ScanError, ScanResult};

/// Exclusive owner of one open handle to a target process.
///
/// The handle is released exactly once: either by [`ProcessHandle::close`] or, failing that,
/// when the value is dropped (early return, `?`, panic unwinding).
pub struct ProcessHandle<A: ProcessAccess> {
    access: A,
    raw: Option<A::Handle>,
    pid: u32,
}

impl<A: ProcessAccess> ProcessHandle<A> {
    /// Rights requested for every handle: enough to query regions and copy bytes, nothing more.
    pub const REQUESTED_RIGHTS: AccessRights =
        AccessRights(AccessRights::QUERY_INFORMATION.0 | AccessRights::VM_READ.0);

    /// Opens `pid` with query and read rights.
    ///
    /// # Errors
    /// * `InvalidArgument` if `pid` is 0
    /// * `ProcessNotFound` / `AccessDenied` as reported by the backend
    pub fn open(access: A, pid: u32) -> ScanResult<Self> {
        if pid == 0 {
            return Err(ScanError::invalid_argument("pid must be greater than zero"));
        }

        let raw = access.open_process(pid, Self::REQUESTED_RIGHTS)?;
        tracing::debug!(pid, "opened process handle");

        Ok(ProcessHandle {
            access,
            raw: Some(raw),
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn is_open(&self) -> bool {
        self.raw.is_some()
    }

    fn raw(&self) -> ScanResult<&A::Handle> {
        self.raw.as_ref().ok_or(ScanError::HandleClosed)
    }

    pub fn query_region(&self, address: usize) -> ScanResult<MemoryRegion> {
        self.access.query_region(self.raw()?, address)
    }

    /// Copies up to `buffer.len()` bytes and returns the count actually copied.
    pub fn read_into(&self, address: usize, buffer: &mut [u8]) -> ScanResult<usize> {
        self.access.read_memory(self.raw()?, address, buffer)
    }

    /// Fills `buffer` completely or fails with `ReadFailed`.
    pub fn read_exact(&self, address: usize, buffer: &mut [u8]) -> ScanResult<()> {
        let requested = buffer.len();
        let read = self.read_into(address, buffer).map_err(|e| match e {
            e @ (ScanError::ReadFailed { .. } | ScanError::HandleClosed) => e,
            e => ScanError::ReadFailed {
                address,
                requested,
                read: 0,
                source: Some(anyhow::Error::new(e)),
            },
        })?;

        if read != requested {
            return Err(ScanError::read_failed(address, requested, read));
        }
        Ok(())
    }

    /// Releases the handle, returning the backend's success flag.
    pub fn close(mut self) -> bool {
        self.release()
    }

    fn release(&mut self) -> bool {
        match self.raw.take() {
            Some(raw) => {
                let ok = self.access.close_handle(raw);
                tracing::debug!(pid = self.pid, ok, "closed process handle");
                ok
            }
            None => false,
        }
    }
}

impl<A: ProcessAccess> Drop for ProcessHandle<A> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<A: ProcessAccess> std::fmt::Debug for ProcessHandle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("open", &self.is_open())
            .finish()
    }
}
