//! Operating-system access behind two small traits.
//!
//! [`ProcessAccess`] is the only way the core touches a target process: open, close,
//! query one region, copy bytes. [`ProcessDiscovery`] resolves process names to ids.
//! Each supported platform provides one implementation of each; the core never
//! branches on the platform itself.

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(feature = "sysinfo")]
pub mod portable;
#[cfg(windows)]
pub mod windows;

use std::ops::BitOr;

use crate::memory::{AddressSpace, MemoryRegion};
use crate::{ScanError, ScanResult};

#[cfg(target_os = "linux")]
pub type NativeAccess = linux::LinuxAccess;
#[cfg(windows)]
pub type NativeAccess = windows::WindowsAccess;

#[cfg(all(target_os = "linux", not(feature = "sysinfo")))]
pub type NativeDiscovery = linux::ProcfsDiscovery;
#[cfg(all(windows, not(feature = "sysinfo")))]
pub type NativeDiscovery = windows::ToolhelpDiscovery;
#[cfg(feature = "sysinfo")]
pub type NativeDiscovery = portable::SysinfoDiscovery;

/// Rights requested when opening a process, encoded with the Win32 `PROCESS_*` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRights(pub u32);

impl AccessRights {
    pub const VM_READ: Self = Self(0x0010);
    pub const QUERY_INFORMATION: Self = Self(0x0400);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AccessRights {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Primitive process-memory calls for one platform.
pub trait ProcessAccess {
    /// Backend-specific open handle.
    type Handle;

    /// Opens `pid`. Fails with `ProcessNotFound` or `AccessDenied`.
    fn open_process(&self, pid: u32, rights: AccessRights) -> ScanResult<Self::Handle>;

    /// Releases a handle, reporting whether the platform accepted the release.
    fn close_handle(&self, handle: Self::Handle) -> bool;

    /// Metadata of the region containing `address`.
    fn query_region(&self, handle: &Self::Handle, address: usize) -> ScanResult<MemoryRegion>;

    /// Copies up to `buffer.len()` bytes starting at `address` and returns how many were copied.
    fn read_memory(&self, handle: &Self::Handle, address: usize, buffer: &mut [u8]) -> ScanResult<usize>;

    /// Usable address range and page size of the target platform.
    fn address_space(&self) -> ScanResult<AddressSpace>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

/// Process listing used to resolve a name to a pid before opening a handle.
pub trait ProcessDiscovery {
    fn enumerate_processes(&self) -> ScanResult<Vec<ProcessEntry>>;

    /// First process whose name matches `name` exactly.
    fn find_process_by_name(&self, name: &str) -> ScanResult<u32> {
        self.enumerate_processes()?
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.pid)
            .ok_or_else(|| ScanError::ProcessNotFound {
                pid: None,
                name: Some(name.to_string()),
            })
    }
}

impl<D: ProcessDiscovery + ?Sized> ProcessDiscovery for &D {
    fn enumerate_processes(&self) -> ScanResult<Vec<ProcessEntry>> {
        (**self).enumerate_processes()
    }

    fn find_process_by_name(&self, name: &str) -> ScanResult<u32> {
        (**self).find_process_by_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<ProcessEntry>);

    impl ProcessDiscovery for Fixed {
        fn enumerate_processes(&self) -> ScanResult<Vec<ProcessEntry>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn find_by_name_takes_first_exact_match() {
        let discovery = Fixed(vec![
            ProcessEntry { pid: 10, name: "game.exe.bak".into() },
            ProcessEntry { pid: 11, name: "game.exe".into() },
            ProcessEntry { pid: 12, name: "game.exe".into() },
        ]);
        assert_eq!(discovery.find_process_by_name("game.exe").unwrap(), 11);
    }

    #[test]
    fn find_by_name_reports_missing_name() {
        let discovery = Fixed(Vec::new());
        let err = discovery.find_process_by_name("nope").unwrap_err();
        assert!(err.is_process_not_found());
        assert!(err.root_cause_string().contains("nope"));
    }

    #[test]
    fn access_rights_combine() {
        let rights = AccessRights::QUERY_INFORMATION | AccessRights::VM_READ;
        assert_eq!(rights.0, 0x0410);
        assert!(rights.contains(AccessRights::VM_READ));
    }
}
