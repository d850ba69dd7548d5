//! Win32 backend: `OpenProcess`, `VirtualQueryEx`, `ReadProcessMemory`, Toolhelp32.
//!
//! `MEMORY_BASIC_INFORMATION` layout differences between x86 and x64 are handled by the
//! `windows` crate bindings; nothing here depends on pointer width.

use core::ffi::c_void;

use windows::Win32::Foundation::{BOOL, CloseHandle, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, HANDLE};
use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Memory::{MEMORY_BASIC_INFORMATION, VirtualQueryEx};
use windows::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};
use windows::Win32::System::Threading::{OpenProcess, PROCESS_ACCESS_RIGHTS};
use windows_result::HRESULT;

use super::{AccessRights, ProcessAccess, ProcessDiscovery, ProcessEntry};
use crate::memory::{AddressSpace, MemoryRegion, ProtectionFlags, StateFlags};
use crate::{ScanError, ScanResult};

/// A Win32 `HANDLE` stored as its integer value.
///
/// Only the owning [`ProcessHandle`](crate::process::ProcessHandle) ever converts it back,
/// which is what makes it safe to move between threads.
#[derive(Debug)]
pub struct RawHandle {
    handle_value: usize,
}

impl RawHandle {
    fn new(handle: HANDLE) -> Self {
        RawHandle {
            handle_value: handle.0 as usize,
        }
    }

    fn as_handle(&self) -> HANDLE {
        HANDLE(self.handle_value as *mut c_void)
    }
}

// SAFETY: the handle value is plain data; the Win32 calls made with it are thread-agnostic.
unsafe impl Send for RawHandle {}
unsafe impl Sync for RawHandle {}

/// Converts a `windows` crate error into the `windows-result` error carried by `ScanError`.
fn api_error(err: windows::core::Error, context: &str) -> ScanError {
    let converted = windows_result::Error::new(HRESULT(err.code().0), err.message());
    ScanError::WinApi((converted, Some(anyhow::anyhow!("{context}"))))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsAccess;

impl WindowsAccess {
    pub fn new() -> Self {
        WindowsAccess
    }
}

impl ProcessAccess for WindowsAccess {
    type Handle = RawHandle;

    fn open_process(&self, pid: u32, rights: AccessRights) -> ScanResult<RawHandle> {
        let handle = unsafe { OpenProcess(PROCESS_ACCESS_RIGHTS(rights.0), BOOL(0), pid) };

        match handle {
            Ok(handle) if !handle.is_invalid() => Ok(RawHandle::new(handle)),
            Ok(_) => Err(ScanError::AccessDenied { pid }),
            Err(e) if e.code() == ERROR_ACCESS_DENIED.to_hresult() => Err(ScanError::AccessDenied { pid }),
            Err(e) if e.code() == ERROR_INVALID_PARAMETER.to_hresult() => Err(ScanError::ProcessNotFound {
                pid: Some(pid),
                name: None,
            }),
            Err(e) => Err(api_error(e, "OpenProcess")),
        }
    }

    fn close_handle(&self, handle: RawHandle) -> bool {
        unsafe { CloseHandle(handle.as_handle()) }.is_ok()
    }

    fn query_region(&self, handle: &RawHandle, address: usize) -> ScanResult<MemoryRegion> {
        let mut mbi = MEMORY_BASIC_INFORMATION::default();
        let size = std::mem::size_of::<MEMORY_BASIC_INFORMATION>();

        let written = unsafe {
            VirtualQueryEx(handle.as_handle(), Some(address as *const c_void), &mut mbi, size)
        };
        if written != size {
            let err = windows::core::Error::from_win32();
            return Err(ScanError::RegionQueryFailed((
                address,
                Some(anyhow::anyhow!("VirtualQueryEx: {}", err.message())),
            )));
        }

        Ok(MemoryRegion {
            allocation_base: mbi.AllocationBase as usize,
            base_address: mbi.BaseAddress as usize,
            region_size: mbi.RegionSize,
            protection: ProtectionFlags(mbi.Protect.0),
            state: StateFlags(mbi.State.0),
        })
    }

    fn read_memory(&self, handle: &RawHandle, address: usize, buffer: &mut [u8]) -> ScanResult<usize> {
        let mut bytes_read: usize = 0;

        let result = unsafe {
            ReadProcessMemory(
                handle.as_handle(),
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len(),
                Some(&mut bytes_read),
            )
        };

        match result {
            Ok(()) => Ok(bytes_read),
            // ERROR_PARTIAL_COPY still reports how much arrived.
            Err(_) if bytes_read > 0 => Ok(bytes_read),
            Err(e) => Err(ScanError::ReadFailed {
                address,
                requested: buffer.len(),
                read: 0,
                source: Some(anyhow::anyhow!("ReadProcessMemory: {}", e.message())),
            }),
        }
    }

    fn address_space(&self) -> ScanResult<AddressSpace> {
        let mut info = SYSTEM_INFO::default();
        unsafe { GetSystemInfo(&mut info) };

        Ok(AddressSpace {
            minimum: info.lpMinimumApplicationAddress as usize,
            maximum: info.lpMaximumApplicationAddress as usize,
            page_size: info.dwPageSize as usize,
        })
    }
}

/// Process listing through `CreateToolhelp32Snapshot`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolhelpDiscovery;

impl ProcessDiscovery for ToolhelpDiscovery {
    fn enumerate_processes(&self) -> ScanResult<Vec<ProcessEntry>> {
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map_err(|e| api_error(e, "CreateToolhelp32Snapshot"))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        let mut processes = Vec::new();

        let mut next = unsafe { Process32FirstW(snapshot, &mut entry) };
        while next.is_ok() {
            let len = entry
                .szExeFile
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(entry.szExeFile.len());
            processes.push(ProcessEntry {
                pid: entry.th32ProcessID,
                name: String::from_utf16_lossy(&entry.szExeFile[..len]),
            });
            next = unsafe { Process32NextW(snapshot, &mut entry) };
        }

        _ = unsafe { CloseHandle(snapshot) };
        Ok(processes)
    }
}
