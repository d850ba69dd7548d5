//! `/proc`-based backend.
//!
//! Region metadata comes from `/proc/<pid>/maps`, bytes from positional reads of
//! `/proc/<pid>/mem`. Permissions are translated into the Win32 protection encoding so
//! the same filters work on every platform.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use nix::unistd::{SysconfVar, sysconf};
use parking_lot::Mutex;

use super::{AccessRights, ProcessAccess, ProcessDiscovery, ProcessEntry};
use crate::memory::{AddressSpace, MemoryRegion, ProtectionFlags, StateFlags};
use crate::{ScanError, ScanResult, ScanResultExt};

const DEFAULT_PAGE_SIZE: usize = 0x1000;

#[cfg(target_pointer_width = "64")]
const MAXIMUM_USER_ADDRESS: usize = 0x7FFF_FFFF_FFFF;
#[cfg(not(target_pointer_width = "64"))]
const MAXIMUM_USER_ADDRESS: usize = 0xBFFF_FFFF;

/// Kernel-provided mappings that `/proc/<pid>/mem` refuses to read.
const UNREADABLE_MAPPINGS: [&str; 3] = ["[vvar]", "[vvar_vclock]", "[vsyscall]"];

/// Open `/proc/<pid>/mem` plus the pid it belongs to.
#[derive(Debug)]
pub struct LinuxHandle {
    pid: u32,
    mem: File,
    maps: Mutex<MapsCache>,
}

/// Parsed maps of the last walk.
///
/// A region walk queries strictly ascending addresses; a query at or below the previous one
/// starts a new walk and re-reads the file.
#[derive(Debug, Default)]
struct MapsCache {
    entries: Option<Vec<MapsEntry>>,
    last_query: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxAccess;

impl LinuxAccess {
    pub fn new() -> Self {
        LinuxAccess
    }
}

fn proc_path(pid: u32, entry: &str) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/{entry}"))
}

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MapsEntry {
    pub start: usize,
    pub end: usize,
    pub protection: ProtectionFlags,
}

/// Translates an `rwxp` permission field into the Win32 protection encoding.
pub(crate) fn protection_from_perms(perms: &str) -> ProtectionFlags {
    let perms = perms.as_bytes();
    let flag = |i: usize, c: u8| perms.get(i) == Some(&c);

    match (flag(0, b'r'), flag(1, b'w'), flag(2, b'x')) {
        (false, false, false) => ProtectionFlags::NOACCESS,
        (_, true, true) => ProtectionFlags::EXECUTE_READWRITE,
        (true, false, true) => ProtectionFlags::EXECUTE_READ,
        (false, false, true) => ProtectionFlags::EXECUTE,
        (_, true, false) => ProtectionFlags::READWRITE,
        (true, false, false) => ProtectionFlags::READONLY,
    }
}

pub(crate) fn parse_maps_line(line: &str) -> Option<MapsEntry> {
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let perms = fields.next()?;
    let (start, end) = range.split_once('-')?;
    let start = usize::from_str_radix(start, 16).ok()?;
    let end = usize::from_str_radix(end, 16).ok()?;

    if end <= start {
        return None;
    }

    let pathname = fields.nth(3).unwrap_or("");
    let protection = match UNREADABLE_MAPPINGS.contains(&pathname) {
        true => ProtectionFlags::NOACCESS,
        false => protection_from_perms(perms),
    };

    Some(MapsEntry { start, end, protection })
}

fn free_region(address: usize, end: usize) -> MemoryRegion {
    MemoryRegion {
        allocation_base: address,
        base_address: address,
        region_size: end - address,
        protection: ProtectionFlags::NOACCESS,
        state: StateFlags::FREE,
    }
}

/// Region containing `address` given the sorted mappings of a process.
///
/// Unmapped gaps come back as `MEM_FREE` regions reaching up to the next mapping, or up to
/// `MAXIMUM_USER_ADDRESS` after the last one. Addresses at or above that limit have no region.
pub(crate) fn region_at(maps: &[MapsEntry], address: usize) -> Option<MemoryRegion> {
    let Some(entry) = maps.iter().find(|entry| entry.end > address) else {
        return (address < MAXIMUM_USER_ADDRESS).then(|| free_region(address, MAXIMUM_USER_ADDRESS));
    };

    if entry.start <= address {
        Some(MemoryRegion {
            allocation_base: entry.start,
            base_address: address,
            region_size: entry.end - address,
            protection: entry.protection,
            state: StateFlags::COMMIT,
        })
    } else {
        Some(free_region(address, entry.start))
    }
}

fn read_maps(pid: u32) -> ScanResult<Vec<MapsEntry>> {
    let text = fs::read_to_string(proc_path(pid, "maps"))
        .map_err(ScanError::from)
        .with_context(|| format!("reading /proc/{pid}/maps"))?;
    Ok(text.lines().filter_map(parse_maps_line).collect())
}

impl ProcessAccess for LinuxAccess {
    type Handle = LinuxHandle;

    fn open_process(&self, pid: u32, rights: AccessRights) -> ScanResult<LinuxHandle> {
        if !rights.contains(AccessRights::VM_READ) {
            return Err(ScanError::invalid_argument("procfs handles are always opened for reading"));
        }
        if !proc_path(pid, "").exists() {
            return Err(ScanError::ProcessNotFound {
                pid: Some(pid),
                name: None,
            });
        }

        match File::open(proc_path(pid, "mem")) {
            Ok(mem) => Ok(LinuxHandle {
                pid,
                mem,
                maps: Mutex::new(MapsCache::default()),
            }),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(ScanError::AccessDenied { pid }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ScanError::ProcessNotFound {
                pid: Some(pid),
                name: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn close_handle(&self, handle: LinuxHandle) -> bool {
        drop(handle.mem);
        true
    }

    fn query_region(&self, handle: &LinuxHandle, address: usize) -> ScanResult<MemoryRegion> {
        let mut cache = handle.maps.lock();

        let restarted = address <= cache.last_query;
        let entries = match cache.entries.take() {
            Some(entries) if !restarted => entries,
            _ => read_maps(handle.pid)
                .map_err(|e| ScanError::RegionQueryFailed((address, Some(anyhow::Error::new(e)))))?,
        };

        let region = region_at(&entries, address);
        cache.entries = Some(entries);
        cache.last_query = address;
        region.ok_or(ScanError::RegionQueryFailed((address, None)))
    }

    fn read_memory(&self, handle: &LinuxHandle, address: usize, buffer: &mut [u8]) -> ScanResult<usize> {
        let mut filled = 0;

        while filled < buffer.len() {
            let offset = (address as u64).saturating_add(filled as u64);
            match handle.mem.read_at(&mut buffer[filled..], offset) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) if filled > 0 => break,
                Err(e) => {
                    return Err(ScanError::ReadFailed {
                        address,
                        requested: buffer.len(),
                        read: 0,
                        source: Some(anyhow::Error::new(e)),
                    });
                }
            }
        }

        Ok(filled)
    }

    fn address_space(&self) -> ScanResult<AddressSpace> {
        let page_size = match sysconf(SysconfVar::PAGE_SIZE) {
            Ok(Some(size)) if size > 0 => size as usize,
            _ => DEFAULT_PAGE_SIZE,
        };

        Ok(AddressSpace {
            minimum: page_size,
            maximum: MAXIMUM_USER_ADDRESS,
            page_size,
        })
    }
}

/// Lists processes by reading `/proc/<pid>/comm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcfsDiscovery;

impl ProcessDiscovery for ProcfsDiscovery {
    fn enumerate_processes(&self) -> ScanResult<Vec<ProcessEntry>> {
        let mut processes = Vec::new();

        let entries = fs::read_dir("/proc")
            .map_err(ScanError::from)
            .context("listing /proc")?;

        for entry in entries {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            // Processes may exit between listing and reading.
            let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
                continue;
            };
            processes.push(ProcessEntry {
                pid,
                name: comm.trim_end_matches('\n').to_string(),
            });
        }

        processes.sort_by_key(|p| p.pid);
        Ok(processes)
    }
}
