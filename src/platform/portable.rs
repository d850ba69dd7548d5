//! Process discovery through the `sysinfo` crate, available on every platform it supports.

use sysinfo::System;

use super::{ProcessDiscovery, ProcessEntry};
use crate::ScanResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoDiscovery;

impl ProcessDiscovery for SysinfoDiscovery {
    fn enumerate_processes(&self) -> ScanResult<Vec<ProcessEntry>> {
        let system = System::new_all();

        let mut processes: Vec<ProcessEntry> = system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
            })
            .collect();

        processes.sort_by_key(|p| p.pid);
        Ok(processes)
    }
}
