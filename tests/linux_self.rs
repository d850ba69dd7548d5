#![cfg(target_os = "linux")]

use memgrep::memory::ProtectionFlags;
use memgrep::platform::linux::LinuxAccess;
use memgrep::{ScanOptions, Scanner};

#[test]
fn reads_own_heap_through_procfs() {
    let value = Box::new(0x0123_4567_89AB_CDEFu64);
    let address = &*value as *const u64 as usize;

    let options = ScanOptions::default().with_protection_filter(ProtectionFlags::READWRITE);
    let scanner = Scanner::with_access(LinuxAccess::new(), std::process::id(), options).unwrap();

    let regions = scanner.regions();
    assert!(!regions.is_empty());
    for pair in regions.windows(2) {
        assert!(pair[0].end_address() <= pair[1].base_address);
    }
    assert!(regions.iter().any(|r| r.contains(address)));

    assert_eq!(scanner.read_typed::<u64>(address).unwrap(), *value);
    assert_eq!(scanner.read_bytes(address, 8).unwrap(), value.to_le_bytes());
    assert!(scanner.dispose());
}

#[test]
fn missing_pid_is_not_found() {
    let err = Scanner::with_access(LinuxAccess::new(), u32::MAX, ScanOptions::default()).unwrap_err();
    assert!(err.is_process_not_found());
}
