#![cfg(target_os = "linux")]

use std::hint::black_box;

use memgrep::memory::ProtectionFlags;
use memgrep::platform::linux::LinuxAccess;
use memgrep::{ScanOptions, Scanner};

static MARKER: [u8; 8] = [0xC3, 0x5A, 0x0F, 0x3C, 0x5D, 0x9A, 0x4B, 0x77];

#[test]
fn searches_every_readable_region_of_own_process() {
    let marker = black_box(&MARKER);
    let address = marker.as_ptr() as usize;
    let heap_copy = black_box(Box::new(MARKER));

    let options = ScanOptions::default().with_protection_filter(ProtectionFlags::READABLE);
    let mut scanner = Scanner::with_access(LinuxAccess::new(), std::process::id(), options).unwrap();

    assert_eq!(scanner.enumeration_truncated_at(), None);
    assert!(scanner.regions().iter().any(|r| r.contains(address)));

    assert!(scanner.snapshot().unwrap().is_valid());
    // The binary's read-only data is mapped below the heap, so its copy is found first.
    assert_eq!(scanner.search_signature("C3 5A 0F 3C ?? 9A 4B 77").unwrap(), Some(address));

    let heap_address = heap_copy.as_ptr() as usize;
    assert_eq!(scanner.read_bytes(heap_address, 8).unwrap(), MARKER);
    assert!(scanner.dispose());
}
