#![cfg(feature = "async")]

mod common;

use std::time::Duration;

use common::{FakeAccess, PAGE, PID, region};
use memgrep::async_ext::{self, SharedScanner};
use memgrep::memory::ProtectionFlags;
use memgrep::{Pattern, Scanner, Value, ValueKind, with_scanner};

fn shared() -> (FakeAccess, SharedScanner<FakeAccess>) {
    let fake = FakeAccess::new()
        .with_region(region(0x1000, PAGE, ProtectionFlags::EXECUTE_READWRITE), 0x00)
        .write(0x1200, &[0xDE, 0xAD, 0xBE, 0xEF])
        .write(0x1300, &7u64.to_le_bytes());
    let options = fake.options(0x10_0000).with_lock_timeout(Duration::from_millis(50));
    let scanner = Scanner::with_access(fake.clone(), PID, options).unwrap();
    (fake, SharedScanner::new(scanner))
}

#[test]
fn async_operations_run_on_the_blocking_pool() {
    let (_fake, shared) = shared();

    smol::block_on(async {
        assert_eq!(async_ext::snapshot(&shared).await.unwrap(), PAGE);
        assert_eq!(
            async_ext::search_signature(&shared, "DE AD ?? EF").await.unwrap(),
            Some(0x1200)
        );
        let pattern = Pattern::parse("BE EF").unwrap();
        assert_eq!(async_ext::search(&shared, pattern).await.unwrap(), Some(0x1202));
        assert_eq!(
            async_ext::read_bytes(&shared, 0x1200, 2).await.unwrap(),
            vec![0xDE, 0xAD]
        );
        assert_eq!(async_ext::read_typed::<_, u64>(&shared, 0x1300).await.unwrap(), 7);
        assert_eq!(
            async_ext::read_value(&shared, 0x1300, ValueKind::U64).await.unwrap(),
            Value::U64(7)
        );
    });
}

#[test]
fn malformed_signature_fails_without_locking() {
    let (_fake, shared) = shared();
    let _held = shared.acquire_with_timeout(None).unwrap();

    let err = smol::block_on(async_ext::search_signature(&shared, "XY")).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn lock_timeout_is_reported() {
    let (_fake, shared) = shared();
    let held = shared.acquire_with_timeout(None).unwrap();

    let err = with_scanner!(&shared, Some(Duration::from_millis(10)), |scanner| -> usize, Ok(scanner.regions().len()))
        .unwrap_err();
    assert!(err.is_timeout());

    let err = smol::block_on(async_ext::read_bytes(&shared, 0x1200, 4)).unwrap_err();
    assert!(err.is_timeout());

    drop(held);
    let regions = with_scanner!(&shared, None, |scanner| -> usize, Ok(scanner.regions().len())).unwrap();
    assert_eq!(regions, 1);
}

#[test]
fn last_reference_returns_the_scanner() {
    let (fake, shared) = shared();
    let other = shared.clone();
    assert!(shared.into_inner().is_none());

    let scanner = other.into_inner().unwrap();
    assert!(scanner.dispose());
    assert_eq!(fake.closed_count(), 1);
}
