//! Shared and async access to a [`Scanner`].
//!
//! [`SharedScanner`] is the external synchronization a scanner needs when more than one
//! thread drives it. The async functions run the blocking operation on smol's blocking
//! thread pool; none of them scan in the background.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::memory::{Primitive, Value, ValueKind};
use crate::platform::ProcessAccess;
use crate::process::Pattern;
use crate::scanner::{CancelToken, Scanner};
use crate::ScanResult;

/// A scanner behind a mutex with timeout-based acquisition.
pub struct SharedScanner<A: ProcessAccess> {
    inner: Arc<Mutex<Scanner<A>>>,
    cancel: CancelToken,
    lock_timeout: Option<Duration>,
}

impl<A: ProcessAccess> Clone for SharedScanner<A> {
    fn clone(&self) -> Self {
        SharedScanner {
            inner: Arc::clone(&self.inner),
            cancel: self.cancel.clone(),
            lock_timeout: self.lock_timeout,
        }
    }
}

impl<A: ProcessAccess> SharedScanner<A> {
    /// Wraps `scanner`, taking the lock timeout from its options.
    pub fn new(scanner: Scanner<A>) -> Self {
        SharedScanner {
            lock_timeout: scanner.options().lock_timeout,
            cancel: scanner.cancel_token(),
            inner: Arc::new(Mutex::new(scanner)),
        }
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout
    }

    /// Cancels whatever operation currently holds the scanner, without taking the lock.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Attempts to acquire exclusive access with an optional timeout.
    ///
    /// # Returns
    /// * `Some(guard)` if the lock was acquired
    /// * `None` if the timeout expired first
    pub fn acquire_with_timeout(&self, timeout: Option<Duration>) -> Option<MutexGuard<'_, Scanner<A>>> {
        match timeout {
            Some(duration) => self.inner.try_lock_for(duration),
            None => Some(self.inner.lock()),
        }
    }

    /// Returns the scanner if this is the last reference to it.
    pub fn into_inner(self) -> Option<Scanner<A>> {
        Arc::try_unwrap(self.inner).ok().map(Mutex::into_inner)
    }
}

/// Locks a [`SharedScanner`] and evaluates an expression with `&mut Scanner` bound to `$guard`.
///
/// Evaluates to `ScanResult<$ret>`; a lock timeout becomes `ScanError::TimeoutReached`.
///
/// # Example
/// ```no_run
/// # #[cfg(target_os = "linux")]
/// # fn demo() -> memgrep::ScanResult<()> {
/// use std::time::Duration;
/// use memgrep::{with_scanner, Scanner, async_ext::SharedScanner};
///
/// let shared = SharedScanner::new(Scanner::attach(1234)?);
/// let found = with_scanner!(&shared, Some(Duration::from_secs(1)), |scanner| -> Option<usize>,
///     scanner.search_signature("5A 0F ?? 9A")
/// )?;
/// println!("{found:?}");
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! with_scanner {
    ($shared:expr, $timeout:expr, |$guard:ident| -> $ret:ty, $block:expr) => {{
        let shared = $shared;
        let timeout: Option<std::time::Duration> = $timeout;
        let result: $crate::ScanResult<$ret> = match shared.acquire_with_timeout(timeout) {
            Some(mut locked) => {
                let $guard = &mut *locked;
                $block
            }
            None => Err($crate::ScanError::TimeoutReached((timeout, None))),
        };
        result
    }};
}

/// Clones a SharedScanner into a `smol::unblock` closure and awaits it.
macro_rules! await_scan {
    ($shared:expr, |$guard:ident| -> $ret:ty, $block:expr) => {{
        let shared = $shared.clone();
        smol::unblock(move || -> ScanResult<$ret> {
            $crate::with_scanner!(&shared, shared.lock_timeout(), |$guard| -> $ret, $block)
        })
        .await
    }};
}

/// Takes a fresh snapshot; returns the number of bytes copied.
pub async fn snapshot<A>(shared: &SharedScanner<A>) -> ScanResult<usize>
where
    A: ProcessAccess + Send + 'static,
    A::Handle: Send,
{
    await_scan!(shared, |scanner| -> usize, scanner.snapshot().map(|snapshot| snapshot.total_bytes()))
}

pub async fn search<A>(shared: &SharedScanner<A>, pattern: Pattern) -> ScanResult<Option<usize>>
where
    A: ProcessAccess + Send + 'static,
    A::Handle: Send,
{
    await_scan!(shared, |scanner| -> Option<usize>, scanner.search(&pattern))
}

/// Parses `signature` on the calling task, then searches on the blocking pool.
pub async fn search_signature<A>(shared: &SharedScanner<A>, signature: &str) -> ScanResult<Option<usize>>
where
    A: ProcessAccess + Send + 'static,
    A::Handle: Send,
{
    let pattern = Pattern::parse(signature)?;
    search(shared, pattern).await
}

pub async fn read_bytes<A>(shared: &SharedScanner<A>, address: usize, size: usize) -> ScanResult<Vec<u8>>
where
    A: ProcessAccess + Send + 'static,
    A::Handle: Send,
{
    await_scan!(shared, |scanner| -> Vec<u8>, scanner.read_bytes(address, size))
}

pub async fn read_typed<A, T>(shared: &SharedScanner<A>, address: usize) -> ScanResult<T>
where
    A: ProcessAccess + Send + 'static,
    A::Handle: Send,
    T: Primitive + Send + 'static,
{
    await_scan!(shared, |scanner| -> T, scanner.read_typed::<T>(address))
}

pub async fn read_value<A>(shared: &SharedScanner<A>, address: usize, kind: ValueKind) -> ScanResult<Value>
where
    A: ProcessAccess + Send + 'static,
    A::Handle: Send,
{
    await_scan!(shared, |scanner| -> Value, scanner.read_value(address, kind))
}
