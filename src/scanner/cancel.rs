use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{ScanError, ScanResult};

/// Cooperative cancellation flag shared between a scanner and whoever may want to stop it.
///
/// Cloning yields another view of the same flag. Once cancelled, every check fails until
/// [`reset`](Self::reset) is called.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once the token has been triggered.
    pub fn check(&self) -> ScanResult<()> {
        match self.is_cancelled() {
            true => Err(ScanError::Cancelled),
            false => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.check().unwrap_err().is_cancelled());
        token.reset();
        assert!(!other.is_cancelled());
    }
}
