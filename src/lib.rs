//! Read-only memory scanning of another process.
//!
//! A [`Scanner`] opens a target process, enumerates its committed regions matching a
//! protection filter, copies them into a [`MemorySnapshot`](memory::MemorySnapshot) and
//! searches the copy for a byte [`Pattern`] with `??` wildcards.
//!
//! ```no_run
//! # #[cfg(target_os = "linux")]
//! # fn demo() -> memgrep::ScanResult<()> {
//! use memgrep::Scanner;
//!
//! let mut scanner = Scanner::attach(4242)?;
//! if let Some(address) = scanner.search_signature("5A 0F 3C ?? 9A 4B")? {
//!     let value: u32 = scanner.read_typed(address + 6)?;
//!     println!("0x{address:X}: {value}");
//! }
//! scanner.dispose();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod platform;
pub mod process;
pub mod scanner;

#[cfg(feature = "async")]
pub mod async_ext;

pub use error::{ScanError, ScanResult, ScanResultExt};
pub use memory::{AddressSpace, MemoryRegion, Primitive, ProtectionFlags, StateFlags, Value, ValueKind};
pub use platform::{ProcessAccess, ProcessDiscovery, ProcessEntry};
pub use process::Pattern;
pub use scanner::{CancelToken, ScanOptions, Scanner};
