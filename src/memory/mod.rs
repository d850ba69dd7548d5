pub mod region;
pub mod snapshot;
pub mod transmute;

pub use region::{AddressSpace, Enumeration, MemoryRegion, ProtectionFlags, RegionEnumerator, StateFlags};
pub use snapshot::MemorySnapshot;
pub use transmute::{Primitive, Value, ValueKind};

/// One pattern position: a concrete byte, or `None` for a wildcard.
pub type Byte = Option<u8>;
