pub mod handle;
pub mod pattern;

pub use handle::ProcessHandle;
pub use pattern::Pattern;
