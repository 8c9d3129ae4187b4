pub mod clock;
pub mod fs;
pub mod host;

pub use clock::{Clock, ManualClock, SystemClock};

/// Sentinel timestamp used wherever a millisecond value is "not yet known":
/// unreadable file mtimes, unset next-execution times, and similar.
pub const DEFAULT_TIMESTAMP: i64 = 0;
