/// Crate-level constants
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Spacing between candidate slot start times, in minutes. Operating windows
/// are expected to be a whole multiple of this so the last slot lands exactly
/// on the closing boundary.
pub const SLOT_GRANULARITY_MINUTES: i64 = 30;
