//! Constants for the download module (timeouts, attempt budget).

/// Lower bound for a per-attempt timeout, in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 2;

/// Upper bound for a per-attempt timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 99;

/// Default per-attempt timeout for index downloads.
pub const DEFAULT_INDEX_TIMEOUT_SECS: u64 = 30;

/// Default per-attempt timeout for audio file downloads.
pub const DEFAULT_FILE_TIMEOUT_SECS: u64 = 10;
