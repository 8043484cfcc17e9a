/// Look-back window of the execution timeline, in seconds.
pub const TIME_WINDOW_SECS: f64 = 15.0;

/// Trailing window kept in the trust history, in seconds.
pub const TRUST_HISTORY_WINDOW_SECS: f64 = 60.0;

/// Default lifetime of the trust popup, in seconds.
pub const DEFAULT_TRUST_DISPLAY_SECS: f64 = 5.0;

/// Maximum number of history entries kept per subject.
pub const HISTORY_CAP: usize = 50;

/// Two intervals whose start and duration both differ by less than this
/// are the same execution.
pub const DUPLICATE_TOLERANCE_SECS: f64 = 0.1;

/// Default pub/sub channel carrying trust events.
pub const DEFAULT_TRUST_CHANNEL: &str = "maple";

/// A device whose heartbeat is older than this is shown as offline.
pub const HEARTBEAT_STALENESS_SECS: f64 = 10.0;

/// Number of per-node log entries returned to the log viewer.
pub const NODE_LOG_TAIL: usize = 20;
