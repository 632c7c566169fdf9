use std::time::Duration;

/// Minimum spacing between accepted watch events.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// Time the managed process gets to exit after a forwarded termination
/// signal before it is killed.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Same as [`GRACE_PERIOD`], applied to the old instance during a restart.
pub const RESTART_GRACE: Duration = GRACE_PERIOD;

/// Capacity of the supervisor command queue.
pub const SUPERVISOR_QUEUE: usize = 16;
