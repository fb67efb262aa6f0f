//! Constants shared by every driver instance.

/// Default capacity of both bridge queues.
///
/// Matches the largest single fan-out of the bundled drivers (the eight
/// MCP3008 inputs). Drivers with more channels get a larger queue: the
/// capacity is always raised to the channel count at construction.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Upper bound on channels per driver instance.
pub const MAX_CHANNELS: usize = 64;

/// Name of the input that triggers every configured channel.
pub const TRIGGER_ALL_INPUT: &str = "trig";

/// Prefix of poll worker thread names (`hakit-<driver>`).
pub const WORKER_THREAD_PREFIX: &str = "hakit-";

/// Upper bound on the oversampling count of a single request.
pub const MAX_AVERAGING: u32 = 1024;

