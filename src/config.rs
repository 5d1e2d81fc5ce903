//! Construction-time timing configuration (§4.9): a small immutable record
//! built once and handed to the election object, never parsed from a file
//! by this crate.

use std::time::Duration;

/// Timing knobs for one election object. There is no file/env/CLI parsing
/// here — that's an embedding concern (§1 Out-of-scope).
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Initial `recvqueue.take` timeout in the election loop; grows
    /// exponentially up to `max_notification_interval` while idle.
    min_notification_interval: Duration,
    /// Ceiling for the exponential backoff above.
    max_notification_interval: Duration,
    /// Fixed poll timeout used by the termination drain.
    finalize_wait: Duration,
    /// Poll timeout used by the sender and receiver worker threads.
    receive_poll_timeout: Duration,
}

impl Config {
    pub const DEFAULT_FINALIZE_WAIT: Duration = Duration::from_millis(200);
    pub const DEFAULT_MAX_NOTIFICATION_INTERVAL: Duration = Duration::from_secs(60);
    pub const DEFAULT_RECEIVE_POLL_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(
        min_notification_interval: Duration,
        max_notification_interval: Duration,
        finalize_wait: Duration,
        receive_poll_timeout: Duration,
    ) -> Config {
        Config {
            min_notification_interval,
            max_notification_interval,
            finalize_wait,
            receive_poll_timeout,
        }
    }

    pub fn min_notification_interval(&self) -> Duration {
        self.min_notification_interval
    }

    pub fn max_notification_interval(&self) -> Duration {
        self.max_notification_interval
    }

    pub fn finalize_wait(&self) -> Duration {
        self.finalize_wait
    }

    pub fn receive_poll_timeout(&self) -> Duration {
        self.receive_poll_timeout
    }
}

impl Default for Config {
    /// `minNotificationInterval` defaults to `finalizeWait`, matching §5.
    fn default() -> Config {
        Config {
            min_notification_interval: Self::DEFAULT_FINALIZE_WAIT,
            max_notification_interval: Self::DEFAULT_MAX_NOTIFICATION_INTERVAL,
            finalize_wait: Self::DEFAULT_FINALIZE_WAIT,
            receive_poll_timeout: Self::DEFAULT_RECEIVE_POLL_TIMEOUT,
        }
    }
}
