use std::time::Duration;

/// Controls how long the runner waits for a session to become ready, and how it recovers from
/// sessions that are stuck waiting for capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyPolicy {
    /// Time between status polls.
    pub poll_interval: Duration,
    /// Overall ceiling on the wait for a session to reach `running`.
    pub ready_timeout: Duration,
    /// How long a session may continuously report the requested state before it counts as stuck.
    pub stuck_threshold: Duration,
    /// How long to let the backing pool recover after destroying a stuck session.
    pub stuck_cooldown: Duration,
    /// How many times a stuck session is destroyed and requested again before giving up.
    pub stuck_retries: u32,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(10 * 60),
            stuck_threshold: Duration::from_secs(3 * 60),
            stuck_cooldown: Duration::from_secs(5 * 60),
            stuck_retries: 1,
        }
    }
}
