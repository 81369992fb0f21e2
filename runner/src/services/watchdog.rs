//! Per-invocation watchdog timer
//!
//! Each supervised invocation owns its own `Watchdog`; there is no
//! process-wide alarm. The supervisor awaits [`Watchdog::expired`] next to
//! the output stream and decides what to kill when it fires.

use std::future::pending;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl Watchdog {
    /// A zero timeout yields a watchdog that never fires
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: (!timeout.is_zero()).then_some(timeout),
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Start (or restart) the countdown from now
    ///
    /// A deadline past what the clock can represent never fires.
    pub fn arm(&mut self) {
        self.deadline = self.timeout.and_then(|timeout| Instant::now().checked_add(timeout));
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolves when the armed deadline passes; pends forever while disarmed
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_armed_watchdog_fires() {
        let mut watchdog = Watchdog::new(Duration::from_secs(10));
        watchdog.arm();

        let fired = timeout(Duration::from_secs(11), watchdog.expired()).await;
        assert!(fired.is_ok(), "Armed watchdog should fire after its timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_does_not_fire_early() {
        let mut watchdog = Watchdog::new(Duration::from_secs(10));
        watchdog.arm();

        let fired = timeout(Duration::from_secs(5), watchdog.expired()).await;
        assert!(fired.is_err(), "Watchdog should not fire before the deadline");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_disables() {
        let mut watchdog = Watchdog::new(Duration::ZERO);
        watchdog.arm();

        assert!(!watchdog.is_armed());
        assert_eq!(watchdog.timeout(), None);
        let fired = timeout(Duration::from_secs(3600), watchdog.expired()).await;
        assert!(fired.is_err(), "Disabled watchdog must never fire");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_deadline_never_fires() {
        let mut watchdog = Watchdog::new(Duration::from_secs(u64::MAX));
        watchdog.arm();

        assert!(!watchdog.is_armed());
        let fired = timeout(Duration::from_secs(3600), watchdog.expired()).await;
        assert!(fired.is_err(), "Overflowing deadline must behave as disabled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_pushes_deadline() {
        let mut watchdog = Watchdog::new(Duration::from_secs(10));
        watchdog.arm();
        tokio::time::advance(Duration::from_secs(8)).await;
        watchdog.arm();

        let fired = timeout(Duration::from_secs(5), watchdog.expired()).await;
        assert!(fired.is_err(), "Re-armed watchdog should count from the re-arm");

        watchdog.disarm();
        assert!(!watchdog.is_armed());
    }
}
