//! Stop signal and in-flight accounting shared by the three listeners.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tracing::debug;

/// Where the listeners are in their lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Built or bound, not yet serving.
    Starting,
    Serving,
    /// Stop requested; requests already inside an adapter may finish.
    Draining,
    Stopped,
}

/// One per process. Listeners watch `stop`; adapters hold an
/// [`InFlightGuard`] for the duration of each request.
#[derive(Debug)]
pub struct ShutdownController {
    stop: watch::Sender<bool>,
    in_flight: Arc<watch::Sender<usize>>,
    state: ArcSwap<ListenerState>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stop: watch::Sender::new(false),
            in_flight: Arc::new(watch::Sender::new(0)),
            state: ArcSwap::from_pointee(ListenerState::Starting),
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(ListenerState::Serving));
    }

    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Idempotent.
    pub fn trigger_shutdown(&self) {
        if self.stop.send_replace(true) {
            return;
        }
        self.state.store(Arc::new(ListenerState::Draining));
        debug!(in_flight = self.in_flight_count(), "listener shutdown triggered");
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.stop.borrow()
    }

    #[must_use]
    pub fn state(&self) -> ListenerState {
        **self.state.load()
    }

    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.send_modify(|n| *n += 1);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Waits until no request is in flight or `timeout` elapses. Only a full
    /// drain moves the state to `Stopped`.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let mut count = self.in_flight.subscribe();
        let drained = tokio::time::timeout(timeout, count.wait_for(|n| *n == 0))
            .await
            .is_ok_and(|changed| changed.is_ok());
        if drained {
            self.state.store(Arc::new(ListenerState::Stopped));
        }
        drained
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once shutdown is triggered, or immediately if the controller is
/// gone.
pub async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Counts one request for as long as it lives, panics included.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<watch::Sender<usize>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let controller = ShutdownController::new();
        assert_eq!(controller.state(), ListenerState::Starting);

        controller.set_ready();
        assert_eq!(controller.state(), ListenerState::Serving);
        assert!(!controller.is_shutting_down());

        controller.trigger_shutdown();
        controller.trigger_shutdown();
        assert_eq!(controller.state(), ListenerState::Draining);
        assert!(controller.is_shutting_down());
    }

    #[test]
    fn guards_count_requests() {
        let controller = ShutdownController::new();
        let first = controller.in_flight_guard();
        let second = controller.in_flight_guard();
        assert_eq!(controller.in_flight_count(), 2);

        drop(first);
        assert_eq!(controller.in_flight_count(), 1);
        drop(second);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn late_receivers_see_the_signal() {
        let controller = ShutdownController::new();
        let mut early = controller.shutdown_receiver();

        controller.trigger_shutdown();
        let mut late = controller.shutdown_receiver();

        tokio::time::timeout(Duration::from_secs(1), async {
            shutdown_signalled(&mut early).await;
            shutdown_signalled(&mut late).await;
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn dropping_the_controller_releases_listeners() {
        let controller = ShutdownController::new();
        let mut rx = controller.shutdown_receiver();
        drop(controller);
        tokio::time::timeout(Duration::from_secs(1), shutdown_signalled(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn drain_completes_when_last_request_ends() {
        let controller = ShutdownController::new();
        let guard = controller.in_flight_guard();
        controller.trigger_shutdown();

        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_secs(2)).await);
        assert_eq!(controller.state(), ListenerState::Stopped);
        release.await.unwrap();
    }

    #[tokio::test]
    async fn drain_gives_up_after_timeout() {
        let controller = ShutdownController::new();
        let _guard = controller.in_flight_guard();
        controller.trigger_shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
        assert_eq!(controller.state(), ListenerState::Draining);
    }
}
