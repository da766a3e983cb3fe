//! Timeout Supervisor
//!
//! Bounds each asynchronous hardware operation with a single-shot deadline.
//! At most one deadline is armed at a time; arming a new one replaces the
//! old. Each ticket carries a generation counter so a fire that raced its
//! cancellation can be recognized as stale by the receiver.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Handle to one armed deadline, invalidated by cancel or fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Arms and cancels deadlines. Not thread-safe by design: it lives behind
/// the session's serialization point alongside the state machine.
#[derive(Debug, Default)]
pub struct TimeoutSupervisor {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TimeoutSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a deadline, replacing any previously armed one. If the deadline
    /// elapses, `on_fire` runs exactly once with the new ticket's generation.
    pub fn arm<F>(&mut self, duration: Duration, on_fire: F) -> Ticket
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.abort_current();
        self.generation += 1;
        let generation = self.generation;
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_fire(generation);
        }));
        Ticket { generation }
    }

    /// Cancel an armed deadline. Canceling a superseded or already-fired
    /// ticket has no effect.
    pub fn cancel(&mut self, ticket: &Ticket) {
        if ticket.generation == self.generation {
            self.abort_current();
        }
    }

    fn abort_current(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TimeoutSupervisor {
    fn drop(&mut self) {
        self.abort_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn fires_with_its_generation_after_the_deadline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut supervisor = TimeoutSupervisor::new();

        let ticket = supervisor.arm(Duration::from_millis(10), move |generation| {
            let _ = tx.send(generation);
        });

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, ticket.generation());
    }

    #[tokio::test]
    async fn canceled_ticket_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut supervisor = TimeoutSupervisor::new();

        let ticket = supervisor.arm(Duration::from_millis(20), move |generation| {
            let _ = tx.send(generation);
        });
        supervisor.cancel(&ticket);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rearming_replaces_the_prior_deadline() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut supervisor = TimeoutSupervisor::new();

        let tx1 = tx.clone();
        let first = supervisor.arm(Duration::from_millis(20), move |generation| {
            let _ = tx1.send(generation);
        });
        let second = supervisor.arm(Duration::from_millis(20), move |generation| {
            let _ = tx.send(generation);
        });
        assert_ne!(first.generation(), second.generation());

        // Only the replacement fires.
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, second.generation());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn canceling_a_superseded_ticket_leaves_the_live_one_armed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut supervisor = TimeoutSupervisor::new();

        let stale = supervisor.arm(Duration::from_millis(10), |_| {});
        let live = supervisor.arm(Duration::from_millis(10), move |generation| {
            let _ = tx.send(generation);
        });
        supervisor.cancel(&stale);

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, live.generation());
    }
}
