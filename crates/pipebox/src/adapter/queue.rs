//! Blocking FIFO handoff between the output pump and the command loop.
//!
//! Single producer (the pump thread) and single consumer (the protocol
//! loop), though nothing here depends on that. Events come out in exactly
//! the order they were pushed.

use crate::model::OutputEvent;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct EventQueue {
    inner: Mutex<VecDeque<OutputEvent>>,
    ready: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and wake one waiting consumer.
    pub fn push(&self, event: OutputEvent) {
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        queue.push_back(event);
        drop(queue);
        self.ready.notify_one();
    }

    /// Dequeue the oldest event, blocking up to `timeout`. `None` means
    /// nothing arrived in time, a normal outcome for a quiet SUT.
    pub fn poll(&self, timeout: Duration) -> Option<OutputEvent> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, wait) = self
                .ready
                .wait_timeout(queue, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            queue = guard;
            if wait.timed_out() {
                return queue.pop_front();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Arc;

    #[test]
    fn poll_returns_events_in_fifo_order() {
        let queue = EventQueue::new();
        queue.push(OutputEvent::classified("!First"));
        queue.push(OutputEvent::classified("!Second"));
        queue.push(OutputEvent::classified("!Third"));

        let timeout = Duration::from_millis(10);
        assert_eq!(queue.poll(timeout).map(|e| e.label), Some("!First".into()));
        assert_eq!(queue.poll(timeout).map(|e| e.label), Some("!Second".into()));
        assert_eq!(queue.poll(timeout).map(|e| e.label), Some("!Third".into()));
        assert_eq!(queue.poll(timeout), None);
    }

    #[test]
    fn poll_times_out_on_empty_queue() {
        let queue = EventQueue::new();
        let started = Instant::now();
        assert_eq!(queue.poll(Duration::from_millis(50)), None);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(45), "returned too early");
        assert!(elapsed < Duration::from_millis(500), "returned too late");
    }

    #[test]
    fn push_unblocks_a_waiting_consumer() {
        let queue = Arc::new(EventQueue::new());
        let producer = Arc::clone(&queue);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.push(OutputEvent::classified("!Late"));
        });

        let event = queue.poll(Duration::from_secs(2));
        handle.join().unwrap();
        assert_eq!(event.map(|e| e.label), Some("!Late".into()));
    }

    #[test]
    fn is_empty_reflects_queue_state() {
        let queue = EventQueue::new();
        assert!(queue.is_empty());
        queue.push(OutputEvent::started());
        assert!(!queue.is_empty());
        assert_eq!(queue.len(), 1);
    }
}
