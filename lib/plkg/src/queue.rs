use crate::message::PublicMessage;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Instant;

/// Inbound public-message queue of one endpoint. The listen task appends in
/// arrival order; consumers pull the first message satisfying a predicate,
/// leaving everything else untouched and in order. Waits carry a deadline.
pub struct Inbox {
    messages: Mutex<VecDeque<PublicMessage>>,
    arrival: Condvar,
}

impl Inbox {
    pub fn new() -> Inbox {
        Inbox {
            messages: Mutex::new(VecDeque::new()),
            arrival: Condvar::new(),
        }
    }

    /// Appends a message. Called by the listen task only.
    pub fn push(&self, message: PublicMessage) {
        let mut queue = self.messages.lock().expect("Inbox lock poisoned");
        queue.push_back(message);
        self.arrival.notify_all();
    }

    /// Removes and returns the first queued message matching the predicate,
    /// blocking until one arrives or the deadline passes. Unmatched messages
    /// stay queued for later consumers.
    pub fn take<F>(&self, deadline: Instant, pred: F) -> Option<PublicMessage>
    where
        F: Fn(&PublicMessage) -> bool,
    {
        let mut queue = self.messages.lock().expect("Inbox lock poisoned");

        loop {
            if let Some(idx) = queue.iter().position(&pred) {
                return queue.remove(idx);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let (guard, wait) = self
                .arrival
                .wait_timeout(queue, deadline - now)
                .expect("Inbox lock poisoned");
            queue = guard;

            if wait.timed_out() && queue.iter().position(&pred).is_none() {
                return None;
            }
        }
    }

    /// Non-blocking variant of `take`.
    pub fn try_take<F>(&self, pred: F) -> Option<PublicMessage>
    where
        F: Fn(&PublicMessage) -> bool,
    {
        let mut queue = self.messages.lock().expect("Inbox lock poisoned");
        let idx = queue.iter().position(&pred)?;
        queue.remove(idx)
    }

    /// Drops every queued message.
    pub fn clear(&self) {
        self.messages.lock().expect("Inbox lock poisoned").clear();
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.lock().expect("Inbox lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn deadline_in(millis: u64) -> Instant {
        Instant::now() + Duration::from_millis(millis)
    }

    #[test]
    fn test_take_preserves_unmatched_order() {
        let inbox = Inbox::new();

        inbox.push(PublicMessage::CascadeDone { pass: 0 });
        inbox.push(PublicMessage::CascadeRequest { pass: 0, start: 0, length: 2 });
        inbox.push(PublicMessage::CascadeDone { pass: 1 });

        let taken = inbox
            .take(deadline_in(10), |m| matches!(m, PublicMessage::CascadeRequest { .. }))
            .unwrap();

        assert_eq!(taken, PublicMessage::CascadeRequest { pass: 0, start: 0, length: 2 });
        assert_eq!(inbox.len(), 2);

        // The untouched messages come out in their original order.
        let first = inbox.take(deadline_in(10), |_| true).unwrap();
        let second = inbox.take(deadline_in(10), |_| true).unwrap();

        assert_eq!(first, PublicMessage::CascadeDone { pass: 0 });
        assert_eq!(second, PublicMessage::CascadeDone { pass: 1 });
    }

    #[test]
    fn test_take_times_out() {
        let inbox = Inbox::new();

        inbox.push(PublicMessage::SyncCheck);

        let result = inbox.take(deadline_in(30), |m| matches!(m, PublicMessage::SyncGo));

        assert_eq!(result, None);
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn test_take_wakes_on_push() {
        let inbox = Arc::new(Inbox::new());
        let pusher = inbox.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            pusher.push(PublicMessage::CascadeDone { pass: 7 });
        });

        let taken = inbox.take(deadline_in(2000), |m| {
            matches!(m, PublicMessage::CascadeDone { pass: 7 })
        });

        handle.join().unwrap();
        assert_eq!(taken, Some(PublicMessage::CascadeDone { pass: 7 }));
    }

    #[test]
    fn test_try_take_and_clear() {
        let inbox = Inbox::new();

        inbox.push(PublicMessage::SyncGo);

        assert_eq!(inbox.try_take(|m| matches!(m, PublicMessage::SyncCheck)), None);
        assert_eq!(inbox.try_take(|m| matches!(m, PublicMessage::SyncGo)), Some(PublicMessage::SyncGo));

        inbox.push(PublicMessage::SyncGo);
        inbox.clear();

        assert_eq!(inbox.len(), 0);
    }
}
