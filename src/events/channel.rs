//! Event channel built on crossbeam-channel.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use super::Event;

/// Sends events from the cache core.
///
/// Cloneable and cheap to pass across threads. Sending never fails from
/// the core's perspective: if the receiver is gone, events are discarded
/// and the fill continues without progress reporting.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Receives events for display.
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event, or `None` once all senders are dropped
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Non-blocking receive
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Iterate until all senders are dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Factory for event channel pairs.
pub struct EventChannel;

impl EventChannel {
    /// Unbounded channel; fill events are small and infrequent.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }

    /// Bounded channel for drivers that want backpressure.
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// A sender with no receiver, for fills that don't report progress.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FillEvent;
    use std::thread;
    use uuid::Uuid;

    #[test]
    fn events_cross_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Fill(FillEvent::Started {
                run_id: Uuid::new_v4(),
                patient_id: "P1".to_string(),
                total_entries: 12,
            }));
        });

        handle.join().unwrap();

        match receiver.recv().unwrap() {
            Event::Fill(FillEvent::Started { total_entries, .. }) => {
                assert_eq!(total_entries, 12);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn null_sender_discards_silently() {
        let sender = null_sender();
        sender.send(Event::Fill(FillEvent::EntryProcessed {
            food_log_id: "F1".to_string(),
            images_added: 0,
            summary_added: false,
        }));
    }

    #[test]
    fn receiver_drains_after_senders_drop() {
        let (sender, receiver) = EventChannel::bounded(4);

        sender.send(Event::Fill(FillEvent::EntryFailed {
            food_log_id: "F1".to_string(),
            message: "download timed out".to_string(),
        }));
        drop(sender);

        assert!(receiver.try_recv().is_some());
        assert!(receiver.recv().is_none());
    }
}
