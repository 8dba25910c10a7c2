//! Bounded output queue.
//!
//! [Publisher::publish] never blocks. When the queue runs out of room,
//! a single [OutputEvent::Error] carrying [NO_MESSAGE_SPACE] is queued in
//! place of the rejected event: the last slot is reserved for it. Further
//! rejections are absorbed until the consumer frees some space.
use log::{error, trace};

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use tokio::sync::mpsc::{Receiver, Sender, channel as mpsc_channel, error::TrySendError};

use crate::{error::NO_MESSAGE_SPACE, event::OutputEvent};

/// Outcome of [Publisher::publish]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Publication {
    /// Event queued
    Queued,
    /// Event dropped, overflow reported
    Overflow,
    /// Event dropped silently
    Dropped,
}

#[derive(Debug, Clone)]
pub struct Publisher {
    tx: Sender<OutputEvent>,

    /// Set during an overflow episode
    overflow: Arc<AtomicBool>,

    /// Number of dropped events
    dropped: Arc<AtomicU64>,
}

/// Creates a [Publisher] and its consumer
pub fn channel(capacity: usize) -> (Publisher, Receiver<OutputEvent>) {
    let (tx, rx) = mpsc_channel(capacity);

    let publisher = Publisher {
        tx,
        overflow: Arc::new(AtomicBool::new(false)),
        dropped: Arc::new(AtomicU64::new(0)),
    };

    (publisher, rx)
}

impl Publisher {
    pub fn publish(&self, event: OutputEvent) -> Publication {
        if self.tx.is_closed() {
            trace!("{} - no consumer", event);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Publication::Dropped;
        }

        if self.tx.capacity() > 1 {
            trace!("publishing {}", event);

            match self.tx.try_send(event) {
                Ok(_) => {
                    self.overflow.store(false, Ordering::Release);
                    return Publication::Queued;
                },
                Err(TrySendError::Closed(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return Publication::Dropped;
                },
                // raced with another producer
                Err(TrySendError::Full(event)) => return self.overflow_with(event),
            }
        }

        self.overflow_with(event)
    }

    /// Reports overflow on behalf of a rejected item
    /// (either an output event or an inbound message).
    pub fn overflow(&self) -> Publication {
        self.dropped.fetch_add(1, Ordering::Relaxed);

        if self.overflow.swap(true, Ordering::AcqRel) {
            return Publication::Dropped;
        }

        error!("output queue full: reporting overflow");

        match self.tx.try_send(OutputEvent::Error(NO_MESSAGE_SPACE)) {
            Ok(_) => Publication::Overflow,
            Err(_) => Publication::Dropped,
        }
    }

    fn overflow_with(&self, event: OutputEvent) -> Publication {
        trace!("{} - dropped", event);
        self.overflow()
    }

    /// Number of events dropped so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True during an overflow episode
    pub fn is_overflowing(&self) -> bool {
        self.overflow.load(Ordering::Acquire)
    }
}
