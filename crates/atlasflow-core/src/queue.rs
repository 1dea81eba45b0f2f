//! Bounded transfer queue between the pagination controller and the writer
//!
//! A thin wrapper over a bounded `tokio::sync::mpsc` channel. The producer
//! blocks when the queue is full rather than dropping records, so a slow
//! database applies backpressure all the way to the HTTP fetch loop. Closing
//! the queue is done by dropping the last [`TransferQueue`]; the receiver
//! then drains whatever is buffered before reporting [`Polled::Closed`].

use std::time::Duration;
use tokio::sync::mpsc;

/// Result of one timed poll on the receiving side
#[derive(Debug, PartialEq)]
pub enum Polled<T> {
    /// An item was dequeued
    Item(T),
    /// Nothing arrived within the timeout; the queue is still open
    Empty,
    /// The queue is closed and fully drained
    Closed,
}

/// Producer handle
#[derive(Clone)]
pub struct TransferQueue<T> {
    tx: mpsc::Sender<T>,
}

/// Consumer handle
pub struct TransferReceiver<T> {
    rx: mpsc::Receiver<T>,
}

/// Create a bounded queue with the given capacity.
pub fn bounded<T>(capacity: usize) -> (TransferQueue<T>, TransferReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TransferQueue { tx }, TransferReceiver { rx })
}

impl<T> TransferQueue<T> {
    /// Enqueue an item, waiting for capacity if the queue is full.
    ///
    /// Returns `false` if the consumer is gone, which means the run is being
    /// torn down and the item can be discarded.
    pub async fn put(&self, item: T) -> bool {
        self.tx.send(item).await.is_ok()
    }
}

impl<T> TransferReceiver<T> {
    /// Dequeue the next item, waiting up to `timeout`.
    ///
    /// Buffered items are always delivered before [`Polled::Closed`], so the
    /// consumer observes close only after a full drain.
    pub async fn get(&mut self, timeout: Duration) -> Polled<T> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(item)) => Polled::Item(item),
            Ok(None) => Polled::Closed,
            Err(_) => Polled::Empty,
        }
    }
}
