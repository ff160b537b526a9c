//! Bounded FIFO queues.
use crossbeam::channel::{self, TryRecvError, TrySendError};
use syncbench::{
    error::{CreateObjectError, QueuePollError, QueueReceiveError, QueueSendError},
    kernel::QueueItem,
};

use crate::task;

/// Queue control block. Holds both ends of a bounded channel, so the channel
/// never disconnects while the queue exists.
#[derive(Debug)]
pub(crate) struct QueueCb {
    send: channel::Sender<QueueItem>,
    recv: channel::Receiver<QueueItem>,
    capacity: usize,
}

impl QueueCb {
    pub(crate) fn new(capacity: usize) -> Result<Self, CreateObjectError> {
        // A zero-capacity channel is a rendezvous point, not a queue
        if capacity == 0 {
            return Err(CreateObjectError::BadParam);
        }
        let (send, recv) = channel::bounded(capacity);
        Ok(Self {
            send,
            recv,
            capacity,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn try_send(&self, item: QueueItem) -> Result<(), QueueSendError> {
        match self.send.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(QueueSendError::QueueOverflow),
            Err(TrySendError::Disconnected(_)) => Err(QueueSendError::BadId),
        }
    }

    pub(crate) fn try_receive(&self) -> Result<QueueItem, QueuePollError> {
        match self.recv.try_recv() {
            Ok(item) => Ok(item),
            Err(TryRecvError::Empty) => Err(QueuePollError::Timeout),
            Err(TryRecvError::Disconnected) => Err(QueuePollError::BadId),
        }
    }

    pub(crate) fn receive(&self) -> Result<QueueItem, QueueReceiveError> {
        if task::current().is_err() {
            return Err(QueueReceiveError::BadContext);
        }
        task::blocking(|| self.recv.recv()).map_err(|_| QueueReceiveError::BadId)
    }

    /// Discard every item.
    pub(crate) fn reset(&self) {
        while self.recv.try_recv().is_ok() {}
    }

    pub(crate) fn len(&self) -> usize {
        self.recv.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use quickcheck_macros::quickcheck;

    #[test]
    fn fifo_order_and_capacity() {
        let q = QueueCb::new(3).unwrap();
        assert_eq!(q.capacity(), 3);
        for i in 0..3 {
            q.try_send(i).unwrap();
        }
        assert_matches!(q.try_send(3), Err(QueueSendError::QueueOverflow));
        assert_eq!(q.len(), 3);
        assert_eq!(q.try_receive(), Ok(0));
        assert_eq!(q.try_receive(), Ok(1));
        assert_eq!(q.try_receive(), Ok(2));
        assert_matches!(q.try_receive(), Err(QueuePollError::Timeout));
    }

    #[test]
    fn reset_empties() {
        let q = QueueCb::new(4).unwrap();
        q.try_send(1).unwrap();
        q.try_send(2).unwrap();
        q.reset();
        assert_eq!(q.len(), 0);
        // The full capacity is available again
        for i in 0..4 {
            q.try_send(i).unwrap();
        }
    }

    #[quickcheck]
    fn receives_in_send_order(items: Vec<QueueItem>) -> bool {
        let q = QueueCb::new(items.len().max(1)).unwrap();
        for &x in items.iter() {
            q.try_send(x).unwrap();
        }
        let received: Vec<_> = std::iter::from_fn(|| q.try_receive().ok()).collect();
        received == items
    }

    #[test]
    fn zero_capacity() {
        assert_matches!(QueueCb::new(0), Err(CreateObjectError::BadParam));
    }

    #[test]
    fn blocking_receive_needs_a_task() {
        let q = QueueCb::new(1).unwrap();
        q.try_send(1).unwrap();
        assert_matches!(q.receive(), Err(QueueReceiveError::BadContext));
    }
}
