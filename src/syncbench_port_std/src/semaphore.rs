//! Counting semaphores. The permits are tokens in a bounded channel whose
//! capacity is the semaphore's maximum count.
use crossbeam::channel;
use syncbench::error::{CreateObjectError, SignalSemaphoreError, WaitSemaphoreError};

use crate::task;

#[derive(Debug)]
pub(crate) struct SemaphoreCb {
    send: channel::Sender<()>,
    recv: channel::Receiver<()>,
    maximum: u32,
}

impl SemaphoreCb {
    pub(crate) fn new(maximum: u32, initial: u32) -> Result<Self, CreateObjectError> {
        if maximum == 0 || initial > maximum {
            return Err(CreateObjectError::BadParam);
        }

        let (send, recv) = channel::bounded(maximum as usize);
        for _ in 0..initial {
            send.try_send(()).map_err(|_| CreateObjectError::NoResource)?;
        }

        Ok(Self {
            send,
            recv,
            maximum,
        })
    }

    pub(crate) fn maximum(&self) -> u32 {
        self.maximum
    }

    pub(crate) fn signal_one(&self) -> Result<(), SignalSemaphoreError> {
        self.send
            .try_send(())
            .map_err(|_| SignalSemaphoreError::QueueOverflow)
    }

    pub(crate) fn wait_one(&self) -> Result<(), WaitSemaphoreError> {
        // A permit can be taken without blocking from anywhere
        if self.recv.try_recv().is_ok() {
            return Ok(());
        }
        if task::current().is_err() {
            return Err(WaitSemaphoreError::BadContext);
        }
        task::blocking(|| self.recv.recv()).map_err(|_| WaitSemaphoreError::BadId)
    }

    pub(crate) fn get(&self) -> u32 {
        self.recv.len() as u32
    }
}
