//! Bounded multi-producer queue behind a threadsafe function.
//!
//! One mutex guards the items together with the acquire count and the
//! closing flags, so a submission and a release can never interleave
//! halfway. Each producer's items keep their relative order.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushError {
    /// At capacity and the caller did not wait.
    Full,
    /// Aborted, or closed by the host.
    Closing,
    /// Every holder has released.
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseError {
    Underflow,
}

struct QueueState<T> {
    items: VecDeque<T>,
    thread_count: usize,
    closing: bool,
    aborted: bool,
}

pub(crate) struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    space: Condvar,
    /// Zero means unbounded.
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub(crate) fn new(capacity: usize, thread_count: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                thread_count,
                closing: false,
                aborted: false,
            }),
            space: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue `item`, waiting for space if `wait` is set.
    pub(crate) fn push(&self, item: T, wait: bool) -> Result<(), PushError> {
        let mut state = self.state.lock();
        loop {
            if state.closing {
                return Err(PushError::Closing);
            }
            if state.thread_count == 0 {
                return Err(PushError::Released);
            }
            if self.capacity == 0 || state.items.len() < self.capacity {
                state.items.push_back(item);
                return Ok(());
            }
            if !wait {
                return Err(PushError::Full);
            }
            self.space.wait(&mut state);
        }
    }

    pub(crate) fn pop(&self) -> Option<T> {
        let item = self.state.lock().items.pop_front();
        if item.is_some() {
            self.space.notify_one();
        }
        item
    }

    pub(crate) fn acquire(&self) -> Result<usize, PushError> {
        let mut state = self.state.lock();
        if state.closing {
            return Err(PushError::Closing);
        }
        if state.thread_count == 0 {
            return Err(PushError::Released);
        }
        state.thread_count += 1;
        Ok(state.thread_count)
    }

    /// Drop one claim. Aborting also closes the queue and returns the
    /// undelivered items so the caller can drop them outside the lock.
    pub(crate) fn release(&self, abort: bool) -> Result<(usize, Vec<T>), ReleaseError> {
        let mut state = self.state.lock();
        if state.thread_count == 0 {
            return Err(ReleaseError::Underflow);
        }
        state.thread_count -= 1;
        let remaining = state.thread_count;
        let mut dropped = Vec::new();
        if abort {
            state.aborted = true;
            state.closing = true;
            dropped.extend(state.items.drain(..));
        }
        drop(state);
        if abort || remaining == 0 {
            self.space.notify_all();
        }
        Ok((remaining, dropped))
    }

    /// Refuse further submissions and hand back whatever is still queued.
    pub(crate) fn close(&self) -> Vec<T> {
        let mut state = self.state.lock();
        state.closing = true;
        let dropped = state.items.drain(..).collect();
        drop(state);
        self.space.notify_all();
        dropped
    }

    /// All holders released and everything delivered, or aborted.
    pub(crate) fn is_finished(&self) -> bool {
        let state = self.state.lock();
        state.aborted || (state.thread_count == 0 && state.items.is_empty())
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.state.lock().closing
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.state.lock().thread_count
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_nonblocking_push_fails_at_capacity() {
        let queue = BoundedQueue::new(2, 1);
        assert_eq!(queue.push(1, false), Ok(()));
        assert_eq!(queue.push(2, false), Ok(()));
        assert_eq!(queue.push(3, false), Err(PushError::Full));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.push(3, false), Ok(()));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let queue = BoundedQueue::new(0, 1);
        for i in 0..10_000 {
            queue.push(i, false).unwrap();
        }
        assert_eq!(queue.len(), 10_000);
    }

    #[test]
    fn test_blocking_push_waits_for_space() {
        let queue = Arc::new(BoundedQueue::new(1, 2));
        queue.push(0, false).unwrap();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(1, true))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());
        assert_eq!(queue.pop(), Some(0));
        assert_eq!(producer.join().unwrap(), Ok(()));
        assert_eq!(queue.pop(), Some(1));
    }

    #[test]
    fn test_abort_wakes_blocked_producers() {
        let queue = Arc::new(BoundedQueue::new(1, 2));
        queue.push(0, false).unwrap();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(1, true))
        };
        thread::sleep(Duration::from_millis(50));
        let (remaining, dropped) = queue.release(true).unwrap();
        assert_eq!(remaining, 1);
        assert_eq!(dropped, vec![0]);
        assert_eq!(producer.join().unwrap(), Err(PushError::Closing));
        assert!(queue.is_finished());
    }

    #[test]
    fn test_release_accounting() {
        let queue: BoundedQueue<u8> = BoundedQueue::new(4, 1);
        assert_eq!(queue.acquire(), Ok(2));
        assert_eq!(queue.release(false).unwrap().0, 1);
        assert_eq!(queue.release(false).unwrap().0, 0);
        assert_eq!(queue.release(false), Err(ReleaseError::Underflow));
        assert_eq!(queue.push(1, false), Err(PushError::Released));
        assert_eq!(queue.acquire(), Err(PushError::Released));
        assert!(queue.is_finished());
    }

    #[test]
    fn test_per_producer_order_is_kept() {
        let queue = Arc::new(BoundedQueue::new(0, 4));
        let producers: Vec<_> = (0..4)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for seq in 0..250 {
                        queue.push((producer, seq), true).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        let mut last = [None; 4];
        while let Some((producer, seq)) = queue.pop() {
            if let Some(prev) = last[producer] {
                assert!(seq > prev);
            }
            last[producer] = Some(seq);
        }
        assert_eq!(last, [Some(249); 4]);
    }
}
