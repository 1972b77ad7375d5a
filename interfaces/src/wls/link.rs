//! In-process WLS link
//!
//! Two endpoints joined by a pair of bounded descriptor queues plus a shared
//! queue of posted empty blocks. Used when the peer runs in the same
//! process (loopback PHY, test MAC) over a pool both sides can address.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::{WlsEntry, WlsTransport};
use crate::InterfaceError;

#[derive(Debug, Default)]
struct Channel {
    queue: Mutex<VecDeque<WlsEntry>>,
    cond: Condvar,
}

#[derive(Debug)]
struct Shared {
    name: String,
    capacity: usize,
    /// Index 0 carries a→b, index 1 carries b→a
    channels: [Channel; 2],
    attached: Mutex<[bool; 2]>,
    attach_cond: Condvar,
    posted: Mutex<VecDeque<u64>>,
}

/// One endpoint of an in-process link
#[derive(Debug, Clone)]
pub struct LocalWls {
    shared: Arc<Shared>,
    side: usize,
}

impl LocalWls {
    /// Create both endpoints of a link holding at most `capacity` descriptors per direction
    pub fn pair(name: &str, capacity: usize) -> (LocalWls, LocalWls) {
        let shared = Arc::new(Shared {
            name: name.to_string(),
            capacity: capacity.max(1),
            channels: [Channel::default(), Channel::default()],
            attached: Mutex::new([false; 2]),
            attach_cond: Condvar::new(),
            posted: Mutex::new(VecDeque::new()),
        });
        (
            LocalWls { shared: Arc::clone(&shared), side: 0 },
            LocalWls { shared, side: 1 },
        )
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    fn rx(&self) -> &Channel {
        &self.shared.channels[1 - self.side]
    }

    fn tx(&self) -> &Channel {
        &self.shared.channels[self.side]
    }

    /// Mark this endpoint attached without waiting for the peer
    pub fn attach(&self) {
        let mut attached = self.shared.attached.lock();
        attached[self.side] = true;
        self.shared.attach_cond.notify_all();
    }

    /// Descriptors waiting for this endpoint
    pub fn pending(&self) -> usize {
        self.rx().queue.lock().len()
    }
}

impl WlsTransport for LocalWls {
    fn ready(&self, timeout: Option<Duration>) -> Result<(), InterfaceError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut attached = self.shared.attached.lock();
        attached[self.side] = true;
        self.shared.attach_cond.notify_all();
        while !attached[1 - self.side] {
            match deadline {
                Some(deadline) => {
                    if self.shared.attach_cond.wait_until(&mut attached, deadline).timed_out()
                        && !attached[1 - self.side]
                    {
                        return Err(InterfaceError::NotAttached);
                    }
                }
                None => self.shared.attach_cond.wait(&mut attached),
            }
        }
        debug!("[WLS] {} side {} ready", self.shared.name, self.side);
        Ok(())
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<usize, InterfaceError> {
        let rx = self.rx();
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut queue = rx.queue.lock();
        while queue.is_empty() {
            match deadline {
                Some(deadline) => {
                    if rx.cond.wait_until(&mut queue, deadline).timed_out() && queue.is_empty() {
                        return Err(InterfaceError::Timeout);
                    }
                }
                None => rx.cond.wait(&mut queue),
            }
        }
        Ok(queue.len())
    }

    fn get(&self) -> Option<WlsEntry> {
        self.rx().queue.lock().pop_front()
    }

    fn put(&self, entry: WlsEntry) -> Result<(), InterfaceError> {
        if !self.shared.attached.lock()[1 - self.side] {
            return Err(InterfaceError::NotAttached);
        }
        let tx = self.tx();
        let mut queue = tx.queue.lock();
        if queue.len() >= self.shared.capacity {
            return Err(InterfaceError::PutFailed(format!(
                "{}: queue full ({} entries)",
                self.shared.name, self.shared.capacity
            )));
        }
        queue.push_back(entry);
        tx.cond.notify_one();
        Ok(())
    }

    fn enqueue_block(&self, pa: u64) -> Result<(), InterfaceError> {
        let mut posted = self.shared.posted.lock();
        if posted.len() >= self.shared.capacity {
            return Err(InterfaceError::PutFailed(format!("{}: block queue full", self.shared.name)));
        }
        posted.push_back(pa);
        Ok(())
    }

    fn dequeue_block(&self) -> Option<u64> {
        self.shared.posted.lock().pop_front()
    }

    fn posted_blocks(&self) -> usize {
        self.shared.posted.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wls::WlsFlags;

    fn entry(pa: u64) -> WlsEntry {
        WlsEntry { pa, size: 8, msg_type: 1, flags: WlsFlags::empty() }
    }

    #[test]
    fn test_put_requires_attached_peer() {
        let (a, b) = LocalWls::pair("t", 4);
        a.attach();
        assert_eq!(a.put(entry(1)), Err(InterfaceError::NotAttached));
        b.attach();
        assert!(a.put(entry(1)).is_ok());
    }

    #[test]
    fn test_directions_are_independent() {
        let (a, b) = LocalWls::pair("t", 4);
        a.attach();
        b.attach();
        a.put(entry(1)).unwrap();
        b.put(entry(2)).unwrap();
        assert_eq!(b.wait(None).unwrap(), 1);
        assert_eq!(b.get().unwrap().pa, 1);
        assert_eq!(a.get().unwrap().pa, 2);
        assert!(a.get().is_none());
    }

    #[test]
    fn test_wait_times_out() {
        let (a, _b) = LocalWls::pair("t", 4);
        assert_eq!(a.wait(Some(Duration::from_millis(5))), Err(InterfaceError::Timeout));
    }

    #[test]
    fn test_full_queue_fails_put() {
        let (a, b) = LocalWls::pair("t", 1);
        a.attach();
        b.attach();
        a.put(entry(1)).unwrap();
        assert!(matches!(a.put(entry(2)), Err(InterfaceError::PutFailed(_))));
    }

    #[test]
    fn test_ready_across_threads() {
        let (a, b) = LocalWls::pair("t", 4);
        let peer = std::thread::spawn(move || b.ready(Some(Duration::from_secs(2))));
        assert!(a.ready(Some(Duration::from_secs(2))).is_ok());
        assert!(peer.join().unwrap().is_ok());
    }

    #[test]
    fn test_posted_blocks_shared() {
        let (a, b) = LocalWls::pair("t", 4);
        a.enqueue_block(0x1000).unwrap();
        a.enqueue_block(0x2000).unwrap();
        assert_eq!(b.posted_blocks(), 2);
        assert_eq!(b.dequeue_block(), Some(0x1000));
    }
}
