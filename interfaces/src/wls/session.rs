//! WLS session: list-level send and receive over one transport endpoint

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::element::{decode_message, OutboundElement, ReceivedBody, ReceivedElement, WireMessage};
use super::pool::BufferPool;
use super::{WlsEntry, WlsFlags, WlsTransport, TO_FREE_SIZE, TO_FREE_SIZE_URLLC};
use crate::InterfaceError;

/// Who returns blocks exchanged on a session to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    /// This side releases every block it sent or received once
    /// `TO_FREE_SIZE` later cycles of the same class have passed
    Deferred,
    /// The peer owns release; this side only reads
    Peer,
}

/// Ring of block lists waiting to be released
#[derive(Debug)]
struct FreeRing {
    slots: VecDeque<Vec<u64>>,
    depth: usize,
}

impl FreeRing {
    fn new(depth: usize) -> Self {
        Self { slots: VecDeque::with_capacity(depth + 1), depth }
    }

    /// Queue one cycle's blocks and hand back the blocks now due for release
    fn push(&mut self, pas: Vec<u64>) -> Option<Vec<u64>> {
        self.slots.push_back(pas);
        if self.slots.len() > self.depth {
            self.slots.pop_front()
        } else {
            None
        }
    }

    fn drain(&mut self) -> Vec<u64> {
        self.slots.drain(..).flatten().collect()
    }
}

#[derive(Debug)]
struct Rings {
    send: FreeRing,
    send_urllc: FreeRing,
    recv: FreeRing,
    recv_urllc: FreeRing,
}

/// Received blocks split by class
#[derive(Debug)]
pub struct RecvLists<M> {
    pub normal: Vec<ReceivedElement<M>>,
    pub urllc: Vec<ReceivedElement<M>>,
}

impl<M> Default for RecvLists<M> {
    fn default() -> Self {
        Self { normal: Vec::new(), urllc: Vec::new() }
    }
}

impl<M> RecvLists<M> {
    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.urllc.is_empty()
    }
}

/// One side of a channel carrying messages of type `M`
pub struct WlsSession<M: WireMessage> {
    name: String,
    pool: Arc<BufferPool>,
    transport: Arc<dyn WlsTransport>,
    reclaim: Reclaim,
    /// Serializes senders and guards the send rings
    send_lock: Mutex<()>,
    rings: Mutex<Rings>,
    _marker: PhantomData<fn() -> M>,
}

impl<M: WireMessage> WlsSession<M> {
    pub fn new(name: &str, pool: Arc<BufferPool>, transport: Arc<dyn WlsTransport>, reclaim: Reclaim) -> Self {
        Self {
            name: name.to_string(),
            pool,
            transport,
            reclaim,
            send_lock: Mutex::new(()),
            rings: Mutex::new(Rings {
                send: FreeRing::new(TO_FREE_SIZE),
                send_urllc: FreeRing::new(TO_FREE_SIZE_URLLC),
                recv: FreeRing::new(TO_FREE_SIZE),
                recv_urllc: FreeRing::new(TO_FREE_SIZE_URLLC),
            }),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn transport(&self) -> &Arc<dyn WlsTransport> {
        &self.transport
    }

    /// Wait for the peer to attach
    pub fn ready(&self, timeout: Option<Duration>) -> Result<(), InterfaceError> {
        self.transport.ready(timeout)
    }

    /// Reserve a block for an outbound message
    pub fn element(&self, msg: M) -> Result<OutboundElement<M>, InterfaceError> {
        OutboundElement::new(&self.pool, msg)
    }

    /// Send a list as FIRST, NEXT.., LAST (a lone element carries no
    /// position flag). Data blocks attached to an element follow it. The
    /// first failing put aborts the rest of the list.
    pub fn send(&self, list: Vec<OutboundElement<M>>, urllc: bool) -> Result<usize, InterfaceError> {
        if list.is_empty() {
            return Ok(0);
        }
        let _guard = self.send_lock.lock();

        let pas: Vec<u64> = list.iter().map(|e| e.pa()).collect();
        let mut entries = Vec::with_capacity(list.len());
        let mut sent_blocks = Vec::with_capacity(list.len());
        for (i, elem) in list.into_iter().enumerate() {
            let next = pas.get(i + 1).copied().unwrap_or(0);
            let msg_type = elem.wire_id();
            let (block, size, data) = elem.seal(next)?;
            entries.push((WlsEntry { pa: block.pa(), size, msg_type, flags: WlsFlags::empty() }, Some(block)));
            for d in data {
                entries.push((WlsEntry { pa: d.pa, size: d.len, msg_type: d.msg_type, flags: WlsFlags::empty() }, None));
            }
        }

        let n = entries.len();
        let class = if urllc { WlsFlags::URLLC } else { WlsFlags::empty() };
        for (i, (mut entry, block)) in entries.into_iter().enumerate() {
            entry.flags = WlsFlags::for_position(i, n) | class;
            if let Err(e) = self.transport.put(entry) {
                error!("[{}] put of block {}/{} failed: {}", self.name, i + 1, n, e);
                // Blocks not yet handed over return to the pool when dropped
                self.retire_sent(sent_blocks, urllc);
                return Err(e);
            }
            trace!("[{}] put {:#x} type {:#x} flags {:?}", self.name, entry.pa, entry.msg_type, entry.flags);
            if let Some(block) = block {
                sent_blocks.push(block.into_pa());
            }
        }

        self.retire_sent(sent_blocks, urllc);
        Ok(n)
    }

    fn retire_sent(&self, pas: Vec<u64>, urllc: bool) {
        if self.reclaim != Reclaim::Deferred || pas.is_empty() {
            return;
        }
        let due = {
            let mut rings = self.rings.lock();
            let ring = if urllc { &mut rings.send_urllc } else { &mut rings.send };
            ring.push(pas)
        };
        if let Some(due) = due {
            self.release(due);
        }
    }

    fn retire_received(&self, pas: Vec<u64>, urllc: bool) {
        if self.reclaim != Reclaim::Deferred || pas.is_empty() {
            return;
        }
        let due = {
            let mut rings = self.rings.lock();
            let ring = if urllc { &mut rings.recv_urllc } else { &mut rings.recv };
            ring.push(pas)
        };
        if let Some(due) = due {
            self.release(due);
        }
    }

    fn release(&self, pas: Vec<u64>) {
        for pa in pas {
            if let Err(e) = self.pool.free_pa(pa) {
                warn!("[{}] deferred release of {:#x}: {}", self.name, pa, e);
            }
        }
    }

    /// Block until data is available, then collect consecutive blocks by
    /// class until a transfer ends or the announced count is used up
    pub fn recv(&self, timeout: Option<Duration>) -> Result<RecvLists<M>, InterfaceError> {
        let mut count = self.transport.wait(timeout)?;
        let mut lists = RecvLists::default();

        while count > 0 {
            count -= 1;
            let Some(entry) = self.transport.get() else {
                break;
            };
            let urllc = entry.flags.contains(WlsFlags::URLLC);
            match self.decode(&entry) {
                Ok(body) => {
                    let elem = ReceivedElement {
                        pa: entry.pa,
                        size: entry.size,
                        msg_type: entry.msg_type,
                        flags: entry.flags,
                        body,
                    };
                    if urllc {
                        lists.urllc.push(elem);
                    } else {
                        lists.normal.push(elem);
                    }
                }
                Err(e) => {
                    error!("[{}] dropping block {:#x}: {}", self.name, entry.pa, e);
                }
            }
            if entry.flags.ends_transfer() {
                break;
            }
        }

        if !lists.urllc.is_empty() {
            self.retire_received(lists.urllc.iter().map(|e| e.pa).collect(), true);
        }
        if !lists.normal.is_empty() {
            self.retire_received(lists.normal.iter().map(|e| e.pa).collect(), false);
        }
        debug!(
            "[{}] received {} normal / {} urllc blocks",
            self.name,
            lists.normal.len(),
            lists.urllc.len()
        );
        Ok(lists)
    }

    fn decode(&self, entry: &WlsEntry) -> Result<ReceivedBody<M>, InterfaceError> {
        let size = entry.size as usize;
        self.pool.with_pa(entry.pa, |bytes| {
            if size > bytes.len() {
                return Err(InterfaceError::Codec(format!("declared size {} exceeds block", size)));
            }
            // Raw payload blocks carry no element header
            if M::is_raw_block(entry.msg_type) {
                return Ok(ReceivedBody::Data);
            }
            decode_message::<M>(&bytes[..size]).map(|(_, m)| ReceivedBody::Message(m))
        })?
    }

    /// Top up the posted UL blocks the peer fills with indications
    pub fn add_blocks_to_ul(&self, target: usize) -> Result<usize, InterfaceError> {
        let mut added = 0;
        while self.transport.posted_blocks() < target {
            let pa = self.pool.allocate()?.into_pa();
            if let Err(e) = self.transport.enqueue_block(pa) {
                self.release(vec![pa]);
                return Err(e);
            }
            trace!("[{}] posted UL block {:#x}", self.name, pa);
            added += 1;
        }
        Ok(added)
    }

    /// Release every block still held in the rings
    pub fn flush_deferred(&self) {
        let pending = {
            let mut rings = self.rings.lock();
            let mut all = rings.send.drain();
            all.extend(rings.send_urllc.drain());
            all.extend(rings.recv.drain());
            all.extend(rings.recv_urllc.drain());
            all
        };
        self.release(pending);
    }
}

impl<M: WireMessage> std::fmt::Debug for WlsSession<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WlsSession")
            .field("name", &self.name)
            .field("reclaim", &self.reclaim)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fapi::{FapiMessage, MsgHeaderInd, SlotIndication, StopIndication};
    use crate::wls::element::DataRef;
    use crate::wls::link::LocalWls;
    use crate::wls::region::HeapRegion;

    fn setup(blocks: usize, capacity: usize) -> (WlsSession<FapiMessage>, WlsSession<FapiMessage>) {
        let pool = BufferPool::new(Box::new(HeapRegion::new(blocks * 1024).unwrap()), 1024).unwrap();
        let (a, b) = LocalWls::pair("test", capacity);
        a.attach();
        b.attach();
        let tx = WlsSession::new("tx", Arc::clone(&pool), Arc::new(a), Reclaim::Deferred);
        let rx = WlsSession::new("rx", pool, Arc::new(b), Reclaim::Peer);
        (tx, rx)
    }

    fn slot(sfn: u16) -> FapiMessage {
        FapiMessage::SlotIndication(SlotIndication { sfn, slot: 0 })
    }

    #[test]
    fn test_list_order_and_flags() {
        let (tx, rx) = setup(16, 16);
        let list = (0..3).map(|i| tx.element(slot(i)).unwrap()).collect();
        assert_eq!(tx.send(list, false).unwrap(), 3);

        let lists = rx.recv(Some(Duration::from_millis(100))).unwrap();
        assert!(lists.urllc.is_empty());
        let flags: Vec<_> = lists.normal.iter().map(|e| e.flags).collect();
        assert_eq!(flags, vec![WlsFlags::FIRST, WlsFlags::NEXT, WlsFlags::LAST]);
        let sfns: Vec<_> = lists
            .normal
            .iter()
            .map(|e| match e.message() {
                Some(FapiMessage::SlotIndication(s)) => s.sfn,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(sfns, vec![0, 1, 2]);
    }

    #[test]
    fn test_single_element_has_no_position_flag() {
        let (tx, rx) = setup(4, 4);
        tx.send(vec![tx.element(FapiMessage::StopIndication(StopIndication)).unwrap()], true).unwrap();
        let lists = rx.recv(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(lists.urllc.len(), 1);
        assert_eq!(lists.urllc[0].flags, WlsFlags::URLLC);
    }

    #[test]
    fn test_put_failure_aborts_rest() {
        let (tx, rx) = setup(16, 2);
        let list = (0..4).map(|i| tx.element(slot(i)).unwrap()).collect();
        assert!(matches!(tx.send(list, false), Err(InterfaceError::PutFailed(_))));
        // Two blocks reached the peer, the unsent two went back to the pool
        assert_eq!(rx.transport().wait(None).unwrap(), 2);
        assert_eq!(tx.pool().stats().in_use, 2);
    }

    #[test]
    fn test_deferred_release_after_depth() {
        let (tx, rx) = setup(32, 64);
        for i in 0..TO_FREE_SIZE {
            tx.send(vec![tx.element(slot(i as u16)).unwrap()], false).unwrap();
        }
        assert_eq!(tx.pool().stats().in_use, TO_FREE_SIZE);
        tx.send(vec![tx.element(slot(99)).unwrap()], false).unwrap();
        // Oldest cycle released
        assert_eq!(tx.pool().stats().in_use, TO_FREE_SIZE);
        let _ = rx.recv(None).unwrap();
        tx.flush_deferred();
        assert_eq!(tx.pool().stats().in_use, 0);
    }

    #[test]
    fn test_data_blocks_follow_their_element() {
        let (tx, rx) = setup(8, 8);
        let mut payload = tx.pool().allocate().unwrap();
        payload.as_mut_slice()[..3].copy_from_slice(b"abc");
        let data = DataRef { pa: payload.into_pa(), len: 3, msg_type: 0x305 };

        let hdr = tx.element(FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 1, phy_id: 0 })).unwrap();
        let mut tx_data = tx.element(slot(1)).unwrap();
        tx_data.attach_data(data);
        tx.send(vec![hdr, tx_data], false).unwrap();

        let lists = rx.recv(None).unwrap();
        assert_eq!(lists.normal.len(), 3);
        assert!(matches!(lists.normal[2].body, ReceivedBody::Data));
        assert_eq!(lists.normal[2].flags, WlsFlags::LAST);
        let bytes = rx.pool().with_pa(lists.normal[2].pa, |b| b[..3].to_vec()).unwrap();
        assert_eq!(bytes, b"abc");
    }

    #[test]
    fn test_add_blocks_to_ul() {
        let (tx, rx) = setup(8, 8);
        assert_eq!(tx.add_blocks_to_ul(3).unwrap(), 3);
        assert_eq!(tx.add_blocks_to_ul(3).unwrap(), 0);
        assert_eq!(rx.transport().posted_blocks(), 3);
    }

    #[test]
    fn test_recv_times_out_when_idle() {
        let (_tx, rx) = setup(2, 2);
        assert_eq!(rx.recv(Some(Duration::from_millis(5))).unwrap_err(), InterfaceError::Timeout);
    }
}
