//! URLLC Hand-off Mailbox
//!
//! The receiving worker posts a low-latency batch; the URLLC worker takes
//! it, runs the handler and reports completion. A second batch cannot be
//! posted until the previous one has been completed, so at most one batch
//! is ever in flight. One worker serves both directions; each batch names
//! the direction it came from.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::context::PhyContext;
use crate::mac2phy::{self, MacBatch};
use crate::phy2mac::{self, PhyBatch};

/// A URLLC batch and the side it was received from
#[derive(Debug)]
pub enum UrllcWork {
    Mac2Phy(MacBatch),
    Phy2Mac(PhyBatch),
}

pub type UrllcMailbox = Mailbox<UrllcWork>;

#[derive(Debug)]
struct Slot<T> {
    item: Option<T>,
    /// Taken but not yet completed
    in_flight: bool,
    closed: bool,
}

/// Single-slot mailbox with depth-1 back-pressure
#[derive(Debug)]
pub struct Mailbox<T> {
    name: &'static str,
    slot: Mutex<Slot<T>>,
    posted: Condvar,
    consumed: Condvar,
}

impl<T> Mailbox<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(Slot { item: None, in_flight: false, closed: false }),
            posted: Condvar::new(),
            consumed: Condvar::new(),
        }
    }

    /// Hand `item` over, waiting until the previous batch was completed.
    /// Returns the item back when the mailbox is closed.
    pub fn post(&self, item: T) -> Result<(), T> {
        let mut slot = self.slot.lock();
        while !slot.closed && (slot.item.is_some() || slot.in_flight) {
            self.consumed.wait(&mut slot);
        }
        if slot.closed {
            return Err(item);
        }
        slot.item = Some(item);
        trace!("[URLLC] {} batch posted", self.name);
        self.posted.notify_one();
        Ok(())
    }

    /// Wait for a posted batch; `None` on timeout or once closed
    pub fn take(&self, timeout: Option<Duration>) -> Option<T> {
        let mut slot = self.slot.lock();
        while slot.item.is_none() && !slot.closed {
            match timeout {
                Some(t) => {
                    if self.posted.wait_for(&mut slot, t).timed_out() {
                        break;
                    }
                }
                None => self.posted.wait(&mut slot),
            }
        }
        let item = slot.item.take();
        if item.is_some() {
            slot.in_flight = true;
        }
        item
    }

    /// Release the poster after the taken batch has been handled
    pub fn complete(&self) {
        let mut slot = self.slot.lock();
        slot.in_flight = false;
        self.consumed.notify_all();
    }

    /// Wake both sides for shutdown; later posts are refused
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        debug!("[URLLC] {} mailbox closed", self.name);
        self.posted.notify_all();
        self.consumed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }
}

/// One cycle of the URLLC worker. Returns false once the mailbox is closed.
pub fn serve(ctx: &PhyContext, mailbox: &UrllcMailbox, timeout: Option<Duration>) -> bool {
    let Some(work) = mailbox.take(timeout) else {
        return !mailbox.is_closed();
    };
    let sent = match work {
        UrllcWork::Mac2Phy(list) => {
            mac2phy::recv_handler(ctx, list, true);
            ctx.fapi2phy.flush(&ctx.phy, true)
        }
        UrllcWork::Phy2Mac(list) => {
            phy2mac::recv_handler(ctx, list, true);
            ctx.fapi2mac.flush(&ctx.mac, true)
        }
    };
    if let Err(e) = sent {
        error!("[URLLC] send failed: {}", e);
    }
    mailbox.complete();
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_post_take_complete() {
        let mb = Mailbox::new("test");
        mb.post(7).unwrap();
        assert_eq!(mb.take(Some(Duration::from_millis(10))), Some(7));
        assert_eq!(mb.take(Some(Duration::from_millis(1))), None);
        mb.complete();
        mb.post(8).unwrap();
        assert_eq!(mb.take(None), Some(8));
    }

    #[test]
    fn test_second_post_waits_for_completion() {
        let mb = Arc::new(Mailbox::new("test"));
        mb.post(1).unwrap();
        assert_eq!(mb.take(None), Some(1));

        let poster = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || mb.post(2))
        };
        thread::sleep(Duration::from_millis(20));
        // Still blocked behind the in-flight batch
        assert_eq!(mb.take(Some(Duration::from_millis(1))), None);
        mb.complete();
        poster.join().unwrap().unwrap();
        assert_eq!(mb.take(Some(Duration::from_millis(100))), Some(2));
    }

    #[test]
    fn test_close_releases_waiters() {
        let mb = Arc::new(Mailbox::<u32>::new("test"));
        let taker = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || mb.take(None))
        };
        thread::sleep(Duration::from_millis(10));
        mb.close();
        assert_eq!(taker.join().unwrap(), None);
        assert_eq!(mb.post(3), Err(3));
        assert!(mb.is_closed());
    }

    #[test]
    fn test_serve_routes_by_direction() {
        use interfaces::fapi::FapiMessage;
        use interfaces::iapi::{CarrierSlot, IapiMessage, SlotInd};
        use interfaces::wls::{ReceivedBody, ReceivedElement, WlsFlags};

        use crate::context::test_support::Harness;
        use crate::context::PhyState;

        let h = Harness::new();
        h.force_state(0, PhyState::Running);
        let mb = UrllcMailbox::new("urllc");

        let tick = IapiMessage::SlotInd(SlotInd { slot: CarrierSlot::new(0, 9, 3, 0) });
        let elem = ReceivedElement {
            pa: 0,
            size: 0,
            msg_type: tick.msg_type().raw(),
            flags: WlsFlags::empty(),
            body: ReceivedBody::Message(tick),
        };
        mb.post(UrllcWork::Phy2Mac(vec![elem])).unwrap();
        assert!(serve(&h.ctx, &mb, Some(Duration::from_millis(10))));

        let msgs = h.mac_messages();
        assert!(msgs.iter().any(|m| matches!(m, FapiMessage::SlotIndication(s) if s.sfn == 9 && s.slot == 3)));

        // Completed, so the next post does not block
        mb.post(UrllcWork::Mac2Phy(vec![])).unwrap();
        assert!(serve(&h.ctx, &mb, Some(Duration::from_millis(10))));
        mb.close();
        assert!(!serve(&h.ctx, &mb, Some(Duration::from_millis(1))));
    }
}
