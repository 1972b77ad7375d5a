//! Outbound Message Lists
//!
//! Translated messages are collected per TTI and handed to the transport
//! in one send per flush. Towards the MAC every cell has its own list
//! opened by a `MsgHeaderInd` whose count tracks the messages behind it;
//! towards the PHY there is one list per class.

use std::sync::Arc;

use interfaces::fapi::{FapiMessage, MsgHeaderInd};
use interfaces::iapi::IapiMessage;
use interfaces::wls::{BufferPool, OutboundElement, WlsSession};
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::FapiError;

type MacList = Vec<OutboundElement<FapiMessage>>;
type PhyList = Vec<OutboundElement<IapiMessage>>;

fn class(urllc: bool) -> usize {
    usize::from(urllc)
}

/// Per-cell, per-class lists towards the MAC
#[derive(Debug)]
pub struct Fapi2MacQueues {
    lists: Vec<[Mutex<MacList>; 2]>,
}

impl Fapi2MacQueues {
    pub fn new(num_phys: usize) -> Self {
        Self {
            lists: (0..num_phys).map(|_| [Mutex::new(Vec::new()), Mutex::new(Vec::new())]).collect(),
        }
    }

    fn list(&self, phy_id: u8, urllc: bool) -> Result<&Mutex<MacList>, FapiError> {
        self.lists
            .get(phy_id as usize)
            .map(|l| &l[class(urllc)])
            .ok_or_else(|| FapiError::InvalidHandle(format!("no fapi2mac queue for phy {}", phy_id)))
    }

    /// Open the cell's list with an empty header unless it is already open
    pub fn seed_header(&self, pool: &Arc<BufferPool>, phy_id: u8, urllc: bool) -> Result<(), FapiError> {
        let list = self.list(phy_id, urllc)?;
        if !list.lock().is_empty() {
            return Ok(());
        }
        let header = OutboundElement::new(pool, FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 0, phy_id }))?;
        let mut list = list.lock();
        // Another producer may have opened it meanwhile
        if list.is_empty() {
            list.push(header);
            trace!("[FAPI2MAC] header seeded for phy {}", phy_id);
        }
        Ok(())
    }

    /// Link an element at the tail, counting it in the header
    pub fn append(&self, phy_id: u8, elem: OutboundElement<FapiMessage>, urllc: bool) -> Result<(), FapiError> {
        let mut list = self.list(phy_id, urllc)?.lock();
        if let Some(head) = list.first_mut() {
            head.bump_header_count();
        }
        list.push(elem);
        Ok(())
    }

    /// Translate-side shorthand: open the list if needed, then append `msg`
    pub fn push(&self, pool: &Arc<BufferPool>, phy_id: u8, msg: FapiMessage, urllc: bool) -> Result<(), FapiError> {
        self.seed_header(pool, phy_id, urllc)?;
        let elem = OutboundElement::new(pool, msg)?;
        self.append(phy_id, elem, urllc)
    }

    /// Messages queued behind the cell's header
    pub fn pending(&self, phy_id: u8, urllc: bool) -> usize {
        self.list(phy_id, urllc)
            .map(|l| l.lock().first().and_then(|h| h.header_count()).unwrap_or(0) as usize)
            .unwrap_or(0)
    }

    fn detach(list: &Mutex<MacList>) -> Option<MacList> {
        let taken = std::mem::take(&mut *list.lock());
        match taken.first().map(|h| h.header_count()) {
            None => None,
            // Nothing behind the header; its block returns to the pool here
            Some(Some(0)) => None,
            Some(_) => Some(taken),
        }
    }

    /// Detach every cell's list and send them as one transfer
    pub fn flush(&self, session: &WlsSession<FapiMessage>, urllc: bool) -> Result<usize, FapiError> {
        let mut commit = Vec::new();
        for phy in &self.lists {
            if let Some(list) = Self::detach(&phy[class(urllc)]) {
                commit.extend(list);
            }
        }
        Self::send(session, commit, urllc)
    }

    /// Send one cell's list on its own
    pub fn flush_phy(&self, session: &WlsSession<FapiMessage>, phy_id: u8, urllc: bool) -> Result<usize, FapiError> {
        let commit = Self::detach(self.list(phy_id, urllc)?).unwrap_or_default();
        Self::send(session, commit, urllc)
    }

    fn send(session: &WlsSession<FapiMessage>, commit: MacList, urllc: bool) -> Result<usize, FapiError> {
        if commit.is_empty() {
            return Ok(0);
        }
        debug!("[FAPI2MAC] sending {} elements (urllc {})", commit.len(), urllc);
        session.send(commit, urllc).map_err(|e| {
            error!("[FAPI2MAC] send failed: {}", e);
            FapiError::from(e)
        })
    }
}

/// Per-class list towards the PHY
#[derive(Debug, Default)]
pub struct Fapi2PhyQueue {
    lists: [Mutex<PhyList>; 2],
}

impl Fapi2PhyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, elem: OutboundElement<IapiMessage>, urllc: bool) {
        self.lists[class(urllc)].lock().push(elem);
    }

    pub fn push(&self, pool: &Arc<BufferPool>, msg: IapiMessage, urllc: bool) -> Result<(), FapiError> {
        let elem = OutboundElement::new(pool, msg)?;
        self.append(elem, urllc);
        Ok(())
    }

    pub fn len(&self, urllc: bool) -> usize {
        self.lists[class(urllc)].lock().len()
    }

    pub fn is_empty(&self, urllc: bool) -> bool {
        self.len(urllc) == 0
    }

    pub fn flush(&self, session: &WlsSession<IapiMessage>, urllc: bool) -> Result<usize, FapiError> {
        let list = std::mem::take(&mut *self.lists[class(urllc)].lock());
        if list.is_empty() {
            return Ok(0);
        }
        trace!("[FAPI2PHY] sending {} elements (urllc {})", list.len(), urllc);
        session.send(list, urllc).map_err(|e| {
            error!("[FAPI2PHY] error sending to PHY: {}", e);
            FapiError::from(e)
        })
    }
}
