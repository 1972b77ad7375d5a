//! Vendor P7 indication accumulator
//!
//! Indications of one receive cycle add their vendor-only fields (raw SNR,
//! symbol stamps, SRS channel estimates) to a per-PHY record. The records
//! go out after every standard indication of the cycle has been queued.

use interfaces::fapi::{FapiMessage, VendorP7Indication, VendorSymInd};
use tracing::trace;

use super::to_mac;
use crate::context::{PhyContext, MAX_PHY_INSTANCES};
use crate::FapiError;

/// Per-PHY vendor records of one dispatch cycle
#[derive(Debug)]
pub struct VendorExt {
    msgs: Vec<Option<VendorP7Indication>>,
}

impl Default for VendorExt {
    fn default() -> Self {
        Self::new()
    }
}

impl VendorExt {
    pub fn new() -> Self {
        Self { msgs: vec![None; MAX_PHY_INSTANCES] }
    }

    /// The record of `phy_id`, opened on first use
    pub fn get(&mut self, phy_id: u8) -> Option<&mut VendorP7Indication> {
        self.msgs.get_mut(phy_id as usize).map(|slot| slot.get_or_insert_with(Default::default))
    }

    pub fn is_empty(&self) -> bool {
        self.msgs.iter().all(Option::is_none)
    }

    /// Queue every open record behind the standard indications and reset
    pub fn flush_into(&mut self, ctx: &PhyContext, urllc: bool) -> Result<(), FapiError> {
        for (phy_id, slot) in self.msgs.iter_mut().enumerate() {
            if let Some(msg) = slot.take() {
                trace!("[FAPI2MAC] phy {} vendor P7 indication", phy_id);
                to_mac(ctx, phy_id as u8, FapiMessage::VendorP7Indication(msg), urllc)?;
            }
        }
        Ok(())
    }
}

/// Symbol stamp of an indication for `phy_id`
pub(crate) fn stamp(phy_id: u8, sym: u8) -> Option<VendorSymInd> {
    Some(VendorSymInd { carrier_idx: phy_id, sym })
}

#[cfg(test)]
mod tests {
    use interfaces::fapi::MsgHeaderInd;

    use super::*;
    use crate::context::test_support::Harness;

    #[test]
    fn test_records_flushed_once_per_phy() {
        let h = Harness::new();
        let mut ext = VendorExt::new();
        assert!(ext.is_empty());
        ext.get(1).unwrap().crc_snr.push(-3);
        ext.get(1).unwrap().crc_snr.push(12);
        ext.get(1).unwrap().crc_ind = stamp(1, 7);
        assert!(ext.get(MAX_PHY_INSTANCES as u8).is_none());

        ext.flush_into(&h.ctx, false).unwrap();
        assert!(ext.is_empty());
        h.flush();
        let msgs = h.mac_messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0], FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 1, phy_id: 1 }));
        let FapiMessage::VendorP7Indication(ind) = &msgs[1] else { panic!("expected vendor indication") };
        assert_eq!(ind.crc_snr, vec![-3, 12]);
        assert_eq!(ind.crc_ind, Some(VendorSymInd { carrier_idx: 1, sym: 7 }));
    }
}
