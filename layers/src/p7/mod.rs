//! P7 (Per-TTI) Translators
//!
//! MAC requests (DL_TTI, UL_TTI, UL_DCI, TX_DATA) become vendor requests
//! for the PHY. PHY indications (slot, CRC, RX data, UCI, SRS, RACH) become
//! FAPI indications for the MAC. UL indications resolve their PDUs against
//! what UL_TTI.request recorded for the same slot and symbol.

pub mod dl_tti;
pub mod ul_tti;
pub mod ul_dci;
pub mod tx_data;
pub mod slot_ind;
pub mod crc_ind;
pub mod rx_data_ind;
pub mod uci_ind;
pub mod srs_ind;
pub mod rach_ind;
pub mod vendor_ext;

use common::rbg::RB_BITMAP_SIZE;
use interfaces::fapi::FapiMessage;
use interfaces::iapi::{CarrierSlot, IapiMessage};

use crate::context::PhyContext;
use crate::ul_slot::{UlSlotInfo, UlSlotKey};
use crate::FapiError;

pub use crc_ind::crc_indication;
pub use dl_tti::dl_tti_request;
pub use rach_ind::rach_indication;
pub use rx_data_ind::rx_data_indication;
pub use slot_ind::slot_indication;
pub use srs_ind::srs_indication;
pub use tx_data::tx_data_request;
pub use uci_ind::{uci_indication, uci_on_pusch_indication};
pub use ul_dci::ul_dci_request;
pub use ul_tti::ul_tti_request;
pub use vendor_ext::VendorExt;

/// Fixed RSSI reported for detected UL transmissions
pub(crate) const REPORTED_RSSI: u16 = 880;
/// Timing advance reported when the PHY gives none
pub(crate) const DEFAULT_TIMING_ADVANCE: u16 = 31;

pub(crate) fn to_mac(ctx: &PhyContext, phy_id: u8, msg: FapiMessage, urllc: bool) -> Result<(), FapiError> {
    ctx.fapi2mac.push(ctx.pool(), phy_id, msg, urllc)
}

pub(crate) fn to_phy(ctx: &PhyContext, msg: IapiMessage, urllc: bool) -> Result<(), FapiError> {
    ctx.fapi2phy.push(ctx.pool(), msg, urllc)
}

/// FAPI per-PRB bitmap widened to the fixed 36-byte layout
pub(crate) fn rb_bitmap(bytes: &[u8]) -> [u8; RB_BITMAP_SIZE] {
    let mut bitmap = [0u8; RB_BITMAP_SIZE];
    let n = bytes.len().min(RB_BITMAP_SIZE);
    bitmap[..n].copy_from_slice(&bytes[..n]);
    bitmap
}

/// Correlation key of an indication stamped with `slot`
pub(crate) fn ul_key(slot: &CarrierSlot, urllc: bool) -> UlSlotKey {
    let t = slot.sfn_slot;
    UlSlotKey::new(urllc, t.sfn, u16::from(t.slot), t.sym)
}

/// Run `f` on what UL_TTI.request recorded for the indication's slot
pub(crate) fn with_ul_slot<R>(
    ctx: &PhyContext,
    slot: &CarrierSlot,
    urllc: bool,
    f: impl FnOnce(&mut UlSlotInfo) -> Result<R, FapiError>,
) -> Result<R, FapiError> {
    ctx.phy(slot.carrier_idx)?.ul_slots.lookup(ul_key(slot, urllc), f)?
}

pub(crate) fn not_scheduled(what: &str, ue_id: u16, slot: &CarrierSlot) -> FapiError {
    let t = slot.sfn_slot;
    FapiError::NoValidData(format!("no {} scheduled for ue {} at {}.{} sym {}", what, ue_id, t.sfn, t.slot, t.sym))
}

#[cfg(test)]
pub(crate) mod test_support {
    use interfaces::fapi::{PuschData, PuschPdu, UlTtiPdu, UlTtiRequest};

    use super::*;
    use crate::context::test_support::Harness;
    use crate::PhyState;

    /// A RUNNING cell with `n_nr_of_rx_ant` antennas
    pub fn running(h: &Harness, phy_id: u8) {
        h.force_state(phy_id, PhyState::Running);
        h.ctx.phy(phy_id).unwrap().lock().config.n_nr_of_rx_ant = 4;
    }

    pub fn pusch(handle: u32, harq_process_id: u8) -> UlTtiPdu {
        UlTtiPdu::Pusch(PuschPdu {
            pdu_bitmap: interfaces::fapi::pusch_bitmap::DATA,
            rnti: 0x4600 + handle as u16,
            handle,
            bwp_size: 106,
            nr_of_layers: 1,
            dmrs_ports: 1,
            pusch_data: PuschData { harq_process_id, tb_size: 1024, ..Default::default() },
            ..Default::default()
        })
    }

    /// Schedule `pdus` through UL_TTI.request and drop what it queued
    pub fn schedule(h: &Harness, phy_id: u8, sfn: u16, slot: u16, pdus: Vec<UlTtiPdu>) {
        let req = UlTtiRequest { sfn, slot, pdus, ..Default::default() };
        ul_tti_request(&h.ctx, phy_id, &req, None, false).unwrap();
        h.flush();
        h.phy_messages();
    }
}
