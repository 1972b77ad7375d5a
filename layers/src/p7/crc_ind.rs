//! CRC_IND from the PHY becomes CRC.indication
//!
//! Each entry is matched to the PUSCH the MAC scheduled for the same slot
//! and symbol; the HARQ id and handle come from that record. The converted
//! SNR is kept in the record for the RX_DATA.indication that follows.

use common::convert_snr_iapi_to_fapi;
use interfaces::fapi::{CrcIndication, CrcInfo, FapiMessage};
use interfaces::iapi::CrcInd;
use tracing::debug;

use super::vendor_ext::{stamp, VendorExt};
use super::{not_scheduled, to_mac, with_ul_slot, DEFAULT_TIMING_ADVANCE, REPORTED_RSSI};
use crate::context::PhyContext;
use crate::p5::resolve;
use crate::FapiError;

pub fn crc_indication(ctx: &PhyContext, ind: &CrcInd, vendor: &mut VendorExt, urllc: bool) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, ind.slot.carrier_idx, "CRC.indication")?;
    inst.stats.iapi.crc_ind += 1;
    let phy_id = inst.phy_id;
    let t = ind.slot.sfn_slot;

    let crcs = with_ul_slot(ctx, &ind.slot, urllc, |info| {
        ind.crc
            .iter()
            .map(|entry| {
                let pusch = info.pusch_mut(entry.ue_id).ok_or_else(|| not_scheduled("PUSCH", entry.ue_id, &ind.slot))?;
                let ul_cqi = convert_snr_iapi_to_fapi(entry.snr);
                pusch.ul_cqi = ul_cqi;
                pusch.timing_advance = DEFAULT_TIMING_ADVANCE;
                Ok(CrcInfo {
                    handle: pusch.handle,
                    rnti: entry.rnti,
                    harq_id: pusch.harq_process_id,
                    // FAPI reports 0 for a passed CRC
                    tb_crc_status: u8::from(entry.crc_flag == 0),
                    num_cb: 0,
                    cb_crc_status: Vec::new(),
                    ul_cqi,
                    timing_advance: DEFAULT_TIMING_ADVANCE,
                    rssi: REPORTED_RSSI,
                })
            })
            .collect::<Result<Vec<_>, FapiError>>()
    })?;

    let n = crcs.len() as u64;
    inst.stats.iapi.crc_ind_pdus += n;
    if let Some(v) = vendor.get(phy_id) {
        v.crc_ind = stamp(phy_id, t.sym);
        v.crc_snr.extend(ind.crc.iter().map(|c| c.snr));
    }

    let out = CrcIndication { sfn: t.sfn, slot: u16::from(t.slot), crcs };
    to_mac(ctx, phy_id, FapiMessage::CrcIndication(out), urllc)?;
    inst.stats.fapi.crc_ind_pdus += n;
    inst.stats.fapi.crc_ind += 1;
    debug!("[FAPI2MAC] phy {} CRC.indication at {}: {} crcs urllc {}", phy_id, t, n, urllc);
    Ok(())
}
