//! RX_SRS_IND from the PHY becomes SRS.indication
//!
//! SNR values are moved from the vendor dB scale onto the FAPI 0.5 dB
//! scale. Channel estimates only travel in the vendor record.

use interfaces::fapi::{FapiMessage, SrsIndication, SrsReport, SrsSymbolReport, VendorSrsPdu};
use interfaces::iapi::{RxSrsInd, SrsEstimate, SRS_SNR_BLOCK_WIDTH};
use tracing::debug;

use super::vendor_ext::{stamp, VendorExt};
use super::{not_scheduled, to_mac, with_ul_slot};
use crate::context::PhyContext;
use crate::p5::resolve;
use crate::FapiError;

/// RBs covered by one SNR block
const RBS_PER_BLOCK: u16 = 4;

fn snr_to_fapi(snr: i8) -> u8 {
    ((i16::from(snr) + 64) * 2) as u8
}

fn wide_band_snr(est: &SrsEstimate) -> u8 {
    let n = est.nr_of_symbols as usize;
    if n == 0 {
        return snr_to_fapi(0);
    }
    let sum: i16 = est.wide_band_snr.iter().take(n).map(|&s| i16::from(s)).sum();
    snr_to_fapi((sum / n as i16) as i8)
}

fn rb_snr(est: &SrsEstimate) -> SrsSymbolReport {
    let num_rbs = est.nr_of_blocks * RBS_PER_BLOCK;
    let rb_snr = (0..num_rbs as usize)
        .map(|k| {
            let snr = est
                .block_snr
                .get(k / SRS_SNR_BLOCK_WIDTH)
                .and_then(|row| row.get(k % SRS_SNR_BLOCK_WIDTH))
                .copied()
                .unwrap_or(0);
            snr_to_fapi(snr)
        })
        .collect();
    SrsSymbolReport { num_rbs, rb_snr }
}

fn vendor_pdu(est: &SrsEstimate) -> VendorSrsPdu {
    VendorSrsPdu {
        nr_of_port: est.nr_of_port,
        nr_of_rx_ant: est.nr_of_rx_ant,
        nr_of_rbs: est.nr_of_rbs,
        is_chan_est_pres: est.is_chan_est_pres,
        chan_est: est.chan_est.clone(),
    }
}

pub fn srs_indication(ctx: &PhyContext, ind: &RxSrsInd, vendor: &mut VendorExt, urllc: bool) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, ind.slot.carrier_idx, "SRS.indication")?;
    inst.stats.iapi.srs_ind += 1;
    let phy_id = inst.phy_id;
    let t = ind.slot.sfn_slot;

    let pdus = with_ul_slot(ctx, &ind.slot, urllc, |info| {
        ind.pdus
            .iter()
            .map(|est| {
                let srs = info.srs(est.ue_id).ok_or_else(|| not_scheduled("SRS", est.ue_id, &ind.slot))?;
                Ok(SrsReport {
                    handle: srs.handle,
                    rnti: est.rnti,
                    timing_advance: 0xFFFF,
                    num_symbols: est.nr_of_symbols,
                    wide_band_snr: wide_band_snr(est),
                    reported_symbols: vec![rb_snr(est)],
                })
            })
            .collect::<Result<Vec<_>, FapiError>>()
    })?;

    let n = pdus.len() as u64;
    inst.stats.iapi.srs_ind_pdus += n;
    if let Some(v) = vendor.get(phy_id) {
        v.srs_ind = stamp(phy_id, t.sym);
        v.srs_pdus.extend(ind.pdus.iter().map(vendor_pdu));
    }

    let out = SrsIndication { sfn: t.sfn, slot: u16::from(t.slot), pdus };
    to_mac(ctx, phy_id, FapiMessage::SrsIndication(out), urllc)?;
    inst.stats.fapi.srs_ind_pdus += n;
    inst.stats.fapi.srs_ind += 1;
    debug!("[FAPI2MAC] phy {} SRS.indication at {} urllc {}", phy_id, t, urllc);
    Ok(())
}

#[cfg(test)]
mod tests {
    use interfaces::fapi::{SrsPdu, UlTtiPdu, UlTtiRequest};
    use interfaces::iapi::CarrierSlot;

    use super::*;
    use crate::context::test_support::Harness;
    use crate::p7::test_support::running;
    use crate::p7::ul_tti_request;

    fn schedule_srs(h: &Harness, handle: u32) {
        let pdu = UlTtiPdu::Srs(SrsPdu { rnti: 0x4600 + handle as u16, handle, ..Default::default() });
        let req = UlTtiRequest { sfn: 2, slot: 6, pdus: vec![pdu], ..Default::default() };
        ul_tti_request(&h.ctx, 0, &req, None, false).unwrap();
        h.flush();
        h.phy_messages();
    }

    fn estimate(ue_id: u16) -> SrsEstimate {
        SrsEstimate {
            ue_id,
            rnti: 0x4600 + ue_id,
            nr_of_symbols: 2,
            wide_band_snr: vec![10, 20],
            nr_of_blocks: 18,
            block_snr: vec![vec![-64; SRS_SNR_BLOCK_WIDTH], vec![5; SRS_SNR_BLOCK_WIDTH]],
            nr_of_port: 1,
            nr_of_rx_ant: 4,
            nr_of_rbs: 72,
            is_chan_est_pres: 1,
            chan_est: vec![1, -1, 2, -2],
        }
    }

    #[test]
    fn test_srs_snr_scaling() {
        let h = Harness::new();
        running(&h, 0);
        schedule_srs(&h, 21);
        let mut vendor = VendorExt::new();

        let ind = RxSrsInd { slot: CarrierSlot::new(0, 2, 6, 0), pdus: vec![estimate(21)] };
        srs_indication(&h.ctx, &ind, &mut vendor, false).unwrap();
        h.flush();

        let Some(FapiMessage::SrsIndication(out)) = h.mac_messages().pop() else { panic!("expected SRS.indication") };
        let pdu = &out.pdus[0];
        assert_eq!((pdu.handle, pdu.timing_advance, pdu.num_symbols), (21, 0xFFFF, 2));
        assert_eq!(pdu.wide_band_snr, 158);
        assert_eq!(pdu.reported_symbols.len(), 1);
        let sym = &pdu.reported_symbols[0];
        assert_eq!(sym.num_rbs, 72);
        assert_eq!(sym.rb_snr[0], 0);
        assert_eq!(sym.rb_snr[67], 0);
        assert_eq!(sym.rb_snr[68], 138);
        assert_eq!(sym.rb_snr.len(), 72);

        let v = vendor.get(0).unwrap();
        assert_eq!(v.srs_pdus[0].chan_est, vec![1, -1, 2, -2]);
        assert_eq!(v.srs_pdus[0].nr_of_rx_ant, 4);
    }

    #[test]
    fn test_zero_symbols_reports_zero_snr() {
        let est = SrsEstimate { nr_of_symbols: 0, wide_band_snr: vec![], ..estimate(1) };
        assert_eq!(wide_band_snr(&est), 128);
    }

    #[test]
    fn test_missing_blocks_read_as_zero() {
        let est = SrsEstimate { nr_of_blocks: 1, block_snr: vec![], ..estimate(1) };
        assert_eq!(rb_snr(&est).rb_snr, vec![128; 4]);
    }
}
