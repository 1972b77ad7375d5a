//! RX_RACH_IND from the PHY becomes RACH.indication
//!
//! Preambles detected on the same occasion (slot, frequency and start
//! symbol) share one RACH PDU. The indication is valid only for slots
//! whose UL_TTI.request announced a PRACH.

use interfaces::fapi::{FapiMessage, PreambleInfo, RachIndication, RachPdu};
use interfaces::iapi::{RachPreamble, RxRachInd};
use tracing::debug;

use super::{to_mac, with_ul_slot};
use crate::context::PhyContext;
use crate::p5::resolve;
use crate::stats::PhyStats;
use crate::FapiError;

const UNREPORTED: u8 = 0xFF;

fn same_occasion(pdu: &RachPdu, p: &RachPreamble) -> bool {
    pdu.slot_index == p.start_slot_idx && pdu.freq_index == p.freq_idx && pdu.symbol_index == p.start_symb_idx
}

fn group_preambles(preambles: &[RachPreamble], phy_cell_id: u16, stats: &mut PhyStats) -> Vec<RachPdu> {
    let mut pdus: Vec<RachPdu> = Vec::new();
    for p in preambles {
        stats.iapi.rach_preambles += 1;
        let info = PreambleInfo { preamble_index: p.preamb_idx, timing_advance: p.ta, preamble_pwr: p.preamb_pwr };
        match pdus.iter_mut().find(|pdu| same_occasion(pdu, p)) {
            Some(pdu) => pdu.preambles.push(info),
            None => {
                pdus.push(RachPdu {
                    phy_cell_id,
                    symbol_index: p.start_symb_idx,
                    slot_index: p.start_slot_idx,
                    freq_index: p.freq_idx,
                    avg_rssi: UNREPORTED,
                    avg_snr: UNREPORTED,
                    preambles: vec![info],
                });
                stats.fapi.rach_ind_pdus += 1;
            }
        }
    }
    pdus
}

/// RACH.indication always goes out on the normal class; `urllc` selects
/// which UL_TTI.request records it is matched against.
pub fn rach_indication(ctx: &PhyContext, ind: &RxRachInd, urllc: bool) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, ind.slot.carrier_idx, "RACH.indication")?;
    inst.stats.iapi.rach_ind += 1;
    let phy_id = inst.phy_id;
    let t = ind.slot.sfn_slot;

    let phy_cell_id = with_ul_slot(ctx, &ind.slot, urllc, |info| {
        if !info.rach_presence {
            return Err(FapiError::NoValidData(format!("RACH not requested for {}.{}", t.sfn, t.slot)));
        }
        Ok(info.rach_info.phy_cell_id)
    })?;

    let pdus = group_preambles(&ind.preambles, phy_cell_id, &mut inst.stats);
    let n = pdus.len();
    let out = RachIndication { sfn: t.sfn, slot: u16::from(t.slot), pdus };
    to_mac(ctx, phy_id, FapiMessage::RachIndication(out), false)?;
    inst.stats.fapi.rach_ind += 1;
    debug!("[FAPI2MAC] phy {} RACH.indication {}.{} sym {}: {} occasions urllc {}",
           phy_id, t.sfn, t.slot, t.sym, n, urllc);
    Ok(())
}

#[cfg(test)]
mod tests {
    use interfaces::fapi::{PrachPdu, UlTtiPdu, UlTtiRequest};
    use interfaces::iapi::CarrierSlot;

    use super::*;
    use crate::context::test_support::Harness;
    use crate::p7::test_support::{pusch, running, schedule};
    use crate::p7::ul_tti_request;

    fn preamble(slot: u8, freq: u8, symb: u8, idx: u8) -> RachPreamble {
        RachPreamble { start_slot_idx: slot, freq_idx: freq, start_symb_idx: symb, preamb_idx: idx, ta: 12, preamb_pwr: 900 }
    }

    fn schedule_prach(h: &Harness) {
        let req = UlTtiRequest {
            sfn: 1,
            slot: 19,
            rach_present: 1,
            pdus: vec![UlTtiPdu::Prach(PrachPdu::default())],
            ..Default::default()
        };
        ul_tti_request(&h.ctx, 0, &req, None, false).unwrap();
        h.flush();
        h.phy_messages();
    }

    #[test]
    fn test_preambles_grouped_by_occasion() {
        let h = Harness::new();
        running(&h, 0);
        h.ctx.phy(0).unwrap().lock().config.phy_cell_id = 500;
        schedule_prach(&h);

        let ind = RxRachInd {
            slot: CarrierSlot::new(0, 1, 19, 0),
            preambles: vec![preamble(0, 0, 0, 3), preamble(0, 1, 0, 7), preamble(0, 0, 0, 9)],
        };
        rach_indication(&h.ctx, &ind, false).unwrap();
        h.flush();

        let Some(FapiMessage::RachIndication(out)) = h.mac_messages().pop() else { panic!("expected RACH.indication") };
        assert_eq!(out.pdus.len(), 2);
        assert_eq!(out.pdus[0].phy_cell_id, 500);
        assert_eq!(out.pdus[0].preambles.iter().map(|p| p.preamble_index).collect::<Vec<_>>(), vec![3, 9]);
        assert_eq!(out.pdus[1].freq_index, 1);
        assert_eq!((out.pdus[1].avg_rssi, out.pdus[1].avg_snr), (0xFF, 0xFF));

        let stats = h.ctx.phy(0).unwrap().lock().stats.clone();
        assert_eq!(stats.iapi.rach_preambles, 3);
        assert_eq!(stats.fapi.rach_ind_pdus, 2);
        assert_eq!(stats.fapi.rach_ind, 1);
    }

    #[test]
    fn test_rach_without_prach_rejected() {
        let h = Harness::new();
        running(&h, 0);
        schedule(&h, 0, 1, 19, vec![pusch(1, 0)]);
        let ind = RxRachInd { slot: CarrierSlot::new(0, 1, 19, 0), preambles: vec![preamble(0, 0, 0, 1)] };
        let err = rach_indication(&h.ctx, &ind, false).unwrap_err();
        assert!(matches!(err, FapiError::NoValidData(_)));
        h.flush();
        assert!(h.mac_messages().is_empty());
    }

    #[test]
    fn test_urllc_rach_reported_on_normal_class() {
        let h = Harness::new();
        running(&h, 0);
        let req = UlTtiRequest { sfn: 4, slot: 2, rach_present: 1, ..Default::default() };
        ul_tti_request(&h.ctx, 0, &req, None, true).unwrap();
        h.flush();
        h.phy_messages();

        let ind = RxRachInd { slot: CarrierSlot::new(0, 4, 2, 0), preambles: vec![preamble(0, 0, 0, 1)] };
        rach_indication(&h.ctx, &ind, true).unwrap();
        assert_eq!(h.ctx.fapi2mac.pending(0, false), 1);
        assert_eq!(h.ctx.fapi2mac.pending(0, true), 0);
    }
}
