//! UL_DCI.request
//!
//! UL grants reuse the DCI record of DL_TTI.request.

use interfaces::fapi::{UlDciRequest, VendorMessage};
use interfaces::iapi::{CarrierSlot, IapiMessage, UlDciReq};
use tracing::debug;

use super::dl_tti::dci_pdu;
use super::to_phy;
use crate::context::PhyContext;
use crate::FapiError;

pub fn ul_dci_request(
    ctx: &PhyContext,
    phy_id: u8,
    req: &UlDciRequest,
    vendor: Option<&VendorMessage>,
    urllc: bool,
) -> Result<(), FapiError> {
    let mut inst = ctx.phy(phy_id)?.lock();
    inst.stats.fapi.ul_dci_req += 1;
    let use_vendor_epre = inst.config.use_vendor_epre_x_ssb;

    let mut out = UlDciReq { slot: CarrierSlot::new(inst.phy_id, req.sfn, req.slot as u8, 0), pdus: Vec::new() };
    for pdu in &req.pdus {
        inst.stats.fapi.ul_dci_pdus += 1;
        out.pdus.push(dci_pdu(pdu, use_vendor_epre)?);
        inst.stats.iapi.ul_dci_pdus += 1;
    }

    if let Some(v) = vendor.map(|v| &v.p7_req_vendor.ul_dci_req) {
        out.slot.sfn_slot.sym = v.sym;
        if use_vendor_epre {
            for (dci, vd) in out.pdus.iter_mut().zip(&v.pdus) {
                dci.epre_ratio_of_pdcch_to_ssb = vd.epre_ratio_of_pdcch_to_ssb;
                dci.epre_ratio_of_dmrs_to_ssb = vd.epre_ratio_of_dmrs_to_ssb;
            }
        }
    }

    debug!("[FAPI2PHY] phy {} UL_DCI.request {}.{}: {} dci", phy_id, req.sfn, req.slot, out.pdus.len());
    to_phy(ctx, IapiMessage::UlDciReq(out), urllc)?;
    inst.stats.iapi.ul_dci_req += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use interfaces::fapi::{DciVendor, DlDci, PdcchPdu};

    use super::*;
    use crate::context::test_support::Harness;
    use crate::PhyState;

    fn grant(rnti: u16) -> PdcchPdu {
        PdcchPdu {
            bwp_size: 106,
            dl_dci: vec![DlDci { rnti, beta_pdcch_1_0: 3, power_control_offset_ss: 2, ..Default::default() }],
            ..Default::default()
        }
    }

    fn sent(h: &Harness) -> UlDciReq {
        h.flush();
        match h.phy_messages().pop() {
            Some(IapiMessage::UlDciReq(req)) => req,
            other => panic!("expected UL_DCI_REQ, got {:?}", other),
        }
    }

    #[test]
    fn test_grants_translated() {
        let h = Harness::new();
        h.force_state(0, PhyState::Running);
        let req = UlDciRequest { sfn: 7, slot: 2, pdus: vec![grant(0x4601), grant(0x4602)] };
        ul_dci_request(&h.ctx, 0, &req, None, false).unwrap();

        let out = sent(&h);
        assert_eq!(out.slot, CarrierSlot::new(0, 7, 2, 0));
        assert_eq!(out.pdus.iter().map(|d| d.rnti).collect::<Vec<_>>(), vec![0x4601, 0x4602]);
        assert_eq!(out.pdus[0].epre_ratio_of_pdcch_to_ssb, 1000);
        assert_eq!(out.pdus[0].epre_ratio_of_dmrs_to_ssb, 9000);
        let stats = h.ctx.phy(0).unwrap().lock().stats.clone();
        assert_eq!((stats.fapi.ul_dci_pdus, stats.iapi.ul_dci_pdus, stats.iapi.ul_dci_req), (2, 2, 1));
    }

    #[test]
    fn test_vendor_epre_and_symbol() {
        let h = Harness::new();
        h.force_state(0, PhyState::Running);
        h.ctx.phy(0).unwrap().lock().config.use_vendor_epre_x_ssb = true;
        let mut vendor = VendorMessage::default();
        vendor.p7_req_vendor.ul_dci_req.sym = 4;
        vendor.p7_req_vendor.ul_dci_req.pdus =
            vec![DciVendor { epre_ratio_of_pdcch_to_ssb: 100, epre_ratio_of_dmrs_to_ssb: 200 }];
        let req = UlDciRequest { sfn: 7, slot: 2, pdus: vec![grant(1), grant(2)] };
        ul_dci_request(&h.ctx, 0, &req, Some(&vendor), true).unwrap();

        let out = sent(&h);
        assert_eq!(out.slot.sfn_slot.sym, 4);
        assert_eq!(out.pdus[0].epre_ratio_of_pdcch_to_ssb, 100);
        assert_eq!(out.pdus[0].epre_ratio_of_dmrs_to_ssb, 200);
        assert_eq!(out.pdus[1].epre_ratio_of_pdcch_to_ssb, 0);
    }
}
