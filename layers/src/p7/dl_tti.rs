//! DL_TTI.request
//!
//! Each FAPI PDU becomes one self-describing vendor PDU whose declared size
//! advances the message length. EPRE ratios are derived from the FAPI power
//! offsets unless the cell was configured to take them from the vendor
//! message.

use common::rbg::{self, RbgBitOrder};
use common::{epre_ratio_dmrs_to_ssb, epre_ratio_pdcch_to_ssb, epre_ratio_pdsch_to_ssb, ssb_prb_offset};
use interfaces::fapi::{
    CsiRsPdu, DlPduVendor, DlTtiPdu, DlTtiReqVendor, DlTtiRequest, PdcchPdu, PdschPdu, SsbPdu, UeGroup,
    VendorMessage,
};
use interfaces::iapi::{
    self, BchPdu, CarrierSlot, DciPdu, DlConfigReq, DlPdu, DlPduBody, DlschCodeword, DlschPdu, IapiMessage,
    PduGroup,
};
use tracing::{debug, error};

use super::{rb_bitmap, to_phy};
use crate::context::PhyContext;
use crate::FapiError;

const MAX_DMRS_PORTS: u16 = 12;
const MAX_DL_CODEWORDS: usize = 2;
const MAX_DL_PTRS_PORTS: u8 = 2;
/// MIB bits carried in the low three bytes of the BCH payload
const MIB_MASK: u32 = 0x00FF_FFFF;

pub(crate) fn pdu_groups(groups: &[UeGroup]) -> Vec<PduGroup> {
    groups
        .iter()
        .map(|g| PduGroup { ue_ids: g.pdu_idx.iter().map(|&i| u16::from(i)).collect() })
        .collect()
}

/// Vendor DCI record of a PDCCH PDU; only its first DCI is carried
pub(crate) fn dci_pdu(pdcch: &PdcchPdu, use_vendor_epre: bool) -> Result<DciPdu, FapiError> {
    let dci = pdcch.dl_dci.first().ok_or_else(|| {
        FapiError::TranslationFailure(format!("PDCCH PDU on bwp {} carries no DCI", pdcch.bwp_start))
    })?;
    let f = &pdcch.freq_domain_resource;
    let mut out = DciPdu {
        bwp_size: pdcch.bwp_size,
        bwp_start: pdcch.bwp_start,
        subc_spacing: pdcch.subcarrier_spacing,
        cp_type: pdcch.cyclic_prefix,
        freq_domain: [
            u32::from_le_bytes([f[0], f[1], f[2], f[3]]),
            u32::from_le_bytes([f[4], f[5], 0, 0]),
        ],
        start_sym_index: pdcch.start_symbol_index,
        nr_of_symbols: pdcch.duration_symbols,
        cce_to_reg_type: pdcch.cce_reg_mapping_type,
        reg_bundle_size: pdcch.reg_bundle_size,
        interleaver_size: pdcch.interleaver_size,
        coreset_type: pdcch.coreset_type,
        shift_index: pdcch.shift_index,
        precoder_granularity: pdcch.precoder_granularity,
        cce_start_index: dci.cce_index,
        agg_level: dci.aggregation_level,
        n_id: dci.scrambling_id,
        scid: dci.scrambling_id,
        scrambling_rnti: dci.scrambling_rnti,
        rnti: dci.rnti,
        total_bits: dci.payload_size_bits,
        dci_payload: dci.payload.clone(),
        ..Default::default()
    };
    if !use_vendor_epre {
        out.epre_ratio_of_pdcch_to_ssb = epre_ratio_pdcch_to_ssb(dci.beta_pdcch_1_0);
        out.epre_ratio_of_dmrs_to_ssb = epre_ratio_dmrs_to_ssb(dci.power_control_offset_ss);
    }
    Ok(out)
}

fn dlsch_pdu(pdsch: &PdschPdu, use_vendor_epre: bool) -> DlschPdu {
    let port_index: Vec<u8> = (0..MAX_DMRS_PORTS)
        .filter(|i| (pdsch.dmrs_ports >> i) & 1 == 1)
        .take(pdsch.nr_of_layers as usize)
        .map(|i| i as u8)
        .collect();

    let bitmap = rb_bitmap(&pdsch.rb_bitmap);
    let nr_of_ptrs_ports = pdsch.ptrs_port_index.count_ones() as u8;
    let mut out = DlschPdu {
        ue_id: pdsch.pdu_index,
        rnti: pdsch.rnti,
        bwp_size: pdsch.bwp_size,
        bwp_start: pdsch.bwp_start,
        subc_spacing: pdsch.subcarrier_spacing,
        cp_type: pdsch.cyclic_prefix,
        codewords: pdsch
            .codewords
            .iter()
            .take(MAX_DL_CODEWORDS)
            .map(|cw| DlschCodeword {
                code_rate: cw.target_code_rate,
                mod_order: cw.qam_mod_order,
                mcs: cw.mcs_index,
                mcs_table: cw.mcs_table,
                rv: cw.rv_index,
                tb_size: cw.tb_size,
            })
            .collect(),
        n_id: pdsch.data_scrambling_id,
        nr_of_layers: pdsch.nr_of_layers,
        transmission_scheme: pdsch.transmission_scheme,
        ref_point: pdsch.ref_point,
        dmrs_symb_pos: pdsch.dl_dmrs_symb_pos,
        dmrs_config_type: pdsch.dmrs_config_type,
        dmrs_scrambling_id: pdsch.dl_dmrs_scrambling_id,
        scid: pdsch.scid,
        nr_of_cdm_groups: pdsch.num_dmrs_cdm_grps_no_data,
        nr_of_antenna_ports: pdsch.nr_of_layers,
        nr_of_tx_ru: port_index.len() as u8,
        port_index,
        resource_alloc_type: pdsch.resource_alloc,
        rbg_index: rbg::calc_rbg_index(&bitmap, pdsch.bwp_start, pdsch.bwp_size, RbgBitOrder::MsbFirst),
        nr_of_rbgs: rbg::num_rbgs(pdsch.bwp_start, pdsch.bwp_size),
        rbg_size: rbg::rbg_size(pdsch.bwp_size),
        rb_start: pdsch.rb_start,
        rb_size: pdsch.rb_size,
        vrb_to_prb_mapping: pdsch.vrb_to_prb_mapping,
        start_sym_index: pdsch.start_symb_index,
        nr_of_symbols: pdsch.nr_of_symbols,
        mapping_type: pdsch.mapping_type,
        nr_of_dmrs_symbols: pdsch.nr_of_dmrs_symbols,
        dmrs_add_pos: pdsch.dmrs_add_pos,
        pmi: pdsch.precoding.prgs.first().map(|p| p.pm_idx).unwrap_or(0),
        ptrs_present: (pdsch.pdu_bitmap & 0x1) as u8,
        nr_of_ptrs_ports,
        ptrs_port_index: (0..nr_of_ptrs_ports.min(MAX_DL_PTRS_PORTS)).collect(),
        ptrs_time_density: pdsch.ptrs_time_density,
        ptrs_freq_density: pdsch.ptrs_freq_density,
        ptrs_re_offset: pdsch.ptrs_re_offset,
        nr_of_dmrs_ass_ptrs: [1, 1],
        n1n2: 0x201,
        epre_ratio_to_ptrs: pdsch.n_epre_ratio_of_pdsch_to_ptrs,
        ..Default::default()
    };
    if !use_vendor_epre {
        out.epre_ratio_of_dmrs_to_ssb = epre_ratio_dmrs_to_ssb(pdsch.power_control_offset_ss);
        out.epre_ratio_of_pdsch_to_ssb = epre_ratio_pdsch_to_ssb(pdsch.power_control_offset);
    }
    out
}

fn bch_pdu(ssb: &SsbPdu, sub_c_common: u8) -> BchPdu {
    BchPdu {
        mib: ssb.bch_payload & MIB_MASK,
        ssb_block_index: ssb.ssb_block_index,
        ssb_subc_offset: ssb.ssb_subcarrier_offset,
        ssb_prb_offset: ssb_prb_offset(ssb.ssb_offset_point_a, sub_c_common),
        beta_pss: ssb.beta_pss,
        phy_cell_id: ssb.phy_cell_id,
        precoder_en: 0,
    }
}

fn csi_rs_pdu(csi: &CsiRsPdu, use_vendor_epre: bool) -> iapi::CsiRsPdu {
    iapi::CsiRsPdu {
        bwp_size: csi.bwp_size,
        bwp_start: csi.bwp_start,
        subc_spacing: csi.subcarrier_spacing,
        cp_type: csi.cyclic_prefix,
        start_rb: csi.start_rb,
        nr_of_rbs: csi.nr_of_rbs,
        csi_type: csi.csi_type,
        row: csi.row,
        freq_domain: csi.freq_domain,
        symb_l0: csi.symb_l0,
        symb_l1: csi.symb_l1,
        cdm_type: csi.cdm_type,
        freq_density: csi.freq_density,
        scr_id: csi.scram_id,
        epre_ratio_to_ssb: if use_vendor_epre { 0 } else { epre_ratio_dmrs_to_ssb(csi.power_control_offset_ss) },
    }
}

/// Overlay the per-TTI vendor fields; PDU overrides are matched by index
fn apply_vendor(out: &mut DlConfigReq, v: &DlTtiReqVendor, use_vendor_epre: bool) {
    out.slot.sfn_slot.sym = v.sym;
    out.lte_crs_present = v.lte_crs_present;
    out.lte_crs_carrier_freq = v.lte_crs_carrier_freq_dl;
    out.lte_crs_carrier_bandwidth = v.lte_crs_carrier_bandwidth_dl;
    out.lte_crs_nr_of_crs_ports = v.lte_crs_nr_of_crs_ports;
    out.lte_crs_v_shift = v.lte_crs_v_shift;
    out.pdcch_precoder_en = v.pdcch_precoder_en;
    out.ssb_precoder_en = v.ssb_precoder_en;

    for (idx, pdu) in out.pdus.iter_mut().enumerate() {
        match (&mut pdu.body, v.pdus.get(idx)) {
            (DlPduBody::Dci(dci), Some(DlPduVendor::Pdcch { dl_dci })) => {
                if let (true, Some(vd)) = (use_vendor_epre, dl_dci.first()) {
                    dci.epre_ratio_of_pdcch_to_ssb = vd.epre_ratio_of_pdcch_to_ssb;
                    dci.epre_ratio_of_dmrs_to_ssb = vd.epre_ratio_of_dmrs_to_ssb;
                }
            }
            (DlPduBody::Dlsch(dlsch), Some(DlPduVendor::Pdsch(vp))) => {
                dlsch.nr_of_antenna_ports = vp.nr_of_antenna_ports;
                dlsch.tx_ru_idx = vp.tx_ru_idx.clone();
                if use_vendor_epre {
                    dlsch.epre_ratio_of_dmrs_to_ssb = vp.epre_ratio_of_dmrs_to_ssb;
                    dlsch.epre_ratio_of_pdsch_to_ssb = vp.epre_ratio_of_pdsch_to_ssb;
                }
            }
            (DlPduBody::CsiRs(csi), Some(DlPduVendor::CsiRs { epre_ratio_to_ssb })) => {
                if use_vendor_epre {
                    csi.epre_ratio_to_ssb = *epre_ratio_to_ssb;
                }
            }
            (DlPduBody::Bch(bch), _) => bch.precoder_en = v.ssb_precoder_en,
            _ => {}
        }
    }
}

/// Translate DL_TTI.request and queue the vendor DL_CONFIG_REQ
pub fn dl_tti_request(
    ctx: &PhyContext,
    phy_id: u8,
    req: &DlTtiRequest,
    vendor: Option<&VendorMessage>,
    urllc: bool,
) -> Result<(), FapiError> {
    let mut inst = ctx.phy(phy_id)?.lock();
    inst.stats.fapi.dl_tti_req += 1;
    let use_vendor_epre = inst.config.use_vendor_epre_x_ssb;
    let sub_c_common = inst.config.sub_c_common;

    let mut out = DlConfigReq {
        slot: CarrierSlot::new(inst.phy_id, req.sfn, req.slot as u8, 0),
        groups: pdu_groups(&req.ue_groups),
        ..Default::default()
    };

    for pdu in &req.pdus {
        inst.stats.fapi.dl_tti_pdus += 1;
        let body = match pdu {
            DlTtiPdu::Pdcch(p) => {
                inst.stats.fapi.dl_tti_pdcch_pdus += 1;
                out.n_dci += 1;
                inst.stats.iapi.dl_tti_pdcch_pdus += 1;
                DlPduBody::Dci(dci_pdu(p, use_vendor_epre)?)
            }
            DlTtiPdu::Pdsch(p) => {
                inst.stats.fapi.dl_tti_pdsch_pdus += 1;
                inst.stats.iapi.dl_tti_pdsch_pdus += 1;
                DlPduBody::Dlsch(dlsch_pdu(p, use_vendor_epre))
            }
            DlTtiPdu::Ssb(p) => {
                inst.stats.fapi.dl_tti_ssb_pdus += 1;
                inst.stats.iapi.dl_tti_ssb_pdus += 1;
                DlPduBody::Bch(bch_pdu(p, sub_c_common))
            }
            DlTtiPdu::CsiRs(p) => {
                inst.stats.fapi.dl_tti_csi_rs_pdus += 1;
                inst.stats.iapi.dl_tti_csi_rs_pdus += 1;
                DlPduBody::CsiRs(csi_rs_pdu(p, use_vendor_epre))
            }
            DlTtiPdu::Unknown(pdu_type) => {
                error!("[FAPI2PHY] phy {} DL_TTI.request: invalid PDU type {}", phy_id, pdu_type);
                return Err(FapiError::TranslationFailure(format!("DL_TTI.request PDU type {}", pdu_type)));
            }
        };
        let size = body.wire_size();
        out.message_len += u32::from(size);
        out.pdus.push(DlPdu { size, body });
        inst.stats.iapi.dl_tti_pdus += 1;
    }

    if let Some(v) = vendor {
        apply_vendor(&mut out, &v.p7_req_vendor.dl_tti_req, use_vendor_epre);
    }

    debug!("[FAPI2PHY] phy {} DL_TTI.request {}.{} sym {}: {} pdus ({} dci) urllc {}",
           phy_id, req.sfn, req.slot, out.slot.sfn_slot.sym, out.pdus.len(), out.n_dci, urllc);
    to_phy(ctx, IapiMessage::DlConfigReq(out), urllc)?;
    inst.stats.iapi.dl_config_req += 1;
    Ok(())
}
