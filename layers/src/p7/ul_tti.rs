//! UL_TTI.request
//!
//! Besides the vendor UL_CONFIG_REQ, every PUSCH / PUCCH / SRS PDU leaves a
//! correlation record in the cell's UL slot table under (class, frame,
//! slot, symbol). PRACH PDUs are only counted; the PHY detects preambles
//! on its own once `rach_present` is set.

use common::rbg::{self, RbgBitOrder};
use common::{alpha_scaling, pow2};
use interfaces::fapi::{pusch_bitmap, PucchPdu, PuschPdu, SrsPdu, UlTtiPdu, UlTtiRequest, VendorMessage};
use interfaces::iapi::{self, CarrierSlot, IapiMessage, UlConfigReq, UlPdu, UlcchUciPdu, UlschPdu};
use tracing::{debug, error};

use super::dl_tti::pdu_groups;
use super::{rb_bitmap, to_phy};
use crate::context::{PhyConfig, PhyContext};
use crate::stats::PhyStats;
use crate::ul_slot::{PucchInfo, PuschInfo, RachInfo, SrsInfo, UlSlotKey};
use crate::FapiError;

const MAX_DMRS_PORTS: u16 = 12;
const MAX_UL_LAYERS: usize = 4;

/// Resources that make format 0/1 PUCCH PDUs share one group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PucchResource {
    initial_cyclic_shift: u16,
    nr_of_symbols: u8,
    start_symbol_index: u8,
    time_domain_occ_idx: u8,
}

impl PucchResource {
    fn of(pdu: &PucchPdu) -> Self {
        Self {
            initial_cyclic_shift: pdu.initial_cyclic_shift,
            nr_of_symbols: pdu.nr_of_symbols,
            start_symbol_index: pdu.start_symbol_index,
            time_domain_occ_idx: pdu.time_domain_occ_idx,
        }
    }
}

/// Group ids handed out within one request
#[derive(Debug, Default)]
struct PucchGroups(Vec<PucchResource>);

impl PucchGroups {
    fn group_id(&mut self, resource: PucchResource) -> u8 {
        match self.0.iter().position(|r| *r == resource) {
            Some(id) => id as u8,
            None => {
                self.0.push(resource);
                (self.0.len() - 1) as u8
            }
        }
    }
}

/// What the request schedules, written to the slot table once translation succeeded
#[derive(Debug, Default)]
struct Scheduled {
    pusch: Vec<PuschInfo>,
    pucch: Vec<PucchInfo>,
    srs: Vec<SrsInfo>,
}

/// Vendor MCS table and transform-precoding flag; tables 3 and 4 are the
/// transform-precoded variants of tables 0 and 2
fn mcs_table(pdu: &PuschPdu) -> (u8, u8) {
    let precoded = u8::from(pdu.transform_precoding == 0);
    match pdu.mcs_table {
        3 => (0, 1),
        4 => (2, 1),
        t => (t, precoded),
    }
}

fn ulsch_pdu(pdu: &PuschPdu, config: &PhyConfig) -> UlschPdu {
    let (mcs_table, trans_precode) = mcs_table(pdu);
    let port_index = (0..MAX_DMRS_PORTS)
        .filter(|i| (pdu.dmrs_ports >> i) & 1 == 1)
        .take((pdu.nr_of_layers as usize).min(MAX_UL_LAYERS))
        .map(|i| i as u8)
        .collect();
    let bitmap = rb_bitmap(&pdu.rb_bitmap);
    let rx_ant = config.n_nr_of_rx_ant as u8;

    let mut out = UlschPdu {
        ue_id: pdu.handle as u16,
        rnti: pdu.rnti,
        bwp_size: pdu.bwp_size,
        bwp_start: pdu.bwp_start,
        subc_spacing: pdu.subcarrier_spacing,
        cp_type: pdu.cyclic_prefix,
        code_rate: pdu.target_code_rate,
        mod_order: pdu.qam_mod_order,
        mcs: pdu.mcs_index,
        mcs_table,
        trans_precode,
        transform_precode: pdu.transform_precoding,
        n_id: pdu.data_scrambling_id,
        nr_of_layers: pdu.nr_of_layers,
        dmrs_symb_pos: pdu.ul_dmrs_symb_pos,
        dmrs_config_type: pdu.dmrs_config_type,
        dmrs_scrambling_id: pdu.ul_dmrs_scrambling_id,
        pusch_identity: pdu.pusch_identity,
        scid: pdu.scid,
        nr_of_cdm_groups: pdu.num_dmrs_cdm_grps_no_data,
        port_index,
        resource_alloc_type: pdu.resource_alloc,
        rbg_index: rbg::calc_rbg_index(&bitmap, pdu.bwp_start, pdu.bwp_size, RbgBitOrder::LsbFirst),
        nr_of_rbgs: rbg::num_rbgs(pdu.bwp_start, pdu.bwp_size),
        rbg_size: rbg::rbg_size(pdu.bwp_size),
        rb_start: pdu.rb_start,
        rb_size: pdu.rb_size,
        vrb_to_prb_mapping: pdu.vrb_to_prb_mapping,
        freq_hopping: pdu.frequency_hopping,
        start_sym_index: pdu.start_symb_index,
        nr_of_symbols: pdu.nr_of_symbols,
        mapping_type: pdu.mapping_type,
        nr_of_dmrs_symbols: pdu.nr_of_dmrs_symbols,
        dmrs_add_pos: pdu.dmrs_add_pos,
        pi2_bpsk: pdu.tp_pi2_bpsk,
        nr_of_antenna_ports: rx_ant,
        nr_of_rx_ru: rx_ant,
        ..Default::default()
    };

    if pdu.pdu_bitmap & pusch_bitmap::DATA != 0 {
        let data = &pdu.pusch_data;
        out.rv = data.rv_index;
        out.harq_process_id = data.harq_process_id;
        out.ndi = data.new_data_indicator;
        out.tb_size = data.tb_size;
    }
    if pdu.pdu_bitmap & pusch_bitmap::UCI != 0 {
        let uci = &pdu.pusch_uci;
        out.n_ack = uci.harq_ack_bit_length;
        out.n_csi_part1 = uci.csi_part1_bit_length;
        out.n_csi_part2 = uci.csi_part2_bit_length;
        out.alpha_scaling = alpha_scaling(uci.alpha_scaling);
        out.beta_offset_ack = uci.beta_offset_harq_ack;
        out.beta_offset_csi1 = uci.beta_offset_csi1;
        out.beta_offset_csi2 = uci.beta_offset_csi2;
    }
    if pdu.pdu_bitmap & pusch_bitmap::PTRS != 0 {
        let ptrs = &pdu.pusch_ptrs;
        if ptrs.ptrs_time_density <= 2 {
            out.ptrs_time_density = pow2(ptrs.ptrs_time_density);
        }
        if ptrs.ptrs_freq_density <= 1 {
            out.ptrs_freq_density = pow2(ptrs.ptrs_freq_density + 1);
        }
        // A single PTRS port is supported
        if let Some(info) = ptrs.ptrs_info.first() {
            out.nr_of_ptrs_ports = 1;
            if info.ptrs_port_index & 0x1 != 0 {
                out.ptrs_port_index.push(0);
            }
            out.ptrs_re_offset = info.ptrs_re_offset;
        }
    }
    if pdu.pdu_bitmap & pusch_bitmap::PTRS_PRESENT != 0 {
        out.ptrs_present = 1;
    }
    out
}

fn ulcch_uci_pdu(pdu: &PucchPdu, group_id: u8, config: &PhyConfig) -> UlcchUciPdu {
    UlcchUciPdu {
        ue_id: pdu.handle as u16,
        rnti: pdu.rnti,
        bwp_size: pdu.bwp_size,
        bwp_start: pdu.bwp_start,
        subc_spacing: pdu.subcarrier_spacing,
        cp_type: pdu.cyclic_prefix,
        format: pdu.format_type,
        // pi/2 BPSK or QPSK
        mod_type: if pdu.pi2_bpsk != 0 { 1 } else { 2 },
        start_prb: pdu.prb_start,
        prb_size: pdu.prb_size,
        start_sym_index: pdu.start_symbol_index,
        symbols: pdu.nr_of_symbols,
        freq_hop_flag: pdu.freq_hop_flag,
        second_hop_prb: pdu.second_hop_prb,
        group_hop_flag: pdu.group_hop_flag,
        sequence_hop_flag: pdu.sequence_hop_flag,
        hopping_id: pdu.hopping_id,
        m0: pdu.initial_cyclic_shift,
        n_id: pdu.data_scrambling_id,
        fmt1_orthogonal_cover_code: pdu.time_domain_occ_idx,
        fmt4_orthogonal_cover_idx: pdu.pre_dft_occ_idx,
        fmt4_orthogonal_cover_len: pdu.pre_dft_occ_len,
        add_dmrs_flag: pdu.add_dmrs_flag,
        dmrs_scrambling_id: pdu.dmrs_scrambling_id,
        sr_flag: pdu.sr_flag,
        bit_len_harq: pdu.bit_len_harq,
        bit_len_csi_part1: pdu.bit_len_csi_part1,
        bit_len_csi_part2: pdu.bit_len_csi_part2,
        group_id,
        nr_of_rx_ru: config.n_nr_of_rx_ant as u8,
    }
}

fn srs_pdu(pdu: &SrsPdu, config: &PhyConfig) -> iapi::SrsPdu {
    // Last symbol of the slot counted back
    let last_symbol: u8 = if pdu.cyclic_prefix != 0 { 11 } else { 13 };
    iapi::SrsPdu {
        ue_id: pdu.handle as u16,
        rnti: pdu.rnti,
        bwp_size: pdu.bwp_size,
        bwp_start: pdu.bwp_start,
        subc_spacing: pdu.subcarrier_spacing,
        cp_type: pdu.cyclic_prefix,
        nr_of_srs_ports: pow2(pdu.num_ant_ports),
        nr_of_symbols: pow2(pdu.num_symbols),
        repetition: pow2(pdu.num_repetitions),
        start_pos: last_symbol.saturating_sub(pdu.time_start_position),
        config_index: pdu.config_index,
        sequence_id: pdu.sequence_id,
        bandwidth_index: pdu.bandwidth_index,
        comb: if pdu.comb_size != 0 { 4 } else { 2 },
        comb_offset: pdu.comb_offset,
        cyclic_shift: pdu.cyclic_shift,
        freq_position: pdu.frequency_position,
        freq_shift: pdu.frequency_shift,
        freq_hopping: pdu.frequency_hopping,
        group_or_seq_hopping: pdu.group_or_sequence_hopping,
        resource_type: pdu.resource_type,
        t_srs: pdu.t_srs,
        t_offset: pdu.t_offset,
        nr_of_rx_ru: config.n_nr_of_rx_ant as u8,
    }
}

fn translate(
    req: &UlTtiRequest,
    config: &PhyConfig,
    stats: &mut PhyStats,
    out: &mut UlConfigReq,
    scheduled: &mut Scheduled,
) -> Result<(), FapiError> {
    let mut groups = PucchGroups::default();
    for pdu in &req.pdus {
        stats.fapi.ul_tti_pdus += 1;
        let ul = match pdu {
            UlTtiPdu::Prach(_) => {
                stats.fapi.ul_tti_prach_pdus += 1;
                continue;
            }
            UlTtiPdu::Pusch(p) => {
                stats.fapi.ul_tti_pusch_pdus += 1;
                scheduled.pusch.push(PuschInfo {
                    handle: p.handle,
                    harq_process_id: p.pusch_data.harq_process_id,
                    ..Default::default()
                });
                stats.iapi.ul_tti_pusch_pdus += 1;
                UlPdu::Ulsch(ulsch_pdu(p, config))
            }
            UlTtiPdu::Pucch(p) => {
                stats.fapi.ul_tti_pucch_pdus += 1;
                let group_id = groups.group_id(PucchResource::of(p));
                scheduled.pucch.push(PucchInfo { handle: p.handle, pucch_format: p.format_type });
                stats.iapi.ul_tti_pucch_pdus += 1;
                UlPdu::UlcchUci(ulcch_uci_pdu(p, group_id, config))
            }
            UlTtiPdu::Srs(p) => {
                stats.fapi.ul_tti_srs_pdus += 1;
                out.n_srs += 1;
                scheduled.srs.push(SrsInfo { handle: p.handle });
                stats.iapi.ul_tti_srs_pdus += 1;
                UlPdu::Srs(srs_pdu(p, config))
            }
            UlTtiPdu::Unknown(pdu_type) => {
                return Err(FapiError::TranslationFailure(format!("UL_TTI.request PDU type {}", pdu_type)));
            }
        };
        out.pdus.push(ul);
        stats.iapi.ul_tti_pdus += 1;
    }
    Ok(())
}

/// Translate UL_TTI.request, queue the vendor UL_CONFIG_REQ and record
/// the scheduled UEs for the matching indications
pub fn ul_tti_request(
    ctx: &PhyContext,
    phy_id: u8,
    req: &UlTtiRequest,
    vendor: Option<&VendorMessage>,
    urllc: bool,
) -> Result<(), FapiError> {
    let entry = ctx.phy(phy_id)?;
    let mut inst = entry.lock();
    inst.stats.fapi.ul_tti_req += 1;
    let config = inst.config.clone();
    let sym = vendor.map(|v| v.p7_req_vendor.ul_tti_req.sym).unwrap_or(0);

    let mut out = UlConfigReq {
        slot: CarrierSlot::new(inst.phy_id, req.sfn, req.slot as u8, sym),
        rach_present: req.rach_present,
        n_ulsch: req.n_ulsch,
        n_ulcch: req.n_ulcch,
        groups: pdu_groups(&req.ue_groups),
        ..Default::default()
    };
    let mut scheduled = Scheduled::default();
    if let Err(e) = translate(req, &config, &mut inst.stats, &mut out, &mut scheduled) {
        error!("[FAPI2PHY] phy {} UL_TTI.request {}.{}: {}", phy_id, req.sfn, req.slot, e);
        return Err(e);
    }

    debug!("[FAPI2PHY] phy {} UL_TTI.request {}.{} sym {}: {} pusch {} pucch {} srs rach {}",
           phy_id, req.sfn, req.slot, sym, scheduled.pusch.len(), scheduled.pucch.len(),
           scheduled.srs.len(), req.rach_present);
    to_phy(ctx, IapiMessage::UlConfigReq(out), urllc)?;
    inst.stats.iapi.ul_config_req += 1;

    let key = UlSlotKey::new(urllc, req.sfn, req.slot, sym);
    entry.ul_slots.record(key, |info| {
        if req.rach_present != 0 {
            info.rach_presence = true;
            info.rach_info = RachInfo { phy_cell_id: config.phy_cell_id };
        }
        scheduled.pusch.into_iter().for_each(|p| info.add_pusch(p));
        scheduled.pucch.into_iter().for_each(|p| info.add_pucch(p));
        scheduled.srs.into_iter().for_each(|s| info.add_srs(s));
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use interfaces::fapi::{PrachPdu, PtrsInfo, PuschPtrs, PuschUci};

    use super::*;
    use crate::context::test_support::Harness;
    use crate::p7::test_support::{pusch, running};

    fn sent(h: &Harness) -> UlConfigReq {
        h.flush();
        match h.phy_messages().pop() {
            Some(IapiMessage::UlConfigReq(req)) => req,
            other => panic!("expected UL_CONFIG_REQ, got {:?}", other),
        }
    }

    fn pucch(handle: u32, format_type: u8, initial_cyclic_shift: u16) -> UlTtiPdu {
        UlTtiPdu::Pucch(PucchPdu {
            handle,
            format_type,
            initial_cyclic_shift,
            nr_of_symbols: 2,
            start_symbol_index: 12,
            ..Default::default()
        })
    }

    #[test]
    fn test_records_scheduled_pusch() {
        let h = Harness::new();
        running(&h, 0);
        let req = UlTtiRequest { sfn: 10, slot: 3, pdus: vec![pusch(5, 1), pusch(9, 7)], ..Default::default() };
        ul_tti_request(&h.ctx, 0, &req, None, false).unwrap();

        let out = sent(&h);
        assert_eq!(out.slot, CarrierSlot::new(0, 10, 3, 0));
        assert_eq!(out.pdus.len(), 2);
        let UlPdu::Ulsch(ulsch) = &out.pdus[1] else { panic!("expected ULSCH") };
        assert_eq!(ulsch.ue_id, 9);
        assert_eq!(ulsch.harq_process_id, 7);
        assert_eq!(ulsch.tb_size, 1024);
        assert_eq!(ulsch.nr_of_rx_ru, 4);
        assert_eq!(ulsch.port_index, vec![0]);
        assert_eq!(ulsch.rbg_size, 8);

        let key = UlSlotKey::new(false, 10, 3, 0);
        let table = &h.ctx.phy(0).unwrap().ul_slots;
        let harq = table.lookup(key, |info| info.pusch_mut(9).map(|p| p.harq_process_id)).unwrap();
        assert_eq!(harq, Some(7));
        assert!(table.lookup(UlSlotKey::new(true, 10, 3, 0), |_| ()).is_err());
    }

    #[test]
    fn test_prach_counted_and_rach_recorded() {
        let h = Harness::new();
        running(&h, 2);
        h.ctx.phy(2).unwrap().lock().config.phy_cell_id = 500;
        let req = UlTtiRequest {
            sfn: 1,
            slot: 9,
            rach_present: 1,
            pdus: vec![UlTtiPdu::Prach(PrachPdu::default())],
            ..Default::default()
        };
        ul_tti_request(&h.ctx, 2, &req, None, false).unwrap();

        let out = sent(&h);
        assert!(out.pdus.is_empty());
        assert_eq!(out.rach_present, 1);
        let rach = h.ctx.phy(2).unwrap().ul_slots
            .lookup(UlSlotKey::new(false, 1, 9, 0), |info| (info.rach_presence, info.rach_info.phy_cell_id))
            .unwrap();
        assert_eq!(rach, (true, 500));
        let stats = h.ctx.phy(2).unwrap().lock().stats.clone();
        assert_eq!(stats.fapi.ul_tti_prach_pdus, 1);
        assert_eq!(stats.iapi.ul_tti_pdus, 0);
    }

    #[test]
    fn test_pucch_groups_share_resources() {
        let h = Harness::new();
        running(&h, 0);
        let req = UlTtiRequest {
            sfn: 2,
            slot: 4,
            pdus: vec![pucch(1, 0, 0), pucch(2, 1, 6), pucch(3, 0, 0), pucch(4, 2, 3)],
            ..Default::default()
        };
        ul_tti_request(&h.ctx, 0, &req, None, false).unwrap();

        let groups: Vec<u8> = sent(&h)
            .pdus
            .iter()
            .map(|p| match p {
                UlPdu::UlcchUci(u) => u.group_id,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(groups, vec![0, 1, 0, 2]);
        let fmt = h.ctx.phy(0).unwrap().ul_slots
            .lookup(UlSlotKey::new(false, 2, 4, 0), |info| info.pucch(2).map(|p| p.pucch_format))
            .unwrap();
        assert_eq!(fmt, Some(1));
    }

    #[test]
    fn test_pusch_field_conversions() {
        let mut rb_bitmap = vec![0u8; 36];
        rb_bitmap[0] = 0xFF;
        let pdu = PuschPdu {
            pdu_bitmap: pusch_bitmap::DATA | pusch_bitmap::UCI | pusch_bitmap::PTRS,
            handle: 0x1_0003,
            bwp_size: 106,
            mcs_table: 3,
            transform_precoding: 1,
            nr_of_layers: 2,
            dmrs_ports: 0b0110,
            rb_bitmap,
            pusch_uci: PuschUci { harq_ack_bit_length: 2, alpha_scaling: 2, ..Default::default() },
            pusch_ptrs: PuschPtrs {
                ptrs_info: vec![PtrsInfo { ptrs_port_index: 1, ptrs_dmrs_port: 0, ptrs_re_offset: 2 }],
                ptrs_time_density: 2,
                ptrs_freq_density: 1,
                ul_ptrs_power: 0,
            },
            ..Default::default()
        };
        let config = PhyConfig { n_nr_of_rx_ant: 2, ..Default::default() };
        let out = ulsch_pdu(&pdu, &config);
        assert_eq!(out.ue_id, 3);
        assert_eq!((out.mcs_table, out.trans_precode), (0, 1));
        assert_eq!(out.port_index, vec![1, 2]);
        // PRBs 0-7 fill RBG 0 of size 8
        assert_eq!(out.rbg_index, 0x1);
        assert_eq!(out.nr_of_rbgs, 14);
        assert_eq!(out.n_ack, 2);
        assert_eq!(out.alpha_scaling, 205);
        assert_eq!(out.ptrs_time_density, 4);
        assert_eq!(out.ptrs_freq_density, 4);
        assert_eq!(out.nr_of_ptrs_ports, 1);
        assert_eq!(out.ptrs_port_index, vec![0]);
        assert_eq!(out.ptrs_re_offset, 2);
        assert_eq!(out.ptrs_present, 0);

        let plain = PuschPdu { mcs_table: 1, transform_precoding: 0, ..Default::default() };
        assert_eq!(mcs_table(&plain), (1, 1));
        let table4 = PuschPdu { mcs_table: 4, transform_precoding: 1, ..Default::default() };
        assert_eq!(mcs_table(&table4), (2, 1));
    }

    #[test]
    fn test_srs_fields_and_vendor_symbol() {
        let h = Harness::new();
        running(&h, 0);
        let srs = SrsPdu {
            handle: 12,
            num_ant_ports: 1,
            num_symbols: 2,
            num_repetitions: 0,
            time_start_position: 3,
            comb_size: 1,
            ..Default::default()
        };
        let mut vendor = VendorMessage::default();
        vendor.p7_req_vendor.ul_tti_req.sym = 7;
        let req = UlTtiRequest { sfn: 3, slot: 1, pdus: vec![UlTtiPdu::Srs(srs)], ..Default::default() };
        ul_tti_request(&h.ctx, 0, &req, Some(&vendor), true).unwrap();

        let out = sent(&h);
        assert_eq!(out.slot.sfn_slot.sym, 7);
        assert_eq!(out.n_srs, 1);
        let UlPdu::Srs(s) = &out.pdus[0] else { panic!("expected SRS") };
        assert_eq!((s.nr_of_srs_ports, s.nr_of_symbols, s.repetition), (2, 4, 1));
        assert_eq!(s.start_pos, 10);
        assert_eq!(s.comb, 4);

        let table = &h.ctx.phy(0).unwrap().ul_slots;
        assert!(table.lookup(UlSlotKey::new(true, 3, 1, 7), |info| info.srs(12).is_some()).unwrap());
        assert!(table.lookup(UlSlotKey::new(true, 3, 1, 0), |_| ()).is_err());
    }

    #[test]
    fn test_unknown_pdu_records_nothing() {
        let h = Harness::new();
        running(&h, 0);
        let req = UlTtiRequest { sfn: 10, slot: 3, pdus: vec![pusch(5, 1), UlTtiPdu::Unknown(7)], ..Default::default() };
        let err = ul_tti_request(&h.ctx, 0, &req, None, false).unwrap_err();
        assert!(matches!(err, FapiError::TranslationFailure(_)));
        assert!(h.ctx.fapi2phy.is_empty(false));
        assert!(h.ctx.phy(0).unwrap().ul_slots.lookup(UlSlotKey::new(false, 10, 3, 0), |_| ()).is_err());
    }
}
