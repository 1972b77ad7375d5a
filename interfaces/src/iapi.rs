//! Vendor PHY Message Model
//!
//! Typed messages of the PHY-facing (IAPI) interface. Layouts follow the
//! vendor conventions: RBG bitmaps instead of per-PRB bitmaps, linear EPRE
//! ratios, power-of-two fields already expanded and two codeword payloads
//! per TX record.

use common::SfnSlot;
use serde::{Deserialize, Serialize};

use crate::message_types::IapiMsgType;

/// Maximum number of antennas a carrier can address
pub const MAX_NUM_ANT: usize = 64;
/// SNR block width of an SRS estimate row
pub const SRS_SNR_BLOCK_WIDTH: usize = 68;

/// Any message carried on the PHY-facing channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IapiMessage {
    ConfigReq(ConfigReq),
    ConfigResp(StatusResp),
    StartReq(StartReq),
    StartResp(StatusResp),
    StopReq(StopReq),
    StopResp(StatusResp),
    ShutdownReq(ShutdownReq),
    ShutdownResp(StatusResp),
    DlConfigReq(DlConfigReq),
    UlConfigReq(UlConfigReq),
    UlDciReq(UlDciReq),
    TxReq(TxReq),
    RxUlschInd(RxUlschInd),
    RxUlschUciInd(RxUlschUciInd),
    CrcInd(CrcInd),
    UciInd(UciInd),
    RxRachInd(RxRachInd),
    RxSrsInd(RxSrsInd),
    SlotInd(SlotInd),
    ErrInd(ErrInd),
}

impl IapiMessage {
    /// Type tag written into the element header
    pub fn msg_type(&self) -> IapiMsgType {
        match self {
            IapiMessage::ConfigReq(_) => IapiMsgType::ConfigReq,
            IapiMessage::ConfigResp(_) => IapiMsgType::ConfigResp,
            IapiMessage::StartReq(_) => IapiMsgType::StartReq,
            IapiMessage::StartResp(_) => IapiMsgType::StartResp,
            IapiMessage::StopReq(_) => IapiMsgType::StopReq,
            IapiMessage::StopResp(_) => IapiMsgType::StopResp,
            IapiMessage::ShutdownReq(_) => IapiMsgType::ShutdownReq,
            IapiMessage::ShutdownResp(_) => IapiMsgType::ShutdownResp,
            IapiMessage::DlConfigReq(_) => IapiMsgType::DlConfigReq,
            IapiMessage::UlConfigReq(_) => IapiMsgType::UlConfigReq,
            IapiMessage::UlDciReq(_) => IapiMsgType::UlDciReq,
            IapiMessage::TxReq(_) => IapiMsgType::TxReq,
            IapiMessage::RxUlschInd(_) => IapiMsgType::RxUlschInd,
            IapiMessage::RxUlschUciInd(_) => IapiMsgType::RxUlschUciInd,
            IapiMessage::CrcInd(_) => IapiMsgType::CrcInd,
            IapiMessage::UciInd(_) => IapiMsgType::UciInd,
            IapiMessage::RxRachInd(_) => IapiMsgType::RxRachInd,
            IapiMessage::RxSrsInd(_) => IapiMsgType::RxSrsInd,
            IapiMessage::SlotInd(_) => IapiMsgType::SlotInd,
            IapiMessage::ErrInd(_) => IapiMsgType::ErrInd,
        }
    }

    /// Carrier the message addresses
    pub fn carrier_idx(&self) -> u8 {
        match self {
            IapiMessage::ConfigReq(m) => m.carrier_idx,
            IapiMessage::ConfigResp(m)
            | IapiMessage::StartResp(m)
            | IapiMessage::StopResp(m)
            | IapiMessage::ShutdownResp(m) => m.carrier_idx,
            IapiMessage::StartReq(m) => m.carrier_idx,
            IapiMessage::StopReq(m) => m.carrier_idx,
            IapiMessage::ShutdownReq(m) => m.carrier_idx,
            IapiMessage::DlConfigReq(m) => m.slot.carrier_idx,
            IapiMessage::UlConfigReq(m) => m.slot.carrier_idx,
            IapiMessage::UlDciReq(m) => m.slot.carrier_idx,
            IapiMessage::TxReq(m) => m.slot.carrier_idx,
            IapiMessage::RxUlschInd(m) => m.slot.carrier_idx,
            IapiMessage::RxUlschUciInd(m) => m.slot.carrier_idx,
            IapiMessage::CrcInd(m) => m.slot.carrier_idx,
            IapiMessage::UciInd(m) => m.slot.carrier_idx,
            IapiMessage::RxRachInd(m) => m.slot.carrier_idx,
            IapiMessage::RxSrsInd(m) => m.slot.carrier_idx,
            IapiMessage::SlotInd(m) => m.slot.carrier_idx,
            IapiMessage::ErrInd(m) => m.carrier_idx,
        }
    }
}

/// Carrier and air-interface time of a per-TTI message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSlot {
    pub carrier_idx: u8,
    pub sfn_slot: SfnSlot,
}

impl CarrierSlot {
    pub fn new(carrier_idx: u8, sfn: u16, slot: u8, sym: u8) -> Self {
        Self { carrier_idx, sfn_slot: SfnSlot::new(sfn, slot).with_sym(sym) }
    }
}

// ---------------------------------------------------------------------------
// P5
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigReq {
    pub carrier_idx: u8,
    pub dl_bandwidth: u16,
    pub n_dl_abs_frequency_point_a: u32,
    pub dl_k0: u16,
    pub dl_grid_size: u16,
    pub nr_of_tx_ant: u16,
    pub ul_bandwidth: u16,
    pub n_ul_abs_frequency_point_a: u32,
    pub ul_k0: u16,
    pub ul_grid_size: u16,
    pub nr_of_rx_ant: u16,
    pub phy_cell_id: u16,
    pub frame_duplex_type: u8,
    pub ss_pbch_power: u32,
    pub subc_common: u8,
    pub prach_subc_spacing: u8,
    pub prach_restricted_set: u8,
    pub prach_fdm: u8,
    pub prach_config_idx: u8,
    pub prach_root_seq_idx: u16,
    pub prach_freq_start: u16,
    pub prach_zero_corr_conf: u8,
    pub prach_ssb_rach: u8,
    pub ssb_prb_offset: u8,
    pub ssb_period: u8,
    pub ssb_subc_offset: u8,
    pub mib: [u8; 3],
    pub dmrs_type_a_pos: u8,
    pub ssb_mask: [u32; 2],
    pub beam_id: Vec<u8>,
    /// Period of the TDD pattern in slots, 0 for FDD
    pub tdd_period: u8,
    /// Symbol type per slot of the TDD pattern
    pub slot_config: Vec<[u8; 14]>,
    pub dl_fft_size: u16,
    pub ul_fft_size: u16,
    pub carrier_aggregation_level: u8,
    pub group_hop_flag: u8,
    pub sequence_hop_flag: u8,
    pub hopping_id: u16,
    pub urllc_capable: u8,
    pub urllc_mini_slot_mask: u16,
    pub prach_nr_of_rx_ru: u8,
    pub nr_of_dl_ports: u8,
    pub nr_of_ul_ports: u8,
    pub ssb_subc_spacing: u8,
}

/// Response carrying only a completion status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResp {
    pub carrier_idx: u8,
    /// 0 on success
    pub status: u32,
    pub sfn_slot: SfnSlot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReq {
    pub carrier_idx: u8,
    pub sfn: u16,
    pub slot: u16,
    pub mode: u8,
    pub count: u16,
    pub period: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReq {
    pub carrier_idx: u8,
    pub sfn: u16,
    pub slot: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReq {
    pub carrier_idx: u8,
    pub sfn: u16,
    pub slot: u16,
    pub test_type: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrInd {
    pub carrier_idx: u8,
    /// Vendor type of the failing message
    pub msg_type: u16,
    pub status: u32,
    pub sfn_slot: SfnSlot,
}

// ---------------------------------------------------------------------------
// P7 requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PduGroup {
    pub ue_ids: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlConfigReq {
    pub slot: CarrierSlot,
    pub n_dci: u16,
    pub groups: Vec<PduGroup>,
    pub lte_crs_present: u8,
    pub lte_crs_carrier_freq: u32,
    pub lte_crs_carrier_bandwidth: u16,
    pub lte_crs_nr_of_crs_ports: u8,
    pub lte_crs_v_shift: u8,
    pub pdcch_precoder_en: u8,
    pub ssb_precoder_en: u8,
    pub pdus: Vec<DlPdu>,
    /// Sum of the declared PDU sizes
    pub message_len: u32,
}

/// One self-describing DL PDU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlPdu {
    /// Declared record size; the write cursor advances by this amount
    pub size: u16,
    pub body: DlPduBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DlPduBody {
    Dci(DciPdu),
    Dlsch(DlschPdu),
    Bch(BchPdu),
    CsiRs(CsiRsPdu),
}

impl DlPduBody {
    /// Nominal record size of the variant on the vendor wire
    pub fn wire_size(&self) -> u16 {
        match self {
            DlPduBody::Dci(_) => 256,
            DlPduBody::Dlsch(_) => 384,
            DlPduBody::Bch(_) => 64,
            DlPduBody::CsiRs(_) => 96,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DciPdu {
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subc_spacing: u8,
    pub cp_type: u8,
    pub freq_domain: [u32; 2],
    pub start_sym_index: u8,
    pub nr_of_symbols: u8,
    pub cce_to_reg_type: u8,
    pub reg_bundle_size: u8,
    pub interleaver_size: u8,
    pub coreset_type: u8,
    pub shift_index: u16,
    pub precoder_granularity: u8,
    pub cce_start_index: u8,
    pub agg_level: u8,
    pub n_id: u16,
    pub scid: u16,
    pub scrambling_rnti: u16,
    pub rnti: u16,
    pub total_bits: u16,
    pub dci_payload: Vec<u8>,
    pub epre_ratio_of_pdcch_to_ssb: u16,
    pub epre_ratio_of_dmrs_to_ssb: u16,
    pub tx_ru_idx: Vec<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DlschCodeword {
    pub code_rate: u16,
    pub mod_order: u8,
    pub mcs: u8,
    pub mcs_table: u8,
    pub rv: u8,
    pub tb_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlschPdu {
    pub ue_id: u16,
    pub rnti: u16,
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subc_spacing: u8,
    pub cp_type: u8,
    pub codewords: Vec<DlschCodeword>,
    pub n_id: u16,
    pub nr_of_layers: u8,
    pub transmission_scheme: u8,
    pub ref_point: u8,
    pub dmrs_symb_pos: u16,
    pub dmrs_config_type: u8,
    pub dmrs_scrambling_id: u16,
    pub scid: u8,
    pub nr_of_cdm_groups: u8,
    pub nr_of_antenna_ports: u8,
    pub port_index: Vec<u8>,
    pub resource_alloc_type: u8,
    /// Allocated RBGs, RBG 0 in the most significant bit
    pub rbg_index: u32,
    pub nr_of_rbgs: u16,
    pub rbg_size: u8,
    pub rb_start: u16,
    pub rb_size: u16,
    pub vrb_to_prb_mapping: u8,
    pub start_sym_index: u8,
    pub nr_of_symbols: u8,
    pub mapping_type: u8,
    pub nr_of_dmrs_symbols: u8,
    pub dmrs_add_pos: u8,
    pub pmi: u16,
    pub ptrs_present: u8,
    pub nr_of_ptrs_ports: u8,
    pub ptrs_port_index: Vec<u8>,
    pub ptrs_time_density: u8,
    pub ptrs_freq_density: u8,
    pub ptrs_re_offset: u8,
    pub nr_of_dmrs_ass_ptrs: [u8; 2],
    pub n1n2: u16,
    pub epre_ratio_to_ptrs: u8,
    pub epre_ratio_of_dmrs_to_ssb: u16,
    pub epre_ratio_of_pdsch_to_ssb: u16,
    pub nr_of_tx_ru: u8,
    pub tx_ru_idx: Vec<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BchPdu {
    pub mib: u32,
    pub ssb_block_index: u8,
    pub ssb_subc_offset: u8,
    pub ssb_prb_offset: u8,
    pub beta_pss: u8,
    pub phy_cell_id: u16,
    pub precoder_en: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsiRsPdu {
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subc_spacing: u8,
    pub cp_type: u8,
    pub start_rb: u16,
    pub nr_of_rbs: u16,
    pub csi_type: u8,
    pub row: u8,
    pub freq_domain: u16,
    pub symb_l0: u8,
    pub symb_l1: u8,
    pub cdm_type: u8,
    pub freq_density: u8,
    pub scr_id: u16,
    pub epre_ratio_to_ssb: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlConfigReq {
    pub slot: CarrierSlot,
    pub rach_present: u8,
    pub n_ulsch: u8,
    pub n_ulcch: u8,
    pub n_srs: u8,
    pub groups: Vec<PduGroup>,
    pub pdus: Vec<UlPdu>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UlPdu {
    Ulsch(UlschPdu),
    UlcchUci(UlcchUciPdu),
    Srs(SrsPdu),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlschPdu {
    pub ue_id: u16,
    pub rnti: u16,
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subc_spacing: u8,
    pub cp_type: u8,
    pub code_rate: u16,
    pub mod_order: u8,
    pub mcs: u8,
    pub mcs_table: u8,
    pub trans_precode: u8,
    pub transform_precode: u8,
    pub n_id: u16,
    pub nr_of_layers: u8,
    pub dmrs_symb_pos: u16,
    pub dmrs_config_type: u8,
    pub dmrs_scrambling_id: u16,
    pub pusch_identity: u16,
    pub scid: u8,
    pub nr_of_cdm_groups: u8,
    pub port_index: Vec<u8>,
    pub resource_alloc_type: u8,
    /// Allocated RBGs, RBG 0 in the least significant bit
    pub rbg_index: u32,
    pub nr_of_rbgs: u16,
    pub rbg_size: u8,
    pub rb_start: u16,
    pub rb_size: u16,
    pub vrb_to_prb_mapping: u8,
    pub freq_hopping: u8,
    pub start_sym_index: u8,
    pub nr_of_symbols: u8,
    pub mapping_type: u8,
    pub nr_of_dmrs_symbols: u8,
    pub dmrs_add_pos: u8,
    pub pi2_bpsk: u8,
    pub rv: u8,
    pub harq_process_id: u8,
    pub ndi: u8,
    pub tb_size: u32,
    pub n_ack: u16,
    pub n_csi_part1: u16,
    pub n_csi_part2: u16,
    pub alpha_scaling: u8,
    pub beta_offset_ack: u8,
    pub beta_offset_csi1: u8,
    pub beta_offset_csi2: u8,
    pub ptrs_present: u8,
    pub nr_of_ptrs_ports: u8,
    pub ptrs_port_index: Vec<u8>,
    pub ptrs_time_density: u8,
    pub ptrs_freq_density: u8,
    pub ptrs_re_offset: u8,
    pub nr_of_antenna_ports: u8,
    pub nr_of_rx_ru: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlcchUciPdu {
    pub ue_id: u16,
    pub rnti: u16,
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subc_spacing: u8,
    pub cp_type: u8,
    pub format: u8,
    pub mod_type: u8,
    pub start_prb: u16,
    pub prb_size: u16,
    pub start_sym_index: u8,
    pub symbols: u8,
    pub freq_hop_flag: u8,
    pub second_hop_prb: u16,
    pub group_hop_flag: u8,
    pub sequence_hop_flag: u8,
    pub hopping_id: u16,
    /// Initial cyclic shift
    pub m0: u16,
    pub n_id: u16,
    pub fmt1_orthogonal_cover_code: u8,
    pub fmt4_orthogonal_cover_idx: u8,
    pub fmt4_orthogonal_cover_len: u8,
    pub add_dmrs_flag: u8,
    pub dmrs_scrambling_id: u16,
    pub sr_flag: u8,
    pub bit_len_harq: u16,
    pub bit_len_csi_part1: u16,
    pub bit_len_csi_part2: u16,
    /// Resource-sharing group among format 0/1 PDUs
    pub group_id: u8,
    pub nr_of_rx_ru: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SrsPdu {
    pub ue_id: u16,
    pub rnti: u16,
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subc_spacing: u8,
    pub cp_type: u8,
    pub nr_of_srs_ports: u8,
    pub nr_of_symbols: u8,
    pub repetition: u8,
    pub start_pos: u8,
    pub config_index: u8,
    pub sequence_id: u16,
    pub bandwidth_index: u8,
    pub comb: u8,
    pub comb_offset: u8,
    pub cyclic_shift: u8,
    pub freq_position: u8,
    pub freq_shift: u16,
    pub freq_hopping: u8,
    pub group_or_seq_hopping: u8,
    pub resource_type: u8,
    pub t_srs: u16,
    pub t_offset: u16,
    pub nr_of_rx_ru: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlDciReq {
    pub slot: CarrierSlot,
    pub pdus: Vec<DciPdu>,
}

/// Location of a codeword payload handed to the PHY
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PayloadRef {
    None,
    Inline(Vec<u8>),
    /// Offset into a data block transferred alongside the request
    Block { block: u16, offset: u32 },
}

impl Default for PayloadRef {
    fn default() -> Self {
        PayloadRef::None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlPduData {
    pub pdu_index: u16,
    pub len1: u32,
    pub payload1: PayloadRef,
    pub len2: u32,
    pub payload2: PayloadRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxReq {
    pub slot: CarrierSlot,
    pub pdus: Vec<DlPduData>,
}

// ---------------------------------------------------------------------------
// Indications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInd {
    pub slot: CarrierSlot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlschData {
    pub ue_id: u16,
    pub rnti: u16,
    pub pdu_len: u32,
    pub snr: i16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RxUlschInd {
    pub slot: CarrierSlot,
    pub ulsch: Vec<UlschData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciPart {
    pub detected: u8,
    pub crc: u8,
    pub bit_len: u16,
    pub bits: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlschUciData {
    pub ue_id: u16,
    pub rnti: u16,
    pub harq: UciPart,
    pub csi_part1: UciPart,
    pub csi_part2: UciPart,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RxUlschUciInd {
    pub slot: CarrierSlot,
    pub pdus: Vec<UlschUciData>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrcEntry {
    pub ue_id: u16,
    pub rnti: u16,
    /// 1 when the transport block passed its CRC
    pub crc_flag: u8,
    pub snr: i16,
    pub ta: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrcInd {
    pub slot: CarrierSlot,
    pub crc: Vec<CrcEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciEntry {
    pub ue_id: u16,
    pub rnti: u16,
    pub sr_present: u8,
    /// 1 detected, 0 or 2 not detected
    pub pucch_detected: u8,
    pub pdu_bit_len: u16,
    pub uci_bits: Vec<u8>,
    pub snr: i16,
    pub ta: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciInd {
    pub slot: CarrierSlot,
    pub uci: Vec<UciEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RachPreamble {
    pub start_slot_idx: u8,
    pub freq_idx: u8,
    pub start_symb_idx: u8,
    pub preamb_idx: u8,
    pub ta: u16,
    pub preamb_pwr: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RxRachInd {
    pub slot: CarrierSlot,
    pub preambles: Vec<RachPreamble>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SrsEstimate {
    pub ue_id: u16,
    pub rnti: u16,
    pub nr_of_symbols: u8,
    /// Wideband SNR per symbol
    pub wide_band_snr: Vec<i8>,
    pub nr_of_blocks: u16,
    /// Per-block SNR rows of [`SRS_SNR_BLOCK_WIDTH`] entries
    pub block_snr: Vec<Vec<i8>>,
    pub nr_of_port: u8,
    pub nr_of_rx_ant: u8,
    pub nr_of_rbs: u16,
    pub is_chan_est_pres: u8,
    pub chan_est: Vec<i16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RxSrsInd {
    pub slot: CarrierSlot,
    pub pdus: Vec<SrsEstimate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_idx_routing() {
        let msg = IapiMessage::CrcInd(CrcInd { slot: CarrierSlot::new(3, 10, 3, 0), crc: vec![] });
        assert_eq!(msg.carrier_idx(), 3);
        assert_eq!(msg.msg_type(), IapiMsgType::CrcInd);

        let resp = IapiMessage::StopResp(StatusResp { carrier_idx: 1, status: 0, ..Default::default() });
        assert_eq!(resp.carrier_idx(), 1);
    }

    #[test]
    fn test_pdu_sizes_nonzero() {
        assert!(DlPduBody::Bch(BchPdu::default()).wire_size() > 0);
        assert!(DlPduBody::Dlsch(DlschPdu::default()).wire_size() > DlPduBody::Bch(BchPdu::default()).wire_size());
    }
}
