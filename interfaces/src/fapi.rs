//! FAPI Message Model
//!
//! Typed SCF FAPI messages exchanged with the MAC, plus the vendor
//! extensions riding on the same channel. PDU arrays are enums with
//! payloads; wire tags that are not understood are kept as `Unknown` so the
//! translators can reject them explicitly.

use serde::{Deserialize, Serialize};

use crate::message_types::FapiMsgId;

/// CONFIG.request TLV tags
pub mod tlv_tag {
    pub const DL_BANDWIDTH: u16 = 0x1001;
    pub const DL_FREQUENCY: u16 = 0x1002;
    pub const DL_K0: u16 = 0x1003;
    pub const DL_GRIDSIZE: u16 = 0x1004;
    pub const NUM_TX_ANT: u16 = 0x1005;
    pub const UPLINK_BANDWIDTH: u16 = 0x1006;
    pub const UPLINK_FREQUENCY: u16 = 0x1007;
    pub const UL_K0: u16 = 0x1008;
    pub const UL_GRIDSIZE: u16 = 0x1009;
    pub const NUM_RX_ANT: u16 = 0x100A;
    pub const FREQUENCY_SHIFT_7P5_KHZ: u16 = 0x100B;
    pub const PHY_CELL_ID: u16 = 0x100C;
    pub const FRAME_DUPLEX_TYPE: u16 = 0x100D;
    pub const SS_PBCH_POWER: u16 = 0x100E;
    pub const BCH_PAYLOAD: u16 = 0x100F;
    pub const SCS_COMMON: u16 = 0x1010;
    pub const PRACH_SEQUENCE_LENGTH: u16 = 0x1011;
    pub const PRACH_SUBC_SPACING: u16 = 0x1012;
    pub const RESTRICTED_SET_CONFIG: u16 = 0x1013;
    pub const NUM_PRACH_FD_OCCASIONS: u16 = 0x1014;
    pub const PRACH_ROOT_SEQUENCE_INDEX: u16 = 0x1015;
    pub const NUM_ROOT_SEQUENCES: u16 = 0x1016;
    pub const K1: u16 = 0x1017;
    pub const PRACH_ZERO_CORR_CONF: u16 = 0x1018;
    pub const NUM_UNUSED_ROOT_SEQUENCES: u16 = 0x1019;
    pub const UNUSED_ROOT_SEQUENCES: u16 = 0x101A;
    pub const SSB_PER_RACH: u16 = 0x101B;
    pub const PRACH_MULTIPLE_CARRIERS_IN_A_BAND: u16 = 0x101C;
    pub const SSB_OFFSET_POINT_A: u16 = 0x101D;
    pub const BETA_PSS: u16 = 0x101E;
    pub const SSB_PERIOD: u16 = 0x101F;
    pub const SSB_SUBCARRIER_OFFSET: u16 = 0x1020;
    pub const MIB: u16 = 0x1021;
    pub const SSB_MASK: u16 = 0x1022;
    pub const BEAM_ID: u16 = 0x1023;
    pub const SS_PBCH_MULTIPLE_CARRIERS_IN_A_BAND: u16 = 0x1024;
    pub const MULTIPLE_CELLS_SS_PBCH_IN_A_CARRIER: u16 = 0x1025;
    pub const TDD_PERIOD: u16 = 0x1026;
    pub const SLOT_CONFIG: u16 = 0x1027;
    pub const RSSI_MEASUREMENT: u16 = 0x1028;
    pub const PRACH_CONFIG_INDEX: u16 = 0x1029;
    pub const DMRS_TYPE_A_POS: u16 = 0x102A;
}

/// PUSCH pduBitmap bits
pub mod pusch_bitmap {
    pub const DATA: u16 = 0x01;
    pub const UCI: u16 = 0x02;
    pub const PTRS: u16 = 0x04;
    pub const DFTS_OFDM: u16 = 0x08;
    /// Vendor flag forcing PTRS on the vendor PDU
    pub const PTRS_PRESENT: u16 = 1 << 15;
}

/// Any message carried on the MAC-facing channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FapiMessage {
    MsgHeader(MsgHeaderInd),
    Vendor(VendorMessage),
    ParamRequest(ParamRequest),
    ParamResponse(ParamResponse),
    ConfigRequest(ConfigRequest),
    ConfigResponse(ConfigResponse),
    StartRequest(StartRequest),
    StopRequest(StopRequest),
    StopIndication(StopIndication),
    ErrorIndication(ErrorIndication),
    ShutdownRequest(ShutdownRequest),
    ShutdownResponse(ShutdownResponse),
    DlTtiRequest(DlTtiRequest),
    UlTtiRequest(UlTtiRequest),
    UlDciRequest(UlDciRequest),
    TxDataRequest(TxDataRequest),
    SlotIndication(SlotIndication),
    RxDataIndication(RxDataIndication),
    CrcIndication(CrcIndication),
    UciIndication(UciIndication),
    SrsIndication(SrsIndication),
    RachIndication(RachIndication),
    VendorP7Indication(VendorP7Indication),
}

impl FapiMessage {
    /// Message id written into the element header
    pub fn msg_id(&self) -> FapiMsgId {
        match self {
            FapiMessage::MsgHeader(_) => FapiMsgId::VendorMsgHeaderInd,
            FapiMessage::Vendor(_) => FapiMsgId::VendorMessage,
            FapiMessage::ParamRequest(_) => FapiMsgId::ParamRequest,
            FapiMessage::ParamResponse(_) => FapiMsgId::ParamResponse,
            FapiMessage::ConfigRequest(_) => FapiMsgId::ConfigRequest,
            FapiMessage::ConfigResponse(_) => FapiMsgId::ConfigResponse,
            FapiMessage::StartRequest(_) => FapiMsgId::StartRequest,
            FapiMessage::StopRequest(_) => FapiMsgId::StopRequest,
            FapiMessage::StopIndication(_) => FapiMsgId::StopIndication,
            FapiMessage::ErrorIndication(_) => FapiMsgId::ErrorIndication,
            FapiMessage::ShutdownRequest(_) => FapiMsgId::VendorExtShutdownRequest,
            FapiMessage::ShutdownResponse(_) => FapiMsgId::VendorExtShutdownResponse,
            FapiMessage::DlTtiRequest(_) => FapiMsgId::DlTtiRequest,
            FapiMessage::UlTtiRequest(_) => FapiMsgId::UlTtiRequest,
            FapiMessage::UlDciRequest(_) => FapiMsgId::UlDciRequest,
            FapiMessage::TxDataRequest(_) => FapiMsgId::TxDataRequest,
            FapiMessage::SlotIndication(_) => FapiMsgId::SlotIndication,
            FapiMessage::RxDataIndication(_) => FapiMsgId::RxDataIndication,
            FapiMessage::CrcIndication(_) => FapiMsgId::CrcIndication,
            FapiMessage::UciIndication(_) => FapiMsgId::UciIndication,
            FapiMessage::SrsIndication(_) => FapiMsgId::SrsIndication,
            FapiMessage::RachIndication(_) => FapiMsgId::RachIndication,
            FapiMessage::VendorP7Indication(_) => FapiMsgId::VendorExtP7Indication,
        }
    }
}

// ---------------------------------------------------------------------------
// Framing and vendor extensions
// ---------------------------------------------------------------------------

/// Per-carrier framing header heading each carrier's sub-list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgHeaderInd {
    /// Number of FAPI messages that follow for this carrier
    pub num_msg: u8,
    /// PHY instance the messages belong to
    pub phy_id: u8,
}

/// Vendor parameters accompanying a per-carrier request list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorMessage {
    pub config_req_vendor: ConfigReqVendor,
    pub start_req_vendor: StartReqVendor,
    pub stop_req_vendor: StopReqVendor,
    pub p7_req_vendor: P7ReqVendor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigReqVendor {
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
    /// Non-zero: take EPRE ratios from the vendor PDUs instead of deriving them
    pub use_vendor_epre_x_ssb: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartReqVendor {
    pub sfn: u16,
    pub slot: u16,
    /// PHY start mode (0-4)
    pub mode: u8,
    pub count: u16,
    pub period: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopReqVendor {
    pub sfn: u16,
    pub slot: u16,
}

/// Per-TTI vendor overrides for the P7 requests of one carrier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct P7ReqVendor {
    pub dl_tti_req: DlTtiReqVendor,
    pub ul_tti_req: UlTtiReqVendor,
    pub ul_dci_req: UlDciReqVendor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlTtiReqVendor {
    pub sym: u8,
    pub lte_crs_present: u8,
    pub lte_crs_carrier_freq_dl: u32,
    pub lte_crs_carrier_bandwidth_dl: u16,
    pub lte_crs_nr_of_crs_ports: u8,
    pub lte_crs_v_shift: u8,
    pub pdcch_precoder_en: u8,
    pub ssb_precoder_en: u8,
    /// Indexed like `DlTtiRequest::pdus`
    pub pdus: Vec<DlPduVendor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlTtiReqVendor {
    /// Starting symbol of a mini-slot UL allocation
    pub sym: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlDciReqVendor {
    pub sym: u8,
    pub pdus: Vec<DciVendor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DlPduVendor {
    Pdcch { dl_dci: Vec<DciVendor> },
    Pdsch(PdschVendor),
    CsiRs { epre_ratio_to_ssb: u16 },
    None,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DciVendor {
    pub epre_ratio_of_pdcch_to_ssb: u16,
    pub epre_ratio_of_dmrs_to_ssb: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdschVendor {
    pub nr_of_antenna_ports: u8,
    pub tx_ru_idx: Vec<u16>,
    pub epre_ratio_of_dmrs_to_ssb: u16,
    pub epre_ratio_of_pdsch_to_ssb: u16,
}

// ---------------------------------------------------------------------------
// P5
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamResponse {
    pub error_code: u8,
    pub number_of_tlvs: u8,
}

/// One CONFIG.request TLV; array-valued parameters repeat their tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTlv {
    pub tag: u16,
    pub value: u32,
}

impl ConfigTlv {
    pub fn new(tag: u16, value: u32) -> Self {
        Self { tag, value }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub tlvs: Vec<ConfigTlv>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub error_code: u8,
    pub number_of_invalid_tlvs: u8,
    pub number_of_inv_tlvs_idle_only: u8,
    pub number_of_inv_tlvs_running_only: u8,
    pub number_of_missing_tlvs: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StartRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StopRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StopIndication;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorIndication {
    pub sfn: u16,
    pub slot: u16,
    /// Id of the message the error relates to
    pub message_id: u16,
    pub error_code: u8,
}

/// Vendor extension: orderly PHY shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownRequest {
    pub sfn: u16,
    pub slot: u16,
    pub test_type: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShutdownResponse {
    pub sfn: u16,
    pub slot: u16,
    pub status: u32,
}

// ---------------------------------------------------------------------------
// P7 requests
// ---------------------------------------------------------------------------

/// UE group: PDU indices scheduled together (MU-MIMO)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UeGroup {
    pub pdu_idx: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlTtiRequest {
    pub sfn: u16,
    pub slot: u16,
    pub pdus: Vec<DlTtiPdu>,
    pub ue_groups: Vec<UeGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DlTtiPdu {
    Pdcch(PdcchPdu),
    Pdsch(PdschPdu),
    CsiRs(CsiRsPdu),
    Ssb(SsbPdu),
    /// PDU with a type tag this layer does not translate
    Unknown(u16),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdcchPdu {
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subcarrier_spacing: u8,
    pub cyclic_prefix: u8,
    pub start_symbol_index: u8,
    pub duration_symbols: u8,
    pub freq_domain_resource: [u8; 6],
    pub cce_reg_mapping_type: u8,
    pub reg_bundle_size: u8,
    pub interleaver_size: u8,
    pub coreset_type: u8,
    pub shift_index: u16,
    pub precoder_granularity: u8,
    pub dl_dci: Vec<DlDci>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DlDci {
    pub rnti: u16,
    pub scrambling_id: u16,
    pub scrambling_rnti: u16,
    pub cce_index: u8,
    pub aggregation_level: u8,
    pub beta_pdcch_1_0: u8,
    pub power_control_offset_ss: u8,
    pub payload_size_bits: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PdschCodeword {
    pub target_code_rate: u16,
    pub qam_mod_order: u8,
    pub mcs_index: u8,
    pub mcs_table: u8,
    pub rv_index: u8,
    pub tb_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrgInfo {
    pub pm_idx: u16,
    pub beam_idx: Vec<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Precoding {
    pub prg_size: u16,
    pub dig_bf_interfaces: u8,
    pub prgs: Vec<PrgInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdschPdu {
    pub pdu_bitmap: u16,
    pub rnti: u16,
    pub pdu_index: u16,
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subcarrier_spacing: u8,
    pub cyclic_prefix: u8,
    pub codewords: Vec<PdschCodeword>,
    pub data_scrambling_id: u16,
    pub nr_of_layers: u8,
    pub transmission_scheme: u8,
    pub ref_point: u8,
    pub dl_dmrs_symb_pos: u16,
    pub dmrs_config_type: u8,
    pub dl_dmrs_scrambling_id: u16,
    pub scid: u8,
    pub num_dmrs_cdm_grps_no_data: u8,
    pub dmrs_ports: u16,
    pub resource_alloc: u8,
    /// Per-PRB bitmap, up to 36 bytes
    pub rb_bitmap: Vec<u8>,
    pub rb_start: u16,
    pub rb_size: u16,
    pub vrb_to_prb_mapping: u8,
    pub start_symb_index: u8,
    pub nr_of_symbols: u8,
    pub mapping_type: u8,
    pub nr_of_dmrs_symbols: u8,
    pub dmrs_add_pos: u8,
    pub ptrs_port_index: u8,
    pub ptrs_time_density: u8,
    pub ptrs_freq_density: u8,
    pub ptrs_re_offset: u8,
    pub n_epre_ratio_of_pdsch_to_ptrs: u8,
    pub precoding: Precoding,
    pub power_control_offset: u8,
    pub power_control_offset_ss: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsiRsPdu {
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subcarrier_spacing: u8,
    pub cyclic_prefix: u8,
    pub start_rb: u16,
    pub nr_of_rbs: u16,
    pub csi_type: u8,
    pub row: u8,
    pub freq_domain: u16,
    pub symb_l0: u8,
    pub symb_l1: u8,
    pub cdm_type: u8,
    pub freq_density: u8,
    pub scram_id: u16,
    pub power_control_offset: u8,
    pub power_control_offset_ss: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SsbPdu {
    pub phy_cell_id: u16,
    pub beta_pss: u8,
    pub ssb_block_index: u8,
    pub ssb_subcarrier_offset: u8,
    pub ssb_offset_point_a: u16,
    pub bch_payload_flag: u8,
    /// MIB payload, first three bytes little-endian significant
    pub bch_payload: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlTtiRequest {
    pub sfn: u16,
    pub slot: u16,
    pub rach_present: u8,
    pub n_ulsch: u8,
    pub n_ulcch: u8,
    pub pdus: Vec<UlTtiPdu>,
    pub ue_groups: Vec<UeGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UlTtiPdu {
    Prach(PrachPdu),
    Pusch(PuschPdu),
    Pucch(PucchPdu),
    Srs(SrsPdu),
    Unknown(u16),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrachPdu {
    pub phy_cell_id: u16,
    pub num_prach_ocas: u8,
    pub prach_format: u8,
    pub num_ra: u8,
    pub prach_start_symbol: u8,
    pub num_cs: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PuschData {
    pub rv_index: u8,
    pub harq_process_id: u8,
    pub new_data_indicator: u8,
    pub tb_size: u32,
    pub num_cb: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PuschUci {
    pub harq_ack_bit_length: u16,
    pub csi_part1_bit_length: u16,
    pub csi_part2_bit_length: u16,
    pub alpha_scaling: u8,
    pub beta_offset_harq_ack: u8,
    pub beta_offset_csi1: u8,
    pub beta_offset_csi2: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PtrsInfo {
    pub ptrs_port_index: u16,
    pub ptrs_dmrs_port: u8,
    pub ptrs_re_offset: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PuschPtrs {
    pub ptrs_info: Vec<PtrsInfo>,
    pub ptrs_time_density: u8,
    pub ptrs_freq_density: u8,
    pub ul_ptrs_power: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PuschPdu {
    /// Presence of data / UCI / PTRS sub-records (see [`pusch_bitmap`])
    pub pdu_bitmap: u16,
    pub rnti: u16,
    pub handle: u32,
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subcarrier_spacing: u8,
    pub cyclic_prefix: u8,
    pub target_code_rate: u16,
    pub qam_mod_order: u8,
    pub mcs_index: u8,
    pub mcs_table: u8,
    pub transform_precoding: u8,
    pub data_scrambling_id: u16,
    pub nr_of_layers: u8,
    pub ul_dmrs_symb_pos: u16,
    pub dmrs_config_type: u8,
    pub ul_dmrs_scrambling_id: u16,
    pub pusch_identity: u16,
    pub scid: u8,
    pub num_dmrs_cdm_grps_no_data: u8,
    pub dmrs_ports: u16,
    pub resource_alloc: u8,
    pub rb_bitmap: Vec<u8>,
    pub rb_start: u16,
    pub rb_size: u16,
    pub vrb_to_prb_mapping: u8,
    pub frequency_hopping: u8,
    pub start_symb_index: u8,
    pub nr_of_symbols: u8,
    pub mapping_type: u8,
    pub nr_of_dmrs_symbols: u8,
    pub dmrs_add_pos: u8,
    pub tp_pi2_bpsk: u8,
    pub pusch_data: PuschData,
    pub pusch_uci: PuschUci,
    pub pusch_ptrs: PuschPtrs,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PucchPdu {
    pub rnti: u16,
    pub handle: u32,
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subcarrier_spacing: u8,
    pub cyclic_prefix: u8,
    pub format_type: u8,
    pub multi_slot_tx_indicator: u8,
    pub pi2_bpsk: u8,
    pub prb_start: u16,
    pub prb_size: u16,
    pub start_symbol_index: u8,
    pub nr_of_symbols: u8,
    pub freq_hop_flag: u8,
    pub second_hop_prb: u16,
    pub group_hop_flag: u8,
    pub sequence_hop_flag: u8,
    pub hopping_id: u16,
    pub initial_cyclic_shift: u16,
    pub data_scrambling_id: u16,
    pub time_domain_occ_idx: u8,
    pub pre_dft_occ_idx: u8,
    pub pre_dft_occ_len: u8,
    pub add_dmrs_flag: u8,
    pub dmrs_scrambling_id: u16,
    pub dmrs_cyclic_shift: u8,
    pub sr_flag: u8,
    pub bit_len_harq: u16,
    pub bit_len_csi_part1: u16,
    pub bit_len_csi_part2: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SrsPdu {
    pub rnti: u16,
    pub handle: u32,
    pub bwp_size: u16,
    pub bwp_start: u16,
    pub subcarrier_spacing: u8,
    pub cyclic_prefix: u8,
    /// log2 of the number of antenna ports
    pub num_ant_ports: u8,
    /// log2 of the number of symbols
    pub num_symbols: u8,
    /// log2 of the repetition factor
    pub num_repetitions: u8,
    pub time_start_position: u8,
    pub config_index: u8,
    pub sequence_id: u16,
    pub bandwidth_index: u8,
    pub comb_size: u8,
    pub comb_offset: u8,
    pub cyclic_shift: u8,
    pub frequency_position: u8,
    pub frequency_shift: u16,
    pub frequency_hopping: u8,
    pub group_or_sequence_hopping: u8,
    pub resource_type: u8,
    pub t_srs: u16,
    pub t_offset: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UlDciRequest {
    pub sfn: u16,
    pub slot: u16,
    pub pdus: Vec<PdcchPdu>,
}

/// Location of a TX payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TlvValue {
    /// Payload bytes carried in the message itself
    Inline(Vec<u8>),
    /// Payload inside the `block`-th zero-copy block attached to the request
    Zbc { block: u16, offset: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxDataTlv {
    pub tag: u16,
    pub length: u32,
    pub value: TlvValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxPduDesc {
    pub pdu_length: u32,
    pub pdu_index: u16,
    /// One TLV per codeword
    pub tlvs: Vec<TxDataTlv>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxDataRequest {
    pub sfn: u16,
    pub slot: u16,
    pub pdus: Vec<TxPduDesc>,
}

// ---------------------------------------------------------------------------
// P7 indications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotIndication {
    pub sfn: u16,
    pub slot: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RxDataPdu {
    pub handle: u32,
    pub rnti: u16,
    pub harq_id: u8,
    pub pdu_length: u32,
    pub ul_cqi: u8,
    pub timing_advance: u16,
    pub rssi: u16,
    pub pdu: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RxDataIndication {
    pub sfn: u16,
    pub slot: u16,
    pub pdus: Vec<RxDataPdu>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrcInfo {
    pub handle: u32,
    pub rnti: u16,
    pub harq_id: u8,
    pub tb_crc_status: u8,
    pub num_cb: u16,
    pub cb_crc_status: Vec<u8>,
    pub ul_cqi: u8,
    pub timing_advance: u16,
    pub rssi: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrcIndication {
    pub sfn: u16,
    pub slot: u16,
    pub crcs: Vec<CrcInfo>,
}

/// HARQ / CSI report carried by UCI on PUSCH and PUCCH formats 2/3/4
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciReport {
    pub crc: u8,
    pub bit_len: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciPusch {
    pub pdu_bitmap: u8,
    pub handle: u32,
    pub rnti: u16,
    pub ul_cqi: u8,
    pub timing_advance: u16,
    pub rssi: u16,
    pub harq_info: UciReport,
    pub csi_part1: UciReport,
    pub csi_part2: UciReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SrInfoF0F1 {
    pub sr_indication: u8,
    pub sr_confidence_level: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarqInfoF0F1 {
    pub num_harq: u8,
    pub harq_confidence_level: u8,
    pub harq_value: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciPucchF0F1 {
    pub pdu_bitmap: u8,
    pub handle: u32,
    pub rnti: u16,
    pub pucch_format: u8,
    pub ul_cqi: u8,
    pub timing_advance: u16,
    pub rssi: u16,
    pub sr_info: SrInfoF0F1,
    pub harq_info: HarqInfoF0F1,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciPucchF2F3F4 {
    pub pdu_bitmap: u8,
    pub handle: u32,
    pub rnti: u16,
    pub pucch_format: u8,
    pub ul_cqi: u8,
    pub timing_advance: u16,
    pub rssi: u16,
    pub num_uci_bits: u16,
    pub uci_bits: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UciPdu {
    Pusch(UciPusch),
    PucchF0F1(UciPucchF0F1),
    PucchF2F3F4(UciPucchF2F3F4),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UciIndication {
    pub sfn: u16,
    pub slot: u16,
    pub pdus: Vec<UciPdu>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SrsSymbolReport {
    pub num_rbs: u16,
    pub rb_snr: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SrsReport {
    pub handle: u32,
    pub rnti: u16,
    pub timing_advance: u16,
    pub num_symbols: u8,
    pub wide_band_snr: u8,
    pub reported_symbols: Vec<SrsSymbolReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SrsIndication {
    pub sfn: u16,
    pub slot: u16,
    pub pdus: Vec<SrsReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PreambleInfo {
    pub preamble_index: u8,
    pub timing_advance: u16,
    pub preamble_pwr: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RachPdu {
    pub phy_cell_id: u16,
    pub symbol_index: u8,
    pub slot_index: u8,
    pub freq_index: u8,
    pub avg_rssi: u8,
    pub avg_snr: u8,
    pub preambles: Vec<PreambleInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RachIndication {
    pub sfn: u16,
    pub slot: u16,
    pub pdus: Vec<RachPdu>,
}

/// Carrier / symbol stamp of one vendor-extended indication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorSymInd {
    pub carrier_idx: u8,
    pub sym: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorSrsPdu {
    pub nr_of_port: u8,
    pub nr_of_rx_ant: u8,
    pub nr_of_rbs: u16,
    pub is_chan_est_pres: u8,
    /// Interleaved I/Q channel estimates
    pub chan_est: Vec<i16>,
}

/// Vendor fields accumulated across one TTI for one PHY
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorP7Indication {
    pub slot_ind: Option<VendorSymInd>,
    pub crc_ind: Option<VendorSymInd>,
    pub rx_data_ind: Option<VendorSymInd>,
    pub uci_ind: Option<VendorSymInd>,
    pub srs_ind: Option<VendorSymInd>,
    /// Raw vendor SNR per CRC entry
    pub crc_snr: Vec<i16>,
    /// Raw vendor SNR per UCI entry
    pub uci_snr: Vec<i16>,
    pub srs_pdus: Vec<VendorSrsPdu>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_id_mapping() {
        let msg = FapiMessage::CrcIndication(CrcIndication::default());
        assert_eq!(msg.msg_id(), FapiMsgId::CrcIndication);
        let hdr = FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 2, phy_id: 0 });
        assert_eq!(hdr.msg_id(), FapiMsgId::VendorMsgHeaderInd);
    }

    #[test]
    fn test_bincode_header_size_is_stable() {
        let small = bincode::serialize(&FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 0, phy_id: 1 })).unwrap();
        let large = bincode::serialize(&FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 200, phy_id: 1 })).unwrap();
        assert_eq!(small.len(), large.len());
    }
}
