//! CONFIG.request
//!
//! The FAPI TLV list is folded into one vendor CONFIG_REQ. Values that
//! depend on the common subcarrier spacing (SSB PRB offset, TDD period)
//! are resolved once the whole list has been read, so TLV order does not
//! matter.

use common::{fft_size, ss_pbch_power, ssb_prb_offset, tdd_period_slots, DuplexMode, Pci, SubcarrierSpacing};
use interfaces::fapi::{tlv_tag, ConfigRequest, ConfigResponse, ConfigTlv, FapiMessage, VendorMessage};
use interfaces::iapi::{ConfigReq, IapiMessage, StatusResp, MAX_NUM_ANT};
use tracing::{debug, error, info, warn};

use super::{resolve, to_mac, to_phy};
use crate::context::{PhyContext, PhyState};
use crate::FapiError;

const SYMBOLS_PER_SLOT: usize = 14;

/// Translate CONFIG.request for `phy_id` and queue it towards the PHY
pub fn config_request(
    ctx: &PhyContext,
    phy_id: u8,
    req: &ConfigRequest,
    vendor: Option<&VendorMessage>,
) -> Result<(), FapiError> {
    let mut inst = ctx.phy(phy_id)?.lock();
    inst.stats.fapi.config_req += 1;

    let vendor = vendor.ok_or_else(|| {
        FapiError::TranslationFailure(format!("CONFIG.request for phy {} without vendor message", phy_id))
    })?;
    if inst.state == PhyState::Idle {
        inst.phy_id = phy_id;
    }
    inst.require_state(&[PhyState::Idle, PhyState::Configured], "CONFIG.request")?;

    let mut cfg = ConfigReq { carrier_idx: inst.phy_id, ..Default::default() };
    translate_tlvs(&req.tlvs, &mut cfg);

    let v = &vendor.config_req_vendor;
    cfg.carrier_aggregation_level = v.carrier_aggregation_level;
    cfg.group_hop_flag = v.group_hop_flag;
    cfg.sequence_hop_flag = v.sequence_hop_flag;
    cfg.hopping_id = v.hopping_id;
    cfg.urllc_capable = v.urllc_capable;
    cfg.urllc_mini_slot_mask = v.urllc_mini_slot_mask;
    cfg.prach_nr_of_rx_ru = v.prach_nr_of_rx_ru;
    cfg.nr_of_dl_ports = v.nr_of_dl_ports;
    cfg.nr_of_ul_ports = v.nr_of_ul_ports;
    cfg.ssb_subc_spacing = v.ssb_subc_spacing;

    if SubcarrierSpacing::from_numerology(cfg.subc_common).is_none() {
        warn!("[P5] phy {}: numerology {} out of range", phy_id, cfg.subc_common);
    }
    if Pci::new(cfg.phy_cell_id).is_none() {
        warn!("[P5] phy {}: physical cell id {} above {}", phy_id, cfg.phy_cell_id, Pci::MAX);
    }
    cfg.dl_fft_size = fft_size(cfg.subc_common, cfg.dl_bandwidth);
    cfg.ul_fft_size = fft_size(cfg.subc_common, cfg.ul_bandwidth);
    if cfg.dl_fft_size == 0 || cfg.ul_fft_size == 0 {
        warn!("[P5] phy {}: no FFT size for numerology {} dl {} MHz ul {} MHz",
              phy_id, cfg.subc_common, cfg.dl_bandwidth, cfg.ul_bandwidth);
    }

    inst.config.phy_cell_id = cfg.phy_cell_id;
    inst.config.n_nr_of_rx_ant = cfg.nr_of_rx_ant;
    inst.config.sub_c_common = cfg.subc_common;
    inst.config.use_vendor_epre_x_ssb = v.use_vendor_epre_x_ssb != 0;

    info!("[P5] phy {} CONFIG.request: pci {} scs {} dl {} MHz fft {} tdd period {}",
          phy_id, cfg.phy_cell_id, cfg.subc_common, cfg.dl_bandwidth, cfg.dl_fft_size, cfg.tdd_period);
    to_phy(ctx, IapiMessage::ConfigReq(cfg))?;
    inst.stats.iapi.config_req += 1;
    Ok(())
}

/// CONFIG_RESP from the PHY; the first success moves the cell to CONFIGURED
pub fn config_response(ctx: &PhyContext, resp: &StatusResp) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, resp.carrier_idx, "CONFIG.response")?;
    inst.stats.iapi.config_res += 1;
    let phy_id = inst.phy_id;

    if resp.status == 0 && inst.state == PhyState::Idle {
        ctx.add_phy_instance();
        inst.state = PhyState::Configured;
        info!("[P5] phy {} CONFIGURED", phy_id);
    } else if resp.status != 0 {
        error!("[P5] phy {} CONFIG.response status {}", phy_id, resp.status);
    }

    // Invalid / missing TLV reporting is not supported
    let out = ConfigResponse { error_code: resp.status as u8, ..Default::default() };
    to_mac(ctx, phy_id, FapiMessage::ConfigResponse(out))?;
    inst.stats.fapi.config_res += 1;
    Ok(())
}

/// Fold the TLV list into `cfg`
fn translate_tlvs(tlvs: &[ConfigTlv], cfg: &mut ConfigReq) {
    let mut ssb_offset_point_a = None;
    let mut tdd_period = None;
    let mut ssb_masks = 0usize;
    let mut slot_symbols: Vec<u8> = Vec::new();

    for tlv in tlvs {
        let v = tlv.value;
        match tlv.tag {
            tlv_tag::DL_BANDWIDTH => cfg.dl_bandwidth = v as u16,
            tlv_tag::DL_FREQUENCY => cfg.n_dl_abs_frequency_point_a = v,
            tlv_tag::DL_K0 => cfg.dl_k0 = v as u16,
            tlv_tag::DL_GRIDSIZE => cfg.dl_grid_size = v as u16,
            tlv_tag::NUM_TX_ANT => cfg.nr_of_tx_ant = v as u16,
            tlv_tag::UPLINK_BANDWIDTH => cfg.ul_bandwidth = v as u16,
            tlv_tag::UPLINK_FREQUENCY => cfg.n_ul_abs_frequency_point_a = v,
            tlv_tag::UL_K0 => cfg.ul_k0 = v as u16,
            tlv_tag::UL_GRIDSIZE => cfg.ul_grid_size = v as u16,
            tlv_tag::NUM_RX_ANT => cfg.nr_of_rx_ant = v as u16,
            tlv_tag::PHY_CELL_ID => cfg.phy_cell_id = v as u16,
            tlv_tag::FRAME_DUPLEX_TYPE => cfg.frame_duplex_type = v as u8,
            tlv_tag::SS_PBCH_POWER => cfg.ss_pbch_power = ss_pbch_power(v),
            tlv_tag::SCS_COMMON => {
                cfg.subc_common = v as u8;
                cfg.ssb_subc_spacing = v as u8;
            }
            tlv_tag::PRACH_SUBC_SPACING => cfg.prach_subc_spacing = v as u8,
            tlv_tag::RESTRICTED_SET_CONFIG => cfg.prach_restricted_set = v as u8,
            tlv_tag::NUM_PRACH_FD_OCCASIONS => cfg.prach_fdm = v as u8,
            tlv_tag::PRACH_CONFIG_INDEX => cfg.prach_config_idx = v as u8,
            tlv_tag::PRACH_ROOT_SEQUENCE_INDEX => cfg.prach_root_seq_idx = v as u16,
            tlv_tag::K1 => cfg.prach_freq_start = v as u16,
            tlv_tag::PRACH_ZERO_CORR_CONF => cfg.prach_zero_corr_conf = v as u8,
            tlv_tag::SSB_PER_RACH => cfg.prach_ssb_rach = v as u8,
            tlv_tag::SSB_OFFSET_POINT_A => ssb_offset_point_a = Some(v as u16),
            tlv_tag::SSB_PERIOD => cfg.ssb_period = v as u8,
            tlv_tag::SSB_SUBCARRIER_OFFSET => cfg.ssb_subc_offset = v as u8,
            tlv_tag::MIB => cfg.mib = [(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8],
            tlv_tag::DMRS_TYPE_A_POS => cfg.dmrs_type_a_pos = v as u8,
            tlv_tag::SSB_MASK => {
                match cfg.ssb_mask.get_mut(ssb_masks) {
                    Some(mask) => *mask = v,
                    None => warn!("[P5] extra SSB mask {:#x} ignored", v),
                }
                ssb_masks += 1;
            }
            tlv_tag::BEAM_ID => {
                if cfg.beam_id.len() < MAX_NUM_ANT {
                    cfg.beam_id.push(v as u8);
                } else {
                    warn!("[P5] beam id {} beyond {} antennas ignored", v, MAX_NUM_ANT);
                }
            }
            tlv_tag::TDD_PERIOD => tdd_period = Some(v as u8),
            tlv_tag::SLOT_CONFIG => slot_symbols.push(v as u8),
            tlv_tag::FREQUENCY_SHIFT_7P5_KHZ
            | tlv_tag::BCH_PAYLOAD
            | tlv_tag::PRACH_SEQUENCE_LENGTH
            | tlv_tag::NUM_ROOT_SEQUENCES
            | tlv_tag::NUM_UNUSED_ROOT_SEQUENCES
            | tlv_tag::UNUSED_ROOT_SEQUENCES
            | tlv_tag::PRACH_MULTIPLE_CARRIERS_IN_A_BAND
            | tlv_tag::BETA_PSS
            | tlv_tag::SS_PBCH_MULTIPLE_CARRIERS_IN_A_BAND
            | tlv_tag::MULTIPLE_CELLS_SS_PBCH_IN_A_CARRIER
            | tlv_tag::RSSI_MEASUREMENT => {
                debug!("[P5] TLV {:#06x} has no vendor counterpart", tlv.tag);
            }
            tag => error!("[P5] unsupported CONFIG.request TLV {:#06x}", tag),
        }
    }

    if let Some(offset) = ssb_offset_point_a {
        cfg.ssb_prb_offset = ssb_prb_offset(offset, cfg.subc_common);
    }

    // FDD carries no TDD pattern
    if DuplexMode::from_fapi(cfg.frame_duplex_type) == DuplexMode::Fdd {
        cfg.tdd_period = 0;
        return;
    }
    if let Some(code) = tdd_period {
        cfg.tdd_period = tdd_period_slots(cfg.subc_common, code);
        if cfg.tdd_period == 0 {
            error!("[P5] TDD period code {} invalid for numerology {}", code, cfg.subc_common);
        }
    }
    let slots = cfg.tdd_period as usize;
    if slot_symbols.len() < slots * SYMBOLS_PER_SLOT {
        warn!("[P5] TDD pattern of {} slots has only {} symbol entries", slots, slot_symbols.len());
    }
    cfg.slot_config = slot_symbols
        .chunks(SYMBOLS_PER_SLOT)
        .take(slots)
        .map(|chunk| {
            let mut slot = [0u8; SYMBOLS_PER_SLOT];
            slot[..chunk.len()].copy_from_slice(chunk);
            slot
        })
        .collect();
}
