//! START / STOP / SHUTDOWN
//!
//! Requests are forwarded to the PHY without touching the cell state; the
//! matching vendor responses perform the transitions.

use interfaces::fapi::{ErrorIndication, FapiMessage, ShutdownRequest, StopIndication, VendorMessage};
use interfaces::iapi::{IapiMessage, ShutdownReq, StartReq, StatusResp, StopReq};
use interfaces::message_types::FapiMsgId;
use tracing::{error, info, warn};

use super::{resolve, to_mac, to_phy};
use crate::context::{PhyContext, PhyInstance, PhyState};
use crate::FapiError;

/// Highest vendor start mode
const MAX_START_MODE: u8 = 4;
/// Start mode whose count / period fields are meaningful
const START_MODE_TIMED: u8 = 1;
/// Shutdown attempts after the first failed response
const MAX_SHUTDOWN_RETRIES: u8 = 3;
/// Vendor STOP_RESP status reporting a failed stop
const STOP_STATUS_FAILURE: u32 = 1;

fn missing_vendor(msg: &str, phy_id: u8) -> FapiError {
    FapiError::TranslationFailure(format!("{} for phy {} without vendor message", msg, phy_id))
}

pub fn start_request(ctx: &PhyContext, phy_id: u8, vendor: Option<&VendorMessage>) -> Result<(), FapiError> {
    let mut inst = ctx.phy(phy_id)?.lock();
    inst.stats.fapi.start_req += 1;
    inst.require_state(&[PhyState::Configured], "START.request")?;
    let v = &vendor.ok_or_else(|| missing_vendor("START.request", phy_id))?.start_req_vendor;
    if v.mode > MAX_START_MODE {
        return Err(FapiError::TranslationFailure(format!("START.request mode {} out of range", v.mode)));
    }

    let mut req = StartReq { carrier_idx: inst.phy_id, sfn: v.sfn, slot: v.slot, mode: v.mode, ..Default::default() };
    if v.mode == START_MODE_TIMED {
        req.count = v.count;
        req.period = v.period;
    }
    info!("[P5] phy {} START.request mode {} at {}.{}", phy_id, req.mode, req.sfn, req.slot);
    to_phy(ctx, IapiMessage::StartReq(req))?;
    inst.stats.iapi.start_req += 1;
    inst.stats.log_summary(phy_id);
    Ok(())
}

pub fn start_response(ctx: &PhyContext, resp: &StatusResp) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, resp.carrier_idx, "START.response")?;
    inst.stats.iapi.start_res += 1;
    let phy_id = inst.phy_id;

    if resp.status != 0 {
        error!("[P5] phy {} failed to start: status {}", phy_id, resp.status);
        let ind = ErrorIndication {
            sfn: resp.sfn_slot.sfn,
            slot: resp.sfn_slot.slot as u16,
            message_id: FapiMsgId::StartRequest.raw(),
            error_code: resp.status as u8,
        };
        to_mac(ctx, phy_id, FapiMessage::ErrorIndication(ind))?;
        inst.stats.fapi.error_ind += 1;
        return Ok(());
    }

    match inst.state {
        PhyState::Configured => {
            inst.state = PhyState::Running;
            info!("[P5] phy {} RUNNING", phy_id);
        }
        other => warn!("[P5] phy {} START.response in state {}", phy_id, other),
    }
    Ok(())
}

pub fn stop_request(ctx: &PhyContext, phy_id: u8, vendor: Option<&VendorMessage>) -> Result<(), FapiError> {
    let mut inst = ctx.phy(phy_id)?.lock();
    inst.stats.fapi.stop_req += 1;
    let v = &vendor.ok_or_else(|| missing_vendor("STOP.request", phy_id))?.stop_req_vendor;

    let req = StopReq { carrier_idx: inst.phy_id, sfn: v.sfn, slot: v.slot };
    info!("[P5] phy {} STOP.request at {}.{}", phy_id, req.sfn, req.slot);
    to_phy(ctx, IapiMessage::StopReq(req))?;
    inst.stats.iapi.stop_req += 1;
    inst.stats.log_summary(phy_id);
    Ok(())
}

/// STOP_RESP from the PHY; success ends RUNNING
pub fn stop_response(ctx: &PhyContext, resp: &StatusResp) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, resp.carrier_idx, "STOP.response")?;
    inst.stats.iapi.stop_ind += 1;
    let phy_id = inst.phy_id;

    match resp.status {
        0 => {
            if inst.state == PhyState::Running {
                inst.state = PhyState::Configured;
                info!("[P5] phy {} stopped, CONFIGURED", phy_id);
            } else {
                warn!("[P5] phy {} STOP.response in state {}", phy_id, inst.state);
            }
            to_mac(ctx, phy_id, FapiMessage::StopIndication(StopIndication))?;
            inst.stats.fapi.stop_ind += 1;
            Ok(())
        }
        STOP_STATUS_FAILURE => {
            error!("[P5] phy {} failed to stop", phy_id);
            let ind = ErrorIndication {
                sfn: resp.sfn_slot.sfn,
                slot: resp.sfn_slot.slot as u16,
                message_id: FapiMsgId::StopRequest.raw(),
                error_code: resp.status as u8,
            };
            to_mac(ctx, phy_id, FapiMessage::ErrorIndication(ind))?;
            inst.stats.fapi.error_ind += 1;
            Ok(())
        }
        status => Err(FapiError::TranslationFailure(format!(
            "STOP.response for phy {} with unknown status {}",
            phy_id, status
        ))),
    }
}

fn queue_shutdown(ctx: &PhyContext, inst: &mut PhyInstance, req: &ShutdownRequest) -> Result<(), FapiError> {
    let iapi = ShutdownReq { carrier_idx: inst.phy_id, sfn: req.sfn, slot: req.slot, test_type: req.test_type };
    to_phy(ctx, IapiMessage::ShutdownReq(iapi))?;
    inst.shutdown_test_type = req.test_type;
    inst.stats.iapi.shutdown_req += 1;
    Ok(())
}

pub fn shutdown_request(ctx: &PhyContext, phy_id: u8, req: &ShutdownRequest) -> Result<(), FapiError> {
    let mut inst = ctx.phy(phy_id)?.lock();
    inst.stats.fapi.vext_shutdown_req += 1;
    info!("[P5] phy {} SHUTDOWN.request test type {}", phy_id, req.test_type);
    queue_shutdown(ctx, &mut inst, req)
}

/// SHUTDOWN_RESP from the PHY; failures are retried a bounded number of times
pub fn shutdown_response(ctx: &PhyContext, resp: &StatusResp) -> Result<(), FapiError> {
    let entry = ctx.phy(resp.carrier_idx)?;
    let mut inst = resolve(ctx, resp.carrier_idx, "SHUTDOWN.response")?;
    inst.stats.iapi.shutdown_res += 1;
    let phy_id = inst.phy_id;

    let mut retry = false;
    if resp.status == 0 {
        info!("[P5] phy {} shut down", phy_id);
        to_mac(ctx, phy_id, FapiMessage::StopIndication(StopIndication))?;
        inst.stats.fapi.stop_ind += 1;
        inst.shutdown_retries = 0;
        entry.ul_slots.clear();
    } else {
        inst.shutdown_retries += 1;
        if inst.shutdown_retries <= MAX_SHUTDOWN_RETRIES {
            warn!("[P5] phy {} shutdown failed (status {}), retry {}", phy_id, resp.status, inst.shutdown_retries);
            let req = ShutdownRequest { sfn: 0, slot: 0, test_type: inst.shutdown_test_type };
            queue_shutdown(ctx, &mut inst, &req)?;
            retry = true;
        } else {
            error!("[P5] phy {} shutdown failed after {} retries", phy_id, MAX_SHUTDOWN_RETRIES);
            let ind = ErrorIndication {
                sfn: resp.sfn_slot.sfn,
                slot: resp.sfn_slot.slot as u16,
                message_id: FapiMsgId::VendorExtShutdownRequest.raw(),
                error_code: resp.status as u8,
            };
            to_mac(ctx, phy_id, FapiMessage::ErrorIndication(ind))?;
            inst.shutdown_retries = 0;
            inst.stats.fapi.error_ind += 1;
        }
    }

    inst.stats.log_summary(phy_id);
    inst.stats.reset();
    drop(inst);

    if retry {
        ctx.fapi2phy.flush(&ctx.phy, false)?;
    }
    Ok(())
}
