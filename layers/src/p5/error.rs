//! ERR_IND from the PHY becomes ERROR.indication

use interfaces::fapi::{ErrorIndication, FapiMessage};
use interfaces::iapi::ErrInd;
use interfaces::message_types::{FapiMsgId, IapiMsgType};
use tracing::warn;

use super::{resolve, to_mac};
use crate::context::PhyContext;
use crate::FapiError;

/// FAPI request id behind a failing vendor request, 0 when there is none
fn originating_request(msg_type: u16) -> u16 {
    let id = match IapiMsgType::from_raw(msg_type) {
        Some(IapiMsgType::ConfigReq) => FapiMsgId::ConfigRequest,
        Some(IapiMsgType::StartReq) => FapiMsgId::StartRequest,
        Some(IapiMsgType::StopReq) => FapiMsgId::StopRequest,
        Some(IapiMsgType::ShutdownReq) => FapiMsgId::VendorExtShutdownRequest,
        Some(IapiMsgType::DlConfigReq) => FapiMsgId::DlTtiRequest,
        Some(IapiMsgType::UlConfigReq) => FapiMsgId::UlTtiRequest,
        Some(IapiMsgType::UlDciReq) => FapiMsgId::UlDciRequest,
        Some(IapiMsgType::TxReq) => FapiMsgId::TxDataRequest,
        _ => return 0,
    };
    id.raw()
}

pub fn error_indication(ctx: &PhyContext, ind: &ErrInd) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, ind.carrier_idx, "ERR_IND")?;
    inst.stats.iapi.error_ind += 1;
    let phy_id = inst.phy_id;

    let out = ErrorIndication {
        sfn: ind.sfn_slot.sfn,
        slot: ind.sfn_slot.slot as u16,
        message_id: originating_request(ind.msg_type),
        error_code: ind.status as u8,
    };
    warn!("[P5] phy {} ERROR.indication msg {:#x} status {} at {}.{}",
          phy_id, out.message_id, ind.status, out.sfn, out.slot);
    to_mac(ctx, phy_id, FapiMessage::ErrorIndication(out))?;
    inst.stats.fapi.error_ind += 1;
    Ok(())
}
