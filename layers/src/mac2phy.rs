//! MAC → PHY Dispatcher
//!
//! A list received from the MAC holds one sub-list per carrier, each opened
//! by a `MsgHeaderInd`. Every sub-list is validated against the cell state,
//! stripped of its vendor message and zero-copy blocks and then dispatched
//! message by message. The translated requests are sent to the PHY in one
//! transfer per receive cycle.

use std::time::Duration;

use interfaces::fapi::{FapiMessage, VendorMessage};
use interfaces::message_types::FapiMsgId;
use interfaces::wls::{DataRef, ReceivedElement};
use interfaces::InterfaceError;
use tracing::{debug, error, trace, warn};

use crate::context::{PhyContext, PhyState};
use crate::urllc::{UrllcMailbox, UrllcWork};
use crate::{p5, p7, FapiError};

pub type MacBatch = Vec<ReceivedElement<FapiMessage>>;

/// Messages of one carrier taken from a received list
#[derive(Debug, Default)]
pub struct CarrierList {
    pub phy_id: u8,
    pub msgs: Vec<FapiMessage>,
    /// Payload blocks for TX_DATA.request, in arrival order
    pub zbc: Vec<DataRef>,
}

/// Split a received list at its carrier headers. Headers announcing no
/// messages are skipped along with anything that precedes the first header.
pub fn split_carriers(list: MacBatch) -> Vec<CarrierList> {
    let mut carriers = Vec::new();
    let mut current: Option<CarrierList> = None;

    for elem in list {
        let data = elem.as_data_ref();
        match elem.into_message() {
            Some(FapiMessage::MsgHeader(hdr)) => {
                carriers.extend(current.take());
                if hdr.num_msg == 0 {
                    trace!("[MAC2PHY] no APIs for phy {}, skipping", hdr.phy_id);
                    continue;
                }
                trace!("[MAC2PHY] phy {}: {} APIs", hdr.phy_id, hdr.num_msg);
                current = Some(CarrierList { phy_id: hdr.phy_id, ..Default::default() });
            }
            Some(msg) => match current.as_mut() {
                Some(c) => c.msgs.push(msg),
                None => warn!("[MAC2PHY] {:?} outside a carrier list dropped", msg.msg_id()),
            },
            None if data.msg_type == FapiMsgId::VendorZbcBlock.raw() => match current.as_mut() {
                Some(c) => c.zbc.push(data),
                None => warn!("[MAC2PHY] payload block {:#x} outside a carrier list dropped", data.pa),
            },
            None => warn!("[MAC2PHY] unexpected raw block type {:#x}", data.msg_type),
        }
    }
    carriers.extend(current);
    carriers
}

/// Detach the vendor message; only messages before it are dispatched
fn take_vendor(msgs: &mut Vec<FapiMessage>) -> Option<VendorMessage> {
    let pos = msgs.iter().position(|m| matches!(m, FapiMessage::Vendor(_)))?;
    let tail = msgs.split_off(pos);
    if tail.len() > 1 {
        debug!("[MAC2PHY] {} messages after the vendor message ignored", tail.len() - 1);
    }
    match tail.into_iter().next() {
        Some(FapiMessage::Vendor(v)) => Some(v),
        _ => None,
    }
}

/// A RUNNING cell expects an optional CONFIG.request, then DL_TTI.request
/// followed by UL_TTI.request
fn check_api_ordering(msgs: &[FapiMessage]) -> Result<(), FapiError> {
    let mut rest = msgs;
    if let Some(FapiMessage::ConfigRequest(_)) = rest.first() {
        rest = &rest[1..];
    }
    match rest {
        [FapiMessage::DlTtiRequest(_), FapiMessage::UlTtiRequest(_), ..] => Ok(()),
        _ => Err(FapiError::ApiOrdering(format!(
            "expected DL_TTI.request then UL_TTI.request, got {:?}",
            rest.iter().take(2).map(FapiMessage::msg_id).collect::<Vec<_>>()
        ))),
    }
}

fn dispatch(
    ctx: &PhyContext,
    phy_id: u8,
    msg: &FapiMessage,
    vendor: Option<&VendorMessage>,
    zbc: &[DataRef],
    urllc: bool,
) -> Result<(), FapiError> {
    match msg {
        FapiMessage::ParamRequest(_) => p5::param_request(ctx, phy_id),
        FapiMessage::ConfigRequest(req) => p5::config_request(ctx, phy_id, req, vendor),
        FapiMessage::StartRequest(_) => p5::start_request(ctx, phy_id, vendor),
        FapiMessage::StopRequest(_) => p5::stop_request(ctx, phy_id, vendor),
        FapiMessage::ShutdownRequest(req) => p5::shutdown_request(ctx, phy_id, req),
        FapiMessage::DlTtiRequest(req) => p7::dl_tti_request(ctx, phy_id, req, vendor, urllc),
        FapiMessage::UlTtiRequest(req) => p7::ul_tti_request(ctx, phy_id, req, vendor, urllc),
        FapiMessage::UlDciRequest(req) => p7::ul_dci_request(ctx, phy_id, req, vendor, urllc),
        FapiMessage::TxDataRequest(req) => p7::tx_data_request(ctx, phy_id, req, zbc, urllc),
        other => Err(FapiError::TranslationFailure(format!("unexpected {:?} from the MAC", other.msg_id()))),
    }
}

/// Validate and dispatch the messages of one carrier
pub fn process_carrier(ctx: &PhyContext, mut list: CarrierList, urllc: bool) -> Result<(), FapiError> {
    let phy_id = list.phy_id;
    let state = ctx.phy(phy_id)?.state();

    if matches!(list.msgs.first(), Some(FapiMessage::Vendor(_))) {
        return Err(FapiError::NoValidData(format!("phy {}: received only a vendor message", phy_id)));
    }
    if state == PhyState::Idle && !matches!(list.msgs.first(), Some(FapiMessage::ConfigRequest(_))) {
        return Err(FapiError::InvalidState { phy_id, state, msg: "any request before CONFIG.request" });
    }

    let vendor = take_vendor(&mut list.msgs);
    if state == PhyState::Running {
        check_api_ordering(&list.msgs)?;
    }

    for msg in &list.msgs {
        if let Err(e) = dispatch(ctx, phy_id, msg, vendor.as_ref(), &list.zbc, urllc) {
            error!("[MAC2PHY] phy {} {:?}: {}", phy_id, msg.msg_id(), e);
        }
    }
    Ok(())
}

/// Handle one received list of either class
pub fn recv_handler(ctx: &PhyContext, list: MacBatch, urllc: bool) {
    for carrier in split_carriers(list) {
        let phy_id = carrier.phy_id;
        if let Err(e) = process_carrier(ctx, carrier, urllc) {
            error!("[MAC2PHY] phy {} list dropped: {}", phy_id, e);
        }
    }
}

/// One cycle of the mac2phy worker: receive, translate, send. URLLC
/// batches go to `urllc` when a URLLC worker runs, else are handled here.
pub fn poll(ctx: &PhyContext, timeout: Option<Duration>, urllc: Option<&UrllcMailbox>) -> Result<(), FapiError> {
    let lists = match ctx.mac.recv(timeout) {
        Ok(lists) => lists,
        Err(InterfaceError::Timeout) => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    if !lists.urllc.is_empty() {
        match urllc {
            Some(mailbox) => {
                if mailbox.post(UrllcWork::Mac2Phy(lists.urllc)).is_err() {
                    warn!("[MAC2PHY] URLLC mailbox closed, batch dropped");
                }
            }
            None => {
                recv_handler(ctx, lists.urllc, true);
                ctx.fapi2phy.flush(&ctx.phy, true)?;
            }
        }
    }
    if !lists.normal.is_empty() {
        recv_handler(ctx, lists.normal, false);
    }
    ctx.fapi2phy.flush(&ctx.phy, false)?;
    Ok(())
}
