//! PHY → MAC Dispatcher
//!
//! Every receive cycle opens an empty list for each CONFIGURED or RUNNING
//! cell, dispatches the PHY messages by type and finally appends the
//! vendor P7 records. Lists that stay empty are never sent.

use std::time::Duration;

use interfaces::iapi::IapiMessage;
use interfaces::wls::{ReceivedElement, FREE_BLOCKS_PER_PHY};
use interfaces::InterfaceError;
use tracing::{error, trace, warn};

use crate::context::{PhyContext, PhyState};
use crate::p7::VendorExt;
use crate::urllc::{UrllcMailbox, UrllcWork};
use crate::{p5, p7, FapiError};

pub type PhyBatch = Vec<ReceivedElement<IapiMessage>>;

/// Open the list of every active cell for this cycle
pub fn seed_headers(ctx: &PhyContext, urllc: bool) {
    for phy_id in ctx.phys_in(&[PhyState::Configured, PhyState::Running]) {
        if let Err(e) = ctx.fapi2mac.seed_header(ctx.pool(), phy_id, urllc) {
            error!("[PHY2MAC] phy {}: cannot open list: {}", phy_id, e);
        }
    }
}

fn dispatch(ctx: &PhyContext, msg: &IapiMessage, vendor: &mut VendorExt, urllc: bool) -> Result<(), FapiError> {
    match msg {
        IapiMessage::ConfigResp(resp) => p5::config_response(ctx, resp),
        IapiMessage::StartResp(resp) => p5::start_response(ctx, resp),
        IapiMessage::StopResp(resp) => p5::stop_response(ctx, resp),
        IapiMessage::ShutdownResp(resp) => p5::shutdown_response(ctx, resp),
        IapiMessage::ErrInd(ind) => p5::error_indication(ctx, ind),
        IapiMessage::SlotInd(ind) => p7::slot_indication(ctx, ind, vendor, urllc),
        IapiMessage::CrcInd(ind) => p7::crc_indication(ctx, ind, vendor, urllc),
        IapiMessage::RxUlschInd(ind) => p7::rx_data_indication(ctx, ind, vendor, urllc),
        IapiMessage::RxUlschUciInd(ind) => p7::uci_on_pusch_indication(ctx, ind, urllc),
        IapiMessage::UciInd(ind) => p7::uci_indication(ctx, ind, vendor, urllc),
        IapiMessage::RxSrsInd(ind) => p7::srs_indication(ctx, ind, vendor, urllc),
        IapiMessage::RxRachInd(ind) => p7::rach_indication(ctx, ind, urllc),
        other => Err(FapiError::TranslationFailure(format!("unexpected {:?} from the PHY", other.msg_type()))),
    }
}

/// Handle one received list of either class
pub fn recv_handler(ctx: &PhyContext, list: PhyBatch, urllc: bool) {
    seed_headers(ctx, urllc);
    let mut vendor = VendorExt::new();

    for elem in list {
        let msg_type = elem.msg_type;
        let Some(msg) = elem.into_message() else {
            warn!("[PHY2MAC] raw block type {:#x} ignored", msg_type);
            continue;
        };
        trace!("[PHY2MAC] {:?} carrier {}", msg.msg_type(), msg.carrier_idx());
        if let Err(e) = dispatch(ctx, &msg, &mut vendor, urllc) {
            error!("[PHY2MAC] {:?}: {}", msg.msg_type(), e);
        }
    }

    if let Err(e) = vendor.flush_into(ctx, urllc) {
        error!("[PHY2MAC] vendor indications dropped: {}", e);
    }
}

/// Keep enough empty UL blocks posted for the PHY's indications
fn replenish_ul(ctx: &PhyContext) {
    let target = FREE_BLOCKS_PER_PHY * usize::from(ctx.num_phy_instance());
    match ctx.phy.add_blocks_to_ul(target) {
        Ok(0) => {}
        Ok(n) => trace!("[PHY2MAC] posted {} UL blocks", n),
        Err(e) => warn!("[PHY2MAC] UL block top-up stopped: {}", e),
    }
}

/// One cycle of the phy2mac worker: receive, translate, send. URLLC
/// batches go to `urllc` when a URLLC worker runs, else are handled here.
pub fn poll(ctx: &PhyContext, timeout: Option<Duration>, urllc: Option<&UrllcMailbox>) -> Result<(), FapiError> {
    let lists = match ctx.phy.recv(timeout) {
        Ok(lists) => lists,
        Err(InterfaceError::Timeout) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    replenish_ul(ctx);

    if !lists.urllc.is_empty() {
        match urllc {
            Some(mailbox) => {
                if mailbox.post(UrllcWork::Phy2Mac(lists.urllc)).is_err() {
                    warn!("[PHY2MAC] URLLC mailbox closed, batch dropped");
                }
            }
            None => {
                recv_handler(ctx, lists.urllc, true);
                ctx.fapi2mac.flush(&ctx.mac, true)?;
            }
        }
    }
    if !lists.normal.is_empty() {
        recv_handler(ctx, lists.normal, false);
    }
    ctx.fapi2mac.flush(&ctx.mac, false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use interfaces::fapi::{FapiMessage, MsgHeaderInd, SlotIndication};
    use interfaces::iapi::{CarrierSlot, CrcEntry, CrcInd, SlotInd, StatusResp};
    use interfaces::wls::{ReceivedBody, WlsFlags};

    use super::*;
    use crate::context::test_support::Harness;
    use crate::p7::test_support::{pusch, running, schedule};

    fn elem(msg: IapiMessage) -> ReceivedElement<IapiMessage> {
        ReceivedElement { pa: 0, size: 0, msg_type: msg.msg_type().raw(), flags: WlsFlags::empty(), body: ReceivedBody::Message(msg) }
    }

    fn tick(sfn: u16, slot: u8) -> IapiMessage {
        IapiMessage::SlotInd(SlotInd { slot: CarrierSlot::new(0, sfn, slot, 0) })
    }

    #[test]
    fn test_idle_cycle_sends_nothing() {
        let h = Harness::new();
        h.force_state(0, PhyState::Configured);
        recv_handler(&h.ctx, vec![elem(tick(1, 1))], false);
        h.flush();
        assert!(h.mac_messages().is_empty());
    }

    #[test]
    fn test_vendor_records_follow_indications() {
        let h = Harness::new();
        running(&h, 0);
        schedule(&h, 0, 5, 4, vec![pusch(3, 1)]);

        let crc = CrcInd {
            slot: CarrierSlot::new(0, 5, 4, 0),
            crc: vec![CrcEntry { ue_id: 3, rnti: 0x4603, crc_flag: 1, snr: 20, ta: 31 }],
        };
        recv_handler(&h.ctx, vec![elem(tick(5, 4)), elem(IapiMessage::CrcInd(crc))], false);
        h.flush();

        let msgs = h.mac_messages();
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0], FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 3, phy_id: 0 }));
        assert_eq!(msgs[1], FapiMessage::SlotIndication(SlotIndication { sfn: 5, slot: 4 }));
        assert!(matches!(msgs[2], FapiMessage::CrcIndication(_)));
        let FapiMessage::VendorP7Indication(v) = &msgs[3] else { panic!("expected vendor indication last") };
        assert!(v.slot_ind.is_some());
        assert_eq!(v.crc_snr, vec![20]);
    }

    #[test]
    fn test_bad_message_does_not_stop_the_list() {
        let h = Harness::new();
        running(&h, 0);
        let stray = CrcInd { slot: CarrierSlot::new(0, 8, 8, 0), crc: vec![CrcEntry::default()] };
        recv_handler(&h.ctx, vec![elem(IapiMessage::CrcInd(stray)), elem(tick(8, 9))], false);
        h.flush();
        let msgs = h.mac_messages();
        assert!(msgs.iter().any(|m| matches!(m, FapiMessage::SlotIndication(s) if s.slot == 9)));
        assert!(!msgs.iter().any(|m| matches!(m, FapiMessage::CrcIndication(_))));
    }

    #[test]
    fn test_poll_start_response_over_wls() {
        let h = Harness::new();
        h.force_state(0, PhyState::Configured);
        let resp = IapiMessage::StartResp(StatusResp { carrier_idx: 0, status: 0, ..Default::default() });
        let list = vec![h.phy_peer.element(resp).unwrap()];
        h.phy_peer.send(list, false).unwrap();

        poll(&h.ctx, Some(Duration::from_millis(10)), None).unwrap();
        assert_eq!(h.ctx.phy(0).unwrap().state(), PhyState::Running);
        // A successful START produces no message for the MAC
        assert!(h.mac_messages().is_empty());
    }

    #[test]
    fn test_ul_blocks_topped_up_per_instance() {
        let h = Harness::new();
        let config = IapiMessage::ConfigResp(StatusResp { carrier_idx: 0, status: 0, ..Default::default() });
        h.phy_peer.send(vec![h.phy_peer.element(config).unwrap()], false).unwrap();
        poll(&h.ctx, Some(Duration::from_millis(10)), None).unwrap();
        assert_eq!(h.ctx.num_phy_instance(), 1);

        h.phy_peer.send(vec![h.phy_peer.element(tick(0, 1)).unwrap()], false).unwrap();
        poll(&h.ctx, Some(Duration::from_millis(10)), None).unwrap();
        assert_eq!(h.ctx.phy.transport().posted_blocks(), FREE_BLOCKS_PER_PHY);
    }

    #[test]
    fn test_poll_timeout_is_quiet() {
        let h = Harness::new();
        poll(&h.ctx, Some(Duration::from_millis(1)), None).unwrap();
    }
}
