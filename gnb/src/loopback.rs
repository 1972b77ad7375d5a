//! In-process peers for bring-up without a MAC or PHY
//!
//! The echo PHY acknowledges every P5 request and ticks SLOT_IND while a
//! carrier runs. The scripted MAC configures and starts each cell, then
//! answers every SLOT.indication with an empty DL_TTI / UL_TTI pair.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use common::{SfnSlot, SubcarrierSpacing};
use interfaces::fapi::{
    tlv_tag, ConfigRequest, ConfigTlv, DlTtiRequest, FapiMessage, MsgHeaderInd, StartRequest, UlTtiRequest,
    VendorMessage,
};
use interfaces::iapi::{CarrierSlot, IapiMessage, SlotInd, StatusResp};
use interfaces::wls::{BufferPool, LocalWls, OutboundElement, Reclaim, WireMessage, WlsSession};
use interfaces::InterfaceError;
use layers::MAX_PHY_INSTANCES;
use tracing::{debug, info, warn};

/// Spacing the scripted MAC configures
const SCS: SubcarrierSpacing = SubcarrierSpacing::Scs30;
const SLOT_DURATION: Duration = Duration::from_micros(1000 >> SCS as u8);

fn send_all<M: WireMessage>(session: &WlsSession<M>, msgs: Vec<M>) -> Result<(), InterfaceError> {
    let list = msgs
        .into_iter()
        .map(|m| session.element(m))
        .collect::<Result<Vec<OutboundElement<M>>, _>>()?;
    session.send(list, false).map(|_| ())
}

/// Answer to one PHY request, if any
fn echo(msg: &IapiMessage, running: &mut [bool]) -> Option<IapiMessage> {
    let ok = |carrier_idx: u8| StatusResp { carrier_idx, status: 0, ..Default::default() };
    match msg {
        IapiMessage::ConfigReq(req) => Some(IapiMessage::ConfigResp(ok(req.carrier_idx))),
        IapiMessage::StartReq(req) => {
            if let Some(r) = running.get_mut(req.carrier_idx as usize) {
                *r = true;
            }
            Some(IapiMessage::StartResp(ok(req.carrier_idx)))
        }
        IapiMessage::StopReq(req) => {
            if let Some(r) = running.get_mut(req.carrier_idx as usize) {
                *r = false;
            }
            Some(IapiMessage::StopResp(ok(req.carrier_idx)))
        }
        IapiMessage::ShutdownReq(req) => Some(IapiMessage::ShutdownResp(ok(req.carrier_idx))),
        _ => None,
    }
}

fn echo_phy(session: WlsSession<IapiMessage>, stop: Arc<AtomicBool>) {
    let mut running = [false; MAX_PHY_INSTANCES];
    let mut now = SfnSlot::new(0, 0);
    let mut next_tick = Instant::now();

    while !stop.load(Ordering::Acquire) {
        match session.recv(Some(SLOT_DURATION)) {
            Ok(lists) => {
                let replies: Vec<IapiMessage> = lists
                    .normal
                    .iter()
                    .chain(&lists.urllc)
                    .filter_map(|e| e.message())
                    .filter_map(|m| echo(m, &mut running))
                    .collect();
                if !replies.is_empty() {
                    debug!("[LOOPBACK] PHY answering {} requests", replies.len());
                    if let Err(e) = send_all(&session, replies) {
                        warn!("[LOOPBACK] PHY send failed: {}", e);
                    }
                }
            }
            Err(InterfaceError::Timeout) => {}
            Err(e) => warn!("[LOOPBACK] PHY receive failed: {}", e),
        }

        if running.iter().any(|r| *r) && Instant::now() >= next_tick {
            next_tick += SLOT_DURATION;
            let tick = IapiMessage::SlotInd(SlotInd { slot: CarrierSlot::new(0, now.sfn, now.slot, 0) });
            if let Err(e) = send_all(&session, vec![tick]) {
                warn!("[LOOPBACK] PHY tick failed: {}", e);
            }
            now = now.next_slot(SCS.slots_per_frame());
        } else if !running.iter().any(|r| *r) {
            next_tick = Instant::now();
        }
    }
}

/// CONFIG.request TLVs of a 20 MHz FDD cell
fn cell_config(phy_id: u8) -> ConfigRequest {
    let tlv = ConfigTlv::new;
    ConfigRequest {
        tlvs: vec![
            tlv(tlv_tag::DL_BANDWIDTH, 20),
            tlv(tlv_tag::UPLINK_BANDWIDTH, 20),
            tlv(tlv_tag::NUM_TX_ANT, 1),
            tlv(tlv_tag::NUM_RX_ANT, 1),
            tlv(tlv_tag::PHY_CELL_ID, u32::from(phy_id) + 1),
            tlv(tlv_tag::FRAME_DUPLEX_TYPE, 0),
            tlv(tlv_tag::SCS_COMMON, u32::from(SCS.numerology())),
            tlv(tlv_tag::SS_PBCH_POWER, 0),
        ],
    }
}

fn carrier_list(phy_id: u8, msgs: Vec<FapiMessage>) -> Vec<FapiMessage> {
    let header = FapiMessage::MsgHeader(MsgHeaderInd { num_msg: (msgs.len() + 1) as u8, phy_id });
    let mut list = Vec::with_capacity(msgs.len() + 2);
    list.push(header);
    list.extend(msgs);
    list.push(FapiMessage::Vendor(VendorMessage::default()));
    list
}

fn scripted_mac(session: WlsSession<FapiMessage>, cells: u8, slots: Arc<AtomicU64>, stop: Arc<AtomicBool>) {
    for phy_id in 0..cells {
        let config = carrier_list(phy_id, vec![FapiMessage::ConfigRequest(cell_config(phy_id))]);
        if let Err(e) = send_all(&session, config) {
            warn!("[LOOPBACK] MAC CONFIG.request for phy {} failed: {}", phy_id, e);
        }
    }

    while !stop.load(Ordering::Acquire) {
        let lists = match session.recv(Some(Duration::from_millis(10))) {
            Ok(lists) => lists,
            Err(InterfaceError::Timeout) => continue,
            Err(e) => {
                warn!("[LOOPBACK] MAC receive failed: {}", e);
                continue;
            }
        };

        let mut out = Vec::new();
        let mut phy_id = 0;
        for msg in lists.normal.iter().chain(&lists.urllc).filter_map(|e| e.message()) {
            match msg {
                FapiMessage::MsgHeader(hdr) => phy_id = hdr.phy_id,
                FapiMessage::ConfigResponse(resp) if resp.error_code == 0 => {
                    info!("[LOOPBACK] MAC phy {} configured, starting", phy_id);
                    out.extend(carrier_list(phy_id, vec![FapiMessage::StartRequest(StartRequest)]));
                }
                FapiMessage::SlotIndication(ind) => {
                    slots.fetch_add(1, Ordering::Relaxed);
                    out.extend(carrier_list(
                        phy_id,
                        vec![
                            FapiMessage::DlTtiRequest(DlTtiRequest { sfn: ind.sfn, slot: ind.slot, ..Default::default() }),
                            FapiMessage::UlTtiRequest(UlTtiRequest { sfn: ind.sfn, slot: ind.slot, ..Default::default() }),
                        ],
                    ));
                }
                FapiMessage::ErrorIndication(err) => {
                    warn!("[LOOPBACK] MAC phy {} ERROR.indication {:?}", phy_id, err);
                }
                _ => {}
            }
        }
        if !out.is_empty() {
            if let Err(e) = send_all(&session, out) {
                warn!("[LOOPBACK] MAC send failed: {}", e);
            }
        }
    }
}

/// Running loopback peers
pub struct Loopback {
    stop: Arc<AtomicBool>,
    slots: Arc<AtomicU64>,
    handles: Vec<JoinHandle<()>>,
}

impl Loopback {
    /// Drive the far ends of both links; `mac` and `phy` are the endpoints
    /// the translation layer does not own
    pub fn start(pool: &Arc<BufferPool>, mac: LocalWls, phy: LocalWls, cells: u8) -> anyhow::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let slots = Arc::new(AtomicU64::new(0));
        mac.attach();
        phy.attach();
        let mac = WlsSession::new("MAC", Arc::clone(pool), Arc::new(mac), Reclaim::Peer);
        let phy = WlsSession::new("PHY", Arc::clone(pool), Arc::new(phy), Reclaim::Peer);

        let handles = vec![
            thread::Builder::new()
                .name("loopback-phy".into())
                .spawn({
                    let stop = Arc::clone(&stop);
                    move || echo_phy(phy, stop)
                })
                .context("cannot spawn loopback PHY")?,
            thread::Builder::new()
                .name("loopback-mac".into())
                .spawn({
                    let (stop, slots) = (Arc::clone(&stop), Arc::clone(&slots));
                    move || scripted_mac(mac, cells.min(MAX_PHY_INSTANCES as u8), slots, stop)
                })
                .context("cannot spawn loopback MAC")?,
        ];
        info!("[LOOPBACK] echo PHY and scripted MAC started for {} cells", cells);
        Ok(Self { stop, slots, handles })
    }

    /// SLOT.indications the scripted MAC has seen
    pub fn slots(&self) -> u64 {
        self.slots.load(Ordering::Relaxed)
    }

    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("[LOOPBACK] peer thread panicked");
            }
        }
    }
}
