//! SLOT.indication fan-out
//!
//! The PHY ticks once per slot; every RUNNING cell gets its own
//! SLOT.indication regardless of which carrier the tick names.

use interfaces::fapi::{FapiMessage, SlotIndication};
use interfaces::iapi::SlotInd;
use tracing::debug;

use super::to_mac;
use super::vendor_ext::{stamp, VendorExt};
use crate::context::{PhyContext, PhyState};
use crate::FapiError;

pub fn slot_indication(
    ctx: &PhyContext,
    ind: &SlotInd,
    vendor: &mut VendorExt,
    urllc: bool,
) -> Result<(), FapiError> {
    let t = ind.slot.sfn_slot;
    for phy_id in ctx.phys_in(&[PhyState::Running]) {
        let mut inst = ctx.phy(phy_id)?.lock();
        inst.verify(phy_id, "SLOT.indication")?;
        inst.stats.iapi.slot_ind += 1;

        let out = SlotIndication { sfn: t.sfn, slot: u16::from(t.slot) };
        if let Some(v) = vendor.get(phy_id) {
            v.slot_ind = stamp(ind.slot.carrier_idx, t.sym);
        }
        to_mac(ctx, phy_id, FapiMessage::SlotIndication(out), urllc)?;
        inst.stats.fapi.slot_ind += 1;
        debug!("[FAPI2MAC] phy {} SLOT.indication {}.{} sym {} urllc {}", phy_id, t.sfn, t.slot, t.sym, urllc);
    }
    Ok(())
}
