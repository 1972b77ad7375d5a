//! P5 (Cell Lifecycle) Translators
//!
//! CONFIG / START / STOP / SHUTDOWN requests from the MAC become vendor
//! requests towards the PHY; the vendor responses drive the cell state
//! machine and come back to the MAC as FAPI responses and indications.
//! PARAM is answered locally. P5 traffic always uses the normal class.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod param;

use interfaces::fapi::FapiMessage;
use interfaces::iapi::IapiMessage;
use parking_lot::MutexGuard;

use crate::context::{PhyContext, PhyInstance};
use crate::FapiError;

pub use config::{config_request, config_response};
pub use error::error_indication;
pub use lifecycle::{
    shutdown_request, shutdown_response, start_request, start_response, stop_request, stop_response,
};
pub use param::param_request;

/// Resolve the instance a vendor response names and check it owns the carrier
pub(crate) fn resolve<'a>(
    ctx: &'a PhyContext,
    carrier_idx: u8,
    what: &str,
) -> Result<MutexGuard<'a, PhyInstance>, FapiError> {
    let inst = ctx.phy(carrier_idx)?.lock();
    inst.verify(carrier_idx, what)?;
    Ok(inst)
}

pub(crate) fn to_mac(ctx: &PhyContext, phy_id: u8, msg: FapiMessage) -> Result<(), FapiError> {
    ctx.fapi2mac.push(ctx.pool(), phy_id, msg, false)
}

pub(crate) fn to_phy(ctx: &PhyContext, msg: IapiMessage) -> Result<(), FapiError> {
    ctx.fapi2phy.push(ctx.pool(), msg, false)
}
