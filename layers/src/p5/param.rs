//! PARAM.request, answered without involving the PHY

use interfaces::fapi::{FapiMessage, ParamResponse};
use interfaces::message_types::FapiErrorCode;
use tracing::debug;

use super::to_mac;
use crate::context::{PhyContext, PhyState};
use crate::FapiError;

/// Answer PARAM.request and send the response immediately
pub fn param_request(ctx: &PhyContext, phy_id: u8) -> Result<(), FapiError> {
    {
        let mut inst = ctx.phy(phy_id)?.lock();
        inst.stats.fapi.param_req += 1;
        let error_code = if inst.state == PhyState::Running {
            FapiErrorCode::MsgInvalidState
        } else {
            FapiErrorCode::MsgOk
        };
        // TLV reporting is not supported
        let resp = ParamResponse { error_code: error_code as u8, number_of_tlvs: 0 };
        debug!("[P5] phy {} PARAM.response {:?}", phy_id, error_code);
        to_mac(ctx, phy_id, FapiMessage::ParamResponse(resp))?;
        inst.stats.fapi.param_res += 1;
    }
    ctx.fapi2mac.flush_phy(&ctx.mac, phy_id, false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use interfaces::fapi::MsgHeaderInd;

    use super::*;
    use crate::context::test_support::Harness;

    #[test]
    fn test_param_answered_locally() {
        let h = Harness::new();
        param_request(&h.ctx, 0).unwrap();
        assert_eq!(
            h.mac_messages(),
            vec![
                FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 1, phy_id: 0 }),
                FapiMessage::ParamResponse(ParamResponse { error_code: 0, number_of_tlvs: 0 }),
            ]
        );
        h.flush();
        assert!(h.phy_messages().is_empty());
        assert_eq!(h.ctx.phy(0).unwrap().lock().stats.fapi.param_res, 1);
    }

    #[test]
    fn test_param_while_running_is_invalid_state() {
        let h = Harness::new();
        h.force_state(3, PhyState::Running);
        param_request(&h.ctx, 3).unwrap();
        let msgs = h.mac_messages();
        assert_eq!(msgs[1], FapiMessage::ParamResponse(ParamResponse { error_code: 1, number_of_tlvs: 0 }));
    }
}
