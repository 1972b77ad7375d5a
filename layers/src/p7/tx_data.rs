//! TX_DATA.request
//!
//! Each FAPI PDU carries one TLV per codeword; the vendor record holds both
//! codewords of a PDU index. Payloads either travel inline or sit in
//! zero-copy blocks that followed the request, in which case the blocks
//! are forwarded behind the TX_REQ without copying.

use interfaces::fapi::{TlvValue, TxDataRequest, TxDataTlv, TxPduDesc};
use interfaces::iapi::{CarrierSlot, DlPduData, IapiMessage, PayloadRef, TxReq};
use interfaces::message_types::IapiMsgType;
use interfaces::wls::{DataRef, OutboundElement};
use tracing::{debug, error};

use crate::context::PhyContext;
use crate::FapiError;

const MAX_CODEWORDS: usize = 2;

fn payload(tlv: &TxDataTlv, zbc: &[DataRef]) -> Result<PayloadRef, FapiError> {
    match &tlv.value {
        TlvValue::Inline(bytes) => Ok(PayloadRef::Inline(bytes.clone())),
        TlvValue::Zbc { block, offset } => {
            if *block as usize >= zbc.len() {
                return Err(FapiError::TranslationFailure(format!(
                    "TX_DATA TLV names zero-copy block {} of {}",
                    block,
                    zbc.len()
                )));
            }
            Ok(PayloadRef::Block { block: *block, offset: *offset })
        }
    }
}

fn pdu_data(pdu: &TxPduDesc, zbc: &[DataRef]) -> Result<DlPduData, FapiError> {
    if pdu.tlvs.len() > MAX_CODEWORDS {
        return Err(FapiError::TranslationFailure(format!(
            "TX_DATA PDU {} carries {} TLVs",
            pdu.pdu_index,
            pdu.tlvs.len()
        )));
    }
    let mut out = DlPduData { pdu_index: pdu.pdu_index, ..Default::default() };
    if let Some(tlv) = pdu.tlvs.first() {
        out.len1 = tlv.length;
        out.payload1 = payload(tlv, zbc)?;
    }
    if let Some(tlv) = pdu.tlvs.get(1) {
        out.len2 = tlv.length;
        out.payload2 = payload(tlv, zbc)?;
    }
    Ok(out)
}

/// Translate TX_DATA.request; `zbc` are the payload blocks that followed it
pub fn tx_data_request(
    ctx: &PhyContext,
    phy_id: u8,
    req: &TxDataRequest,
    zbc: &[DataRef],
    urllc: bool,
) -> Result<(), FapiError> {
    let mut inst = ctx.phy(phy_id)?.lock();
    inst.stats.fapi.tx_data_req += 1;

    let pdus = req
        .pdus
        .iter()
        .map(|pdu| pdu_data(pdu, zbc))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            error!("[FAPI2PHY] phy {} TX_DATA.request {}.{}: {}", phy_id, req.sfn, req.slot, e);
            e
        })?;
    let out = TxReq { slot: CarrierSlot::new(inst.phy_id, req.sfn, req.slot as u8, 0), pdus };

    let mut elem = OutboundElement::new(ctx.pool(), IapiMessage::TxReq(out))?;
    for block in zbc {
        elem.attach_data(DataRef { msg_type: IapiMsgType::TxDataBlock.raw(), ..*block });
    }
    ctx.fapi2phy.append(elem, urllc);
    inst.stats.iapi.tx_req += 1;

    debug!("[FAPI2PHY] phy {} TX_DATA.request {}.{}: {} pdus {} zero-copy blocks",
           phy_id, req.sfn, req.slot, req.pdus.len(), zbc.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use interfaces::message_types::FapiMsgId;

    use super::*;
    use crate::context::test_support::Harness;
    use crate::PhyState;

    fn tlv(length: u32, value: TlvValue) -> TxDataTlv {
        TxDataTlv { tag: 0, length, value }
    }

    #[test]
    fn test_two_codewords_share_one_record() {
        let h = Harness::new();
        h.force_state(0, PhyState::Running);
        let req = TxDataRequest {
            sfn: 5,
            slot: 1,
            pdus: vec![
                TxPduDesc {
                    pdu_length: 12,
                    pdu_index: 0,
                    tlvs: vec![tlv(4, TlvValue::Inline(vec![1, 2, 3, 4])), tlv(8, TlvValue::Inline(vec![9; 8]))],
                },
                TxPduDesc { pdu_length: 2, pdu_index: 1, tlvs: vec![tlv(2, TlvValue::Inline(vec![7, 7]))] },
            ],
        };
        tx_data_request(&h.ctx, 0, &req, &[], false).unwrap();
        h.flush();

        let Some(IapiMessage::TxReq(out)) = h.phy_messages().pop() else { panic!("expected TX_REQ") };
        assert_eq!(out.pdus.len(), 2);
        assert_eq!(out.pdus[0].len1, 4);
        assert_eq!(out.pdus[0].payload1, PayloadRef::Inline(vec![1, 2, 3, 4]));
        assert_eq!(out.pdus[0].len2, 8);
        assert_eq!(out.pdus[0].payload2, PayloadRef::Inline(vec![9; 8]));
        // A single codeword leaves the second one empty
        assert_eq!(out.pdus[1].len1, 2);
        assert_eq!(out.pdus[1].len2, 0);
        assert_eq!(out.pdus[1].payload2, PayloadRef::None);
    }

    #[test]
    fn test_zero_copy_blocks_follow_request() {
        let h = Harness::new();
        h.force_state(0, PhyState::Running);
        let pa = h.ctx.pool().allocate().unwrap().into_pa();
        let zbc = [DataRef { pa, len: 1500, msg_type: FapiMsgId::VendorZbcBlock.raw() }];
        let req = TxDataRequest {
            sfn: 5,
            slot: 2,
            pdus: vec![TxPduDesc {
                pdu_length: 1500,
                pdu_index: 0,
                tlvs: vec![tlv(1500, TlvValue::Zbc { block: 0, offset: 0 })],
            }],
        };
        tx_data_request(&h.ctx, 0, &req, &zbc, false).unwrap();
        h.flush();

        let lists = h.phy_peer.recv(Some(Duration::from_millis(10))).unwrap();
        assert_eq!(lists.normal.len(), 2);
        let Some(IapiMessage::TxReq(out)) = lists.normal[0].message() else { panic!("expected TX_REQ") };
        assert_eq!(out.pdus[0].payload1, PayloadRef::Block { block: 0, offset: 0 });
        assert_eq!(lists.normal[1].pa, pa);
        assert_eq!(lists.normal[1].msg_type, IapiMsgType::TxDataBlock.raw());
        assert!(lists.normal[1].message().is_none());
    }

    #[test]
    fn test_bad_tlvs_rejected() {
        let h = Harness::new();
        h.force_state(0, PhyState::Running);
        let missing_block = TxDataRequest {
            pdus: vec![TxPduDesc { tlvs: vec![tlv(10, TlvValue::Zbc { block: 1, offset: 0 })], ..Default::default() }],
            ..Default::default()
        };
        let err = tx_data_request(&h.ctx, 0, &missing_block, &[], false).unwrap_err();
        assert!(matches!(err, FapiError::TranslationFailure(_)));

        let three = TxDataRequest {
            pdus: vec![TxPduDesc { tlvs: vec![tlv(1, TlvValue::Inline(vec![0])); 3], ..Default::default() }],
            ..Default::default()
        };
        assert!(tx_data_request(&h.ctx, 0, &three, &[], false).is_err());
        assert!(h.ctx.fapi2phy.is_empty(false));
        assert_eq!(h.ctx.phy(0).unwrap().lock().stats.iapi.tx_req, 0);
    }
}
