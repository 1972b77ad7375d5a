//! RX_ULSCH_IND from the PHY becomes RX_DATA.indication
//!
//! Link quality fields repeat what CRC.indication stored for the same PUSCH.

use interfaces::fapi::{FapiMessage, RxDataIndication, RxDataPdu};
use interfaces::iapi::RxUlschInd;
use tracing::debug;

use super::vendor_ext::{stamp, VendorExt};
use super::{not_scheduled, to_mac, with_ul_slot, REPORTED_RSSI};
use crate::context::PhyContext;
use crate::p5::resolve;
use crate::FapiError;

pub fn rx_data_indication(
    ctx: &PhyContext,
    ind: &RxUlschInd,
    vendor: &mut VendorExt,
    urllc: bool,
) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, ind.slot.carrier_idx, "RX_DATA.indication")?;
    inst.stats.iapi.rx_data_ind += 1;
    let phy_id = inst.phy_id;
    let t = ind.slot.sfn_slot;

    let pdus = with_ul_slot(ctx, &ind.slot, urllc, |info| {
        ind.ulsch
            .iter()
            .map(|data| {
                let pusch = info.pusch_mut(data.ue_id).ok_or_else(|| not_scheduled("PUSCH", data.ue_id, &ind.slot))?;
                Ok(RxDataPdu {
                    handle: pusch.handle,
                    rnti: data.rnti,
                    harq_id: pusch.harq_process_id,
                    pdu_length: data.pdu_len,
                    ul_cqi: pusch.ul_cqi,
                    timing_advance: pusch.timing_advance,
                    rssi: REPORTED_RSSI,
                    pdu: if data.pdu_len > 0 { data.payload.clone() } else { Vec::new() },
                })
            })
            .collect::<Result<Vec<_>, FapiError>>()
    })?;

    let n = pdus.len() as u64;
    inst.stats.iapi.rx_data_ind_pdus += n;
    if let Some(v) = vendor.get(phy_id) {
        v.rx_data_ind = stamp(phy_id, t.sym);
    }

    let out = RxDataIndication { sfn: t.sfn, slot: u16::from(t.slot), pdus };
    to_mac(ctx, phy_id, FapiMessage::RxDataIndication(out), urllc)?;
    inst.stats.fapi.rx_data_ind_pdus += n;
    inst.stats.fapi.rx_data_ind += 1;
    debug!("[FAPI2MAC] phy {} RX_DATA.indication at {}: {} pdus", phy_id, t, n);
    Ok(())
}

#[cfg(test)]
mod tests {
    use interfaces::iapi::{CarrierSlot, CrcEntry, CrcInd, UlschData};

    use super::*;
    use crate::context::test_support::Harness;
    use crate::p7::crc_indication;
    use crate::p7::test_support::{pusch, running, schedule};

    fn ulsch(ue_id: u16, payload: Vec<u8>) -> UlschData {
        UlschData { ue_id, rnti: 0x4600 + ue_id, pdu_len: payload.len() as u32, snr: 0, payload }
    }

    #[test]
    fn test_rx_data_carries_crc_link_quality() {
        let h = Harness::new();
        running(&h, 0);
        schedule(&h, 0, 20, 8, vec![pusch(3, 2)]);
        let slot = CarrierSlot::new(0, 20, 8, 0);
        let mut vendor = VendorExt::new();
        let crc = CrcInd { slot, crc: vec![CrcEntry { ue_id: 3, rnti: 0x4603, crc_flag: 1, snr: 20, ta: 0 }] };
        crc_indication(&h.ctx, &crc, &mut vendor, false).unwrap();

        let ind = RxUlschInd { slot, ulsch: vec![ulsch(3, vec![0xDE, 0xAD, 0xBE, 0xEF])] };
        rx_data_indication(&h.ctx, &ind, &mut vendor, false).unwrap();
        h.flush();

        let msgs = h.mac_messages();
        let FapiMessage::RxDataIndication(out) = &msgs[2] else { panic!("expected RX_DATA.indication") };
        let pdu = &out.pdus[0];
        assert_eq!((pdu.handle, pdu.harq_id, pdu.pdu_length), (3, 2, 4));
        assert_eq!(pdu.ul_cqi, 168);
        assert_eq!(pdu.timing_advance, 31);
        assert_eq!(pdu.pdu, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(vendor.get(0).unwrap().rx_data_ind.is_some());
    }

    #[test]
    fn test_empty_pdu_and_missing_ue() {
        let h = Harness::new();
        running(&h, 0);
        schedule(&h, 0, 20, 8, vec![pusch(3, 2)]);
        let slot = CarrierSlot::new(0, 20, 8, 0);
        let mut vendor = VendorExt::new();

        let empty = RxUlschInd { slot, ulsch: vec![UlschData { payload: vec![1, 2], ..ulsch(3, vec![]) }] };
        rx_data_indication(&h.ctx, &empty, &mut vendor, false).unwrap();
        h.flush();
        let msgs = h.mac_messages();
        let FapiMessage::RxDataIndication(out) = &msgs[1] else { panic!("expected RX_DATA.indication") };
        assert!(out.pdus[0].pdu.is_empty());

        let unknown = RxUlschInd { slot, ulsch: vec![ulsch(4, vec![1])] };
        let err = rx_data_indication(&h.ctx, &unknown, &mut vendor, false).unwrap_err();
        assert!(matches!(err, FapiError::NoValidData(_)));
    }
}
