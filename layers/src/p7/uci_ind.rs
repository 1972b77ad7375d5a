//! UCI_IND and RX_ULSCH_UCI_IND from the PHY become UCI.indication
//!
//! PUCCH reports take handle and format from the UL_TTI.request record.
//! UCI multiplexed on PUSCH carries no slot record; the UE id stands in
//! for the handle.

use common::convert_snr_iapi_to_fapi;
use interfaces::fapi::{
    FapiMessage, HarqInfoF0F1, SrInfoF0F1, UciIndication, UciPdu, UciPucchF0F1, UciPucchF2F3F4, UciPusch,
    UciReport,
};
use interfaces::iapi::{RxUlschUciInd, UciEntry, UciInd, UciPart};
use tracing::{debug, error};

use super::vendor_ext::{stamp, VendorExt};
use super::{not_scheduled, to_mac, with_ul_slot, DEFAULT_TIMING_ADVANCE, REPORTED_RSSI};
use crate::context::PhyContext;
use crate::p5::resolve;
use crate::ul_slot::PucchInfo;
use crate::FapiError;

mod bitmap {
    pub const SR: u8 = 0x01;
    pub const HARQ: u8 = 0x02;
    pub const CSI_PART1: u8 = 0x04;
    pub const CSI_PART2: u8 = 0x08;
}

const CONFIDENCE_UNKNOWN: u8 = 0xFF;

fn pucch_pdu(entry: &UciEntry, pucch: &PucchInfo) -> Result<UciPdu, FapiError> {
    let detected = entry.pucch_detected == 1;
    let ul_cqi = convert_snr_iapi_to_fapi(entry.snr);
    let rssi = if detected { REPORTED_RSSI } else { 0 };
    match pucch.pucch_format {
        0 | 1 => {
            let mut pdu = UciPucchF0F1 {
                handle: pucch.handle,
                rnti: entry.rnti,
                pucch_format: pucch.pucch_format,
                ul_cqi,
                timing_advance: DEFAULT_TIMING_ADVANCE,
                rssi,
                ..Default::default()
            };
            if entry.sr_present != 0 {
                pdu.pdu_bitmap |= bitmap::SR;
                pdu.sr_info = SrInfoF0F1 { sr_indication: 1, sr_confidence_level: CONFIDENCE_UNKNOWN };
            }
            if detected {
                pdu.pdu_bitmap |= bitmap::HARQ;
                pdu.harq_info = HarqInfoF0F1 {
                    num_harq: entry.pdu_bit_len as u8,
                    harq_confidence_level: CONFIDENCE_UNKNOWN,
                    harq_value: entry.uci_bits.clone(),
                };
            }
            Ok(UciPdu::PucchF0F1(pdu))
        }
        2..=4 => {
            let mut pdu = UciPucchF2F3F4 {
                handle: pucch.handle,
                rnti: entry.rnti,
                pucch_format: pucch.pucch_format,
                ul_cqi,
                timing_advance: DEFAULT_TIMING_ADVANCE,
                rssi,
                num_uci_bits: entry.pdu_bit_len,
                uci_bits: entry.uci_bits.clone(),
                ..Default::default()
            };
            if entry.sr_present != 0 {
                pdu.pdu_bitmap |= bitmap::SR;
            }
            if detected {
                pdu.pdu_bitmap |= bitmap::HARQ;
            }
            Ok(UciPdu::PucchF2F3F4(pdu))
        }
        other => Err(FapiError::TranslationFailure(format!("PUCCH format {} for ue {}", other, entry.ue_id))),
    }
}

pub fn uci_indication(ctx: &PhyContext, ind: &UciInd, vendor: &mut VendorExt, urllc: bool) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, ind.slot.carrier_idx, "UCI.indication")?;
    inst.stats.iapi.uci_ind += 1;
    let phy_id = inst.phy_id;
    let t = ind.slot.sfn_slot;

    let pdus = with_ul_slot(ctx, &ind.slot, urllc, |info| {
        ind.uci
            .iter()
            .map(|entry| {
                let pucch = info.pucch(entry.ue_id).ok_or_else(|| not_scheduled("PUCCH", entry.ue_id, &ind.slot))?;
                pucch_pdu(entry, pucch)
            })
            .collect::<Result<Vec<_>, FapiError>>()
    })
    .map_err(|e| {
        error!("[FAPI2MAC] phy {} UCI.indication {}.{}: {}", phy_id, t.sfn, t.slot, e);
        e
    })?;

    let n = pdus.len() as u64;
    inst.stats.iapi.uci_ind_pdus += n;
    if let Some(v) = vendor.get(phy_id) {
        v.uci_ind = stamp(phy_id, t.sym);
        v.uci_snr.extend(ind.uci.iter().map(|u| u.snr));
    }

    let out = UciIndication { sfn: t.sfn, slot: u16::from(t.slot), pdus };
    to_mac(ctx, phy_id, FapiMessage::UciIndication(out), urllc)?;
    inst.stats.fapi.uci_ind_pdus += n;
    inst.stats.fapi.uci_ind += 1;
    debug!("[FAPI2MAC] phy {} UCI.indication {}.{} sym {}: {} pdus", phy_id, t.sfn, t.slot, t.sym, n);
    Ok(())
}

fn report(part: &UciPart) -> UciReport {
    UciReport { crc: part.crc, bit_len: part.bit_len, payload: part.bits.clone() }
}

/// UCI multiplexed on PUSCH
pub fn uci_on_pusch_indication(ctx: &PhyContext, ind: &RxUlschUciInd, urllc: bool) -> Result<(), FapiError> {
    let mut inst = resolve(ctx, ind.slot.carrier_idx, "UCI.indication")?;
    inst.stats.iapi.uci_ind += 1;
    let phy_id = inst.phy_id;
    let t = ind.slot.sfn_slot;

    let mut pdus = Vec::with_capacity(ind.pdus.len());
    for data in &ind.pdus {
        inst.stats.iapi.uci_ind_pdus += 1;
        let mut pdu = UciPusch {
            handle: u32::from(data.ue_id),
            rnti: data.rnti,
            ul_cqi: 0xFF,
            timing_advance: 0xFFFF,
            rssi: 0xFFFF,
            ..Default::default()
        };
        for (part, bit, dst) in [
            (&data.harq, bitmap::HARQ, &mut pdu.harq_info),
            (&data.csi_part1, bitmap::CSI_PART1, &mut pdu.csi_part1),
            (&data.csi_part2, bitmap::CSI_PART2, &mut pdu.csi_part2),
        ] {
            if part.detected != 0 {
                pdu.pdu_bitmap |= bit;
                *dst = report(part);
            }
        }
        pdus.push(UciPdu::Pusch(pdu));
        inst.stats.fapi.uci_ind_pdus += 1;
    }

    let n = pdus.len();
    let out = UciIndication { sfn: t.sfn, slot: u16::from(t.slot), pdus };
    to_mac(ctx, phy_id, FapiMessage::UciIndication(out), urllc)?;
    inst.stats.fapi.uci_ind += 1;
    debug!("[FAPI2MAC] phy {} UCI.indication (PUSCH) {}.{}: {} pdus", phy_id, t.sfn, t.slot, n);
    Ok(())
}

#[cfg(test)]
mod tests {
    use interfaces::fapi::{PucchPdu, UlTtiPdu};
    use interfaces::iapi::{CarrierSlot, UlschUciData};

    use super::*;
    use crate::context::test_support::Harness;
    use crate::p7::test_support::{running, schedule};

    fn pucch(handle: u32, format_type: u8) -> UlTtiPdu {
        UlTtiPdu::Pucch(PucchPdu { rnti: 0x4600 + handle as u16, handle, format_type, ..Default::default() })
    }

    fn uci(ue_id: u16, sr_present: u8, pucch_detected: u8, bits: Vec<u8>) -> UciEntry {
        UciEntry {
            ue_id,
            rnti: 0x4600 + ue_id,
            sr_present,
            pucch_detected,
            pdu_bit_len: bits.len() as u16,
            uci_bits: bits,
            snr: 10,
            ta: 0,
        }
    }

    fn sent(h: &Harness) -> UciIndication {
        h.flush();
        match h.mac_messages().pop() {
            Some(FapiMessage::UciIndication(ind)) => ind,
            other => panic!("expected UCI.indication, got {:?}", other),
        }
    }

    #[test]
    fn test_pucch_formats() {
        let h = Harness::new();
        running(&h, 0);
        schedule(&h, 0, 7, 9, vec![pucch(1, 0), pucch(2, 1), pucch(3, 2)]);
        let mut vendor = VendorExt::new();

        let ind = UciInd {
            slot: CarrierSlot::new(0, 7, 9, 0),
            uci: vec![uci(1, 1, 1, vec![1]), uci(2, 0, 0, vec![]), uci(3, 1, 1, vec![0xA5, 0x01])],
        };
        uci_indication(&h.ctx, &ind, &mut vendor, false).unwrap();
        let out = sent(&h);
        assert_eq!(out.pdus.len(), 3);

        let UciPdu::PucchF0F1(f0) = &out.pdus[0] else { panic!("expected format 0") };
        assert_eq!(f0.pdu_bitmap, 0x03);
        assert_eq!(f0.sr_info, SrInfoF0F1 { sr_indication: 1, sr_confidence_level: 0xFF });
        assert_eq!(f0.harq_info.num_harq, 1);
        assert_eq!(f0.harq_info.harq_value, vec![1]);
        assert_eq!((f0.ul_cqi, f0.rssi), (148, 880));

        let UciPdu::PucchF0F1(f1) = &out.pdus[1] else { panic!("expected format 1") };
        assert_eq!((f1.pdu_bitmap, f1.rssi, f1.pucch_format), (0, 0, 1));

        let UciPdu::PucchF2F3F4(f2) = &out.pdus[2] else { panic!("expected format 2") };
        assert_eq!(f2.pdu_bitmap, 0x03);
        assert_eq!(f2.num_uci_bits, 2);
        assert_eq!(f2.uci_bits, vec![0xA5, 0x01]);

        assert_eq!(vendor.get(0).unwrap().uci_snr, vec![10, 10, 10]);
    }

    #[test]
    fn test_unscheduled_pucch_rejected() {
        let h = Harness::new();
        running(&h, 0);
        schedule(&h, 0, 7, 9, vec![pucch(1, 0)]);
        let mut vendor = VendorExt::new();
        let ind = UciInd { slot: CarrierSlot::new(0, 7, 9, 0), uci: vec![uci(4, 1, 0, vec![])] };
        let err = uci_indication(&h.ctx, &ind, &mut vendor, false).unwrap_err();
        assert!(matches!(err, FapiError::NoValidData(_)));
        assert!(vendor.is_empty());
    }

    #[test]
    fn test_uci_on_pusch() {
        let h = Harness::new();
        running(&h, 0);
        let detected = |bits: Vec<u8>| UciPart { detected: 1, crc: 0, bit_len: 8 * bits.len() as u16, bits };
        let ind = RxUlschUciInd {
            slot: CarrierSlot::new(0, 3, 4, 0),
            pdus: vec![UlschUciData {
                ue_id: 12,
                rnti: 0x460C,
                harq: detected(vec![0x01]),
                csi_part1: UciPart::default(),
                csi_part2: detected(vec![0x10, 0x20]),
            }],
        };
        uci_on_pusch_indication(&h.ctx, &ind, false).unwrap();
        let out = sent(&h);
        let UciPdu::Pusch(pdu) = &out.pdus[0] else { panic!("expected UCI on PUSCH") };
        assert_eq!(pdu.handle, 12);
        assert_eq!(pdu.pdu_bitmap, 0x0A);
        assert_eq!((pdu.ul_cqi, pdu.timing_advance, pdu.rssi), (0xFF, 0xFFFF, 0xFFFF));
        assert_eq!(pdu.harq_info.payload, vec![0x01]);
        assert_eq!(pdu.csi_part1, UciReport::default());
        assert_eq!(pdu.csi_part2.bit_len, 16);
        let stats = h.ctx.phy(0).unwrap().lock().stats.clone();
        assert_eq!((stats.fapi.uci_ind, stats.fapi.uci_ind_pdus), (1, 1));
    }
}
