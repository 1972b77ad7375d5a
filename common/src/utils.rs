//! Common Utilities
//!
//! Numeric helpers shared by the FAPI and vendor-side translators: power
//! offset tables, SNR rescaling, resource block group packing and
//! carrier dimensioning

use tracing::{error, trace};

/// Vendor SNR units per FAPI SNR step (vendor reports whole dB)
pub const SINR_STEP_SIZE: f64 = 1.0;

/// Rescale a signed vendor SNR into the FAPI 0..=255 domain.
///
/// Negative values round towards minus infinity, non-negative values round
/// up and are offset by 128. The step count is clamped to the
/// representable range (-64..=63) so the mapping stays monotonic.
pub fn convert_snr_iapi_to_fapi(snr: i16) -> u8 {
    let steps = snr as f64 / SINR_STEP_SIZE;
    if steps < 0.0 {
        let folded = (steps.floor().max(-64.0) as i32 as u8) & 0x3F;
        folded * 2
    } else {
        let folded = (steps.ceil().min(63.0) as i32 as u8) & 0x3F;
        folded * 2 + 128
    }
}

/// PDCCH EPRE relative to SSB (milli-dB scale) from the FAPI beta_pdcch_1_0 index
pub fn epre_ratio_pdcch_to_ssb(beta_pdcch_1_0: u8) -> u16 {
    match beta_pdcch_1_0 {
        0..=2 => 1,
        3..=16 => (beta_pdcch_1_0 as u16 - 2) * 1000,
        17 => (beta_pdcch_1_0 as u16 - 3) * 1000,
        _ => 0,
    }
}

/// DMRS EPRE relative to SSB from the FAPI powerControlOffsetSS index
pub fn epre_ratio_dmrs_to_ssb(power_control_offset_ss: u8) -> u16 {
    match power_control_offset_ss {
        0 => 3000,
        1 => 6000,
        2 => 9000,
        3 => 12000,
        other => {
            error!("Unsupported power_control_offset_ss {}", other);
            0
        }
    }
}

const PDSCH_EPRE_RATIO: [u16; 24] = [
    1, 1, 1, 1000, 2000, 3000, 4000, 5000,
    6000, 7000, 8000, 9000, 10000, 11000, 12000, 13000,
    14000, 15000, 16000, 17000, 18000, 19000, 20000, 20000,
];

/// PDSCH EPRE relative to SSB from the FAPI powerControlOffset index
pub fn epre_ratio_pdsch_to_ssb(power_control_offset: u8) -> u16 {
    match PDSCH_EPRE_RATIO.get(power_control_offset as usize) {
        Some(ratio) => *ratio,
        None => {
            error!("Unsupported power_control_offset {}", power_control_offset);
            0
        }
    }
}

/// SSB PRB offset in units of the common subcarrier spacing
pub fn ssb_prb_offset(ssb_offset_point_a: u16, sub_c_common: u8) -> u8 {
    (ssb_offset_point_a >> sub_c_common.min(15)) as u8
}

/// Vendor alpha scaling from the FAPI alphaScaling code
pub fn alpha_scaling(fapi_alpha_scaling: u8) -> u8 {
    match fapi_alpha_scaling {
        0 => 127,
        1 => 166,
        2 => 205,
        3 => 255,
        _ => 0,
    }
}

/// `2^exp` for the small exponent codes used by SRS and PTRS fields
pub fn pow2(exp: u8) -> u8 {
    1u8.checked_shl(exp as u32).unwrap_or(0)
}

/// SS/PBCH block power in vendor units from the FAPI ssPbchPower code
pub fn ss_pbch_power(value: u32) -> u32 {
    match value {
        0 => 1,
        54002 => 20000,
        v => v.saturating_sub(54000),
    }
}

/// FFT size for a numerology / bandwidth pair, 0 when unsupported
pub fn fft_size(numerology: u8, bandwidth_mhz: u16) -> u16 {
    match (numerology, bandwidth_mhz) {
        (0, 5) => 512,
        (0, 10) => 1024,
        (0, 15 | 20) => 2048,
        (0, 25 | 30 | 40 | 50) => 4096,
        (1, 5 | 10) => 512,
        (1, 15 | 20) => 1024,
        (1, 25 | 30 | 40 | 50) => 2048,
        (1, 60 | 70 | 80 | 90 | 100) => 4096,
        (2, 10 | 15 | 20 | 25) => 512,
        (2, 30 | 40 | 50) => 1024,
        (2, 60 | 70 | 80 | 90 | 100) => 2048,
        (2, 200) => 4096,
        (3, 50) => 512,
        (3, 100) => 1024,
        (3, 200) => 2048,
        (3, 400) => 4096,
        _ => 0,
    }
}

/// TDD pattern period in slots for the FAPI TddPeriod code, 0 when unsupported
pub fn tdd_period_slots(numerology: u8, tdd_period: u8) -> u8 {
    match (numerology, tdd_period) {
        (0, 2) => 1,
        (0, 4) => 2,
        (0, 6) => 5,
        (0, 7) => 10,
        (1, 0) => 1,
        (1, 2) => 2,
        (1, 4) => 4,
        (1, 5) => 5,
        (1, 6) => 10,
        (1, 7) => 20,
        (2, 0) => 2,
        (2, 2) => 4,
        (2, 3) => 5,
        (2, 4) => 8,
        (2, 5) => 10,
        (2, 6) => 20,
        (2, 7) => 40,
        (3, 0) => 4,
        (3, 1) => 5,
        (3, 2) => 8,
        (3, 3) => 10,
        (3, 4) => 16,
        (3, 5) => 20,
        (3, 6) => 40,
        (3, 7) => 80,
        _ => 0,
    }
}

/// Resource block group packing between FAPI per-PRB bitmaps and vendor
/// per-RBG indices (TS 38.214 5.1.2.2.1 / 6.1.2.2.1, configuration 1).
///
/// FAPI `rbBitmap[i]` holds RB `8i` in bit 0 through RB `8i+7` in bit 7.
/// The vendor index holds one bit per RBG of the bandwidth part.
pub mod rbg {
    use super::*;

    /// Bytes in a FAPI RB bitmap
    pub const RB_BITMAP_SIZE: usize = 36;

    /// Highest resource block number representable in the bitmap
    pub const MAX_RB_BIT_NUM: u16 = 273;

    /// Bit placement of RBG-0 in the vendor index
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RbgBitOrder {
        /// RBG-0 in bit 31 (downlink shared channel)
        MsbFirst,
        /// RBG-0 in bit 0 (uplink shared channel)
        LsbFirst,
    }

    impl RbgBitOrder {
        fn bit(&self, nth: u16) -> u32 {
            if nth >= 32 {
                return 0;
            }
            match self {
                RbgBitOrder::MsbFirst => 1u32 << (31 - nth),
                RbgBitOrder::LsbFirst => 1u32 << nth,
            }
        }
    }

    /// RBG size in PRBs for a bandwidth part size, 0 when out of range
    pub fn rbg_size(bwp_size: u16) -> u8 {
        match bwp_size {
            1..=36 => 2,
            37..=72 => 4,
            73..=144 => 8,
            145..=275 => 16,
            _ => 0,
        }
    }

    /// Number of RBGs spanned by a bandwidth part
    pub fn num_rbgs(bwp_start: u16, bwp_size: u16) -> u16 {
        let size = rbg_size(bwp_size) as u16;
        if size == 0 {
            return 0;
        }
        (bwp_size + bwp_start % size).div_ceil(size)
    }

    fn rb_bitmap_mask(rbg_size: u8) -> u16 {
        match rbg_size {
            2 => 0x3,
            4 => 0xF,
            8 => 0xFF,
            16 => 0xFFFF,
            _ => 0,
        }
    }

    /// RB bits of the `nth_rbg` group (absolute numbering from point A)
    pub fn rb_bits_for_rbg(rb_bitmap: &[u8; RB_BITMAP_SIZE], nth_rbg: u16, rbg_size: u8, mask: u16) -> u16 {
        let nth_rb = nth_rbg as usize * rbg_size as usize;
        let byte_1 = (nth_rb / 16) * 2;
        let byte_2 = byte_1 + 1;
        let mut rb_bits: u16 = 0;
        if let Some(b) = rb_bitmap.get(byte_1) {
            rb_bits |= *b as u16;
        }
        if let Some(b) = rb_bitmap.get(byte_2) {
            rb_bits |= (*b as u16) << 8;
        }
        (rb_bits >> (nth_rb % 16)) & mask
    }

    fn has_rbg(rb_bitmap: &[u8; RB_BITMAP_SIZE], nth_rbg: u16, rbg_size: u8, mask: u16) -> bool {
        let bits = rb_bits_for_rbg(rb_bitmap, nth_rbg, rbg_size, mask);
        if bits == mask {
            return true;
        }
        if bits != 0 {
            error!(
                "RB bits do not cover RBG {}: size {} bits {:#x} mask {:#x}",
                nth_rbg, rbg_size, bits, mask
            );
        }
        false
    }

    /// Bounds of the bandwidth part in RBG numbering plus the partial masks
    struct RbgSpan {
        size: u8,
        first: u16,
        last: u16,
        full_mask: u16,
        first_mask: u16,
        last_mask: u16,
    }

    fn span(bwp_start: u16, bwp_size: u16) -> Option<RbgSpan> {
        let size = rbg_size(bwp_size);
        let full_mask = rb_bitmap_mask(size);
        if full_mask == 0 {
            error!("Wrong rbg_size {} for bwp_size {}", size, bwp_size);
            return None;
        }
        if bwp_start >= MAX_RB_BIT_NUM {
            error!("Wrong bwp_start {}", bwp_start);
            return None;
        }
        let size16 = size as u16;
        let first = bwp_start / size16;
        let rb_end = MAX_RB_BIT_NUM.min(bwp_start + bwp_size);
        let last = rb_end.div_ceil(size16) - 1;
        let start_offset = bwp_start % size16;
        let mut first_mask = full_mask & (full_mask << start_offset);
        let last_size = if rb_end % size16 == 0 { size16 } else { rb_end % size16 };
        let mut last_mask = full_mask >> (size16 - last_size);
        if first == last {
            let mask = first_mask & last_mask;
            first_mask = mask;
            last_mask = mask;
        }
        Some(RbgSpan { size, first, last, full_mask, first_mask, last_mask })
    }

    /// Pack a FAPI per-PRB bitmap into the vendor per-RBG index.
    ///
    /// An RBG is set only when all of its PRBs inside the bandwidth part
    /// are set; the first and last RBG use partial masks.
    pub fn calc_rbg_index(
        rb_bitmap: &[u8; RB_BITMAP_SIZE],
        bwp_start: u16,
        bwp_size: u16,
        order: RbgBitOrder,
    ) -> u32 {
        let Some(span) = span(bwp_start, bwp_size) else {
            return 0;
        };
        let mut result = 0u32;
        for nth in span.first..=span.last {
            let mask = if nth == span.first {
                span.first_mask
            } else if nth == span.last {
                span.last_mask
            } else {
                span.full_mask
            };
            if has_rbg(rb_bitmap, nth, span.size, mask) {
                result |= order.bit(nth - span.first);
            }
        }
        trace!("rbBitmap -> rbgIndex {:#010x} (bwp {}+{})", result, bwp_start, bwp_size);
        result
    }

    /// Expand a vendor per-RBG index back into a FAPI per-PRB bitmap,
    /// limited to the PRBs of the bandwidth part.
    pub fn rbg_index_to_rb_bitmap(
        rbg_index: u32,
        bwp_start: u16,
        bwp_size: u16,
        order: RbgBitOrder,
    ) -> [u8; RB_BITMAP_SIZE] {
        let mut bitmap = [0u8; RB_BITMAP_SIZE];
        let Some(span) = span(bwp_start, bwp_size) else {
            return bitmap;
        };
        let rb_end = MAX_RB_BIT_NUM.min(bwp_start + bwp_size);
        for nth in span.first..=span.last {
            if rbg_index & order.bit(nth - span.first) == 0 {
                continue;
            }
            let lo = (nth * span.size as u16).max(bwp_start);
            let hi = ((nth + 1) * span.size as u16).min(rb_end);
            for rb in lo..hi {
                bitmap[rb as usize / 8] |= 1 << (rb % 8);
            }
        }
        bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::rbg::*;

    #[test]
    fn test_snr_conversion_points() {
        assert_eq!(convert_snr_iapi_to_fapi(0), 128);
        assert_eq!(convert_snr_iapi_to_fapi(10), 148);
        assert_eq!(convert_snr_iapi_to_fapi(-1), 126);
        assert_eq!(convert_snr_iapi_to_fapi(-64), 0);
        assert_eq!(convert_snr_iapi_to_fapi(63), 254);
    }

    #[test]
    fn test_snr_conversion_monotonic() {
        let mut prev = convert_snr_iapi_to_fapi(i16::MIN);
        for snr in (i16::MIN as i32 + 1)..=(i16::MAX as i32) {
            let cur = convert_snr_iapi_to_fapi(snr as i16);
            assert!(cur >= prev, "snr {} -> {} after {}", snr, cur, prev);
            assert_eq!(cur, convert_snr_iapi_to_fapi(snr as i16));
            prev = cur;
        }
    }

    #[test]
    fn test_epre_tables() {
        assert_eq!(epre_ratio_pdcch_to_ssb(0), 1);
        assert_eq!(epre_ratio_pdcch_to_ssb(2), 1);
        assert_eq!(epre_ratio_pdcch_to_ssb(3), 1000);
        assert_eq!(epre_ratio_pdcch_to_ssb(16), 14000);
        assert_eq!(epre_ratio_pdcch_to_ssb(17), 14000);
        assert_eq!(epre_ratio_pdcch_to_ssb(18), 0);
        assert_eq!(epre_ratio_dmrs_to_ssb(3), 12000);
        assert_eq!(epre_ratio_dmrs_to_ssb(4), 0);
        assert_eq!(epre_ratio_pdsch_to_ssb(23), 20000);
        assert_eq!(epre_ratio_pdsch_to_ssb(24), 0);
    }

    #[test]
    fn test_carrier_tables() {
        assert_eq!(fft_size(1, 100), 4096);
        assert_eq!(fft_size(0, 20), 2048);
        assert_eq!(fft_size(3, 300), 0);
        assert_eq!(tdd_period_slots(1, 6), 10);
        assert_eq!(tdd_period_slots(0, 0), 0);
        assert_eq!(ss_pbch_power(0), 1);
        assert_eq!(ss_pbch_power(54002), 20000);
        assert_eq!(ss_pbch_power(54010), 10);
        assert_eq!(ssb_prb_offset(24, 1), 12);
        assert_eq!(pow2(3), 8);
    }

    #[test]
    fn test_rbg_size_bands() {
        assert_eq!(rbg_size(0), 0);
        assert_eq!(rbg_size(36), 2);
        assert_eq!(rbg_size(37), 4);
        assert_eq!(rbg_size(144), 8);
        assert_eq!(rbg_size(275), 16);
        assert_eq!(rbg_size(276), 0);
        assert_eq!(num_rbgs(0, 106), 14);
        assert_eq!(num_rbgs(4, 106), 14);
    }

    #[test]
    fn test_rbg_round_trip_aligned() {
        // bwp 0+64 -> rbg size 4, 16 groups
        // groups 0, 13 and 15 in both bit orders
        let lsb = (1u32 << 0) | (1 << 13) | (1 << 15);
        let msb = (1u32 << 31) | (1 << 18) | (1 << 16);
        for (index, order) in [(lsb, RbgBitOrder::LsbFirst), (msb, RbgBitOrder::MsbFirst)] {
            let bitmap = rbg_index_to_rb_bitmap(index, 0, 64, order);
            assert_eq!(bitmap[0], 0x0F);
            assert_eq!(bitmap[5], 0x00);
            assert_eq!(bitmap[6], 0xF0);
            assert_eq!(bitmap[7], 0xF0);
            assert_eq!(calc_rbg_index(&bitmap, 0, 64, order), index);
        }
    }

    #[test]
    fn test_rbg_partial_first_and_last() {
        // bwp 2+20 -> rbg size 2; offset 2 keeps groups aligned
        // bwp 3+20 -> first group holds only RB 3, last only RB 22
        let mut bitmap = [0u8; RB_BITMAP_SIZE];
        bitmap[0] = 1 << 3;
        bitmap[2] = 1 << 6;
        let index = calc_rbg_index(&bitmap, 3, 20, RbgBitOrder::LsbFirst);
        assert_eq!(index & 1, 1);
        assert_eq!(index & (1 << 10), 1 << 10);
        assert_eq!(index.count_ones(), 2);

        // RB 2 lies outside the bwp; a full mask on group 1 must ignore it
        let mut outside = [0u8; RB_BITMAP_SIZE];
        outside[0] = 1 << 2;
        assert_eq!(calc_rbg_index(&outside, 3, 20, RbgBitOrder::LsbFirst), 0);
    }

    #[test]
    fn test_rbg_partial_group_not_set() {
        // bwp 0+64, rbg size 4: only half of group 0 set
        let mut bitmap = [0u8; RB_BITMAP_SIZE];
        bitmap[0] = 0x03;
        assert_eq!(calc_rbg_index(&bitmap, 0, 64, RbgBitOrder::MsbFirst), 0);
        bitmap[0] = 0x0F;
        assert_eq!(calc_rbg_index(&bitmap, 0, 64, RbgBitOrder::MsbFirst), 1 << 31);
    }

    #[test]
    fn test_rbg_invalid_bwp() {
        let bitmap = [0xFFu8; RB_BITMAP_SIZE];
        assert_eq!(calc_rbg_index(&bitmap, 0, 0, RbgBitOrder::LsbFirst), 0);
        assert_eq!(calc_rbg_index(&bitmap, 273, 10, RbgBitOrder::LsbFirst), 0);
    }
}
