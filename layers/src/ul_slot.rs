//! UL Slot Correlation Table
//!
//! UL_TTI.request records, per (class, slot, symbol), which UE handles were
//! scheduled and with what HARQ / format metadata. Indications arriving
//! later for the same (frame, slot, symbol) resolve their PDUs against the
//! entry. Each entry sits behind its own lock, so a record is fully written
//! before any indication can observe it; a reused entry carries the newer
//! frame and no longer matches lookups for the old one.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

use crate::FapiError;

/// Slots tracked per class
pub const MAX_UL_SLOT_INFO_COUNT: usize = 20;
/// Symbols tracked per slot
pub const MAX_UL_SYMBOL_INFO_COUNT: usize = 14;
/// Normal and URLLC
pub const MAX_SLOT_INFO_CLASSES: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RachInfo {
    pub phy_cell_id: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PuschInfo {
    pub handle: u32,
    pub harq_process_id: u8,
    /// Filled by CRC.indication, reported again in RX_DATA.indication
    pub ul_cqi: u8,
    pub timing_advance: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PucchInfo {
    pub handle: u32,
    pub pucch_format: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SrsInfo {
    pub handle: u32,
}

/// Lookup key of one entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UlSlotKey {
    pub urllc: bool,
    pub frame: u16,
    pub slot: u16,
    pub symbol: u8,
}

impl UlSlotKey {
    pub fn new(urllc: bool, frame: u16, slot: u16, symbol: u8) -> Self {
        Self { urllc, frame, slot, symbol }
    }

    fn index(&self) -> usize {
        let class = usize::from(self.urllc);
        let slot = self.slot as usize % MAX_UL_SLOT_INFO_COUNT;
        let symbol = self.symbol as usize % MAX_UL_SYMBOL_INFO_COUNT;
        (class * MAX_UL_SLOT_INFO_COUNT + slot) * MAX_UL_SYMBOL_INFO_COUNT + symbol
    }
}

impl std::fmt::Display for UlSlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame {} slot {} symbol {} urllc {}", self.frame, self.slot, self.symbol, self.urllc)
    }
}

/// Scheduling metadata of one UL occasion
#[derive(Debug, Clone, Default)]
pub struct UlSlotInfo {
    key: Option<UlSlotKey>,
    pub rach_presence: bool,
    pub rach_info: RachInfo,
    /// Keyed by the 16-bit UE id the PHY echoes back
    pub pusch: HashMap<u16, PuschInfo>,
    pub pucch: HashMap<u16, PucchInfo>,
    pub srs: HashMap<u16, SrsInfo>,
}

impl UlSlotInfo {
    pub fn key(&self) -> Option<UlSlotKey> {
        self.key
    }

    fn reset(&mut self, key: UlSlotKey) {
        self.key = Some(key);
        self.rach_presence = false;
        self.rach_info = RachInfo::default();
        self.pusch.clear();
        self.pucch.clear();
        self.srs.clear();
    }

    pub fn add_pusch(&mut self, info: PuschInfo) {
        self.pusch.insert(info.handle as u16, info);
    }

    pub fn add_pucch(&mut self, info: PucchInfo) {
        self.pucch.insert(info.handle as u16, info);
    }

    pub fn add_srs(&mut self, info: SrsInfo) {
        self.srs.insert(info.handle as u16, info);
    }

    /// PUSCH record of a vendor UE id
    pub fn pusch_mut(&mut self, ue_id: u16) -> Option<&mut PuschInfo> {
        self.pusch.get_mut(&ue_id)
    }

    pub fn pucch(&self, ue_id: u16) -> Option<&PucchInfo> {
        self.pucch.get(&ue_id)
    }

    pub fn srs(&self, ue_id: u16) -> Option<&SrsInfo> {
        self.srs.get(&ue_id)
    }
}

/// All correlation entries of one PHY
#[derive(Debug)]
pub struct UlSlotTable {
    entries: Vec<Mutex<UlSlotInfo>>,
}

impl Default for UlSlotTable {
    fn default() -> Self {
        Self::new()
    }
}

impl UlSlotTable {
    pub fn new() -> Self {
        let n = MAX_SLOT_INFO_CLASSES * MAX_UL_SLOT_INFO_COUNT * MAX_UL_SYMBOL_INFO_COUNT;
        Self { entries: (0..n).map(|_| Mutex::new(UlSlotInfo::default())).collect() }
    }

    /// Overwrite the entry for `key` with what `fill` records
    pub fn record<R>(&self, key: UlSlotKey, fill: impl FnOnce(&mut UlSlotInfo) -> R) -> R {
        let mut entry = self.entries[key.index()].lock();
        entry.reset(key);
        let result = fill(&mut entry);
        trace!("[UL_SLOT] recorded {}: {} pusch {} pucch {} srs",
               key, entry.pusch.len(), entry.pucch.len(), entry.srs.len());
        result
    }

    /// Resolve the entry recorded for exactly `key`
    pub fn lookup<R>(&self, key: UlSlotKey, f: impl FnOnce(&mut UlSlotInfo) -> R) -> Result<R, FapiError> {
        let mut entry = self.entries[key.index()].lock();
        if entry.key != Some(key) {
            return Err(FapiError::NoValidData(format!("no UL slot info for {}", key)));
        }
        Ok(f(&mut entry))
    }

    /// Forget everything, e.g. after shutdown
    pub fn clear(&self) {
        for entry in &self.entries {
            *entry.lock() = UlSlotInfo::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_by_key_and_handle() {
        let table = UlSlotTable::new();
        let key = UlSlotKey::new(false, 10, 3, 0);
        table.record(key, |info| {
            info.add_pusch(PuschInfo { handle: 5, harq_process_id: 1, ..Default::default() });
            info.add_pusch(PuschInfo { handle: 9, harq_process_id: 7, ..Default::default() });
        });

        let harq = table.lookup(key, |info| info.pusch_mut(9).map(|p| p.harq_process_id)).unwrap();
        assert_eq!(harq, Some(7));
        let harq = table.lookup(key, |info| info.pusch_mut(5).map(|p| p.harq_process_id)).unwrap();
        assert_eq!(harq, Some(1));
        let missing = table.lookup(key, |info| info.pusch_mut(6).is_some()).unwrap();
        assert!(!missing);
    }

    #[test]
    fn test_miss_without_record() {
        let table = UlSlotTable::new();
        let err = table.lookup(UlSlotKey::new(false, 10, 3, 0), |_| ()).unwrap_err();
        assert!(matches!(err, FapiError::NoValidData(_)));
    }

    #[test]
    fn test_reuse_invalidates_older_frame() {
        let table = UlSlotTable::new();
        table.record(UlSlotKey::new(false, 10, 3, 0), |info| info.add_srs(SrsInfo { handle: 1 }));
        // Same slot index, next frame
        table.record(UlSlotKey::new(false, 11, 3, 0), |info| info.add_srs(SrsInfo { handle: 2 }));

        assert!(table.lookup(UlSlotKey::new(false, 10, 3, 0), |_| ()).is_err());
        let srs = table.lookup(UlSlotKey::new(false, 11, 3, 0), |info| info.srs(2).copied()).unwrap();
        assert_eq!(srs, Some(SrsInfo { handle: 2 }));
    }

    #[test]
    fn test_classes_and_symbols_are_separate() {
        let table = UlSlotTable::new();
        table.record(UlSlotKey::new(true, 4, 2, 7), |info| info.add_pucch(PucchInfo { handle: 3, pucch_format: 1 }));
        assert!(table.lookup(UlSlotKey::new(false, 4, 2, 7), |_| ()).is_err());
        assert!(table.lookup(UlSlotKey::new(true, 4, 2, 0), |_| ()).is_err());
        let fmt = table.lookup(UlSlotKey::new(true, 4, 2, 7), |info| info.pucch(3).map(|p| p.pucch_format)).unwrap();
        assert_eq!(fmt, Some(1));
    }

    #[test]
    fn test_write_then_read_across_threads() {
        let table = std::sync::Arc::new(UlSlotTable::new());
        let key = UlSlotKey::new(false, 1, 1, 0);
        let writer = {
            let table = std::sync::Arc::clone(&table);
            std::thread::spawn(move || {
                table.record(key, |info| info.add_pusch(PuschInfo { handle: 42, harq_process_id: 3, ..Default::default() }))
            })
        };
        writer.join().unwrap();
        let found = table.lookup(key, |info| info.pusch_mut(42).map(|p| p.harq_process_id)).unwrap();
        assert_eq!(found, Some(3));
    }
}
