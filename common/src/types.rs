//! Common Types for the FAPI Translation Layer
//!
//! Defines the radio-level scalar types shared by the transport, the
//! translators and the binary

use serde::{Deserialize, Serialize};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Physical Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pci(pub u16);

impl Pci {
    /// Maximum valid PCI value (0-1007)
    pub const MAX: u16 = 1007;

    /// Create a new PCI with validation
    pub fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }
}

/// System frame number, slot and symbol of an air-interface event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SfnSlot {
    /// System frame number (0-1023)
    pub sfn: u16,
    /// Slot within the frame
    pub slot: u8,
    /// Starting symbol within the slot (mini-slot scheduling)
    pub sym: u8,
}

impl SfnSlot {
    /// Create a slot-aligned timestamp (symbol 0)
    pub fn new(sfn: u16, slot: u8) -> Self {
        Self { sfn, slot, sym: 0 }
    }

    /// Same timestamp with an explicit starting symbol
    pub fn with_sym(self, sym: u8) -> Self {
        Self { sym, ..self }
    }

    /// Advance by one slot, wrapping at the frame and SFN boundaries
    pub fn next_slot(self, slots_per_frame: u16) -> Self {
        let slots = slots_per_frame.max(1);
        let next = self.slot as u16 + 1;
        if next >= slots {
            Self { sfn: (self.sfn + 1) % 1024, slot: 0, sym: 0 }
        } else {
            Self { sfn: self.sfn, slot: next as u8, sym: 0 }
        }
    }
}

impl std::fmt::Display for SfnSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.sfn, self.slot, self.sym)
    }
}

/// Subcarrier spacing, indexed by numerology (mu)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    /// 15 kHz
    Scs15 = 0,
    /// 30 kHz
    Scs30 = 1,
    /// 60 kHz
    Scs60 = 2,
    /// 120 kHz
    Scs120 = 3,
    /// 240 kHz
    Scs240 = 4,
}

impl SubcarrierSpacing {
    /// Look up the spacing for a numerology value as carried in FAPI TLVs
    pub fn from_numerology(mu: u8) -> Option<Self> {
        Self::from_u8(mu)
    }

    /// Numerology (mu)
    pub fn numerology(&self) -> u8 {
        *self as u8
    }

    /// Number of slots in a 10 ms frame
    pub fn slots_per_frame(&self) -> u16 {
        10 << self.numerology()
    }
}

/// Duplex mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplexMode {
    /// Frequency Division Duplex
    Fdd,
    /// Time Division Duplex
    Tdd,
}

impl DuplexMode {
    /// FAPI encodes FDD as 0 and TDD as 1
    pub fn from_fapi(value: u8) -> Self {
        if value == 0 {
            DuplexMode::Fdd
        } else {
            DuplexMode::Tdd
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pci_validation() {
        assert!(Pci::new(0).is_some());
        assert!(Pci::new(1007).is_some());
        assert!(Pci::new(1008).is_none());
    }

    #[test]
    fn test_duplex_from_fapi() {
        assert_eq!(DuplexMode::from_fapi(0), DuplexMode::Fdd);
        assert_eq!(DuplexMode::from_fapi(1), DuplexMode::Tdd);
    }

    #[test]
    fn test_numerology() {
        let scs = SubcarrierSpacing::from_numerology(1).unwrap();
        assert_eq!(scs, SubcarrierSpacing::Scs30);
        assert_eq!(scs.slots_per_frame(), 20);
        assert!(SubcarrierSpacing::from_numerology(7).is_none());
    }

    #[test]
    fn test_sfn_slot_wraps() {
        let last = SfnSlot::new(1023, 19);
        assert_eq!(last.next_slot(20), SfnSlot::new(0, 0));
        assert_eq!(SfnSlot::new(10, 3).next_slot(20), SfnSlot::new(10, 4));
    }
}
