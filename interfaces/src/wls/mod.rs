//! WLS Shared-Memory Transport
//!
//! Fixed-size blocks carved from a pinned region are exchanged between the
//! translation layer and its peers (MAC and PHY). A message list travels as
//! a scatter-gather sequence of blocks flagged FIRST / NEXT / LAST, with a
//! side flag marking the low-latency (URLLC) class.

pub mod region;
pub mod pool;
pub mod element;
pub mod link;
pub mod session;

use std::time::Duration;

use bitflags::bitflags;

use crate::InterfaceError;

pub use element::{DataRef, ElementHeader, OutboundElement, ReceivedBody, ReceivedElement, WireMessage};
pub use link::LocalWls;
pub use pool::{BlockHandle, BufferPool, PoolBlock, PoolStats};
pub use region::{HeapRegion, MemoryRegion, ShmRegion};
pub use session::{Reclaim, RecvLists, WlsSession};

/// Largest message block exchanged on a channel
pub const MSG_MAXSIZE: usize = 16 * 16384;
/// Send cycles a sent or received block is kept before release
pub const TO_FREE_SIZE: usize = 5;
/// URLLC cycles; a mini-slot may be a single symbol long
pub const TO_FREE_SIZE_URLLC: usize = 14 * TO_FREE_SIZE;
/// UL blocks pre-posted per PHY instance
pub const FREE_BLOCKS_PER_PHY: usize = 100;

bitflags! {
    /// Per-block transfer flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WlsFlags: u16 {
        /// Scatter-gather list member
        const SG = 1 << 15;
        /// Low-latency class
        const URLLC = 1 << 11;
        const LTE = 1 << 10;
        const SYN = 1 << 9;
        /// End of a transfer
        const FIN = 1 << 8;
        const FIRST = Self::SG.bits() | Self::SYN.bits();
        const NEXT = Self::SG.bits();
        const LAST = Self::SG.bits() | Self::FIN.bits();
    }
}

impl WlsFlags {
    /// Position flag of the `i`-th block of an `n`-block list
    pub fn for_position(i: usize, n: usize) -> Self {
        if n <= 1 {
            WlsFlags::empty()
        } else if i == 0 {
            WlsFlags::FIRST
        } else if i + 1 == n {
            WlsFlags::LAST
        } else {
            WlsFlags::NEXT
        }
    }

    /// Whether the block closes a transfer
    pub fn ends_transfer(&self) -> bool {
        self.contains(WlsFlags::FIN)
    }
}

/// One block descriptor as seen on the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WlsEntry {
    /// Bus address of the block
    pub pa: u64,
    pub size: u32,
    pub msg_type: u16,
    pub flags: WlsFlags,
}

/// Blocking transport primitives of one channel endpoint
pub trait WlsTransport: Send + Sync {
    /// Block until the peer has attached
    fn ready(&self, timeout: Option<Duration>) -> Result<(), InterfaceError>;

    /// Block until at least one block is queued; returns the queued count
    fn wait(&self, timeout: Option<Duration>) -> Result<usize, InterfaceError>;

    /// Dequeue one block descriptor
    fn get(&self) -> Option<WlsEntry>;

    /// Enqueue one block descriptor towards the peer
    fn put(&self, entry: WlsEntry) -> Result<(), InterfaceError>;

    /// Post an empty block for the peer to fill
    fn enqueue_block(&self, pa: u64) -> Result<(), InterfaceError>;

    /// Take an empty block posted by the peer
    fn dequeue_block(&self) -> Option<u64>;

    /// Number of posted empty blocks
    fn posted_blocks(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_flags() {
        assert_eq!(WlsFlags::for_position(0, 1), WlsFlags::empty());
        assert_eq!(WlsFlags::for_position(0, 3), WlsFlags::FIRST);
        assert_eq!(WlsFlags::for_position(1, 3), WlsFlags::NEXT);
        assert_eq!(WlsFlags::for_position(2, 3), WlsFlags::LAST);
    }

    #[test]
    fn test_transfer_end() {
        assert!(WlsFlags::LAST.ends_transfer());
        assert!((WlsFlags::LAST | WlsFlags::URLLC).ends_transfer());
        assert!(WlsFlags::FIN.ends_transfer());
        assert!(!WlsFlags::NEXT.ends_transfer());
        assert!(!WlsFlags::FIRST.ends_transfer());
        assert!(!WlsFlags::empty().ends_transfer());
    }
}
