//! PHY/MAC Wire Interfaces Library
//!
//! This crate provides the typed FAPI and vendor (IAPI) message sets and the
//! WLS shared-memory transport used to move them between processes.

pub mod message_types;
pub mod fapi;
pub mod iapi;
pub mod wls;

use thiserror::Error;

/// Interface errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("Buffer pool exhausted ({0} blocks in use)")]
    OutOfMemory(usize),

    #[error("Block {0} freed twice")]
    DoubleFree(usize),

    #[error("Block does not belong to this pool: {0}")]
    ForeignBlock(String),

    #[error("Stale block handle for block {0}")]
    StaleHandle(usize),

    #[error("Tail guard of block {0} overwritten")]
    Corrupted(usize),

    #[error("Peer not attached")]
    NotAttached,

    #[error("WLS put failed: {0}")]
    PutFailed(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Memory region error: {0}")]
    Region(String),

    #[error("Timed out waiting for peer")]
    Timeout,
}

impl From<bincode::Error> for InterfaceError {
    fn from(err: bincode::Error) -> Self {
        InterfaceError::Codec(err.to_string())
    }
}
