//! FAPI Translation Layers Library
//!
//! This crate implements the PHY-MAC translation core: per-cell state,
//! outbound message queues, the UL slot correlation table and the P5 / P7
//! translators in both directions.

pub mod context;
pub mod stats;
pub mod queue;
pub mod ul_slot;
pub mod p5;
pub mod p7;
pub mod mac2phy;
pub mod phy2mac;
pub mod urllc;

use interfaces::InterfaceError;
use thiserror::Error;

pub use context::{PhyConfig, PhyContext, PhyEntry, PhyInstance, PhyState, MAX_PHY_INSTANCES};

/// Translation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FapiError {
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Phy {phy_id} in state {state:?} cannot accept {msg}")]
    InvalidState {
        phy_id: u8,
        state: PhyState,
        msg: &'static str,
    },

    #[error("No valid data: {0}")]
    NoValidData(String),

    #[error("Translation failure: {0}")]
    TranslationFailure(String),

    #[error("Transport error: {0}")]
    Transport(#[from] InterfaceError),

    #[error("API ordering error: {0}")]
    ApiOrdering(String),
}
