//! Message Identifiers for the FAPI and Vendor (IAPI) Interfaces
//!
//! Defines the closed message-id enumerations carried in every WLS element
//! header, the FAPI error codes and the PDU type tags of both sides.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

/// FAPI message identifiers (SCF 222) plus the vendor extensions exchanged with the MAC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
#[repr(u16)]
pub enum FapiMsgId {
    ParamRequest = 0x00,
    ParamResponse = 0x01,
    ConfigRequest = 0x02,
    ConfigResponse = 0x03,
    StartRequest = 0x04,
    StopRequest = 0x05,
    StopIndication = 0x06,
    ErrorIndication = 0x07,
    DlTtiRequest = 0x80,
    UlTtiRequest = 0x81,
    SlotIndication = 0x82,
    UlDciRequest = 0x83,
    TxDataRequest = 0x84,
    RxDataIndication = 0x85,
    CrcIndication = 0x86,
    UciIndication = 0x87,
    SrsIndication = 0x88,
    RachIndication = 0x89,
    /// Per-carrier vendor parameters accompanying a request list
    VendorMessage = 0x300,
    VendorExtShutdownRequest = 0x301,
    VendorExtShutdownResponse = 0x302,
    /// Per-TTI vendor indication record trailing the standard indications
    VendorExtP7Indication = 0x303,
    /// Per-carrier framing header {num_msg, phy_id}
    VendorMsgHeaderInd = 0x304,
    /// Zero-copy TX payload block following TX_DATA.request
    VendorZbcBlock = 0x305,
}

impl FapiMsgId {
    /// Parse a raw identifier from an element header
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::from_u16(raw)
    }

    /// Raw identifier
    pub fn raw(self) -> u16 {
        self as u16
    }
}

/// Vendor (IAPI) message types exchanged with the PHY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
#[repr(u16)]
pub enum IapiMsgType {
    ConfigReq = 0x01,
    ConfigResp = 0x02,
    StartReq = 0x03,
    StartResp = 0x04,
    StopReq = 0x05,
    StopResp = 0x06,
    ShutdownReq = 0x07,
    ShutdownResp = 0x08,
    DlConfigReq = 0x10,
    UlConfigReq = 0x11,
    UlDciReq = 0x12,
    TxReq = 0x13,
    RxUlschInd = 0x20,
    RxUlschUciInd = 0x21,
    CrcInd = 0x22,
    UciInd = 0x23,
    RxRachInd = 0x24,
    RxSrsInd = 0x25,
    SlotInd = 0x26,
    ErrInd = 0x27,
    /// Payload block referenced by a TX request
    TxDataBlock = 0x30,
}

impl IapiMsgType {
    /// Parse a raw type tag from an element header
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::from_u16(raw)
    }

    /// Raw type tag
    pub fn raw(self) -> u16 {
        self as u16
    }
}

/// FAPI error codes carried by responses and ERROR.indication
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum FapiErrorCode {
    MsgOk = 0,
    MsgInvalidState = 1,
    MsgInvalidConfig = 2,
    SfnOutOfSync = 3,
    MsgSlotErr = 4,
    MsgBchMissing = 5,
    MsgInvalidSfn = 6,
    MsgUlDciErr = 7,
    MsgTxErr = 8,
}

/// DL_TTI.request PDU type tags
pub mod dl_pdu_type {
    pub const PDCCH: u16 = 0;
    pub const PDSCH: u16 = 1;
    pub const CSI_RS: u16 = 2;
    pub const SSB: u16 = 3;
}

/// UL_TTI.request PDU type tags
pub mod ul_pdu_type {
    pub const PRACH: u16 = 0;
    pub const PUSCH: u16 = 1;
    pub const PUCCH_F0_F1: u16 = 2;
    pub const PUCCH_F2_F3_F4: u16 = 3;
    pub const SRS: u16 = 4;
}
