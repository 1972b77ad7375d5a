//! Queue elements
//!
//! Block layout, little-endian:
//!
//! | off | size | field                |
//! |-----|------|----------------------|
//! | 0   | 2    | msg_type             |
//! | 2   | 1    | num_message_in_block |
//! | 3   | 1    | align_offset         |
//! | 4   | 4    | msg_len              |
//! | 8   | 8    | next (bus address)   |
//! | 16  | 2    | msg_id               |
//! | 18  | 4    | body length          |
//! | 22  | ..   | bincode body         |

use std::fmt::Debug;
use std::sync::Arc;

use bytes::{Buf, BufMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::pool::{BufferPool, PoolBlock};
use super::WlsFlags;
use crate::fapi::{FapiMessage, MsgHeaderInd};
use crate::iapi::IapiMessage;
use crate::message_types::{FapiMsgId, IapiMsgType};
use crate::InterfaceError;

pub const ELEM_HEADER_LEN: usize = 16;
pub const MSG_HEADER_LEN: usize = 6;

/// A message that can travel in a queue element
pub trait WireMessage: Serialize + DeserializeOwned + Debug + Send + 'static {
    /// Identifier written into both the element and the message header
    fn wire_id(&self) -> u16;

    /// Element types that carry raw payload bytes instead of a message
    fn is_raw_block(msg_type: u16) -> bool;
}

impl WireMessage for FapiMessage {
    fn wire_id(&self) -> u16 {
        self.msg_id().raw()
    }

    fn is_raw_block(msg_type: u16) -> bool {
        msg_type == FapiMsgId::VendorZbcBlock.raw()
    }
}

impl WireMessage for IapiMessage {
    fn wire_id(&self) -> u16 {
        self.msg_type().raw()
    }

    fn is_raw_block(msg_type: u16) -> bool {
        msg_type == IapiMsgType::TxDataBlock.raw()
    }
}

/// Fixed header at the start of every block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ElementHeader {
    pub msg_type: u16,
    pub num_message_in_block: u8,
    pub align_offset: u8,
    pub msg_len: u32,
    pub next: u64,
}

impl ElementHeader {
    pub fn encode(&self, mut buf: &mut [u8]) -> Result<(), InterfaceError> {
        if buf.len() < ELEM_HEADER_LEN {
            return Err(InterfaceError::Codec("block shorter than element header".into()));
        }
        buf.put_u16_le(self.msg_type);
        buf.put_u8(self.num_message_in_block);
        buf.put_u8(self.align_offset);
        buf.put_u32_le(self.msg_len);
        buf.put_u64_le(self.next);
        Ok(())
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, InterfaceError> {
        if buf.remaining() < ELEM_HEADER_LEN {
            return Err(InterfaceError::Codec("truncated element header".into()));
        }
        Ok(Self {
            msg_type: buf.get_u16_le(),
            num_message_in_block: buf.get_u8(),
            align_offset: buf.get_u8(),
            msg_len: buf.get_u32_le(),
            next: buf.get_u64_le(),
        })
    }
}

/// Raw block forwarded alongside a message without copying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRef {
    pub pa: u64,
    pub len: u32,
    pub msg_type: u16,
}

/// A pending outbound message together with its reserved block
#[derive(Debug)]
pub struct OutboundElement<M: WireMessage> {
    block: PoolBlock,
    msg: M,
    data: Vec<DataRef>,
}

impl<M: WireMessage> OutboundElement<M> {
    /// Reserve a block for `msg`; fails when the pool is exhausted or the
    /// message does not fit one block
    pub fn new(pool: &Arc<BufferPool>, msg: M) -> Result<Self, InterfaceError> {
        let body = bincode::serialized_size(&msg)? as usize;
        let needed = ELEM_HEADER_LEN + MSG_HEADER_LEN + body;
        if needed > pool.payload_capacity() {
            return Err(InterfaceError::Codec(format!(
                "message 0x{:x} needs {} bytes, block holds {}",
                msg.wire_id(),
                needed,
                pool.payload_capacity()
            )));
        }
        let block = pool.allocate()?;
        Ok(Self { block, msg, data: Vec::new() })
    }

    pub fn message(&self) -> &M {
        &self.msg
    }

    pub fn message_mut(&mut self) -> &mut M {
        &mut self.msg
    }

    pub fn wire_id(&self) -> u16 {
        self.msg.wire_id()
    }

    /// Forward a raw block right after this element
    pub fn attach_data(&mut self, data: DataRef) {
        self.data.push(data);
    }

    pub fn data(&self) -> &[DataRef] {
        &self.data
    }

    /// Bus address of the reserved block
    pub fn pa(&self) -> u64 {
        self.block.pa()
    }

    /// Write header and body into the block; returns the block, its total
    /// length and the attached data blocks
    pub fn seal(mut self, next: u64) -> Result<(PoolBlock, u32, Vec<DataRef>), InterfaceError> {
        let body = bincode::serialize(&self.msg)?;
        let msg_len = (MSG_HEADER_LEN + body.len()) as u32;
        let total = ELEM_HEADER_LEN + msg_len as usize;
        let id = self.msg.wire_id();

        let buf = self.block.as_mut_slice();
        if total > buf.len() {
            return Err(InterfaceError::Codec(format!("message 0x{:x} outgrew its block", id)));
        }
        let header = ElementHeader {
            msg_type: id,
            num_message_in_block: 1,
            align_offset: 0,
            msg_len,
            next,
        };
        header.encode(&mut buf[..ELEM_HEADER_LEN])?;
        let mut cursor = &mut buf[ELEM_HEADER_LEN..total];
        cursor.put_u16_le(id);
        cursor.put_u32_le(body.len() as u32);
        cursor.put_slice(&body);

        Ok((self.block, total as u32, self.data))
    }
}

impl OutboundElement<FapiMessage> {
    /// Count one more message behind a per-carrier header element
    pub fn bump_header_count(&mut self) -> bool {
        match &mut self.msg {
            FapiMessage::MsgHeader(MsgHeaderInd { num_msg, .. }) => {
                *num_msg = num_msg.saturating_add(1);
                true
            }
            _ => false,
        }
    }

    /// Message count of a header element
    pub fn header_count(&self) -> Option<u8> {
        match &self.msg {
            FapiMessage::MsgHeader(hdr) => Some(hdr.num_msg),
            _ => None,
        }
    }
}

/// Decode the message carried in a block's bytes
pub fn decode_message<M: WireMessage>(bytes: &[u8]) -> Result<(ElementHeader, M), InterfaceError> {
    let header = ElementHeader::decode(bytes)?;
    let end = ELEM_HEADER_LEN + header.msg_len as usize;
    if end > bytes.len() || (header.msg_len as usize) < MSG_HEADER_LEN {
        return Err(InterfaceError::Codec(format!("bad message length {}", header.msg_len)));
    }
    let mut cursor = &bytes[ELEM_HEADER_LEN..end];
    let msg_id = cursor.get_u16_le();
    let body_len = cursor.get_u32_le() as usize;
    if msg_id != header.msg_type || body_len > cursor.remaining() {
        return Err(InterfaceError::Codec(format!(
            "message header {:#x}/{} disagrees with element {:#x}",
            msg_id, body_len, header.msg_type
        )));
    }
    let msg: M = bincode::deserialize(&cursor[..body_len])?;
    Ok((header, msg))
}

/// Contents of one received block
#[derive(Debug)]
pub enum ReceivedBody<M> {
    Message(M),
    /// Raw block; read through the pool or forwarded by address
    Data,
}

#[derive(Debug)]
pub struct ReceivedElement<M> {
    pub pa: u64,
    pub size: u32,
    pub msg_type: u16,
    pub flags: WlsFlags,
    pub body: ReceivedBody<M>,
}

impl<M> ReceivedElement<M> {
    pub fn message(&self) -> Option<&M> {
        match &self.body {
            ReceivedBody::Message(m) => Some(m),
            ReceivedBody::Data => None,
        }
    }

    pub fn into_message(self) -> Option<M> {
        match self.body {
            ReceivedBody::Message(m) => Some(m),
            ReceivedBody::Data => None,
        }
    }

    pub fn as_data_ref(&self) -> DataRef {
        DataRef { pa: self.pa, len: self.size, msg_type: self.msg_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fapi::{SlotIndication, StopIndication};
    use crate::wls::region::HeapRegion;

    fn pool(blocks: usize, size: usize) -> Arc<BufferPool> {
        BufferPool::new(Box::new(HeapRegion::new(blocks * size).unwrap()), size).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let hdr = ElementHeader { msg_type: 0x82, num_message_in_block: 1, align_offset: 0, msg_len: 10, next: 0x1122 };
        let mut buf = [0u8; ELEM_HEADER_LEN];
        hdr.encode(&mut buf).unwrap();
        assert_eq!(&buf[..4], &[0x82, 0x00, 0x01, 0x00]);
        assert_eq!(&buf[4..8], &[10, 0, 0, 0]);
        assert_eq!(&buf[8..10], &[0x22, 0x11]);
        assert_eq!(ElementHeader::decode(&buf).unwrap(), hdr);
    }

    #[test]
    fn test_seal_then_decode() {
        let pool = pool(2, 512);
        let msg = FapiMessage::SlotIndication(SlotIndication { sfn: 10, slot: 3 });
        let elem = OutboundElement::new(&pool, msg.clone()).unwrap();
        let (block, len, data) = elem.seal(0).unwrap();
        assert!(data.is_empty());

        let (header, decoded) = decode_message::<FapiMessage>(&block.as_slice()[..len as usize]).unwrap();
        assert_eq!(header.msg_type, 0x82);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_oversized_message_rejected() {
        let pool = pool(1, 64);
        let msg = FapiMessage::RxDataIndication(crate::fapi::RxDataIndication {
            sfn: 0,
            slot: 0,
            pdus: vec![crate::fapi::RxDataPdu { pdu: vec![0; 256], ..Default::default() }],
        });
        assert!(matches!(OutboundElement::new(&pool, msg), Err(InterfaceError::Codec(_))));
        // Nothing was reserved
        assert_eq!(pool.free_blocks(), 1);
    }

    #[test]
    fn test_header_count_bump() {
        let pool = pool(2, 256);
        let mut hdr = OutboundElement::new(&pool, FapiMessage::MsgHeader(MsgHeaderInd { num_msg: 0, phy_id: 2 })).unwrap();
        assert!(hdr.bump_header_count());
        assert!(hdr.bump_header_count());
        assert_eq!(hdr.header_count(), Some(2));

        let mut other = OutboundElement::new(&pool, FapiMessage::StopIndication(StopIndication)).unwrap();
        assert!(!other.bump_header_count());
        assert_eq!(other.header_count(), None);
    }

    #[test]
    fn test_mismatched_ids_rejected() {
        let pool = pool(1, 256);
        let elem = OutboundElement::new(&pool, FapiMessage::StopIndication(StopIndication)).unwrap();
        let (mut block, len, _) = elem.seal(0).unwrap();
        block.as_mut_slice()[0] = 0x99;
        assert!(decode_message::<FapiMessage>(&block.as_slice()[..len as usize]).is_err());
    }
}
