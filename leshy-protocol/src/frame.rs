/*
[ version: u8 ]
[ frame_type: u8 ]
[ correlation_id: u32 ]
[ payload_len: u32 ]
[ checksum: u32 ]
[ payload bytes... ]
*/

use bytes::{Buf, BufMut, BytesMut};
use xxhash_rust::xxh32::xxh32;

use crate::ProtocolError;

/// Hard cap on message data carried in a single publish or delivery.
pub const MAX_DATA_BYTES: usize = 16 * 1024 * 1024;

// Data cap plus slack for the payload envelope (op code, queue name, id).
const MAX_PAYLOAD_BYTES: usize = MAX_DATA_BYTES + 4096;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameType {
    Request = 1,
    Response = 2,
    Error = 3,
    Heartbeat = 4, // (future: keepalive)
}

impl TryFrom<u8> for FrameType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(FrameType::Request),
            2 => Ok(FrameType::Response),
            3 => Ok(FrameType::Error),
            4 => Ok(FrameType::Heartbeat),
            _ => Err(ProtocolError::UnknownFrameType(value)),
        }
    }
}

/// One framed transport message. Requests and responses are matched through
/// `correlation_id`; server pushes (deliveries) use correlation id 0.
#[derive(Debug)]
pub struct Frame {
    pub version: u8,
    pub frame_type: FrameType,
    pub correlation_id: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.frame_type as u8);
        buf.put_u32(self.correlation_id);
        buf.put_u32(self.payload.len() as u32);
        let hash = xxh32(&self.payload, 0);
        buf.put_u32(hash);
        buf.extend_from_slice(&self.payload);
    }

    /// Decodes one frame from the front of `buf`, consuming its bytes.
    /// Returns `Ok(None)` while the frame is not fully buffered yet.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if buf.len() < 14 {
            return Ok(None); // Not enough for frame header
        }

        let mut cursor = &buf[..];

        let version = cursor.get_u8();
        let frame_type_raw = cursor.get_u8();
        let correlation_id = cursor.get_u32();
        let payload_len = cursor.get_u32() as usize;
        let checksum_expected = cursor.get_u32();

        if payload_len > MAX_PAYLOAD_BYTES {
            return Err(ProtocolError::FrameTooLarge(payload_len));
        }

        if cursor.remaining() < payload_len {
            return Ok(None); // Payload not fully available yet
        }

        buf.advance(14); // consume header
        let payload = buf.split_to(payload_len).to_vec();
        let checksum_actual = xxh32(&payload, 0);

        if checksum_actual != checksum_expected {
            return Err(ProtocolError::ChecksumMismatch {
                expected: checksum_expected,
                found: checksum_actual,
            });
        }

        Ok(Some(Frame {
            version,
            frame_type: FrameType::try_from(frame_type_raw)?,
            correlation_id,
            payload,
        }))
    }
}
