use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::ProtocolError;
use crate::frame::MAX_DATA_BYTES;

//frame: [u32 id_len][id bytes][u32 data_len][data bytes]

/// One message pushed to a subscriber, either from the backlog replay or
/// from a live publish.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: String,
    pub data: Bytes,
}

impl Delivery {
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(8 + self.id.len() + self.data.len());
        buf.put_u32(self.id.len() as u32);
        buf.extend_from_slice(self.id.as_bytes());
        buf.put_u32(self.data.len() as u32);
        buf.extend_from_slice(&self.data);
        buf.freeze()
    }

    pub fn deserialize(mut buf: Bytes) -> Result<Self, ProtocolError> {
        if buf.remaining() < 4 {
            return Err(ProtocolError::PayloadError(
                "Incomplete delivery payload".into(),
            ));
        }
        let id_len = buf.get_u32() as usize;
        if buf.remaining() < id_len + 4 {
            return Err(ProtocolError::PayloadError(
                "Incomplete delivery payload".into(),
            ));
        }
        let id = String::from_utf8(buf.split_to(id_len).to_vec())
            .map_err(|_| ProtocolError::PayloadError("Invalid UTF-8 in id".into()))?;
        let data_len = buf.get_u32() as usize;
        if data_len > MAX_DATA_BYTES {
            return Err(ProtocolError::FrameTooLarge(data_len));
        }
        if buf.remaining() < data_len {
            return Err(ProtocolError::PayloadError(
                "Incomplete delivery payload".into(),
            ));
        }
        let data = buf.split_to(data_len);

        Ok(Delivery { id, data })
    }
}
