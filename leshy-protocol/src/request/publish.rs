use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::ProtocolError;
use crate::frame::MAX_DATA_BYTES;

//frame: [u32 queue_len][queue bytes][u32 data_len][data bytes]

#[derive(Debug)]
pub struct PublishRequest {
    pub queue: String,
    pub data: Bytes,
}

impl PublishRequest {
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32(self.queue.len() as u32);
        buf.extend_from_slice(self.queue.as_bytes());
        buf.put_u32(self.data.len() as u32);
        buf.extend_from_slice(&self.data);
        buf.freeze()
    }

    pub fn deserialize(mut buf: Bytes) -> Result<Self, ProtocolError> {
        if buf.remaining() < 4 {
            return Err(ProtocolError::PayloadError(
                "Incomplete publish payload".into(),
            ));
        }
        let queue_len = buf.get_u32() as usize;
        if buf.remaining() < queue_len + 4 {
            return Err(ProtocolError::PayloadError(
                "Incomplete publish payload".into(),
            ));
        }
        let queue_bytes = buf.split_to(queue_len);
        let queue = String::from_utf8(queue_bytes.to_vec())
            .map_err(|_| ProtocolError::PayloadError("Invalid UTF-8 in queue".into()))?;
        let data_len = buf.get_u32() as usize;
        if data_len > MAX_DATA_BYTES {
            return Err(ProtocolError::FrameTooLarge(data_len));
        }
        if buf.remaining() < data_len {
            return Err(ProtocolError::PayloadError(
                "Incomplete message payload".into(),
            ));
        }
        let data = buf.split_to(data_len);

        Ok(PublishRequest { queue, data })
    }
}
