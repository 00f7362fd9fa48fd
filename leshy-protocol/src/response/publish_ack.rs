use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::ProtocolError;

//frame: [u32 id_len][id bytes]

/// Confirms a publish, carrying the id the broker assigned to the message.
#[derive(Debug)]
pub struct PublishAck {
    pub id: String,
}

impl PublishAck {
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + self.id.len());
        buf.put_u32(self.id.len() as u32);
        buf.extend_from_slice(self.id.as_bytes());
        buf.freeze()
    }

    pub fn deserialize(mut buf: Bytes) -> Result<Self, ProtocolError> {
        if buf.remaining() < 4 {
            return Err(ProtocolError::PayloadError(
                "Incomplete publish ack payload".into(),
            ));
        }
        let id_len = buf.get_u32() as usize;
        if buf.remaining() < id_len {
            return Err(ProtocolError::PayloadError(
                "Incomplete publish ack payload".into(),
            ));
        }
        let id = String::from_utf8(buf.split_to(id_len).to_vec())
            .map_err(|_| ProtocolError::PayloadError("Invalid UTF-8 in id".into()))?;

        Ok(PublishAck { id })
    }
}
