use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::ProtocolError;

//frame: [u32 id_len][id bytes]

/// Acknowledges one delivered message on the subscriber's own cursor.
#[derive(Debug)]
pub struct AckRequest {
    pub id: String,
}

impl AckRequest {
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32(self.id.len() as u32);
        buf.extend_from_slice(self.id.as_bytes());
        buf.freeze()
    }

    pub fn deserialize(mut buf: Bytes) -> Result<Self, ProtocolError> {
        if buf.remaining() < 4 {
            return Err(ProtocolError::PayloadError("Incomplete ack payload".into()));
        }
        let id_len = buf.get_u32() as usize;
        if buf.remaining() < id_len {
            return Err(ProtocolError::PayloadError("Incomplete ack payload".into()));
        }
        let id = String::from_utf8(buf.split_to(id_len).to_vec())
            .map_err(|_| ProtocolError::PayloadError("Invalid UTF-8 in id".into()))?;

        Ok(AckRequest { id })
    }
}
