use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::ProtocolError;

//frame: [u32 queue_len][queue bytes][u32 consumer_len][consumer bytes]

/// First frame of a subscriber stream. An empty consumer name subscribes
/// on the queue's primary cursor.
#[derive(Debug)]
pub struct SubscribeRequest {
    pub queue: String,
    pub consumer: String,
}

impl SubscribeRequest {
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u32(self.queue.len() as u32);
        buf.extend_from_slice(self.queue.as_bytes());
        buf.put_u32(self.consumer.len() as u32);
        buf.extend_from_slice(self.consumer.as_bytes());
        buf.freeze()
    }

    pub fn deserialize(mut buf: Bytes) -> Result<Self, ProtocolError> {
        if buf.remaining() < 4 {
            return Err(ProtocolError::PayloadError(
                "Incomplete subscribe payload".into(),
            ));
        }
        let queue_len = buf.get_u32() as usize;
        if buf.remaining() < queue_len + 4 {
            return Err(ProtocolError::PayloadError(
                "Incomplete subscribe payload".into(),
            ));
        }
        let queue = String::from_utf8(buf.split_to(queue_len).to_vec())
            .map_err(|_| ProtocolError::PayloadError("Invalid UTF-8 in queue".into()))?;
        let consumer_len = buf.get_u32() as usize;
        if buf.remaining() < consumer_len {
            return Err(ProtocolError::PayloadError(
                "Incomplete subscribe payload".into(),
            ));
        }
        let consumer = String::from_utf8(buf.split_to(consumer_len).to_vec())
            .map_err(|_| ProtocolError::PayloadError("Invalid UTF-8 in consumer".into()))?;

        Ok(SubscribeRequest { queue, consumer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_empty_consumer() {
        let req = SubscribeRequest {
            queue: "q".to_string(),
            consumer: String::new(),
        };
        let parsed = SubscribeRequest::deserialize(req.serialize()).unwrap();
        assert_eq!(parsed.queue, "q");
        assert_eq!(parsed.consumer, "");
    }
}
