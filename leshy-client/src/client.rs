use anyhow::Context;
use bytes::{Bytes, BytesMut};
use leshy_protocol::{
    AckRequest, Delivery, Frame, FrameType, OpCode, ProtocolError, PublishAck, PublishRequest,
    RequestPayload, ResponsePayload, SubscribeRequest,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub struct LeshyClient {
    stream: TcpStream,
    buf: BytesMut,
    correlation_id: u32,
}

impl LeshyClient {
    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .context("Failed to connect to leshy server")?;

        Ok(LeshyClient {
            stream,
            buf: BytesMut::with_capacity(4096),
            correlation_id: 0,
        })
    }

    async fn send_request(&mut self, payload: RequestPayload) -> Result<u32, ProtocolError> {
        self.correlation_id = self.correlation_id.wrapping_add(1);

        let frame = Frame {
            version: 1,
            frame_type: FrameType::Request,
            correlation_id: self.correlation_id,
            payload: Vec::from(payload.serialize()),
        };

        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        self.stream
            .write_all(&buf)
            .await
            .map_err(ProtocolError::IoError)?;
        Ok(self.correlation_id)
    }

    async fn read_response(&mut self) -> Result<Frame, ProtocolError> {
        loop {
            if let Some(frame) = Frame::decode(&mut self.buf)? {
                return Ok(frame);
            }
            let n = self
                .stream
                .read_buf(&mut self.buf)
                .await
                .map_err(ProtocolError::IoError)?;
            if n == 0 {
                return Err(ProtocolError::IncompleteFrame);
            }
        }
    }

    /// Publishes one message and waits for the broker-assigned id.
    pub async fn publish(&mut self, queue: &str, data: &[u8]) -> Result<PublishAck, ProtocolError> {
        let req = PublishRequest {
            queue: queue.to_string(),
            data: Bytes::copy_from_slice(data),
        };
        let payload = RequestPayload {
            op_code: OpCode::Publish,
            data: req.serialize(),
        };

        self.send_request(payload).await?;

        let response = self.read_response().await?;
        if response.frame_type == FrameType::Error {
            return Err(ProtocolError::Remote(
                String::from_utf8_lossy(&response.payload).into_owned(),
            ));
        }

        let resp_payload = ResponsePayload::deserialize(Bytes::from(response.payload))?;
        if resp_payload.op_code != OpCode::Publish {
            return Err(ProtocolError::UnknownOpCode(resp_payload.op_code as u8));
        }

        PublishAck::deserialize(resp_payload.data)
    }

    /// Turns the connection into a subscriber stream on the given queue.
    /// An empty consumer name follows the queue's primary cursor.
    pub async fn subscribe(
        mut self,
        queue: &str,
        consumer: &str,
    ) -> Result<Subscription, ProtocolError> {
        let req = SubscribeRequest {
            queue: queue.to_string(),
            consumer: consumer.to_string(),
        };
        let payload = RequestPayload {
            op_code: OpCode::Subscribe,
            data: req.serialize(),
        };
        self.send_request(payload).await?;

        let (read, write) = self.stream.into_split();
        Ok(Subscription {
            read,
            write,
            buf: self.buf,
        })
    }
}

/// A live subscriber stream: deliveries flow in through `next`, acks flow
/// out through `ack`.
pub struct Subscription {
    read: OwnedReadHalf,
    write: OwnedWriteHalf,
    buf: BytesMut,
}

impl Subscription {
    /// Waits for the next delivery. Returns `None` when the server closes
    /// the stream.
    pub async fn next(&mut self) -> Result<Option<Delivery>, ProtocolError> {
        loop {
            if let Some(frame) = Frame::decode(&mut self.buf)? {
                if frame.frame_type == FrameType::Error {
                    return Err(ProtocolError::Remote(
                        String::from_utf8_lossy(&frame.payload).into_owned(),
                    ));
                }

                let payload = ResponsePayload::deserialize(Bytes::from(frame.payload))?;
                if payload.op_code != OpCode::Deliver {
                    return Err(ProtocolError::UnknownOpCode(payload.op_code as u8));
                }
                return Ok(Some(Delivery::deserialize(payload.data)?));
            }

            let n = self
                .read
                .read_buf(&mut self.buf)
                .await
                .map_err(ProtocolError::IoError)?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError::IncompleteFrame);
            }
        }
    }

    /// Acknowledges one delivered message by id. Fire-and-forget.
    pub async fn ack(&mut self, id: &str) -> Result<(), ProtocolError> {
        let payload = RequestPayload {
            op_code: OpCode::Ack,
            data: AckRequest { id: id.to_string() }.serialize(),
        };
        let frame = Frame {
            version: 1,
            frame_type: FrameType::Request,
            correlation_id: 0,
            payload: Vec::from(payload.serialize()),
        };

        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        self.write
            .write_all(&buf)
            .await
            .map_err(ProtocolError::IoError)?;
        Ok(())
    }
}
