use std::sync::Arc;

use anyhow::{bail, Result};
use bytes::{Bytes, BytesMut};
use leshy_protocol::{
    AckRequest, Delivery, Frame, FrameType, OpCode, ProtocolError, PublishAck, PublishRequest,
    RequestPayload, ResponsePayload, SubscribeRequest,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::Receiver;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::core::broadcaster::Listener;
use crate::core::queue::{Consumer, Queue};
use crate::core::storage::Message;
use crate::types::SharedBroadcaster;

/// Incremental frame reader over the stream's read half. `next` is
/// cancel-safe: partial input stays buffered across calls.
struct FrameReader {
    half: OwnedReadHalf,
    buf: BytesMut,
}

impl FrameReader {
    fn new(half: OwnedReadHalf) -> Self {
        FrameReader {
            half,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Returns the next complete frame, or `None` on a clean EOF.
    async fn next(&mut self) -> Result<Option<Frame>, ProtocolError> {
        loop {
            if let Some(frame) = Frame::decode(&mut self.buf)? {
                return Ok(Some(frame));
            }

            let n = self
                .half
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
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &Frame) -> std::io::Result<()> {
    let mut out = BytesMut::new();
    frame.encode(&mut out);
    writer.write_all(&out).await?;
    writer.flush().await
}

fn response_frame(correlation_id: u32, payload: ResponsePayload) -> Frame {
    Frame {
        version: 1,
        frame_type: FrameType::Response,
        correlation_id,
        payload: Vec::from(payload.serialize()),
    }
}

fn error_frame(correlation_id: u32, message: &str) -> Frame {
    Frame {
        version: 1,
        frame_type: FrameType::Error,
        correlation_id,
        payload: message.as_bytes().to_vec(),
    }
}

/// Drives one inbound connection. The first frame, bounded by the
/// handshake timeout, decides the role: a publish frame makes this a
/// publisher connection, a subscribe frame starts a subscriber session.
pub async fn handle_connection(
    stream: TcpStream,
    broadcaster: SharedBroadcaster,
    config: Arc<BrokerConfig>,
    shutdown_rx: watch::Receiver<()>,
) -> Result<()> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = FrameReader::new(read_half);

    let first = match timeout(config.handshake_timeout, reader.next()).await {
        Err(_) => {
            warn!("stream timed out waiting for the first frame");
            let _ = write_frame(&mut writer, &error_frame(0, "handshake timed out")).await;
            return Ok(());
        }
        Ok(read) => read?,
    };
    let Some(frame) = first else {
        return Ok(()); // client went away without sending anything
    };

    let request = RequestPayload::deserialize(Bytes::from(frame.payload))?;
    match request.op_code {
        OpCode::Publish => {
            publisher_loop(
                reader,
                writer,
                broadcaster,
                frame.correlation_id,
                request.data,
                shutdown_rx,
            )
            .await
        }
        OpCode::Subscribe => {
            subscriber_session(reader, writer, broadcaster, request.data, shutdown_rx).await
        }
        OpCode::Ack | OpCode::Deliver => {
            let _ = write_frame(
                &mut writer,
                &error_frame(frame.correlation_id, "first frame must name a queue"),
            )
            .await;
            bail!("first frame carried opcode {:?}", request.op_code);
        }
    }
}

/// Handles unary publishes for the lifetime of the connection.
async fn publisher_loop(
    mut reader: FrameReader,
    mut writer: OwnedWriteHalf,
    broadcaster: SharedBroadcaster,
    first_correlation_id: u32,
    first_data: Bytes,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<()> {
    handle_publish(&mut writer, &broadcaster, first_correlation_id, first_data).await?;

    loop {
        tokio::select! {
            read = reader.next() => {
                let Some(frame) = read? else {
                    return Ok(());
                };
                let request = RequestPayload::deserialize(Bytes::from(frame.payload))?;
                match request.op_code {
                    OpCode::Publish => {
                        handle_publish(&mut writer, &broadcaster, frame.correlation_id, request.data).await?;
                    }
                    other => {
                        let _ = write_frame(
                            &mut writer,
                            &error_frame(frame.correlation_id, "publisher connections only publish"),
                        )
                        .await;
                        bail!("publisher connection sent opcode {other:?}");
                    }
                }
            }

            _ = shutdown_rx.changed() => return Ok(()),
        }
    }
}

async fn handle_publish(
    writer: &mut OwnedWriteHalf,
    broadcaster: &SharedBroadcaster,
    correlation_id: u32,
    data: Bytes,
) -> Result<()> {
    let request = PublishRequest::deserialize(data)?;

    // Validation failures go back to the caller; the connection stays up.
    let queue = match Queue::new(request.queue) {
        Ok(queue) => queue,
        Err(err) => {
            write_frame(writer, &error_frame(correlation_id, &err.to_string())).await?;
            return Ok(());
        }
    };

    match broadcaster.publish_message(&queue, request.data) {
        Ok(id) => {
            let payload = ResponsePayload {
                op_code: OpCode::Publish,
                data: PublishAck { id }.serialize(),
            };
            write_frame(writer, &response_frame(correlation_id, payload)).await?;
        }
        Err(err) => {
            error!(error = %err, %queue, "saving message");
            write_frame(
                writer,
                &error_frame(correlation_id, &format!("saving message: {err}")),
            )
            .await?;
        }
    }

    Ok(())
}

/// One subscriber stream from handshake to close: register a listener,
/// replay the backlog, then multiplex live deliveries with ack intake.
async fn subscriber_session(
    mut reader: FrameReader,
    mut writer: OwnedWriteHalf,
    broadcaster: SharedBroadcaster,
    data: Bytes,
    shutdown_rx: watch::Receiver<()>,
) -> Result<()> {
    let request = SubscribeRequest::deserialize(data)?;

    let (queue, consumer) = match Queue::new(request.queue)
        .and_then(|queue| Ok((queue, Consumer::new(request.consumer)?)))
    {
        Ok(pair) => pair,
        Err(err) => {
            let _ = write_frame(&mut writer, &error_frame(0, &err.to_string())).await;
            bail!("rejecting subscribe: {err}");
        }
    };

    let (listener, mut deliveries) = Listener::new(queue, consumer);

    let backlog = match broadcaster.read_messages(&listener) {
        Ok(backlog) => backlog,
        Err(err) => {
            error!(error = %err, queue = %listener.queue, "reading messages");
            let _ = write_frame(&mut writer, &error_frame(0, &format!("getting messages: {err}"))).await;
            return Err(err.into());
        }
    };

    let result = subscribed(
        &mut reader,
        &mut writer,
        &broadcaster,
        &listener,
        &mut deliveries,
        backlog,
        shutdown_rx,
    )
    .await;

    info!(
        id = %listener.id,
        queue = %listener.queue,
        consumer = %listener.consumer,
        "disconnecting listener"
    );
    broadcaster.remove_listener(&listener);
    drop(deliveries); // ends any fan-out send still parked on this session

    result
}

async fn subscribed(
    reader: &mut FrameReader,
    writer: &mut OwnedWriteHalf,
    broadcaster: &SharedBroadcaster,
    listener: &Listener,
    deliveries: &mut Receiver<Delivery>,
    backlog: Vec<Message>,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<()> {
    debug!(messages = backlog.len(), "sending backlog to new listener");
    for msg in backlog {
        // Live deliveries queue up on the channel while the backlog drains,
        // which keeps replayed messages strictly first.
        send_delivery(
            writer,
            Delivery {
                id: msg.id,
                data: Bytes::from(msg.data),
            },
        )
        .await?;
    }

    loop {
        tokio::select! {
            delivery = deliveries.recv() => {
                // The session's own listener keeps a sender alive, so the
                // channel cannot report closed while we are here.
                let Some(delivery) = delivery else { return Ok(()) };
                send_delivery(writer, delivery).await?;
            }

            read = reader.next() => {
                let Some(frame) = read? else {
                    return Ok(()); // graceful EOF from the client
                };
                handle_ack(broadcaster, listener, frame).await?;
            }

            _ = shutdown_rx.changed() => return Ok(()),
        }
    }
}

async fn handle_ack(
    broadcaster: &SharedBroadcaster,
    listener: &Listener,
    frame: Frame,
) -> Result<()> {
    let request = RequestPayload::deserialize(Bytes::from(frame.payload))?;
    if request.op_code != OpCode::Ack {
        bail!(
            "subscriber sent opcode {:?} after the handshake",
            request.op_code
        );
    }

    let ack = AckRequest::deserialize(request.data)?;
    debug!(id = %ack.id, listener = %listener.id, "acking message");

    broadcaster
        .ack(listener, &ack.id)
        .map_err(|err| anyhow::anyhow!("acking message: {err}"))
}

async fn send_delivery(writer: &mut OwnedWriteHalf, delivery: Delivery) -> Result<()> {
    let payload = ResponsePayload {
        op_code: OpCode::Deliver,
        data: delivery.serialize(),
    };
    write_frame(writer, &response_frame(0, payload)).await?;
    Ok(())
}
