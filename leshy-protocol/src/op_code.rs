use crate::ProtocolError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum OpCode {
    /// Unary publish of one message onto a queue.
    Publish = 1,
    /// First frame of a subscriber stream, names queue and consumer.
    Subscribe = 2,
    /// Subsequent subscriber frame acknowledging one message id.
    Ack = 3,
    /// Server push of one message to a subscriber.
    Deliver = 4,
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OpCode::Publish),
            2 => Ok(OpCode::Subscribe),
            3 => Ok(OpCode::Ack),
            4 => Ok(OpCode::Deliver),
            _ => Err(ProtocolError::UnknownOpCode(value)),
        }
    }
}
